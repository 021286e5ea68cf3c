
use crate::DecompileError;
use crate::ast::SyntaxNode;

pub fn register_name(index: u32) -> String {
    format!("r{index}")
}

/// True for identifiers following the synthetic register-name pattern
/// (`r` followed by digits), which signal an unreconstructed binding.
pub fn is_synthetic_register(name: &str) -> bool {
    name.strip_prefix('r')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

#[derive(Debug, Clone, Default)]
struct Slot {
    value: Option<SyntaxNode>,
    marked: bool,
    // value not yet inlined at a read site nor flushed as a named binding
    pending: bool,
}

/// Per-function symbolic register file. The size is fixed by the function
/// header; every access is bounds-checked. Branch exploration works on
/// `snapshot()` copies, never on shared state.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    slots: Vec<Slot>,
}

impl RegisterFile {
    pub fn new(size: usize) -> Self {
        Self { slots: vec![Slot::default(); size] }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, index: u32) -> Result<&Slot, DecompileError> {
        self.slots.get(index as usize).ok_or(DecompileError::InvalidRegisterIndex {
            index,
            size: self.slots.len(),
        })
    }

    fn slot_mut(&mut self, index: u32) -> Result<&mut Slot, DecompileError> {
        let size = self.slots.len();
        self.slots
            .get_mut(index as usize)
            .ok_or(DecompileError::InvalidRegisterIndex { index, size })
    }

    pub fn assign(&mut self, index: u32, value: SyntaxNode) -> Result<(), DecompileError> {
        let slot = self.slot_mut(index)?;
        slot.value = Some(value);
        slot.pending = true;
        Ok(())
    }

    /// Clears the pending flag after the caller has already emitted the
    /// binding for this register.
    pub fn settle(&mut self, index: u32) -> Result<(), DecompileError> {
        self.slot_mut(index)?.pending = false;
        Ok(())
    }

    /// Resolves a register read. Usage-marked and empty registers read as the
    /// synthetic name; anything else inlines the stored expression and counts
    /// as consumption.
    pub fn read(&mut self, index: u32) -> Result<SyntaxNode, DecompileError> {
        let slot = self.slot_mut(index)?;
        if slot.marked || slot.value.is_none() {
            return Ok(SyntaxNode::ident(register_name(index)));
        }
        slot.pending = false;
        Ok(slot.value.clone().unwrap_or_else(|| SyntaxNode::ident(register_name(index))))
    }

    pub fn is_marked(&self, index: u32) -> Result<bool, DecompileError> {
        Ok(self.slot(index)?.marked)
    }

    /// Marks the register so every later read resolves to its synthetic name.
    /// If a stored value is still pending, it is handed back exactly once so
    /// the caller can materialize `r<n> = value` before the first named read.
    /// The mark survives reassignment.
    pub fn mark_usage(&mut self, index: u32) -> Result<Option<SyntaxNode>, DecompileError> {
        let slot = self.slot_mut(index)?;
        slot.marked = true;
        if slot.pending {
            slot.pending = false;
            return Ok(slot.value.clone());
        }
        Ok(None)
    }

    pub fn clear(&mut self, index: u32) -> Result<(), DecompileError> {
        let slot = self.slot_mut(index)?;
        slot.value = None;
        slot.pending = false;
        Ok(())
    }

    /// Independent copy for speculative branch exploration; writes through the
    /// copy never reach the original.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Values still pending at the end of a pass (or a branch), in register
    /// order, for flushing as trailing synthetic assignments.
    pub fn drain_pending(&mut self) -> Vec<(u32, SyntaxNode)> {
        let mut out = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.pending {
                if let Some(value) = slot.value.clone() {
                    out.push((index as u32, value));
                }
                slot.pending = false;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{LiteralValue, SyntaxNode};

    fn lit(v: bool) -> SyntaxNode {
        SyntaxNode::Literal(LiteralValue::Bool(v))
    }

    #[test]
    fn read_inlines_until_marked() {
        let mut regs = RegisterFile::new(4);
        regs.assign(0, lit(true)).unwrap();
        assert_eq!(regs.read(0).unwrap(), lit(true));

        regs.mark_usage(0).unwrap();
        assert_eq!(regs.read(0).unwrap(), SyntaxNode::ident("r0"));
    }

    #[test]
    fn empty_register_reads_as_synthetic_name() {
        let mut regs = RegisterFile::new(2);
        assert_eq!(regs.read(1).unwrap(), SyntaxNode::ident("r1"));
    }

    #[test]
    fn mark_survives_reassignment() {
        let mut regs = RegisterFile::new(2);
        regs.assign(0, lit(true)).unwrap();
        regs.mark_usage(0).unwrap();
        regs.assign(0, lit(false)).unwrap();
        assert_eq!(regs.read(0).unwrap(), SyntaxNode::ident("r0"));
    }

    #[test]
    fn mark_usage_hands_back_the_pending_value_once() {
        let mut regs = RegisterFile::new(2);
        regs.assign(0, lit(true)).unwrap();
        assert_eq!(regs.mark_usage(0).unwrap(), Some(lit(true)));
        assert_eq!(regs.mark_usage(0).unwrap(), None);
    }

    #[test]
    fn snapshot_is_independent() {
        let mut regs = RegisterFile::new(2);
        regs.assign(0, lit(true)).unwrap();
        let mut branch = regs.snapshot();
        branch.assign(0, lit(false)).unwrap();
        branch.assign(1, lit(false)).unwrap();
        assert_eq!(regs.read(0).unwrap(), lit(true));
        assert_eq!(regs.read(1).unwrap(), SyntaxNode::ident("r1"));
    }

    #[test]
    fn drain_pending_skips_consumed_values() {
        let mut regs = RegisterFile::new(3);
        regs.assign(0, lit(true)).unwrap();
        regs.assign(1, lit(false)).unwrap();
        let _ = regs.read(0).unwrap(); // consumed by an inline use
        let pending = regs.drain_pending();
        assert_eq!(pending, vec![(1, lit(false))]);
        assert!(regs.drain_pending().is_empty());
    }

    #[test]
    fn out_of_range_access_is_a_fault() {
        let mut regs = RegisterFile::new(2);
        assert!(matches!(
            regs.assign(2, lit(true)),
            Err(DecompileError::InvalidRegisterIndex { index: 2, size: 2 })
        ));
        assert!(matches!(
            regs.read(9),
            Err(DecompileError::InvalidRegisterIndex { index: 9, size: 2 })
        ));
    }

    #[test]
    fn synthetic_name_pattern() {
        assert!(is_synthetic_register("r0"));
        assert!(is_synthetic_register("r17"));
        assert!(!is_synthetic_register("r"));
        assert!(!is_synthetic_register("radius"));
        assert!(!is_synthetic_register("par1"));
    }
}
