
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::OpcodeCatalog;
use crate::instr::{Instr, decode_stream};
use crate::{BytecodeModule, DecompileError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferKind {
    Array,
    ObjectKey,
    ObjectValue,
}

impl BufferKind {
    pub fn prefix(self) -> &'static str {
        match self {
            BufferKind::Array => "A",
            BufferKind::ObjectKey => "K",
            BufferKind::ObjectValue => "V",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRef {
    pub function_id: u32,
    pub offset: u32,
}

impl fmt::Display for CodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FCT{}:{}", self.function_id, self.offset)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub name: String,
    pub count: u32,
    pub refs: Vec<CodeRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BufferRefs {
    by_offset: BTreeMap<u32, ReferenceRecord>,
    named: u32,
}

impl BufferRefs {
    fn add(&mut self, kind: BufferKind, offset: u32, count: u32, site: CodeRef) {
        let named = &mut self.named;
        let record = self.by_offset.entry(offset).or_insert_with(|| {
            let name = format!("{}{}", kind.prefix(), *named);
            *named += 1;
            ReferenceRecord { name, count: 0, refs: Vec::new() }
        });
        record.count = record.count.max(count);
        record.refs.push(site);
    }

    pub fn get(&self, offset: u32) -> Option<&ReferenceRecord> {
        self.by_offset.get(&offset)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &ReferenceRecord)> {
        self.by_offset.iter().map(|(&offset, record)| (offset, record))
    }

    pub fn is_empty(&self) -> bool {
        self.by_offset.is_empty()
    }
}

/// Assigns every referenced literal-buffer offset a stable symbolic name.
/// Runs once over the whole module before any function is decompiled, so the
/// names are deterministic: functions in declaration order, instructions in
/// offset order, first encounter takes the lowest index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceTracker {
    arrays: BufferRefs,
    object_keys: BufferRefs,
    object_values: BufferRefs,
}

impl ReferenceTracker {
    pub fn scan(module: &BytecodeModule, catalog: &OpcodeCatalog) -> Self {
        let mut tracker = ReferenceTracker::default();
        for function in &module.functions {
            // a function whose stream does not decode is reported by its own
            // pass; the pre-pass just skips it
            let Ok(instrs) = decode_stream(catalog, &function.bytecode) else {
                continue;
            };
            for instr in &instrs {
                let _ = tracker.observe(catalog, function.function_id, instr);
            }
        }
        tracker
    }

    fn observe(
        &mut self,
        catalog: &OpcodeCatalog,
        function_id: u32,
        instr: &Instr,
    ) -> Result<(), DecompileError> {
        let site = CodeRef { function_id, offset: instr.offset };
        match catalog.name(instr.opcode) {
            "NewArrayWithBuffer" | "NewArrayWithBufferLong" => {
                self.arrays
                    .add(BufferKind::Array, instr.uint(3)?, instr.uint(2)?, site);
            }
            "NewObjectWithBuffer" | "NewObjectWithBufferLong" => {
                let count = instr.uint(2)?;
                self.object_keys
                    .add(BufferKind::ObjectKey, instr.uint(3)?, count, site);
                self.object_values
                    .add(BufferKind::ObjectValue, instr.uint(4)?, count, site);
            }
            _ => {}
        }
        Ok(())
    }

    pub fn section(&self, kind: BufferKind) -> &BufferRefs {
        match kind {
            BufferKind::Array => &self.arrays,
            BufferKind::ObjectKey => &self.object_keys,
            BufferKind::ObjectValue => &self.object_values,
        }
    }

    pub fn name_for(&self, kind: BufferKind, offset: u32) -> Option<&str> {
        self.section(kind).get(offset).map(|r| r.name.as_str())
    }
}
