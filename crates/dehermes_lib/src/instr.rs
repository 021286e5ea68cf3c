
use byteorder::{ByteOrder, LittleEndian};

use crate::DecompileError;
use crate::catalog::{OpcodeCatalog, OperandEncoding};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Byte(u8),
    UShort(u16),
    UInt(u32),
    Int(i32),
    Double(f64),
    StringIdx(u32),
}

impl Operand {
    pub fn as_u32(self) -> Option<u32> {
        match self {
            Operand::Byte(v) => Some(v as u32),
            Operand::UShort(v) => Some(v as u32),
            Operand::UInt(v) => Some(v),
            Operand::StringIdx(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub offset: u32,
    pub opcode: u8,
    pub length: u8,
    pub operands: Vec<Operand>,
}

impl Instr {
    fn operand(&self, index: usize) -> Result<Operand, DecompileError> {
        self.operands.get(index).copied().ok_or(DecompileError::OperandType {
            opcode: self.opcode,
            index,
        })
    }

    /// Register operand (Reg8 or Reg32).
    pub fn reg(&self, index: usize) -> Result<u32, DecompileError> {
        self.operand(index)?
            .as_u32()
            .ok_or(DecompileError::OperandType { opcode: self.opcode, index })
    }

    pub fn uint(&self, index: usize) -> Result<u32, DecompileError> {
        self.operand(index)?
            .as_u32()
            .ok_or(DecompileError::OperandType { opcode: self.opcode, index })
    }

    /// Jump displacement or signed immediate.
    pub fn int(&self, index: usize) -> Result<i32, DecompileError> {
        match self.operand(index)? {
            Operand::Int(v) => Ok(v),
            _ => Err(DecompileError::OperandType { opcode: self.opcode, index }),
        }
    }

    pub fn double(&self, index: usize) -> Result<f64, DecompileError> {
        match self.operand(index)? {
            Operand::Double(v) => Ok(v),
            _ => Err(DecompileError::OperandType { opcode: self.opcode, index }),
        }
    }

    pub fn string_index(&self, index: usize) -> Result<u32, DecompileError> {
        match self.operand(index)? {
            Operand::StringIdx(v) => Ok(v),
            _ => Err(DecompileError::OperandType { opcode: self.opcode, index }),
        }
    }
}

/// Decodes one function's raw bytecode into its ordered instruction sequence.
pub fn decode_stream(catalog: &OpcodeCatalog, code: &[u8]) -> Result<Vec<Instr>, DecompileError> {
    let mut out = Vec::new();
    let mut pos: usize = 0;
    while pos < code.len() {
        let opcode = code[pos];
        let def = catalog.get(opcode).ok_or(DecompileError::UnknownOpcode {
            opcode,
            offset: pos as u32,
        })?;
        let size = def.size();
        if code.len() - pos < size {
            return Err(DecompileError::TruncatedInstruction {
                offset: pos as u32,
                size,
                remaining: code.len() - pos,
            });
        }

        let mut operands = Vec::with_capacity(def.operands.len());
        let mut cursor = pos + 1;
        for encoding in &def.operands {
            let raw = &code[cursor..cursor + encoding.width()];
            let operand = match encoding {
                OperandEncoding::Reg8 | OperandEncoding::UInt8 => Operand::Byte(raw[0]),
                OperandEncoding::UInt16 => Operand::UShort(LittleEndian::read_u16(raw)),
                OperandEncoding::Reg32 | OperandEncoding::UInt32 => {
                    Operand::UInt(LittleEndian::read_u32(raw))
                }
                OperandEncoding::Addr8 => Operand::Int(raw[0] as i8 as i32),
                OperandEncoding::Addr32 | OperandEncoding::Imm32 => {
                    Operand::Int(LittleEndian::read_i32(raw))
                }
                OperandEncoding::Double => Operand::Double(LittleEndian::read_f64(raw)),
                OperandEncoding::UInt8S => Operand::StringIdx(raw[0] as u32),
                OperandEncoding::UInt16S => Operand::StringIdx(LittleEndian::read_u16(raw) as u32),
                OperandEncoding::UInt32S => Operand::StringIdx(LittleEndian::read_u32(raw)),
            };
            operands.push(operand);
            cursor += encoding.width();
        }

        out.push(Instr {
            offset: pos as u32,
            opcode,
            length: size as u8,
            operands,
        });
        pos += size;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> OpcodeCatalog {
        OpcodeCatalog::builtin(96).unwrap()
    }

    fn op(c: &OpcodeCatalog, name: &str) -> u8 {
        c.find(name).unwrap().opcode
    }

    #[test]
    fn decodes_offsets_and_operands() {
        let c = catalog();
        let mut code = vec![op(&c, "LoadConstUInt8"), 1, 7];
        code.extend_from_slice(&[op(&c, "JStrictEqual"), 0xfc_u8, 1, 2]);
        code.push(op(&c, "Ret"));
        code.push(1);

        let instrs = decode_stream(&c, &code).unwrap();
        assert_eq!(instrs.len(), 3);
        assert_eq!(instrs[0].offset, 0);
        assert_eq!(instrs[0].operands, vec![Operand::Byte(1), Operand::Byte(7)]);
        assert_eq!(instrs[1].offset, 3);
        // Addr8 sign-extends
        assert_eq!(instrs[1].int(0).unwrap(), -4);
        assert_eq!(instrs[2].offset, 7);
        assert_eq!(instrs[2].length, 2);
    }

    #[test]
    fn offsets_are_strictly_increasing() {
        let c = catalog();
        let code = vec![
            op(&c, "LoadConstTrue"), 0,
            op(&c, "LoadConstFalse"), 1,
            op(&c, "Ret"), 0,
        ];
        let instrs = decode_stream(&c, &code).unwrap();
        for pair in instrs.windows(2) {
            assert!(pair[0].offset < pair[1].offset);
        }
    }

    #[test]
    fn double_operand_reads_ieee754() {
        let c = catalog();
        let mut code = vec![op(&c, "LoadConstDouble"), 0];
        code.extend_from_slice(&1.5f64.to_le_bytes());
        let instrs = decode_stream(&c, &code).unwrap();
        assert_eq!(instrs[0].double(1).unwrap(), 1.5);
    }

    #[test]
    fn truncated_instruction_is_fatal() {
        let c = catalog();
        let code = vec![op(&c, "LoadConstUInt8"), 0];
        assert!(matches!(
            decode_stream(&c, &code),
            Err(DecompileError::TruncatedInstruction { offset: 0, size: 3, remaining: 2 })
        ));
    }

    #[test]
    fn unknown_opcode_is_fatal() {
        let c = catalog();
        assert!(matches!(
            decode_stream(&c, &[0xee]),
            Err(DecompileError::UnknownOpcode { opcode: 0xee, offset: 0 })
        ));
    }

    #[test]
    fn operand_accessor_checks_type() {
        let c = catalog();
        let code = vec![op(&c, "LoadConstTrue"), 3];
        let instrs = decode_stream(&c, &code).unwrap();
        assert_eq!(instrs[0].reg(0).unwrap(), 3);
        assert!(matches!(
            instrs[0].int(0),
            Err(DecompileError::OperandType { index: 0, .. })
        ));
    }
}
