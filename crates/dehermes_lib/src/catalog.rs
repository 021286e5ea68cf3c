
use serde::{Deserialize, Serialize};

use crate::DecompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperandEncoding {
    Reg8,
    Reg32,
    UInt8,
    UInt16,
    UInt32,
    Addr8,
    Addr32,
    Imm32,
    Double,
    UInt8S,
    UInt16S,
    UInt32S,
}

impl OperandEncoding {
    pub fn width(self) -> usize {
        match self {
            OperandEncoding::Reg8
            | OperandEncoding::UInt8
            | OperandEncoding::Addr8
            | OperandEncoding::UInt8S => 1,
            OperandEncoding::UInt16 | OperandEncoding::UInt16S => 2,
            OperandEncoding::Reg32
            | OperandEncoding::UInt32
            | OperandEncoding::Addr32
            | OperandEncoding::Imm32
            | OperandEncoding::UInt32S => 4,
            OperandEncoding::Double => 8,
        }
    }

}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionDefinition {
    pub opcode: u8,
    pub name: String,
    pub operands: Vec<OperandEncoding>,
}

impl InstructionDefinition {
    /// Encoded size of the whole instruction, opcode byte included.
    pub fn size(&self) -> usize {
        1 + self.operands.iter().map(|e| e.width()).sum::<usize>()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpcodeCatalog {
    pub version: u32,
    pub definitions: Vec<InstructionDefinition>,
}

const BYTECODE_96: &str = include_str!("../resources/bytecode96.json");

impl OpcodeCatalog {
    pub fn from_json(json: &str) -> Result<Self, DecompileError> {
        let catalog: OpcodeCatalog = serde_json::from_str(json)
            .map_err(|e| DecompileError::InvalidCatalog(e.to_string()))?;
        // the definition list is indexed by encoded opcode value
        for (i, def) in catalog.definitions.iter().enumerate() {
            if def.opcode as usize != i {
                return Err(DecompileError::InvalidCatalog(format!(
                    "definition {} is out of order (opcode {})",
                    i, def.opcode
                )));
            }
        }
        Ok(catalog)
    }

    pub fn builtin(version: u32) -> Result<Self, DecompileError> {
        match version {
            96 => Self::from_json(BYTECODE_96),
            other => Err(DecompileError::UnsupportedVersion(other)),
        }
    }

    pub fn get(&self, opcode: u8) -> Option<&InstructionDefinition> {
        self.definitions.get(opcode as usize)
    }

    pub fn find(&self, name: &str) -> Option<&InstructionDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    pub fn name(&self, opcode: u8) -> &str {
        self.get(opcode).map(|d| d.name.as_str()).unwrap_or("<invalid>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_loads() {
        let catalog = OpcodeCatalog::builtin(96).unwrap();
        assert_eq!(catalog.version, 96);
        let ret = catalog.find("Ret").unwrap();
        assert_eq!(ret.operands, vec![OperandEncoding::Reg8]);
        assert_eq!(catalog.get(ret.opcode).unwrap().name, "Ret");
    }

    #[test]
    fn unsupported_version_is_rejected() {
        assert!(matches!(
            OpcodeCatalog::builtin(51),
            Err(DecompileError::UnsupportedVersion(51))
        ));
    }

    #[test]
    fn instruction_sizes_follow_operand_widths() {
        let catalog = OpcodeCatalog::builtin(96).unwrap();
        // opcode byte + Addr8 + Reg8 + Reg8
        assert_eq!(catalog.find("JStrictEqual").unwrap().size(), 4);
        // opcode byte + Reg8 + Double
        assert_eq!(catalog.find("LoadConstDouble").unwrap().size(), 10);
    }

    #[test]
    fn out_of_order_definitions_are_rejected() {
        let json = r#"{ "version": 96, "definitions": [
            { "opcode": 3, "name": "Bogus", "operands": [] }
        ] }"#;
        assert!(matches!(
            OpcodeCatalog::from_json(json),
            Err(DecompileError::InvalidCatalog(_))
        ));
    }
}
