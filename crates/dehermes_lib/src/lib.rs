
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod ast;
pub mod catalog;
pub mod databuf;
pub mod decompiler;
pub mod disasm;
pub mod instr;
pub mod refs;
pub mod registers;

pub use ast::{BlockStatement, LiteralValue, ObjectProperty, SourceBuilder, SyntaxNode, render};
pub use catalog::{InstructionDefinition, OpcodeCatalog, OperandEncoding};
pub use databuf::{BufferEntry, BufferRun, BufferTag, BufferValue};
pub use decompiler::{
    DecompiledFunction, Decompiler, DecompilerOptions, FunctionFailure, ModuleDecompilation,
};
pub use disasm::DisassemblerOptions;
pub use instr::{Instr, Operand};
pub use refs::{BufferKind, CodeRef, ReferenceRecord, ReferenceTracker};
pub use registers::{RegisterFile, is_synthetic_register, register_name};

#[derive(Debug, Error)]
pub enum DecompileError {
    #[error("unexpected end of input")]
    Eof,

    #[error("unsupported bytecode version: {0}")]
    UnsupportedVersion(u32),

    #[error("invalid opcode catalog: {0}")]
    InvalidCatalog(String),

    #[error("invalid string table index: {0}")]
    InvalidStringIndex(u32),

    #[error("function {0} does not exist")]
    InvalidFunctionId(u32),

    #[error("malformed literal buffer at offset {offset}")]
    MalformedBuffer { offset: u32 },

    #[error("literal run of {len} values cannot be encoded")]
    OversizedRun { len: usize },

    #[error("literal run value does not match tag {tag:?}")]
    MismatchedRunValue { tag: databuf::BufferTag },

    #[error("truncated instruction at offset {offset} (need {size} bytes, {remaining} remain)")]
    TruncatedInstruction { offset: u32, size: usize, remaining: usize },

    #[error("unknown opcode 0x{opcode:02x} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: u32 },

    #[error("operand {index} of opcode 0x{opcode:02x} has unexpected type")]
    OperandType { opcode: u8, index: usize },

    #[error("no handler for opcode {name} (0x{opcode:02x})")]
    UnsupportedOpcode { opcode: u8, name: String },

    #[error("unresolved jump target {target} in function {function_id}")]
    UnresolvedJumpTarget { function_id: u32, target: u32 },

    #[error("unsupported control flow: backward jump of {jump} at offset {offset}")]
    UnsupportedControlFlow { offset: u32, jump: i32 },

    #[error("branch nesting exceeds limit of {limit}")]
    BranchNestingLimit { limit: usize },

    #[error("register {index} out of range for register file of size {size}")]
    InvalidRegisterIndex { index: u32, size: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionHeader {
    pub function_id: u32,
    pub name_index: Option<u32>,
    pub param_count: u32,
    pub register_count: u32,
    pub bytecode: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BytecodeModule {
    pub version: u32,
    pub functions: Vec<FunctionHeader>,
    pub string_table: Vec<String>,
    pub array_buffer: Vec<u8>,
    pub object_key_buffer: Vec<u8>,
    pub object_value_buffer: Vec<u8>,
}

impl BytecodeModule {
    pub fn string(&self, index: u32) -> Result<&str, DecompileError> {
        self.string_table
            .get(index as usize)
            .map(String::as_str)
            .ok_or(DecompileError::InvalidStringIndex(index))
    }

    pub fn function(&self, function_id: u32) -> Result<&FunctionHeader, DecompileError> {
        self.functions
            .iter()
            .find(|f| f.function_id == function_id)
            .ok_or(DecompileError::InvalidFunctionId(function_id))
    }

    pub fn function_name(&self, header: &FunctionHeader) -> Option<&str> {
        let idx = header.name_index?;
        self.string_table
            .get(idx as usize)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn buffer(&self, kind: refs::BufferKind) -> &[u8] {
        match kind {
            refs::BufferKind::Array => &self.array_buffer,
            refs::BufferKind::ObjectKey => &self.object_key_buffer,
            refs::BufferKind::ObjectValue => &self.object_value_buffer,
        }
    }
}

pub fn decompile(module: &BytecodeModule) -> Result<String, DecompileError> {
    decompile_with_options(module, DecompilerOptions::default())
}

pub fn decompile_with_options(
    module: &BytecodeModule,
    options: DecompilerOptions,
) -> Result<String, DecompileError> {
    let catalog = OpcodeCatalog::builtin(module.version)?;
    let decompiler = Decompiler::new(module, &catalog, options)?;
    Ok(decompiler.decompile_module().to_source())
}

pub fn disassemble(
    module: &BytecodeModule,
    options: DisassemblerOptions,
) -> Result<String, DecompileError> {
    let catalog = OpcodeCatalog::builtin(module.version)?;
    disasm::disassemble_module(module, &catalog, options)
}
