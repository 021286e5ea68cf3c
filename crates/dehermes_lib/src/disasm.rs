
use crate::catalog::{OpcodeCatalog, OperandEncoding};
use crate::databuf::{self, BufferTag, BufferValue};
use crate::instr::{Instr, decode_stream};
use crate::refs::{BufferKind, ReferenceTracker};
use crate::{BytecodeModule, DecompileError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisassemblerOptions {
    pub verbose: bool,
}

impl Default for DisassemblerOptions {
    fn default() -> Self {
        Self { verbose: false }
    }
}

fn asm_value(module: &BytecodeModule, value: &BufferValue) -> String {
    match value {
        BufferValue::Null => "null".into(),
        BufferValue::Bool(v) => v.to_string(),
        BufferValue::Number(v) => v.to_string(),
        BufferValue::Integer(v) => v.to_string(),
        BufferValue::StringIdx(i) => match module.string(*i) {
            Ok(s) => format!("'{s}'"),
            Err(_) => format!("<string:{i}>"),
        },
    }
}

fn data_section(
    out: &mut String,
    module: &BytecodeModule,
    tracker: &ReferenceTracker,
    kind: BufferKind,
    verbose: bool,
) {
    for (offset, record) in tracker.section(kind).iter() {
        match databuf::read_run(module.buffer(kind), offset) {
            Ok(run) => {
                match run.tag {
                    BufferTag::Null | BufferTag::True | BufferTag::False => {
                        out.push_str(&format!(
                            ".data {} {}[{}]",
                            record.name,
                            run.tag.label(),
                            run.values.len()
                        ));
                    }
                    _ => {
                        let values: Vec<String> =
                            run.values.iter().map(|v| asm_value(module, v)).collect();
                        out.push_str(&format!(
                            ".data {} {}[{}] {{ {} }}",
                            record.name,
                            run.tag.label(),
                            run.values.len(),
                            values.join(", ")
                        ));
                    }
                }
                if verbose {
                    out.push_str(&format!(" // offset {offset}"));
                }
                out.push('\n');
                if verbose {
                    for site in &record.refs {
                        out.push_str(&format!("{:50}// Ref: {}\n", "", site));
                    }
                }
            }
            Err(_) => {
                out.push_str(&format!(
                    ".data {} // malformed buffer at offset {offset}\n",
                    record.name
                ));
            }
        }
    }
}

fn instruction_line(
    module: &BytecodeModule,
    catalog: &OpcodeCatalog,
    tracker: &ReferenceTracker,
    instr: &Instr,
) -> Result<String, DecompileError> {
    let def = catalog.get(instr.opcode).ok_or(DecompileError::UnknownOpcode {
        opcode: instr.opcode,
        offset: instr.offset,
    })?;

    let mut parts = Vec::with_capacity(def.operands.len());
    let mut notes = Vec::new();
    for (i, encoding) in def.operands.iter().enumerate() {
        let text = match encoding {
            OperandEncoding::Reg8 | OperandEncoding::Reg32 => format!("r{}", instr.reg(i)?),
            OperandEncoding::UInt8 | OperandEncoding::UInt16 | OperandEncoding::UInt32 => {
                instr.uint(i)?.to_string()
            }
            OperandEncoding::Imm32 => instr.int(i)?.to_string(),
            OperandEncoding::Addr8 | OperandEncoding::Addr32 => {
                let rel = instr.int(i)?;
                notes.push(format!("=> {}", instr.offset as i64 + rel as i64));
                format!("{rel:+}")
            }
            OperandEncoding::Double => instr.double(i)?.to_string(),
            OperandEncoding::UInt8S | OperandEncoding::UInt16S | OperandEncoding::UInt32S => {
                let index = instr.string_index(i)?;
                if let Ok(s) = module.string(index) {
                    notes.push(format!("'{s}'"));
                }
                index.to_string()
            }
        };
        parts.push(text);
    }

    match def.name.as_str() {
        "NewArrayWithBuffer" | "NewArrayWithBufferLong" => {
            if let Some(name) = tracker.name_for(BufferKind::Array, instr.uint(3)?) {
                notes.push(name.to_string());
            }
        }
        "NewObjectWithBuffer" | "NewObjectWithBufferLong" => {
            if let Some(name) = tracker.name_for(BufferKind::ObjectKey, instr.uint(3)?) {
                notes.push(name.to_string());
            }
            if let Some(name) = tracker.name_for(BufferKind::ObjectValue, instr.uint(4)?) {
                notes.push(name.to_string());
            }
        }
        _ => {}
    }

    let mut line = format!("{:05} {:<24}{}", instr.offset, def.name, parts.join(", "));
    if !notes.is_empty() {
        line.push_str(" ; ");
        line.push_str(&notes.join(", "));
    }
    Ok(line.trim_end().to_string())
}

/// Dumps the whole module: format header, named data sections, then one
/// listing per function.
pub fn disassemble_module(
    module: &BytecodeModule,
    catalog: &OpcodeCatalog,
    options: DisassemblerOptions,
) -> Result<String, DecompileError> {
    let tracker = ReferenceTracker::scan(module, catalog);

    let mut out = String::new();
    out.push_str(&format!(".hasm {} auto\n", module.version));

    let has_data = [BufferKind::Array, BufferKind::ObjectKey, BufferKind::ObjectValue]
        .iter()
        .any(|&k| !tracker.section(k).is_empty());
    if has_data {
        out.push('\n');
        for kind in [BufferKind::Array, BufferKind::ObjectKey, BufferKind::ObjectValue] {
            data_section(&mut out, module, &tracker, kind, options.verbose);
        }
    }

    for function in &module.functions {
        let name = module
            .function_name(function)
            .map(str::to_string)
            .unwrap_or_else(|| format!("func{}", function.function_id));
        out.push_str(&format!(
            "\n.start function {}(id={}, params={}, registers={})\n",
            name,
            function.function_id,
            function.param_count,
            function.register_count
        ));
        match decode_stream(catalog, &function.bytecode) {
            Ok(instrs) => {
                for instr in &instrs {
                    out.push_str(&instruction_line(module, catalog, &tracker, instr)?);
                    out.push('\n');
                }
            }
            Err(error) => {
                out.push_str(&format!("// failed to disassemble: {error}\n"));
            }
        }
        out.push_str(".end\n");
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FunctionHeader;

    fn module() -> BytecodeModule {
        let catalog = OpcodeCatalog::builtin(96).unwrap();
        let mut array_buffer = vec![0x70 | 2];
        array_buffer.extend_from_slice(&7i32.to_le_bytes());
        array_buffer.extend_from_slice(&9i32.to_le_bytes());

        let mut code = vec![catalog.find("NewArrayWithBuffer").unwrap().opcode, 0];
        code.extend_from_slice(&2u16.to_le_bytes()); // size hint
        code.extend_from_slice(&2u16.to_le_bytes()); // count
        code.extend_from_slice(&0u16.to_le_bytes()); // buffer offset
        code.push(catalog.find("Ret").unwrap().opcode);
        code.push(0);

        BytecodeModule {
            version: 96,
            functions: vec![FunctionHeader {
                function_id: 0,
                name_index: None,
                param_count: 1,
                register_count: 4,
                bytecode: code,
            }],
            string_table: Vec::new(),
            array_buffer,
            object_key_buffer: Vec::new(),
            object_value_buffer: Vec::new(),
        }
    }

    #[test]
    fn header_data_and_listing() {
        let module = module();
        let out = disassemble(&module);
        assert!(out.starts_with(".hasm 96 auto\n"));
        assert!(out.contains(".data A0 Integer[2] { 7, 9 }"));
        assert!(out.contains(".start function func0(id=0, params=1, registers=4)"));
        assert!(out.contains("00000 NewArrayWithBuffer"));
        assert!(out.contains("; A0"));
        assert!(out.contains("00008 Ret"));
    }

    #[test]
    fn verbose_mode_lists_references() {
        let module = module();
        let catalog = OpcodeCatalog::builtin(96).unwrap();
        let out =
            disassemble_module(&module, &catalog, DisassemblerOptions { verbose: true }).unwrap();
        assert!(out.contains("// offset 0"));
        assert!(out.contains("// Ref: FCT0:0"));
    }

    fn disassemble(module: &BytecodeModule) -> String {
        let catalog = OpcodeCatalog::builtin(96).unwrap();
        disassemble_module(module, &catalog, DisassemblerOptions::default()).unwrap()
    }
}
