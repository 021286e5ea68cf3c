
use serde::Serialize;

use crate::ast::{BlockStatement, LiteralValue, ObjectProperty, SyntaxNode, render};
use crate::catalog::OpcodeCatalog;
use crate::databuf::{self, BufferValue};
use crate::instr::{Instr, decode_stream};
use crate::refs::ReferenceTracker;
use crate::registers::{RegisterFile, register_name};
use crate::{BytecodeModule, DecompileError, FunctionHeader};

// branch recursion is bounded by source nesting depth; fail closed on
// hostile inputs instead of exhausting the call stack
const MAX_BRANCH_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecompilerOptions {
    pub omit_explicit_global: bool,
}

impl Default for DecompilerOptions {
    fn default() -> Self {
        Self { omit_explicit_global: false }
    }
}

#[derive(Debug)]
pub struct FunctionFailure {
    pub function_id: u32,
    pub error: DecompileError,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecompiledFunction {
    pub function_id: u32,
    pub ast: SyntaxNode,
}

/// Result of a module-level run: every function that decompiled, plus a
/// manifest of the ones that faulted. One function's fault never aborts its
/// siblings.
#[derive(Debug)]
pub struct ModuleDecompilation {
    pub functions: Vec<DecompiledFunction>,
    pub failures: Vec<FunctionFailure>,
}

impl ModuleDecompilation {
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        for function in &self.functions {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&render(&function.ast));
        }
        for failure in &self.failures {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!(
                "// function {} failed to decompile: {}\n",
                failure.function_id, failure.error
            ));
        }
        out
    }
}

/// Mutable state bundle for one function pass (or one branch exploration
/// within it): the working instruction slice, the cursor, the register file
/// and the block being built.
struct DecompilerContext<'a> {
    function: &'a FunctionHeader,
    instrs: &'a [Instr],
    cursor: usize,
    registers: RegisterFile,
    block: BlockStatement,
    depth: usize,
}

pub struct Decompiler<'m> {
    module: &'m BytecodeModule,
    catalog: &'m OpcodeCatalog,
    options: DecompilerOptions,
    references: ReferenceTracker,
}

fn lit(value: LiteralValue) -> SyntaxNode {
    SyntaxNode::Literal(value)
}

fn assign_stmt(register: u32, value: SyntaxNode) -> SyntaxNode {
    SyntaxNode::Assignment {
        target: Box::new(SyntaxNode::ident(register_name(register))),
        value: Box::new(value),
    }
}

fn member(object: SyntaxNode, property: SyntaxNode, computed: bool) -> SyntaxNode {
    SyntaxNode::Member {
        object: Box::new(object),
        property: Box::new(property),
        computed,
    }
}

impl<'m> Decompiler<'m> {
    /// Runs the global reference pre-pass and prepares a decompiler for the
    /// module. The pre-pass output is read-only afterwards.
    pub fn new(
        module: &'m BytecodeModule,
        catalog: &'m OpcodeCatalog,
        options: DecompilerOptions,
    ) -> Result<Self, DecompileError> {
        if catalog.version != module.version {
            return Err(DecompileError::UnsupportedVersion(module.version));
        }
        let references = ReferenceTracker::scan(module, catalog);
        Ok(Self { module, catalog, options, references })
    }

    pub fn references(&self) -> &ReferenceTracker {
        &self.references
    }

    pub fn decompile_module(&self) -> ModuleDecompilation {
        let mut functions = Vec::new();
        let mut failures = Vec::new();
        for header in &self.module.functions {
            match self.decompile_function(header.function_id) {
                Ok(ast) => functions.push(DecompiledFunction {
                    function_id: header.function_id,
                    ast,
                }),
                Err(error) => failures.push(FunctionFailure {
                    function_id: header.function_id,
                    error,
                }),
            }
        }
        ModuleDecompilation { functions, failures }
    }

    pub fn decompile_function(&self, function_id: u32) -> Result<SyntaxNode, DecompileError> {
        let function = self.module.function(function_id)?;
        let instrs = decode_stream(self.catalog, &function.bytecode)?;
        let mut ctx = DecompilerContext {
            function,
            instrs: &instrs,
            cursor: 0,
            registers: RegisterFile::new(function.register_count as usize),
            block: BlockStatement::new(),
            depth: 0,
        };
        self.run(&mut ctx)?;
        Self::flush_registers(&mut ctx);

        let name = self
            .module
            .function_name(function)
            .map(str::to_string)
            .unwrap_or_else(|| format!("func{function_id}"));
        let params = (1..function.param_count).map(|i| format!("par{i}")).collect();
        Ok(SyntaxNode::Function { name, params, body: ctx.block })
    }

    fn run(&self, ctx: &mut DecompilerContext) -> Result<(), DecompileError> {
        while ctx.cursor < ctx.instrs.len() {
            self.observe(ctx)?;
        }
        Ok(())
    }

    /// Stores a result expression in a register. A usage-marked register keeps
    /// its name binding current by re-emitting the assignment immediately.
    fn write_result(
        &self,
        ctx: &mut DecompilerContext,
        register: u32,
        value: SyntaxNode,
    ) -> Result<(), DecompileError> {
        if ctx.registers.is_marked(register)? {
            ctx.block.push(assign_stmt(register, value.clone()));
            ctx.registers.assign(register, value)?;
            ctx.registers.settle(register)?;
        } else {
            ctx.registers.assign(register, value)?;
        }
        Ok(())
    }

    /// Marks a register whose value is about to be referenced by name,
    /// materializing the pending definition first so the name never dangles.
    fn touch_usage(ctx: &mut DecompilerContext, register: u32) -> Result<(), DecompileError> {
        if let Some(value) = ctx.registers.mark_usage(register)? {
            ctx.block.push(assign_stmt(register, value));
        }
        Ok(())
    }

    /// Trailing flush: no computed value with a potential side effect is
    /// silently dropped.
    fn flush_registers(ctx: &mut DecompilerContext) {
        for (register, value) in ctx.registers.drain_pending() {
            ctx.block.push(assign_stmt(register, value));
        }
    }

    fn global_object(&self) -> SyntaxNode {
        SyntaxNode::Identifier {
            name: "global".into(),
            is_redundant: self.options.omit_explicit_global,
        }
    }

    fn literal_from(&self, value: BufferValue) -> Result<SyntaxNode, DecompileError> {
        Ok(lit(match value {
            BufferValue::Null => LiteralValue::Null,
            BufferValue::Bool(v) => LiteralValue::Bool(v),
            BufferValue::Number(v) => LiteralValue::Number(v),
            BufferValue::Integer(v) => LiteralValue::Integer(v as i64),
            BufferValue::StringIdx(i) => LiteralValue::String(self.module.string(i)?.to_string()),
        }))
    }

    fn closure_name(&self, index: u32) -> String {
        self.module
            .functions
            .get(index as usize)
            .and_then(|f| self.module.function_name(f))
            .map(str::to_string)
            .unwrap_or_else(|| format!("closure_{index}"))
    }

    fn observe(&self, ctx: &mut DecompilerContext) -> Result<(), DecompileError> {
        let index = ctx.cursor;
        let instr = ctx.instrs[index].clone();
        ctx.cursor += 1;
        let def = self.catalog.get(instr.opcode).ok_or(DecompileError::UnknownOpcode {
            opcode: instr.opcode,
            offset: instr.offset,
        })?;

        match def.name.as_str() {
            "Unreachable" => {}

            // ----- constant loads -----
            "LoadConstEmpty" | "LoadConstUndefined" => {
                self.write_result(ctx, instr.reg(0)?, SyntaxNode::ident("undefined"))?;
            }
            "LoadConstNull" => {
                self.write_result(ctx, instr.reg(0)?, lit(LiteralValue::Null))?;
            }
            "LoadConstTrue" => {
                self.write_result(ctx, instr.reg(0)?, lit(LiteralValue::Bool(true)))?;
            }
            "LoadConstFalse" => {
                self.write_result(ctx, instr.reg(0)?, lit(LiteralValue::Bool(false)))?;
            }
            "LoadConstZero" => {
                self.write_result(ctx, instr.reg(0)?, lit(LiteralValue::Integer(0)))?;
            }
            "LoadConstUInt8" => {
                let value = LiteralValue::Integer(instr.uint(1)? as i64);
                self.write_result(ctx, instr.reg(0)?, lit(value))?;
            }
            "LoadConstInt" => {
                let value = LiteralValue::Integer(instr.int(1)? as i64);
                self.write_result(ctx, instr.reg(0)?, lit(value))?;
            }
            "LoadConstDouble" => {
                let value = LiteralValue::Number(instr.double(1)?);
                self.write_result(ctx, instr.reg(0)?, lit(value))?;
            }
            "LoadConstString" | "LoadConstStringLongIndex" => {
                let s = self.module.string(instr.string_index(1)?)?.to_string();
                self.write_result(ctx, instr.reg(0)?, lit(LiteralValue::String(s)))?;
            }

            // ----- function flow -----
            "LoadParam" => {
                let value = match instr.uint(1)? {
                    0 => SyntaxNode::ident("this"),
                    n => SyntaxNode::ident(format!("par{n}")),
                };
                self.write_result(ctx, instr.reg(0)?, value)?;
            }
            "ReifyArguments" => {
                self.write_result(ctx, instr.reg(0)?, SyntaxNode::ident("arguments"))?;
            }
            "GetArgumentsLength" => {
                let value = member(SyntaxNode::ident("arguments"), SyntaxNode::ident("length"), false);
                self.write_result(ctx, instr.reg(0)?, value)?;
            }
            "GetArgumentsPropByVal" => {
                let idx = instr.reg(1)?;
                Self::touch_usage(ctx, idx)?;
                let property = ctx.registers.read(idx)?;
                let value = member(SyntaxNode::ident("arguments"), property, true);
                self.write_result(ctx, instr.reg(0)?, value)?;
            }
            "Ret" => {
                let register = instr.reg(0)?;
                let value = ctx.registers.read(register)?;
                ctx.block.push(SyntaxNode::Return(Some(Box::new(value))));
                ctx.registers.clear(register)?;
            }
            "Throw" => {
                let register = instr.reg(0)?;
                let value = ctx.registers.read(register)?;
                ctx.block.push(SyntaxNode::Throw(Box::new(value)));
                ctx.registers.clear(register)?;
            }
            "Mov" | "MovLong" => {
                let dst = instr.reg(0)?;
                let value = ctx.registers.read(instr.reg(1)?)?;
                // the copy is also emitted as a rename so later passes can
                // see the binding
                ctx.block.push(assign_stmt(dst, value.clone()));
                ctx.registers.assign(dst, value)?;
                ctx.registers.settle(dst)?;
            }
            "SelectObject" => {
                // constructor result vs `this`: either way the register copy
                // is all the decompiler needs
                let value = ctx.registers.read(instr.reg(2)?)?;
                ctx.registers.assign(instr.reg(0)?, value)?;
            }

            // ----- fields and globals -----
            "GetGlobalObject" => {
                self.write_result(ctx, instr.reg(0)?, self.global_object())?;
            }
            "LoadThisNS" => {
                let value = if ctx.function.function_id == 0 {
                    self.global_object()
                } else {
                    SyntaxNode::ident("this")
                };
                self.write_result(ctx, instr.reg(0)?, value)?;
            }
            "DeclareGlobalVar" => {
                // always references the global explicitly, even when the
                // omit option is on: the binding is global, not local
                let name = self.module.string(instr.string_index(0)?)?.to_string();
                ctx.block.push(SyntaxNode::Assignment {
                    target: Box::new(member(
                        SyntaxNode::ident("global"),
                        SyntaxNode::ident(name),
                        false,
                    )),
                    value: Box::new(SyntaxNode::ident("undefined")),
                });
            }
            "GetById" | "GetByIdShort" | "GetByIdLong" | "TryGetById" | "TryGetByIdLong" => {
                let object = ctx.registers.read(instr.reg(1)?)?;
                let name = self.module.string(instr.string_index(3)?)?.to_string();
                let value = member(object, SyntaxNode::ident(name), false);
                self.write_result(ctx, instr.reg(0)?, value)?;
            }
            "GetByVal" => {
                let object = ctx.registers.read(instr.reg(1)?)?;
                let property = ctx.registers.read(instr.reg(2)?)?;
                self.write_result(ctx, instr.reg(0)?, member(object, property, true))?;
            }
            "PutById" | "PutByIdLong" | "TryPutById" => {
                let object = ctx.registers.read(instr.reg(0)?)?;
                let value = ctx.registers.read(instr.reg(1)?)?;
                let name = self.module.string(instr.string_index(3)?)?.to_string();
                ctx.block.push(SyntaxNode::Assignment {
                    target: Box::new(member(object, SyntaxNode::ident(name), false)),
                    value: Box::new(value),
                });
            }
            "PutNewOwnById" | "PutNewOwnByIdShort" => {
                let object = ctx.registers.read(instr.reg(0)?)?;
                let value = ctx.registers.read(instr.reg(1)?)?;
                let name = self.module.string(instr.string_index(2)?)?.to_string();
                ctx.block.push(SyntaxNode::Assignment {
                    target: Box::new(member(object, SyntaxNode::ident(name), false)),
                    value: Box::new(value),
                });
            }
            "PutOwnByIndex" | "PutOwnByIndexL" => {
                let object = ctx.registers.read(instr.reg(0)?)?;
                let value = ctx.registers.read(instr.reg(1)?)?;
                let property = lit(LiteralValue::Integer(instr.uint(2)? as i64));
                ctx.block.push(SyntaxNode::Assignment {
                    target: Box::new(member(object, property, true)),
                    value: Box::new(value),
                });
            }
            "PutByVal" => {
                let object = ctx.registers.read(instr.reg(0)?)?;
                let property = ctx.registers.read(instr.reg(1)?)?;
                let value = ctx.registers.read(instr.reg(2)?)?;
                ctx.block.push(SyntaxNode::Assignment {
                    target: Box::new(member(object, property, true)),
                    value: Box::new(value),
                });
            }

            // ----- unary -----
            "TypeOf" => {
                let src = instr.reg(1)?;
                Self::touch_usage(ctx, src)?;
                let argument = ctx.registers.read(src)?;
                let value = SyntaxNode::Unary { operator: "typeof", argument: Box::new(argument) };
                self.write_result(ctx, instr.reg(0)?, value)?;
            }
            "Not" | "Negate" | "BitNot" => {
                let operator = match def.name.as_str() {
                    "Not" => "!",
                    "Negate" => "-",
                    _ => "~",
                };
                let argument = ctx.registers.read(instr.reg(1)?)?;
                let value = SyntaxNode::Unary { operator, argument: Box::new(argument) };
                self.write_result(ctx, instr.reg(0)?, value)?;
            }
            "AddEmptyString" => {
                let argument = ctx.registers.read(instr.reg(1)?)?;
                let value = SyntaxNode::Binary {
                    left: Box::new(lit(LiteralValue::String(String::new()))),
                    operator: "+",
                    right: Box::new(argument),
                };
                self.write_result(ctx, instr.reg(0)?, value)?;
            }

            // ----- binary -----
            "Eq" | "StrictEq" | "Neq" | "StrictNeq" | "Less" | "LessEq" | "Greater"
            | "GreaterEq" | "Add" | "AddN" | "Sub" | "SubN" | "Mul" | "MulN" | "Div" | "DivN"
            | "Mod" | "BitAnd" | "BitOr" | "BitXor" | "LShift" | "RShift" | "URshift" => {
                let operator = match def.name.as_str() {
                    "Eq" => "==",
                    "StrictEq" => "===",
                    "Neq" => "!=",
                    "StrictNeq" => "!==",
                    "Less" => "<",
                    "LessEq" => "<=",
                    "Greater" => ">",
                    "GreaterEq" => ">=",
                    "Add" | "AddN" => "+",
                    "Sub" | "SubN" => "-",
                    "Mul" | "MulN" => "*",
                    "Div" | "DivN" => "/",
                    "Mod" => "%",
                    "BitAnd" => "&",
                    "BitOr" => "|",
                    "BitXor" => "^",
                    "LShift" => "<<",
                    "RShift" => ">>",
                    _ => ">>>",
                };
                let left = ctx.registers.read(instr.reg(1)?)?;
                let right = ctx.registers.read(instr.reg(2)?)?;
                let value = SyntaxNode::Binary {
                    left: Box::new(left),
                    operator,
                    right: Box::new(right),
                };
                self.write_result(ctx, instr.reg(0)?, value)?;
            }

            // ----- literal buffers, calls, closures -----
            "NewObject" => {
                self.write_result(ctx, instr.reg(0)?, SyntaxNode::Object(Vec::new()))?;
            }
            "NewArray" => {
                self.write_result(ctx, instr.reg(0)?, SyntaxNode::Array(Vec::new()))?;
            }
            "NewArrayWithBuffer" | "NewArrayWithBufferLong" => {
                let count = instr.uint(2)? as usize;
                let offset = instr.uint(3)?;
                let values = databuf::read_series(&self.module.array_buffer, offset, count)?;
                let elements = values
                    .into_iter()
                    .map(|v| self.literal_from(v))
                    .collect::<Result<Vec<_>, _>>()?;
                self.write_result(ctx, instr.reg(0)?, SyntaxNode::Array(elements))?;
            }
            "NewObjectWithBuffer" | "NewObjectWithBufferLong" => {
                let count = instr.uint(2)? as usize;
                let keys = databuf::read_series(&self.module.object_key_buffer, instr.uint(3)?, count)?;
                let values =
                    databuf::read_series(&self.module.object_value_buffer, instr.uint(4)?, count)?;
                let properties = keys
                    .into_iter()
                    .zip(values)
                    .map(|(k, v)| {
                        Ok(ObjectProperty {
                            key: self.literal_from(k)?,
                            value: self.literal_from(v)?,
                        })
                    })
                    .collect::<Result<Vec<_>, DecompileError>>()?;
                self.write_result(ctx, instr.reg(0)?, SyntaxNode::Object(properties))?;
            }
            "Call1" | "Call2" | "Call3" | "Call4" => {
                let callee = ctx.registers.read(instr.reg(1)?)?;
                let argc = instr.operands.len() - 2;
                let mut arguments = Vec::with_capacity(argc);
                for i in 0..argc {
                    arguments.push(ctx.registers.read(instr.reg(2 + i)?)?);
                }
                let value = SyntaxNode::Call {
                    callee: Box::new(callee),
                    arguments,
                    is_constructor: false,
                };
                self.write_result(ctx, instr.reg(0)?, value)?;
            }
            "CreateEnvironment" => {
                // environments are not reconstructed
                ctx.registers.clear(instr.reg(0)?)?;
            }
            "CreateClosure" => {
                let name = self.closure_name(instr.uint(2)?);
                self.write_result(ctx, instr.reg(0)?, SyntaxNode::ident(name))?;
            }

            // ----- control flow -----
            "Jmp" | "JmpLong" => {
                // a bare unconditional jump that was not consumed as an else
                // marker is unstructured flow (a loop back-edge or worse)
                return Err(DecompileError::UnsupportedControlFlow {
                    offset: instr.offset,
                    jump: instr.int(0)?,
                });
            }
            "JmpTrue" | "JmpTrueLong" => {
                let argument = ctx.registers.read(instr.reg(1)?)?;
                let test = SyntaxNode::Unary { operator: "!", argument: Box::new(argument) };
                self.conditional_jump(ctx, index, &instr, test)?;
            }
            "JmpFalse" | "JmpFalseLong" => {
                let test = ctx.registers.read(instr.reg(1)?)?;
                self.conditional_jump(ctx, index, &instr, test)?;
            }
            "JmpUndefined" => {
                let left = ctx.registers.read(instr.reg(1)?)?;
                let test = SyntaxNode::Binary {
                    left: Box::new(left),
                    operator: "!==",
                    right: Box::new(SyntaxNode::ident("undefined")),
                };
                self.conditional_jump(ctx, index, &instr, test)?;
            }
            "JEqual" | "JEqualLong" | "JNotEqual" | "JNotEqualLong" | "JStrictEqual"
            | "JStrictEqualLong" | "JStrictNotEqual" | "JStrictNotEqualLong" | "JLess"
            | "JNotLess" | "JLessEqual" | "JNotLessEqual" | "JGreater" | "JNotGreater"
            | "JGreaterEqual" | "JNotGreaterEqual" => {
                // the bytecode jumps around the consequent when the source
                // condition is false, so the test is the negated comparison
                let operator = match def.name.as_str() {
                    "JEqual" | "JEqualLong" => "!=",
                    "JNotEqual" | "JNotEqualLong" => "==",
                    "JStrictEqual" | "JStrictEqualLong" => "!==",
                    "JStrictNotEqual" | "JStrictNotEqualLong" => "===",
                    "JLess" => ">=",
                    "JNotLess" => "<",
                    "JLessEqual" => ">",
                    "JNotLessEqual" => "<=",
                    "JGreater" => "<=",
                    "JNotGreater" => ">",
                    "JGreaterEqual" => "<",
                    _ => ">=",
                };
                let left = ctx.registers.read(instr.reg(1)?)?;
                let right = ctx.registers.read(instr.reg(2)?)?;
                let test = SyntaxNode::Binary {
                    left: Box::new(left),
                    operator,
                    right: Box::new(right),
                };
                self.conditional_jump(ctx, index, &instr, test)?;
            }

            other => {
                // skipping would desynchronize every following register read
                return Err(DecompileError::UnsupportedOpcode {
                    opcode: instr.opcode,
                    name: other.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Rebuilds an `if` (or `if`/`else`) from a forward conditional jump and
    /// resumes the cursor after the resolved end boundary.
    fn conditional_jump(
        &self,
        ctx: &mut DecompilerContext,
        index: usize,
        instr: &Instr,
        test: SyntaxNode,
    ) -> Result<(), DecompileError> {
        if ctx.depth >= MAX_BRANCH_DEPTH {
            return Err(DecompileError::BranchNestingLimit { limit: MAX_BRANCH_DEPTH });
        }
        let jump = instr.int(0)?;
        if jump < 0 {
            // loop recovery is out of scope
            return Err(DecompileError::UnsupportedControlFlow { offset: instr.offset, jump });
        }
        let function_id = ctx.function.function_id;
        let instrs = ctx.instrs;
        let target = (instr.offset as i64 + jump as i64) as u32;
        let join = Self::boundary_index(ctx, function_id, target)?;
        if join <= index {
            // a zero-displacement jump resolves to itself
            return Err(DecompileError::UnresolvedJumpTarget { function_id, target });
        }

        // an unconditional jump immediately before the target means the
        // consequent skips over an else branch
        let trailing_jmp = join
            .checked_sub(1)
            .filter(|&i| i > index)
            .map(|i| &instrs[i])
            .filter(|t| matches!(self.catalog.name(t.opcode), "Jmp" | "JmpLong"));

        let (consequent_end, alternate_span, resume) = match trailing_jmp {
            Some(jmp) => {
                let exit = jmp.int(0)?;
                if exit < 0 {
                    return Err(DecompileError::UnsupportedControlFlow {
                        offset: jmp.offset,
                        jump: exit,
                    });
                }
                let alt_target = (jmp.offset as i64 + exit as i64) as u32;
                let alt_end = Self::boundary_index(ctx, function_id, alt_target)?;
                if alt_end < join {
                    return Err(DecompileError::UnresolvedJumpTarget {
                        function_id,
                        target: alt_target,
                    });
                }
                (join - 1, Some((join, alt_end)), alt_end)
            }
            None => (join, None, join),
        };

        let consequent = self.decompile_branch(ctx, index + 1, consequent_end)?;
        let alternate = match alternate_span {
            Some((start, end)) => Some(self.decompile_branch(ctx, start, end)?),
            None => None,
        };

        ctx.block.push(SyntaxNode::If {
            test: Box::new(test),
            consequent,
            alternate,
        });
        ctx.cursor = resume;
        Ok(())
    }

    /// Explores one branch over an independent register snapshot; writes in
    /// the branch never leak into a sibling. Values still pending at the end
    /// of the branch are flushed into its block so they stay visible as named
    /// bindings past the merge point.
    fn decompile_branch(
        &self,
        parent: &DecompilerContext,
        start: usize,
        end: usize,
    ) -> Result<BlockStatement, DecompileError> {
        let instrs = parent.instrs;
        let mut ctx = DecompilerContext {
            function: parent.function,
            instrs: &instrs[start..end],
            cursor: 0,
            registers: parent.registers.snapshot(),
            block: BlockStatement::new(),
            depth: parent.depth + 1,
        };
        self.run(&mut ctx)?;
        Self::flush_registers(&mut ctx);
        Ok(ctx.block)
    }

    /// Resolves a jump target offset to an instruction index. The offset one
    /// past the last instruction is a valid end boundary; anything else that
    /// matches no instruction is fatal.
    fn boundary_index(
        ctx: &DecompilerContext,
        function_id: u32,
        target: u32,
    ) -> Result<usize, DecompileError> {
        if let Ok(i) = ctx.instrs.binary_search_by_key(&target, |instr| instr.offset) {
            return Ok(i);
        }
        let end = ctx.instrs.last().map(|i| i.offset + i.length as u32).unwrap_or(0);
        if target == end {
            return Ok(ctx.instrs.len());
        }
        Err(DecompileError::UnresolvedJumpTarget { function_id, target })
    }
}
