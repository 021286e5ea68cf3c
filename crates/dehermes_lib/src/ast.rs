
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LiteralValue {
    Null,
    Bool(bool),
    Number(f64),
    Integer(i64),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectProperty {
    pub key: SyntaxNode,
    pub value: SyntaxNode,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BlockStatement {
    pub body: Vec<SyntaxNode>,
}

impl BlockStatement {
    pub fn new() -> Self {
        Self { body: Vec::new() }
    }

    pub fn push(&mut self, stmt: SyntaxNode) {
        self.body.push(stmt);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SyntaxNode {
    Identifier {
        name: String,
        // a qualifier the caller asked to leave out of member accesses,
        // e.g. the explicit global object
        is_redundant: bool,
    },
    Literal(LiteralValue),
    Member {
        object: Box<SyntaxNode>,
        property: Box<SyntaxNode>,
        computed: bool,
    },
    Unary {
        operator: &'static str,
        argument: Box<SyntaxNode>,
    },
    Binary {
        left: Box<SyntaxNode>,
        operator: &'static str,
        right: Box<SyntaxNode>,
    },
    Assignment {
        target: Box<SyntaxNode>,
        value: Box<SyntaxNode>,
    },
    Call {
        callee: Box<SyntaxNode>,
        arguments: Vec<SyntaxNode>,
        is_constructor: bool,
    },
    Array(Vec<SyntaxNode>),
    Object(Vec<ObjectProperty>),
    Return(Option<Box<SyntaxNode>>),
    Throw(Box<SyntaxNode>),
    If {
        test: Box<SyntaxNode>,
        consequent: BlockStatement,
        alternate: Option<BlockStatement>,
    },
    Function {
        name: String,
        params: Vec<String>,
        body: BlockStatement,
    },
}

impl SyntaxNode {
    pub fn ident(name: impl Into<String>) -> SyntaxNode {
        SyntaxNode::Identifier { name: name.into(), is_redundant: false }
    }
}

#[derive(Debug, Default)]
pub struct SourceBuilder {
    out: String,
    indent: usize,
}

impl SourceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, s: &str) {
        self.out.push_str(s);
    }

    pub fn pad(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    pub fn finish(self) -> String {
        self.out
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn write_number(b: &mut SourceBuilder, value: f64) {
    if value.is_nan() {
        b.write("NaN");
    } else if value.is_infinite() {
        b.write(if value > 0.0 { "Infinity" } else { "-Infinity" });
    } else {
        b.write(&value.to_string());
    }
}

fn write_block(b: &mut SourceBuilder, block: &BlockStatement) {
    b.write("{\n");
    b.indent += 1;
    for stmt in &block.body {
        b.pad();
        stmt.write_stmt(b);
    }
    b.indent -= 1;
    b.pad();
    b.write("}");
}

impl SyntaxNode {
    /// Writes the node as an expression.
    pub fn write(&self, b: &mut SourceBuilder) {
        match self {
            SyntaxNode::Identifier { name, .. } => b.write(name),
            SyntaxNode::Literal(value) => match value {
                LiteralValue::Null => b.write("null"),
                LiteralValue::Bool(v) => b.write(if *v { "true" } else { "false" }),
                LiteralValue::Number(v) => write_number(b, *v),
                LiteralValue::Integer(v) => b.write(&v.to_string()),
                LiteralValue::String(s) => {
                    b.write("'");
                    b.write(&escape_string(s));
                    b.write("'");
                }
            },
            SyntaxNode::Member { object, property, computed } => {
                let elided = !computed
                    && matches!(**object, SyntaxNode::Identifier { is_redundant: true, .. });
                if !elided {
                    object.write(b);
                }
                if *computed {
                    b.write("[");
                    property.write(b);
                    b.write("]");
                } else {
                    if !elided {
                        b.write(".");
                    }
                    property.write(b);
                }
            }
            SyntaxNode::Unary { operator, argument } => {
                b.write(operator);
                if operator.chars().all(|c| c.is_ascii_alphabetic()) {
                    b.write(" ");
                }
                if matches!(**argument, SyntaxNode::Binary { .. }) {
                    b.write("(");
                    argument.write(b);
                    b.write(")");
                } else {
                    argument.write(b);
                }
            }
            SyntaxNode::Binary { left, operator, right } => {
                if matches!(**left, SyntaxNode::Binary { .. }) {
                    b.write("(");
                    left.write(b);
                    b.write(")");
                } else {
                    left.write(b);
                }
                b.write(" ");
                b.write(operator);
                b.write(" ");
                if matches!(**right, SyntaxNode::Binary { .. }) {
                    b.write("(");
                    right.write(b);
                    b.write(")");
                } else {
                    right.write(b);
                }
            }
            SyntaxNode::Assignment { target, value } => {
                target.write(b);
                b.write(" = ");
                value.write(b);
            }
            SyntaxNode::Call { callee, arguments, is_constructor } => {
                if *is_constructor {
                    b.write("new ");
                }
                callee.write(b);
                b.write("(");
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        b.write(", ");
                    }
                    arg.write(b);
                }
                b.write(")");
            }
            SyntaxNode::Array(elements) => {
                b.write("[");
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        b.write(", ");
                    }
                    element.write(b);
                }
                b.write("]");
            }
            SyntaxNode::Object(properties) => {
                if properties.is_empty() {
                    b.write("{}");
                    return;
                }
                b.write("{ ");
                for (i, property) in properties.iter().enumerate() {
                    if i > 0 {
                        b.write(", ");
                    }
                    property.key.write(b);
                    b.write(": ");
                    property.value.write(b);
                }
                b.write(" }");
            }
            SyntaxNode::Return(argument) => {
                b.write("return");
                if let Some(argument) = argument {
                    b.write(" ");
                    argument.write(b);
                }
            }
            SyntaxNode::Throw(argument) => {
                b.write("throw ");
                argument.write(b);
            }
            SyntaxNode::If { .. } | SyntaxNode::Function { .. } => self.write_stmt(b),
        }
    }

    /// Writes the node as a statement; the caller provides the indentation of
    /// the first line.
    pub fn write_stmt(&self, b: &mut SourceBuilder) {
        match self {
            SyntaxNode::If { test, consequent, alternate } => {
                b.write("if (");
                test.write(b);
                b.write(") ");
                write_block(b, consequent);
                if let Some(alternate) = alternate {
                    b.write(" else ");
                    write_block(b, alternate);
                }
                b.write("\n");
            }
            SyntaxNode::Function { name, params, body } => {
                b.write("function ");
                b.write(name);
                b.write("(");
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        b.write(", ");
                    }
                    b.write(param);
                }
                b.write(") ");
                write_block(b, body);
                b.write("\n");
            }
            other => {
                other.write(b);
                b.write(";\n");
            }
        }
    }
}

pub fn render(node: &SyntaxNode) -> String {
    let mut b = SourceBuilder::new();
    node.write_stmt(&mut b);
    b.finish()
}
