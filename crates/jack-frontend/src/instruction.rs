use std::fmt::Display;

use compact_str::CompactString;

use crate::compiler::options::OutputLayout;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// A VM memory segment.
pub enum Segment {
    Constant,
    Local,
    Argument,
    This,
    That,
    Pointer,
    Temp,
    Static,
}

impl Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Segment::Constant => "constant",
            Segment::Local => "local",
            Segment::Argument => "argument",
            Segment::This => "this",
            Segment::That => "that",
            Segment::Pointer => "pointer",
            Segment::Temp => "temp",
            Segment::Static => "static",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// A stack arithmetic or logic operation.
pub enum ArithmeticOp {
    Add,
    Sub,
    Neg,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
}

impl Display for ArithmeticOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ArithmeticOp::Add => "add",
            ArithmeticOp::Sub => "sub",
            ArithmeticOp::Neg => "neg",
            ArithmeticOp::Eq => "eq",
            ArithmeticOp::Gt => "gt",
            ArithmeticOp::Lt => "lt",
            ArithmeticOp::And => "and",
            ArithmeticOp::Or => "or",
            ArithmeticOp::Not => "not",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Represents a single instruction of the stack VM.
pub enum Instruction {
    /// Pushes `segment[index]` onto the stack.
    Push(Segment, u16),
    /// Pops the top of the stack into `segment[index]`.
    Pop(Segment, u16),
    Arithmetic(ArithmeticOp),
    Label(CompactString),
    Goto(CompactString),
    /// Pops the top of the stack and jumps if it is not zero.
    IfGoto(CompactString),
    /// Starts a function with `locals` local variables.
    Function { name: CompactString, locals: u16 },
    /// Calls a function that takes `args` arguments from the stack.
    Call { name: CompactString, args: u16 },
    Return,
}

impl Instruction {
    /// Returns `true` for instructions that are not indented by [`OutputLayout::Indented`].
    fn is_flush_left(&self) -> bool {
        matches!(
            self,
            Instruction::Function { .. } | Instruction::Label(_) | Instruction::IfGoto(_)
        )
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::Push(segment, index) => write!(f, "push {segment} {index}"),
            Instruction::Pop(segment, index) => write!(f, "pop {segment} {index}"),
            Instruction::Arithmetic(op) => write!(f, "{op}"),
            Instruction::Label(label) => write!(f, "label {label}"),
            Instruction::Goto(label) => write!(f, "goto {label}"),
            Instruction::IfGoto(label) => write!(f, "if-goto {label}"),
            Instruction::Function { name, locals } => write!(f, "function {name} {locals}"),
            Instruction::Call { name, args } => write!(f, "call {name} {args}"),
            Instruction::Return => write!(f, "return"),
        }
    }
}

/// Renders instructions as VM text, one instruction per line.
pub fn render(instructions: &[Instruction], layout: OutputLayout) -> String {
    use std::fmt::Write;
    let mut out = String::new();
    for instruction in instructions {
        if layout == OutputLayout::Indented && !instruction.is_flush_left() {
            out.push_str("    ");
        }
        // Writing to a `String` can not fail.
        let _ = writeln!(out, "{instruction}");
    }
    out
}
