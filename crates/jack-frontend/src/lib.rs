//! Compiler front end for the Jack language. Turns the source of one class into instructions for
//! the stack based VM.

/// Compiler.
pub mod compiler;
/// VM instructions.
pub mod instruction;

pub use compiler::{
    codegen::{LoweredClass, Warning},
    compile,
    error::{CompileError, CompileResult, ErrorKind},
    options::{CompileOptions, OutputLayout, PrecedenceMode},
};
pub use instruction::Instruction;
