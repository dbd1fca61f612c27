use bumpalo::Bump;

use codegen::LoweredClass;
use error::CompileResult;
use options::{CompileOptions, PrecedenceMode};

pub mod ast;
pub mod codegen;
pub mod error;
pub mod options;
pub mod parser;
pub mod span;
pub mod symbol_table;
pub mod tokenizer;

/// Compiles the source of one class into VM instructions.
pub fn compile(source: &str, options: &CompileOptions) -> CompileResult<LoweredClass> {
    let arena = Bump::new();
    let class = parser::parse_class(source, &arena, options.precedence)?;
    codegen::lower_class(class)
}

/// Renders the tokens the parser sees, without comments, as an S-expression.
pub fn dump_tokens(source: &str) -> String {
    let mut out = String::from("(TOKENS");
    for token in tokenizer::significant_tokens(source) {
        out.push_str("\n  ");
        out.push_str(&token.to_string());
    }
    out.push(')');
    out
}

/// Parses `source` and renders its AST as an S-expression.
pub fn dump_ast(source: &str, precedence: PrecedenceMode) -> CompileResult<String> {
    let arena = Bump::new();
    let class = parser::parse_class(source, &arena, precedence)?;
    Ok(class.to_string())
}
