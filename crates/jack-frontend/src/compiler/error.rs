use compact_str::CompactString;

use super::{
    span::{Span, line_text},
    tokenizer::{Malformation, Token},
};

/// The result type of every compilation stage.
pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// The class of a [`CompileError`].
pub enum ErrorKind {
    Lexical,
    Syntax,
    Semantic,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Lexical => write!(f, "lexical error"),
            ErrorKind::Syntax => write!(f, "syntax error"),
            ErrorKind::Semantic => write!(f, "semantic error"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
/// Represents an error that stops the compilation of a class.
pub enum CompileError {
    Lexical(LexicalError),
    Syntax(SyntaxError),
    Semantic(SemanticError),
}

#[derive(Clone, Debug, PartialEq)]
/// A malformed token reached the parser.
pub struct LexicalError {
    pub malformation: Malformation,
    pub text: CompactString,
    pub span: Span,
    pub line: u32,
}

#[derive(Clone, Debug, PartialEq)]
/// The parser found a token the grammar does not allow.
pub struct SyntaxError {
    /// What the parser was looking for.
    pub expected: &'static str,
    /// A description of the token that was found instead.
    pub found: String,
    pub span: Span,
    pub line: u32,
}

impl SyntaxError {
    pub fn new(expected: &'static str, token: &Token) -> SyntaxError {
        SyntaxError {
            expected,
            found: token.describe(),
            span: token.span,
            line: token.line,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
/// A well formed program that can not be lowered.
pub enum SemanticError {
    DuplicateSymbol {
        name: CompactString,
        line: u32,
    },
    UndefinedVariable {
        name: CompactString,
        line: u32,
    },
    /// A variable or parameter was declared as `void`.
    VoidVariable {
        name: CompactString,
        line: u32,
    },
    /// `return expr;` inside a `void` subroutine.
    VoidReturnsValue {
        subroutine: CompactString,
        line: u32,
    },
    /// `return;` inside a subroutine that declares a return type.
    MissingReturnValue {
        subroutine: CompactString,
        line: u32,
    },
    /// A constructor must return an instance of its own class.
    ConstructorReturnType {
        subroutine: CompactString,
        expected: CompactString,
        found: CompactString,
        line: u32,
    },
    /// An unqualified call from a function, which has no object to call the method on.
    MethodCallOutsideMethod {
        name: CompactString,
        line: u32,
    },
    /// `this` inside a function.
    ThisInFunction { line: u32 },
    /// `x.f()` where `x` has a primitive type.
    CallOnPrimitive {
        name: CompactString,
        var_type: CompactString,
        line: u32,
    },
    IntegerOutOfRange { value: u32, line: u32 },
    /// A variable was declared with a storage class that does not belong to its scope.
    StorageClassMismatch {
        name: CompactString,
        storage: &'static str,
        line: u32,
    },
}

impl SemanticError {
    pub fn line(&self) -> u32 {
        match self {
            SemanticError::DuplicateSymbol { line, .. }
            | SemanticError::UndefinedVariable { line, .. }
            | SemanticError::VoidVariable { line, .. }
            | SemanticError::VoidReturnsValue { line, .. }
            | SemanticError::MissingReturnValue { line, .. }
            | SemanticError::ConstructorReturnType { line, .. }
            | SemanticError::MethodCallOutsideMethod { line, .. }
            | SemanticError::ThisInFunction { line }
            | SemanticError::CallOnPrimitive { line, .. }
            | SemanticError::IntegerOutOfRange { line, .. }
            | SemanticError::StorageClassMismatch { line, .. } => *line,
        }
    }
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::Lexical(_) => ErrorKind::Lexical,
            CompileError::Syntax(_) => ErrorKind::Syntax,
            CompileError::Semantic(_) => ErrorKind::Semantic,
        }
    }

    /// The line of the source the error was found on.
    pub fn line(&self) -> u32 {
        match self {
            CompileError::Lexical(e) => e.line,
            CompileError::Syntax(e) => e.line,
            CompileError::Semantic(e) => e.line(),
        }
    }

    pub fn with_context(self, source: &str) -> CompileErrorWithContext<'_> {
        CompileErrorWithContext { err: self, source }
    }
}

impl From<LexicalError> for CompileError {
    fn from(value: LexicalError) -> Self {
        CompileError::Lexical(value)
    }
}

impl From<SyntaxError> for CompileError {
    fn from(value: SyntaxError) -> Self {
        CompileError::Syntax(value)
    }
}

impl From<SemanticError> for CompileError {
    fn from(value: SemanticError) -> Self {
        CompileError::Semantic(value)
    }
}

impl std::error::Error for LexicalError {}

impl std::fmt::Display for LexicalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {line}: {m} at {span}",
            line = self.line,
            m = self.malformation,
            span = self.span
        )
    }
}

impl std::error::Error for SyntaxError {}

impl std::fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {line}: expected {expected}, found {found}",
            line = self.line,
            expected = self.expected,
            found = self.found
        )
    }
}

impl std::error::Error for SemanticError {}

impl std::fmt::Display for SemanticError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: ", self.line())?;
        match self {
            SemanticError::DuplicateSymbol { name, .. } => {
                write!(f, "'{name}' is already defined in this scope")
            }
            SemanticError::UndefinedVariable { name, .. } => {
                write!(f, "variable '{name}' is not defined")
            }
            SemanticError::VoidVariable { name, .. } => {
                write!(f, "variable '{name}' can not be declared void")
            }
            SemanticError::VoidReturnsValue { subroutine, .. } => {
                write!(f, "void subroutine '{subroutine}' returns a value")
            }
            SemanticError::MissingReturnValue { subroutine, .. } => {
                write!(f, "non-void subroutine '{subroutine}' returns without a value")
            }
            SemanticError::ConstructorReturnType {
                subroutine,
                expected,
                found,
                ..
            } => write!(
                f,
                "constructor '{subroutine}' must return '{expected}', but is declared to return '{found}'"
            ),
            SemanticError::MethodCallOutsideMethod { name, .. } => {
                write!(f, "method call '{name}' not inside method")
            }
            SemanticError::ThisInFunction { .. } => {
                write!(f, "'this' is not permitted in functions")
            }
            SemanticError::CallOnPrimitive { name, var_type, .. } => {
                write!(f, "'{name}' has type '{var_type}' and has no methods")
            }
            SemanticError::IntegerOutOfRange { value, .. } => {
                write!(f, "integer constant {value} is out of range 0..=32767")
            }
            SemanticError::StorageClassMismatch { name, storage, .. } => {
                write!(f, "invalid storage class '{storage}' for '{name}' in this scope")
            }
        }
    }
}

impl std::error::Error for CompileError {}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Lexical(e) => write!(f, "{e}"),
            CompileError::Syntax(e) => write!(f, "{e}"),
            CompileError::Semantic(e) => write!(f, "{e}"),
        }
    }
}

/// A [`CompileError`] that renders the line of source it refers to.
#[derive(Debug, PartialEq)]
pub struct CompileErrorWithContext<'a> {
    err: CompileError,
    source: &'a str,
}

impl std::error::Error for CompileErrorWithContext<'_> {}

impl std::fmt::Display for CompileErrorWithContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{kind}: {err}", kind = self.err.kind(), err = self.err)?;
        let line = self.err.line();
        if let Some(text) = line_text(self.source, line) {
            write!(f, "\n{line:>5} | {text}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_shows_offending_line() {
        let err = CompileError::Semantic(SemanticError::UndefinedVariable {
            name: "y".into(),
            line: 2,
        });
        let source = "class A {\n  let x = y;\n}";
        assert_eq!(
            err.with_context(source).to_string(),
            "semantic error: line 2: variable 'y' is not defined\n    2 |   let x = y;"
        );
    }

    #[test]
    fn context_without_line_text_is_message_only() {
        let err = CompileError::Semantic(SemanticError::ThisInFunction { line: 40 });
        assert_eq!(
            err.with_context("").to_string(),
            "semantic error: line 40: 'this' is not permitted in functions"
        );
    }

    #[test]
    fn kind_matches_variant() {
        let err: CompileError = SyntaxError {
            expected: "';'",
            found: "end of input".into(),
            span: Span::default(),
            line: 1,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(err.to_string(), "line 1: expected ';', found end of input");
    }
}
