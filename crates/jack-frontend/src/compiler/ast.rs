//! The abstract syntax tree of one class.
//!
//! Nodes are allocated in a [`bumpalo::Bump`] arena owned by the caller and refer to their
//! children through shared references and slices into the same arena. The tree is built once by
//! the parser and is read-only afterwards.

use std::fmt::{Display, Write};

use super::tokenizer::Symbol;

/// A name together with the line it appeared on.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Ident<'a> {
    pub name: &'a str,
    pub line: u32,
}

/// A declared type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Type<'a> {
    Int,
    Char,
    Boolean,
    /// Only meaningful as a return type. Anywhere else it is rejected during code generation.
    Void,
    /// A class name.
    Class(&'a str),
}

impl Display for Type<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int => f.write_str("int"),
            Type::Char => f.write_str("char"),
            Type::Boolean => f.write_str("boolean"),
            Type::Void => f.write_str("void"),
            Type::Class(name) => f.write_str(name),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClassVarKind {
    Static,
    Field,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SubroutineKind {
    Constructor,
    Function,
    Method,
}

impl Display for SubroutineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubroutineKind::Constructor => f.write_str("constructor"),
            SubroutineKind::Function => f.write_str("function"),
            SubroutineKind::Method => f.write_str("method"),
        }
    }
}

/// The root of a compilation unit.
#[derive(Debug, PartialEq)]
pub struct Class<'a> {
    pub name: Ident<'a>,
    pub vars: &'a [ClassVarDec<'a>],
    pub subroutines: &'a [SubroutineDec<'a>],
}

/// `static int a, b;` or `field Point p;`.
#[derive(Debug, PartialEq)]
pub struct ClassVarDec<'a> {
    pub kind: ClassVarKind,
    pub var_type: Type<'a>,
    pub names: &'a [Ident<'a>],
}

/// `var int a, b;` inside a subroutine body.
#[derive(Debug, PartialEq)]
pub struct VarDec<'a> {
    pub var_type: Type<'a>,
    pub names: &'a [Ident<'a>],
}

#[derive(Debug, PartialEq)]
pub struct Parameter<'a> {
    pub param_type: Type<'a>,
    pub name: Ident<'a>,
}

#[derive(Debug, PartialEq)]
pub struct SubroutineDec<'a> {
    pub kind: SubroutineKind,
    pub return_type: Type<'a>,
    pub name: Ident<'a>,
    pub params: &'a [Parameter<'a>],
    pub locals: &'a [VarDec<'a>],
    pub body: &'a [Statement<'a>],
}

impl SubroutineDec<'_> {
    /// Returns `true` if a `return` statement appears anywhere in the body, including nested
    /// blocks.
    pub fn has_return(&self) -> bool {
        fn any_return(block: &[Statement]) -> bool {
            block.iter().any(|s| match s {
                Statement::Return { .. } => true,
                Statement::If {
                    then_block,
                    else_block,
                    ..
                } => any_return(then_block) || else_block.is_some_and(any_return),
                Statement::While { body, .. } => any_return(body),
                Statement::Let { .. } | Statement::Do(_) => false,
            })
        }
        any_return(self.body)
    }
}

#[derive(Debug, PartialEq)]
pub enum Statement<'a> {
    /// `let target = value;` or `let target[index] = value;`.
    Let {
        target: Ident<'a>,
        index: Option<&'a Expr<'a>>,
        value: &'a Expr<'a>,
    },
    If {
        condition: &'a Expr<'a>,
        then_block: &'a [Statement<'a>],
        else_block: Option<&'a [Statement<'a>]>,
    },
    While {
        condition: &'a Expr<'a>,
        body: &'a [Statement<'a>],
    },
    /// A call whose result is discarded.
    Do(&'a SubroutineCall<'a>),
    Return {
        value: Option<&'a Expr<'a>>,
        line: u32,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeywordConstant {
    True,
    False,
    Null,
    This,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-`
    Neg,
    /// `~`
    Not,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Lt,
    Gt,
    Eq,
}

impl BinaryOp {
    pub fn from_symbol(symbol: Symbol) -> Option<BinaryOp> {
        match symbol {
            Symbol::Plus => Some(BinaryOp::Add),
            Symbol::Minus => Some(BinaryOp::Sub),
            Symbol::Asterisk => Some(BinaryOp::Mul),
            Symbol::Slash => Some(BinaryOp::Div),
            Symbol::Ampersand => Some(BinaryOp::And),
            Symbol::Pipe => Some(BinaryOp::Or),
            Symbol::LessThan => Some(BinaryOp::Lt),
            Symbol::GreaterThan => Some(BinaryOp::Gt),
            Symbol::Equals => Some(BinaryOp::Eq),
            _ => None,
        }
    }

    /// The binding power under conventional precedence. Larger binds tighter.
    pub fn binding_power(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq => 3,
            BinaryOp::Lt | BinaryOp::Gt => 4,
            BinaryOp::Add | BinaryOp::Sub => 5,
            BinaryOp::Mul | BinaryOp::Div => 6,
        }
    }

    pub fn as_text(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Eq => "=",
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum Expr<'a> {
    /// An unsigned decimal literal. Literals too large for `u32` saturate; the range is checked
    /// during code generation.
    IntegerConstant { value: u32, line: u32 },
    StringConstant(&'a str),
    KeywordConstant { keyword: KeywordConstant, line: u32 },
    Var(Ident<'a>),
    /// `name[index]`
    Subscript {
        name: Ident<'a>,
        index: &'a Expr<'a>,
    },
    Unary {
        op: UnaryOp,
        operand: &'a Expr<'a>,
    },
    Binary {
        op: BinaryOp,
        lhs: &'a Expr<'a>,
        rhs: &'a Expr<'a>,
    },
    Call(SubroutineCall<'a>),
}

/// `name(args)` or `receiver.name(args)` where the receiver is a variable or a class name.
#[derive(Debug, PartialEq)]
pub struct SubroutineCall<'a> {
    pub receiver: Option<Ident<'a>>,
    pub name: Ident<'a>,
    pub args: &'a [Expr<'a>],
}

// S-expression rendering. Each node opens a new line indented by its depth.

fn newline(f: &mut impl Write, depth: usize) -> std::fmt::Result {
    f.write_char('\n')?;
    for _ in 0..depth {
        f.write_str("  ")?;
    }
    Ok(())
}

impl Class<'_> {
    fn write_sexp(&self, f: &mut impl Write) -> std::fmt::Result {
        write!(f, "(CLASS_DECL {}", self.name.name)?;
        for var in self.vars {
            newline(f, 1)?;
            let kind = match var.kind {
                ClassVarKind::Static => "STATIC",
                ClassVarKind::Field => "FIELD",
            };
            write!(f, "(CLASS_VAR_DECL {kind} {}", var.var_type)?;
            for name in var.names {
                write!(f, " {}", name.name)?;
            }
            f.write_char(')')?;
        }
        for subroutine in self.subroutines {
            newline(f, 1)?;
            subroutine.write_sexp(f, 1)?;
        }
        f.write_char(')')
    }
}

impl SubroutineDec<'_> {
    fn write_sexp(&self, f: &mut impl Write, depth: usize) -> std::fmt::Result {
        let kind = match self.kind {
            SubroutineKind::Constructor => "CONSTRUCTOR_DECL",
            SubroutineKind::Function => "FUNCTION_DECL",
            SubroutineKind::Method => "METHOD_DECL",
        };
        write!(f, "({kind} {} {}", self.return_type, self.name.name)?;
        newline(f, depth + 1)?;
        f.write_str("(PARAMETER_LIST")?;
        for param in self.params {
            write!(f, " ({} {})", param.param_type, param.name.name)?;
        }
        f.write_char(')')?;
        for local in self.locals {
            newline(f, depth + 1)?;
            write!(f, "(LOCAL_VAR_DECL {}", local.var_type)?;
            for name in local.names {
                write!(f, " {}", name.name)?;
            }
            f.write_char(')')?;
        }
        newline(f, depth + 1)?;
        write_block(f, self.body, depth + 1)?;
        f.write_char(')')
    }
}

fn write_block(f: &mut impl Write, block: &[Statement], depth: usize) -> std::fmt::Result {
    f.write_str("(STATEMENT_BLOCK")?;
    for statement in block {
        newline(f, depth + 1)?;
        statement.write_sexp(f, depth + 1)?;
    }
    f.write_char(')')
}

impl Statement<'_> {
    fn write_sexp(&self, f: &mut impl Write, depth: usize) -> std::fmt::Result {
        match self {
            Statement::Let {
                target,
                index,
                value,
            } => {
                write!(f, "(LET_STATEMENT {}", target.name)?;
                if let Some(index) = index {
                    f.write_str(" [")?;
                    index.write_sexp(f)?;
                    f.write_char(']')?;
                }
                f.write_char(' ')?;
                value.write_sexp(f)?;
                f.write_char(')')
            }
            Statement::If {
                condition,
                then_block,
                else_block,
            } => {
                f.write_str("(IF_STATEMENT ")?;
                condition.write_sexp(f)?;
                newline(f, depth + 1)?;
                write_block(f, then_block, depth + 1)?;
                if let Some(else_block) = else_block {
                    newline(f, depth + 1)?;
                    write_block(f, else_block, depth + 1)?;
                }
                f.write_char(')')
            }
            Statement::While { condition, body } => {
                f.write_str("(WHILE_STATEMENT ")?;
                condition.write_sexp(f)?;
                newline(f, depth + 1)?;
                write_block(f, body, depth + 1)?;
                f.write_char(')')
            }
            Statement::Do(call) => {
                f.write_str("(DO_STATEMENT ")?;
                call.write_sexp(f)?;
                f.write_char(')')
            }
            Statement::Return { value, .. } => {
                f.write_str("(RETURN_STATEMENT")?;
                if let Some(value) = value {
                    f.write_char(' ')?;
                    value.write_sexp(f)?;
                }
                f.write_char(')')
            }
        }
    }
}

impl Expr<'_> {
    fn write_sexp(&self, f: &mut impl Write) -> std::fmt::Result {
        match self {
            Expr::IntegerConstant { value, .. } => write!(f, "{value}"),
            Expr::StringConstant(s) => write!(f, "{s:?}"),
            Expr::KeywordConstant { keyword, .. } => f.write_str(match keyword {
                KeywordConstant::True => "true",
                KeywordConstant::False => "false",
                KeywordConstant::Null => "null",
                KeywordConstant::This => "this",
            }),
            Expr::Var(ident) => f.write_str(ident.name),
            Expr::Subscript { name, index } => {
                write!(f, "(SUBSCRIPT {} ", name.name)?;
                index.write_sexp(f)?;
                f.write_char(')')
            }
            Expr::Unary { op, operand } => {
                let op = match op {
                    UnaryOp::Neg => '-',
                    UnaryOp::Not => '~',
                };
                write!(f, "({op} ")?;
                operand.write_sexp(f)?;
                f.write_char(')')
            }
            Expr::Binary { op, lhs, rhs } => {
                write!(f, "({} ", op.as_text())?;
                lhs.write_sexp(f)?;
                f.write_char(' ')?;
                rhs.write_sexp(f)?;
                f.write_char(')')
            }
            Expr::Call(call) => call.write_sexp(f),
        }
    }
}

impl SubroutineCall<'_> {
    fn write_sexp(&self, f: &mut impl Write) -> std::fmt::Result {
        f.write_str("(CALL ")?;
        if let Some(receiver) = self.receiver {
            write!(f, "{}.", receiver.name)?;
        }
        f.write_str(self.name.name)?;
        for arg in self.args {
            f.write_char(' ')?;
            arg.write_sexp(f)?;
        }
        f.write_char(')')
    }
}

impl Display for Class<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.write_sexp(f)
    }
}

impl Display for Expr<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.write_sexp(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Ident<'_> {
        Ident { name, line: 1 }
    }

    #[test]
    fn binding_power_orders_operators() {
        assert!(BinaryOp::Mul.binding_power() > BinaryOp::Add.binding_power());
        assert!(BinaryOp::Add.binding_power() > BinaryOp::Lt.binding_power());
        assert!(BinaryOp::Lt.binding_power() > BinaryOp::Eq.binding_power());
        assert!(BinaryOp::Eq.binding_power() > BinaryOp::And.binding_power());
        assert!(BinaryOp::And.binding_power() > BinaryOp::Or.binding_power());
        assert_eq!(
            BinaryOp::Div.binding_power(),
            BinaryOp::Mul.binding_power()
        );
    }

    #[test]
    fn every_operator_symbol_maps_to_its_text() {
        for symbol in Symbol::ALL {
            if let Some(op) = BinaryOp::from_symbol(*symbol) {
                assert_eq!(op.as_text(), symbol.as_text());
            }
        }
        assert_eq!(BinaryOp::from_symbol(Symbol::Tilde), None);
    }

    #[test]
    fn has_return_searches_nested_blocks() {
        let ret = [Statement::Return {
            value: None,
            line: 3,
        }];
        let cond = Expr::KeywordConstant {
            keyword: KeywordConstant::True,
            line: 2,
        };
        let body = [Statement::While {
            condition: &cond,
            body: &ret,
        }];
        let mut subroutine = SubroutineDec {
            kind: SubroutineKind::Function,
            return_type: Type::Void,
            name: ident("f"),
            params: &[],
            locals: &[],
            body: &body,
        };
        assert!(subroutine.has_return());
        subroutine.body = &[];
        assert!(!subroutine.has_return());
    }

    #[test]
    fn expression_renders_as_s_expression() {
        let two = Expr::IntegerConstant { value: 2, line: 1 };
        let x = Expr::Var(ident("x"));
        let neg = Expr::Unary {
            op: UnaryOp::Neg,
            operand: &x,
        };
        let expr = Expr::Binary {
            op: BinaryOp::Mul,
            lhs: &two,
            rhs: &neg,
        };
        assert_eq!(expr.to_string(), "(* 2 (- x))");
    }
}
