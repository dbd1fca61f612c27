use bumpalo::{Bump, collections::Vec as BumpVec};

use super::{
    ast::{
        BinaryOp, Class, ClassVarDec, ClassVarKind, Expr, Ident, KeywordConstant, Parameter,
        Statement, SubroutineCall, SubroutineDec, SubroutineKind, Type, UnaryOp, VarDec,
    },
    error::{CompileResult, LexicalError, SyntaxError},
    options::PrecedenceMode,
    tokenizer::{Keyword, Symbol, Token, TokenType, significant_tokens},
};

/// How deeply expressions and blocks may nest before parsing gives up.
pub const MAX_NESTING: u32 = 256;

/// Parses the source of one class into an AST allocated in `arena`.
pub fn parse_class<'a>(
    source: &str,
    arena: &'a Bump,
    precedence: PrecedenceMode,
) -> CompileResult<&'a Class<'a>> {
    let mut parser = Parser::new(source, arena, precedence);
    let class = parser.parse_class()?;
    parser.expect_eof()?;
    Ok(arena.alloc(class))
}

/// A recursive descent parser with a single token of lookahead.
///
/// The parser stops at the first error. Malformed tokens are reported as lexical errors when the
/// parser reaches them.
pub struct Parser<'a> {
    tokens: Vec<Token>,
    /// Index of the current token. Never moves past the final `Eof` token.
    pos: usize,
    arena: &'a Bump,
    precedence: PrecedenceMode,
    /// The number of enclosing expressions and blocks.
    depth: u32,
}

impl<'a> Parser<'a> {
    pub fn new(source: &str, arena: &'a Bump, precedence: PrecedenceMode) -> Parser<'a> {
        Parser {
            tokens: significant_tokens(source),
            pos: 0,
            arena,
            precedence,
            depth: 0,
        }
    }

    /// Returns the current token without checking whether it is malformed.
    fn current(&self) -> &Token {
        // `significant_tokens` always ends with `Eof` so the list is never empty.
        let idx = self.pos.min(self.tokens.len().saturating_sub(1));
        &self.tokens[idx]
    }

    fn peek(&self) -> CompileResult<&Token> {
        let token = self.current();
        if let TokenType::Malformed(malformation) = token.token_type {
            return Err(LexicalError {
                malformation,
                text: token.text.clone(),
                span: token.span,
                line: token.line,
            }
            .into());
        }
        Ok(token)
    }

    fn peek_type(&self) -> CompileResult<TokenType> {
        Ok(self.peek()?.token_type)
    }

    fn bump(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn next(&mut self) -> CompileResult<Token> {
        let token = self.peek()?.clone();
        self.bump();
        Ok(token)
    }

    fn error(&self, expected: &'static str) -> SyntaxError {
        SyntaxError::new(expected, self.current())
    }

    fn at_symbol(&self, symbol: Symbol) -> CompileResult<bool> {
        Ok(self.peek_type()? == TokenType::Symbol(symbol))
    }

    fn at_keyword(&self, keyword: Keyword) -> CompileResult<bool> {
        Ok(self.peek_type()? == TokenType::Keyword(keyword))
    }

    /// Consumes the current token if it is `symbol`.
    fn eat_symbol(&mut self, symbol: Symbol) -> CompileResult<bool> {
        let found = self.at_symbol(symbol)?;
        if found {
            self.bump();
        }
        Ok(found)
    }

    fn expect_symbol(&mut self, symbol: Symbol, expected: &'static str) -> CompileResult<Token> {
        if !self.at_symbol(symbol)? {
            return Err(self.error(expected).into());
        }
        self.next()
    }

    fn expect_keyword(&mut self, keyword: Keyword, expected: &'static str) -> CompileResult<Token> {
        if !self.at_keyword(keyword)? {
            return Err(self.error(expected).into());
        }
        self.next()
    }

    fn expect_identifier(&mut self, expected: &'static str) -> CompileResult<Ident<'a>> {
        if self.peek_type()? != TokenType::Identifier {
            return Err(self.error(expected).into());
        }
        let token = self.next()?;
        Ok(self.ident(&token))
    }

    fn expect_eof(&mut self) -> CompileResult<()> {
        match self.peek_type()? {
            TokenType::Eof => Ok(()),
            _ => Err(self.error("end of input after class").into()),
        }
    }

    fn ident(&self, token: &Token) -> Ident<'a> {
        Ident {
            name: self.arena.alloc_str(&token.text),
            line: token.line,
        }
    }

    fn alloc<T>(&self, value: T) -> &'a T {
        self.arena.alloc(value)
    }

    /// Runs `parse` one nesting level deeper, failing once [`MAX_NESTING`] is reached.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> CompileResult<T>,
    ) -> CompileResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("at most 256 nested expressions or blocks").into());
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// `class Name { classVarDec* subroutineDec* }`
    pub fn parse_class(&mut self) -> CompileResult<Class<'a>> {
        self.expect_keyword(Keyword::Class, "'class'")?;
        let name = self.expect_identifier("class name")?;
        self.expect_symbol(Symbol::LeftBrace, "'{'")?;
        let mut vars = BumpVec::new_in(self.arena);
        loop {
            let kind = match self.peek_type()? {
                TokenType::Keyword(Keyword::Static) => ClassVarKind::Static,
                TokenType::Keyword(Keyword::Field) => ClassVarKind::Field,
                _ => break,
            };
            self.bump();
            let var_type = self.parse_type()?;
            let names = self.parse_name_list()?;
            vars.push(ClassVarDec {
                kind,
                var_type,
                names,
            });
        }
        let mut subroutines = BumpVec::new_in(self.arena);
        loop {
            let kind = match self.peek_type()? {
                TokenType::Keyword(Keyword::Constructor) => SubroutineKind::Constructor,
                TokenType::Keyword(Keyword::Function) => SubroutineKind::Function,
                TokenType::Keyword(Keyword::Method) => SubroutineKind::Method,
                _ => break,
            };
            self.bump();
            subroutines.push(self.parse_subroutine(kind)?);
        }
        self.expect_symbol(
            Symbol::RightBrace,
            "class variable, subroutine declaration or '}'",
        )?;
        Ok(Class {
            name,
            vars: vars.into_bump_slice(),
            subroutines: subroutines.into_bump_slice(),
        })
    }

    /// Parses a type. `void` is accepted everywhere and rejected later where it does not belong.
    fn parse_type(&mut self) -> CompileResult<Type<'a>> {
        let var_type = match self.peek_type()? {
            TokenType::Keyword(Keyword::Int) => Type::Int,
            TokenType::Keyword(Keyword::Char) => Type::Char,
            TokenType::Keyword(Keyword::Boolean) => Type::Boolean,
            TokenType::Keyword(Keyword::Void) => Type::Void,
            TokenType::Identifier => Type::Class(self.arena.alloc_str(&self.current().text)),
            _ => return Err(self.error("type").into()),
        };
        self.bump();
        Ok(var_type)
    }

    /// `name (, name)* ;`
    fn parse_name_list(&mut self) -> CompileResult<&'a [Ident<'a>]> {
        let mut names = BumpVec::new_in(self.arena);
        names.push(self.expect_identifier("variable name")?);
        while self.eat_symbol(Symbol::Comma)? {
            names.push(self.expect_identifier("variable name")?);
        }
        self.expect_symbol(Symbol::Semicolon, "',' or ';'")?;
        Ok(names.into_bump_slice())
    }

    fn parse_subroutine(&mut self, kind: SubroutineKind) -> CompileResult<SubroutineDec<'a>> {
        let return_type = self.parse_type()?;
        let name = self.expect_identifier("subroutine name")?;
        self.expect_symbol(Symbol::LeftParen, "'('")?;
        let params = self.parse_parameter_list()?;
        self.expect_symbol(Symbol::RightParen, "',' or ')'")?;
        self.expect_symbol(Symbol::LeftBrace, "'{'")?;
        let mut locals = BumpVec::new_in(self.arena);
        while self.at_keyword(Keyword::Var)? {
            self.bump();
            let var_type = self.parse_type()?;
            let names = self.parse_name_list()?;
            locals.push(VarDec { var_type, names });
        }
        let body = self.parse_statements()?;
        self.expect_symbol(Symbol::RightBrace, "statement or '}'")?;
        Ok(SubroutineDec {
            kind,
            return_type,
            name,
            params,
            locals: locals.into_bump_slice(),
            body,
        })
    }

    fn parse_parameter_list(&mut self) -> CompileResult<&'a [Parameter<'a>]> {
        let mut params = BumpVec::new_in(self.arena);
        if self.at_symbol(Symbol::RightParen)? {
            return Ok(params.into_bump_slice());
        }
        loop {
            let param_type = self.parse_type()?;
            let name = self.expect_identifier("parameter name")?;
            params.push(Parameter { param_type, name });
            if !self.eat_symbol(Symbol::Comma)? {
                break;
            }
        }
        Ok(params.into_bump_slice())
    }

    /// Parses statements until a token that can not start a statement.
    fn parse_statements(&mut self) -> CompileResult<&'a [Statement<'a>]> {
        let mut statements = BumpVec::new_in(self.arena);
        loop {
            let statement = match self.peek_type()? {
                TokenType::Keyword(Keyword::Let) => self.parse_let()?,
                TokenType::Keyword(Keyword::If) => self.parse_if()?,
                TokenType::Keyword(Keyword::While) => self.parse_while()?,
                TokenType::Keyword(Keyword::Do) => self.parse_do()?,
                TokenType::Keyword(Keyword::Return) => self.parse_return()?,
                _ => break,
            };
            statements.push(statement);
        }
        Ok(statements.into_bump_slice())
    }

    /// `{ statements }`
    fn parse_block(&mut self) -> CompileResult<&'a [Statement<'a>]> {
        self.expect_symbol(Symbol::LeftBrace, "'{'")?;
        let statements = self.nested(Self::parse_statements)?;
        self.expect_symbol(Symbol::RightBrace, "statement or '}'")?;
        Ok(statements)
    }

    fn parse_let(&mut self) -> CompileResult<Statement<'a>> {
        self.bump();
        let target = self.expect_identifier("variable name")?;
        let index = if self.eat_symbol(Symbol::LeftBracket)? {
            let index = self.parse_expression()?;
            self.expect_symbol(Symbol::RightBracket, "']'")?;
            Some(index)
        } else {
            None
        };
        self.expect_symbol(Symbol::Equals, "'[' or '='")?;
        let value = self.parse_expression()?;
        self.expect_symbol(Symbol::Semicolon, "';'")?;
        Ok(Statement::Let {
            target,
            index,
            value,
        })
    }

    fn parse_condition(&mut self) -> CompileResult<&'a Expr<'a>> {
        self.expect_symbol(Symbol::LeftParen, "'('")?;
        let condition = self.parse_expression()?;
        self.expect_symbol(Symbol::RightParen, "')'")?;
        Ok(condition)
    }

    fn parse_if(&mut self) -> CompileResult<Statement<'a>> {
        self.bump();
        let condition = self.parse_condition()?;
        let then_block = self.parse_block()?;
        let else_block = if self.at_keyword(Keyword::Else)? {
            self.bump();
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(Statement::If {
            condition,
            then_block,
            else_block,
        })
    }

    fn parse_while(&mut self) -> CompileResult<Statement<'a>> {
        self.bump();
        let condition = self.parse_condition()?;
        let body = self.parse_block()?;
        Ok(Statement::While { condition, body })
    }

    fn parse_do(&mut self) -> CompileResult<Statement<'a>> {
        self.bump();
        let name = self.expect_identifier("subroutine name")?;
        let call = self.parse_call(name)?;
        self.expect_symbol(Symbol::Semicolon, "';'")?;
        Ok(Statement::Do(self.alloc(call)))
    }

    fn parse_return(&mut self) -> CompileResult<Statement<'a>> {
        let line = self.next()?.line;
        let value = if self.at_symbol(Symbol::Semicolon)? {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_symbol(Symbol::Semicolon, "';'")?;
        Ok(Statement::Return { value, line })
    }

    /// Parses the rest of a call whose first name has already been consumed.
    ///
    /// `name(args)` or `name.method(args)`.
    fn parse_call(&mut self, first: Ident<'a>) -> CompileResult<SubroutineCall<'a>> {
        let (receiver, name) = if self.eat_symbol(Symbol::Dot)? {
            (Some(first), self.expect_identifier("subroutine name")?)
        } else {
            (None, first)
        };
        self.expect_symbol(Symbol::LeftParen, "'(' or '.'")?;
        let mut args = BumpVec::new_in(self.arena);
        if !self.at_symbol(Symbol::RightParen)? {
            loop {
                args.push(self.parse_expression_value()?);
                if !self.eat_symbol(Symbol::Comma)? {
                    break;
                }
            }
        }
        self.expect_symbol(Symbol::RightParen, "',' or ')'")?;
        Ok(SubroutineCall {
            receiver,
            name,
            args: args.into_bump_slice(),
        })
    }

    /// Parses an expression with the configured operator precedence.
    pub fn parse_expression(&mut self) -> CompileResult<&'a Expr<'a>> {
        let expr = self.parse_expression_value()?;
        Ok(self.alloc(expr))
    }

    fn parse_expression_value(&mut self) -> CompileResult<Expr<'a>> {
        self.nested(|parser| match parser.precedence {
            PrecedenceMode::Flat => parser.parse_flat_expression(),
            PrecedenceMode::Conventional => parser.parse_expression_bp(0),
        })
    }

    fn peek_binary_op(&self) -> CompileResult<Option<BinaryOp>> {
        match self.peek_type()? {
            TokenType::Symbol(symbol) => Ok(BinaryOp::from_symbol(symbol)),
            _ => Ok(None),
        }
    }

    /// `term (op term)*`, grouped strictly left to right.
    fn parse_flat_expression(&mut self) -> CompileResult<Expr<'a>> {
        let mut lhs = self.parse_term()?;
        while let Some(op) = self.peek_binary_op()? {
            self.bump();
            let rhs = self.parse_term()?;
            lhs = Expr::Binary {
                op,
                lhs: self.alloc(lhs),
                rhs: self.alloc(rhs),
            };
        }
        Ok(lhs)
    }

    /// Precedence climbing over [`BinaryOp::binding_power`]. Only operators that bind tighter
    /// than `min_power` are consumed, which makes every operator left associative.
    fn parse_expression_bp(&mut self, min_power: u8) -> CompileResult<Expr<'a>> {
        let mut lhs = self.parse_term()?;
        while let Some(op) = self.peek_binary_op()? {
            let power = op.binding_power();
            if power <= min_power {
                break;
            }
            self.bump();
            let rhs = self.parse_expression_bp(power)?;
            lhs = Expr::Binary {
                op,
                lhs: self.alloc(lhs),
                rhs: self.alloc(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> CompileResult<Expr<'a>> {
        let token = self.peek()?;
        let line = token.line;
        let token_type = token.token_type;
        let keyword_constant = |keyword| Expr::KeywordConstant { keyword, line };
        let term = match token_type {
            TokenType::IntegerConstant => {
                // Only digits reach here, so the parse fails only on overflow.
                let value = token.text.parse::<u32>().unwrap_or(u32::MAX);
                self.bump();
                Expr::IntegerConstant { value, line }
            }
            TokenType::StringConstant => {
                let text = self.arena.alloc_str(&token.text);
                self.bump();
                Expr::StringConstant(text)
            }
            TokenType::Keyword(Keyword::True) => {
                self.bump();
                keyword_constant(KeywordConstant::True)
            }
            TokenType::Keyword(Keyword::False) => {
                self.bump();
                keyword_constant(KeywordConstant::False)
            }
            TokenType::Keyword(Keyword::Null) => {
                self.bump();
                keyword_constant(KeywordConstant::Null)
            }
            TokenType::Keyword(Keyword::This) => {
                self.bump();
                keyword_constant(KeywordConstant::This)
            }
            TokenType::Identifier => {
                let name = self.expect_identifier("variable name")?;
                match self.peek_type()? {
                    TokenType::Symbol(Symbol::LeftBracket) => {
                        self.bump();
                        let index = self.parse_expression()?;
                        self.expect_symbol(Symbol::RightBracket, "']'")?;
                        Expr::Subscript { name, index }
                    }
                    TokenType::Symbol(Symbol::LeftParen | Symbol::Dot) => {
                        Expr::Call(self.parse_call(name)?)
                    }
                    _ => Expr::Var(name),
                }
            }
            TokenType::Symbol(Symbol::LeftParen) => {
                self.bump();
                let expr = self.parse_expression_value()?;
                self.expect_symbol(Symbol::RightParen, "')'")?;
                expr
            }
            TokenType::Symbol(symbol @ (Symbol::Minus | Symbol::Tilde)) => {
                self.bump();
                let op = if symbol == Symbol::Minus {
                    UnaryOp::Neg
                } else {
                    UnaryOp::Not
                };
                let operand = self.nested(Self::parse_term)?;
                Expr::Unary {
                    op,
                    operand: self.alloc(operand),
                }
            }
            _ => return Err(self.error("expression").into()),
        };
        Ok(term)
    }
}
