use std::{fmt::Display, iter::Peekable, str::CharIndices};

use compact_str::CompactString;

use super::span::Span;

/// Creates a fieldless enum together with conversions to and from its source text.
macro_rules! lexeme_enum {
    ($(#[$meta:meta])* $EnumName:ident $($VariantName:ident $value:literal)*) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub enum $EnumName {
            $($VariantName),*
        }

        impl $EnumName {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$EnumName] = &[$($EnumName::$VariantName),*];

            /// Returns the variant whose source text is exactly `text`.
            pub fn from_text(text: &str) -> Option<Self> {
                match text {
                    $($value => Some(Self::$VariantName),)*
                    _ => None,
                }
            }

            /// Returns the source text of the variant.
            pub fn as_text(self) -> &'static str {
                match self {
                    $(Self::$VariantName => $value,)*
                }
            }
        }

        impl Display for $EnumName {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_text())
            }
        }
    };
}

lexeme_enum! {
    /// A reserved word. Keywords only match whole words, `classify` is an identifier.
    Keyword
    Class "class"
    Constructor "constructor"
    Function "function"
    Method "method"
    Field "field"
    Static "static"
    Var "var"
    Int "int"
    Char "char"
    Boolean "boolean"
    Void "void"
    True "true"
    False "false"
    Null "null"
    This "this"
    Let "let"
    Do "do"
    If "if"
    Else "else"
    While "while"
    Return "return"
}

lexeme_enum! {
    /// A single character of punctuation or an operator.
    Symbol
    LeftBrace "{"
    RightBrace "}"
    LeftParen "("
    RightParen ")"
    LeftBracket "["
    RightBracket "]"
    Dot "."
    Comma ","
    Semicolon ";"
    Plus "+"
    Minus "-"
    Asterisk "*"
    Slash "/"
    Ampersand "&"
    Pipe "|"
    LessThan "<"
    GreaterThan ">"
    Equals "="
    Tilde "~"
}

impl Symbol {
    /// Returns the symbol for a single character.
    pub fn from_char(ch: char) -> Option<Symbol> {
        let mut buf = [0u8; 4];
        Symbol::from_text(ch.encode_utf8(&mut buf))
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
/// The reason a token could not be lexed.
pub enum Malformation {
    /// A string literal reached a newline or the end of input before its closing quote.
    UnterminatedString,
    /// A string literal contains a character outside of printable ASCII.
    InvalidStringCharacter,
    /// A block comment reached the end of input before `*/`.
    UnterminatedComment,
    /// A character that cannot begin any token.
    InvalidCharacter,
}

impl Display for Malformation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Malformation::UnterminatedString => write!(f, "unterminated string literal"),
            Malformation::InvalidStringCharacter => {
                write!(f, "string literal contains a non-printable or non-ASCII character")
            }
            Malformation::UnterminatedComment => write!(f, "unterminated block comment"),
            Malformation::InvalidCharacter => write!(f, "invalid character"),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
/// The classification of a token.
pub enum TokenType {
    Keyword(Keyword),
    Symbol(Symbol),
    /// A run of decimal digits. The value is not range checked.
    IntegerConstant,
    /// A double quoted string. The token text holds the unescaped contents.
    StringConstant,
    Identifier,
    /// A line or block comment. The parser never sees these.
    Comment,
    /// The end of the input. Always the last token.
    Eof,
    /// Text that could not be lexed.
    Malformed(Malformation),
}

impl TokenType {
    /// Returns the name used in token dumps.
    pub fn name(self) -> &'static str {
        match self {
            TokenType::Keyword(_) => "KEYWORD",
            TokenType::Symbol(_) => "SYMBOL",
            TokenType::IntegerConstant => "INTEGER_CONSTANT",
            TokenType::StringConstant => "STRING_CONSTANT",
            TokenType::Identifier => "IDENTIFIER",
            TokenType::Comment => "COMMENT",
            TokenType::Eof => "EOF",
            TokenType::Malformed(_) => "MALFORMED",
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
/// A classified piece of the source code.
pub struct Token {
    /// The span of the token in the source code.
    pub span: Span,
    /// The line the token starts on, starting at 1.
    pub line: u32,
    /// The type of the token.
    pub token_type: TokenType,
    /// The canonical text of the token.
    pub text: CompactString,
}

impl Token {
    /// Returns a human readable description of the token for diagnostics.
    pub fn describe(&self) -> String {
        match self.token_type {
            TokenType::Keyword(k) => format!("keyword '{k}'"),
            TokenType::Symbol(s) => format!("symbol '{s}'"),
            TokenType::IntegerConstant => format!("integer constant '{}'", self.text),
            TokenType::StringConstant => format!("string constant \"{}\"", self.text),
            TokenType::Identifier => format!("identifier '{}'", self.text),
            TokenType::Comment => "comment".to_string(),
            TokenType::Eof => "end of input".to_string(),
            TokenType::Malformed(m) => format!("{m} '{}'", self.text),
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} {})", self.token_type.name(), self.text)
    }
}

/// Splits source text into tokens.
///
/// The tokenizer never fails: text that can not be lexed is returned as a
/// [`TokenType::Malformed`] token and it is up to the parser to reject it. Iterating yields every
/// token up to and including a single [`TokenType::Eof`].
pub struct Tokenizer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    /// The byte offset just past the last consumed character.
    offset: usize,
    line: u32,
    finished: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Tokenizer<'a> {
        Tokenizer {
            source,
            chars: source.char_indices().peekable(),
            offset: 0,
            line: 1,
            finished: false,
        }
    }

    /// Rewinds the tokenizer to the start of its source.
    pub fn restart(&mut self) {
        *self = Tokenizer::new(self.source);
    }

    /// Returns the next token, skipping whitespace. Once the input is exhausted every call returns
    /// an [`TokenType::Eof`] token.
    pub fn next_token(&mut self) -> Token {
        while let Some(ch) = self.peek_char() {
            if matches!(ch, ' ' | '\t' | '\r' | '\n') {
                self.bump();
            } else {
                break;
            }
        }
        let start = self.offset;
        let line = self.line;
        let Some(ch) = self.bump() else {
            return self.token(start, line, TokenType::Eof, CompactString::default());
        };
        match ch {
            '/' if self.peek_char() == Some('/') => self.line_comment(start, line),
            '/' if self.peek_char() == Some('*') => self.block_comment(start, line),
            '"' => self.string(start, line),
            '0'..='9' => {
                self.eat_while(|ch| ch.is_ascii_digit());
                self.token_from_source(start, line, TokenType::IntegerConstant)
            }
            ch if ch == '_' || ch.is_ascii_alphabetic() => {
                self.eat_while(|ch| ch == '_' || ch.is_ascii_alphanumeric());
                let text = &self.source[start..self.offset];
                let token_type = match Keyword::from_text(text) {
                    Some(keyword) => TokenType::Keyword(keyword),
                    None => TokenType::Identifier,
                };
                self.token_from_source(start, line, token_type)
            }
            ch => match Symbol::from_char(ch) {
                Some(symbol) => self.token_from_source(start, line, TokenType::Symbol(symbol)),
                None => self.token_from_source(
                    start,
                    line,
                    TokenType::Malformed(Malformation::InvalidCharacter),
                ),
            },
        }
    }

    fn line_comment(&mut self, start: usize, line: u32) -> Token {
        self.eat_while(|ch| ch != '\n' && ch != '\r');
        self.token_from_source(start, line, TokenType::Comment)
    }

    fn block_comment(&mut self, start: usize, line: u32) -> Token {
        // Consume the `*` of the opening `/*`.
        self.bump();
        let mut previous = '\0';
        while let Some(ch) = self.bump() {
            if previous == '*' && ch == '/' {
                return self.token_from_source(start, line, TokenType::Comment);
            }
            previous = ch;
        }
        self.token_from_source(
            start,
            line,
            TokenType::Malformed(Malformation::UnterminatedComment),
        )
    }

    fn string(&mut self, start: usize, line: u32) -> Token {
        let mut contents = CompactString::default();
        let mut malformation = None;
        loop {
            match self.peek_char() {
                None | Some('\n') | Some('\r') => {
                    return self.token(
                        start,
                        line,
                        TokenType::Malformed(Malformation::UnterminatedString),
                        contents,
                    );
                }
                Some('"') => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    match self.peek_char() {
                        Some(escaped @ ('"' | '\\')) => {
                            self.bump();
                            contents.push(escaped);
                        }
                        _ => contents.push('\\'),
                    }
                }
                Some(ch) => {
                    self.bump();
                    if !(' '..='~').contains(&ch) {
                        malformation = Some(Malformation::InvalidStringCharacter);
                    }
                    contents.push(ch);
                }
            }
        }
        let token_type = match malformation {
            Some(m) => TokenType::Malformed(m),
            None => TokenType::StringConstant,
        };
        self.token(start, line, token_type, contents)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn bump(&mut self) -> Option<char> {
        let (idx, ch) = self.chars.next()?;
        self.offset = idx + ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
        }
        Some(ch)
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.peek_char().is_some_and(&pred) {
            self.bump();
        }
    }

    fn token_from_source(&self, start: usize, line: u32, token_type: TokenType) -> Token {
        let text = CompactString::new(&self.source[start..self.offset]);
        self.token(start, line, token_type, text)
    }

    fn token(&self, start: usize, line: u32, token_type: TokenType, text: CompactString) -> Token {
        Token {
            span: Span::new(start, self.offset),
            line,
            token_type,
            text,
        }
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        self.finished = token.token_type == TokenType::Eof;
        Some(token)
    }
}

/// Tokenizes a string of source code.
pub fn tokenize(source: &str) -> Tokenizer<'_> {
    Tokenizer::new(source)
}

/// Tokenizes a string of source code, dropping comments. The result always ends with a
/// [`TokenType::Eof`] token.
pub fn significant_tokens(source: &str) -> Vec<Token> {
    tokenize(source)
        .filter(|t| t.token_type != TokenType::Comment)
        .collect()
}
