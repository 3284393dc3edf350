//! src/lexer.rs

use crate::common::Position;
use crate::error::{LexicalError, LexicalErrorKind};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Int,
    Float,
    Bool,
    If,
    Else,
    While,
    Print,
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Percent,      // %
    Assign,       // =
    Equal,        // ==
    NotEqual,     // !=
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=
    AndAnd,       // &&
    OrOr,         // ||
    Bang,         // !
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punctuation {
    OpenParen,  // (
    CloseParen, // )
    OpenBrace,  // {
    CloseBrace, // }
    Semicolon,  // ;
}

#[derive(Debug, PartialEq, Clone)]
pub enum TokenType {
    Identifier(String),
    IntegerLiteral(i64),
    FloatLiteral(f64),
    BooleanLiteral(bool),
    Keyword(Keyword),
    Operator(Operator),
    Punctuation(Punctuation),
    Eof,
}

impl TokenType {
    /// transcript 中使用的种类名。
    pub fn kind_name(&self) -> &'static str {
        match self {
            TokenType::Identifier(_) => "IDENTIFIER",
            TokenType::IntegerLiteral(_) => "INTEGER",
            TokenType::FloatLiteral(_) => "FLOAT",
            TokenType::BooleanLiteral(_) => "BOOLEAN",
            TokenType::Keyword(_) => "KEYWORD",
            TokenType::Operator(_) => "OPERATOR",
            TokenType::Punctuation(_) => "PUNCTUATION",
            TokenType::Eof => "EOF",
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub position: Position,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lexeme.is_empty() {
            write!(f, "{}:", self.token_type.kind_name())
        } else {
            write!(f, "{}: {}", self.token_type.kind_name(), self.lexeme)
        }
    }
}

/// 一次性把整段源码切成 token 列表，最后一个 token 总是 `Eof`。
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexicalError> {
    Lexer::new(source).collect()
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
    // Eof 已经发出，或者已经报过错
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
            finished: false,
        }
    }

    fn current_position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    /// 消费一个字符并更新行列号。
    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// 向前看两个字符，用来区分 `/` 和注释的开头。
    fn peek_second(&self) -> Option<char> {
        let mut lookahead = self.chars.clone();
        lookahead.next();
        lookahead.next()
    }

    fn error(&self, position: Position, kind: LexicalErrorKind) -> LexicalError {
        LexicalError { position, kind }
    }

    /// 跳过空白、行注释和块注释。
    fn skip_trivia(&mut self) -> Result<(), LexicalError> {
        loop {
            match self.chars.peek().copied() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_second() == Some('/') => {
                    while let Some(&c) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek_second() == Some('*') => {
                    let start = self.current_position();
                    self.bump();
                    self.bump();
                    let mut closed = false;
                    while let Some(c) = self.bump() {
                        if c == '*' && self.chars.peek() == Some(&'/') {
                            self.bump();
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        return Err(self.error(start, LexicalErrorKind::UnterminatedComment));
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn lex_identifier_or_keyword(&mut self, lexeme: &mut String) -> TokenType {
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                lexeme.push(c);
                self.bump();
            } else {
                break;
            }
        }
        match lexeme.as_str() {
            "int" => TokenType::Keyword(Keyword::Int),
            "float" => TokenType::Keyword(Keyword::Float),
            "bool" => TokenType::Keyword(Keyword::Bool),
            "if" => TokenType::Keyword(Keyword::If),
            "else" => TokenType::Keyword(Keyword::Else),
            "while" => TokenType::Keyword(Keyword::While),
            "print" => TokenType::Keyword(Keyword::Print),
            "return" => TokenType::Keyword(Keyword::Return),
            "true" => TokenType::BooleanLiteral(true),
            "false" => TokenType::BooleanLiteral(false),
            _ => TokenType::Identifier(lexeme.clone()),
        }
    }

    fn take_digits(&mut self, lexeme: &mut String) {
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                lexeme.push(c);
                self.bump();
            } else {
                break;
            }
        }
    }

    /// 解析整数或浮点常量。`12abc` 和 `1.` 这样的写法都是错误。
    fn lex_number(&mut self, start: Position, lexeme: &mut String) -> Result<TokenType, LexicalError> {
        self.take_digits(lexeme);

        let mut is_float = false;
        if self.chars.peek() == Some(&'.') {
            lexeme.push('.');
            self.bump();
            if !matches!(self.chars.peek(), Some(c) if c.is_ascii_digit()) {
                return Err(self.error(start, LexicalErrorKind::InvalidNumber(lexeme.clone())));
            }
            self.take_digits(lexeme);
            is_float = true;
        }

        if matches!(self.chars.peek(), Some(&c) if c.is_ascii_alphabetic() || c == '_') {
            while let Some(&c) = self.chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    lexeme.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
            return Err(self.error(start, LexicalErrorKind::InvalidNumber(lexeme.clone())));
        }

        if is_float {
            lexeme
                .parse::<f64>()
                .map(TokenType::FloatLiteral)
                .map_err(|_| self.error(start, LexicalErrorKind::InvalidNumber(lexeme.clone())))
        } else {
            lexeme
                .parse::<i64>()
                .map(TokenType::IntegerLiteral)
                .map_err(|_| self.error(start, LexicalErrorKind::InvalidNumber(lexeme.clone())))
        }
    }

    /// 运算符和标点。两个字符的运算符优先匹配（最长匹配）。
    fn lex_symbol(&mut self, c: char, start: Position, lexeme: &mut String) -> Result<TokenType, LexicalError> {
        self.bump();
        lexeme.push(c);
        let next = self.chars.peek().copied();

        let double = match (c, next) {
            ('=', Some('=')) => Some(Operator::Equal),
            ('!', Some('=')) => Some(Operator::NotEqual),
            ('<', Some('=')) => Some(Operator::LessEqual),
            ('>', Some('=')) => Some(Operator::GreaterEqual),
            ('&', Some('&')) => Some(Operator::AndAnd),
            ('|', Some('|')) => Some(Operator::OrOr),
            _ => None,
        };
        if let Some(op) = double {
            if let Some(second) = self.bump() {
                lexeme.push(second);
            }
            return Ok(TokenType::Operator(op));
        }

        let token_type = match c {
            '+' => TokenType::Operator(Operator::Plus),
            '-' => TokenType::Operator(Operator::Minus),
            '*' => TokenType::Operator(Operator::Star),
            '/' => TokenType::Operator(Operator::Slash),
            '%' => TokenType::Operator(Operator::Percent),
            '=' => TokenType::Operator(Operator::Assign),
            '<' => TokenType::Operator(Operator::Less),
            '>' => TokenType::Operator(Operator::Greater),
            '!' => TokenType::Operator(Operator::Bang),
            '(' => TokenType::Punctuation(Punctuation::OpenParen),
            ')' => TokenType::Punctuation(Punctuation::CloseParen),
            '{' => TokenType::Punctuation(Punctuation::OpenBrace),
            '}' => TokenType::Punctuation(Punctuation::CloseBrace),
            ';' => TokenType::Punctuation(Punctuation::Semicolon),
            _ => return Err(self.error(start, LexicalErrorKind::UnexpectedCharacter(c))),
        };
        Ok(token_type)
    }

    /// 核心方法：解析下一个 token。
    fn next_token(&mut self) -> Result<Token, LexicalError> {
        self.skip_trivia()?;

        let position = self.current_position();
        let mut lexeme = String::new();
        let token_type = match self.chars.peek().copied() {
            None => TokenType::Eof,
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                self.lex_identifier_or_keyword(&mut lexeme)
            }
            Some(c) if c.is_ascii_digit() => self.lex_number(position, &mut lexeme)?,
            Some(c) => self.lex_symbol(c, position, &mut lexeme)?,
        };

        Ok(Token {
            token_type,
            lexeme,
            position,
        })
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token, LexicalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_token();
        if matches!(&result, Ok(token) if token.token_type == TokenType::Eof) || result.is_err() {
            self.finished = true;
        }
        Some(result)
    }
}
