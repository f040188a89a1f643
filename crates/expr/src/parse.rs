use thiserror::Error;

use crate::{BinOp, Expr, Func, Width};

const REGISTERS: &[&str] = &[
    "A", "B", "C", "D", "E", "H", "L", "F", "AF", "BC", "DE", "HL", "SP", "PC", "FZ", "FN", "FH",
    "FC", "IME",
];

const PARAMS: &[&str] = &["v8", "v16", "v8_rel", "FF00_v8", "ROMBANK"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected token {token} at column {column}")]
    UnexpectedToken { column: usize, token: String },
    #[error("unexpected end of expression")]
    UnexpectedEof,
    #[error("invalid number literal '{literal}'")]
    InvalidNumber { literal: String },
    #[error("unknown identifier '{name}'")]
    UnknownIdentifier { name: String },
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },
    #[error("function '{name}' expected {expected} arguments, got {got}")]
    BadArity {
        name: String,
        expected: usize,
        got: usize,
    },
}

/// Parses effect template text such as `A := A + [HL]` right-hand sides.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let tokens = Lexer::new(input).lex_all()?;
    Parser::new(tokens).parse()
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(u16, Width),
    Ident(String),
    Param(String),
    Plus,
    Minus,
    PlusDot,
    MinusDot,
    Amp,
    Pipe,
    Caret,
    EqEq,
    BangEq,
    Lt,
    GtEq,
    Shl,
    Shr,
    ShlDot,
    ShrDot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    End,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    start: usize,
}

#[derive(Debug)]
struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn lex_all(&mut self) -> Result<Vec<Token>, ParseError> {
        let mut out = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_end = matches!(token.kind, TokenKind::End);
            out.push(token);
            if is_end {
                break;
            }
        }
        Ok(out)
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_ws();
        let start = self.pos;
        let Some(ch) = self.peek_char(0) else {
            return Ok(Token {
                kind: TokenKind::End,
                start,
            });
        };

        macro_rules! punct {
            ($literal:literal, $kind:expr) => {
                if self.starts_with($literal) {
                    self.pos += $literal.len();
                    return Ok(Token { kind: $kind, start });
                }
            };
        }

        punct!("<<.", TokenKind::ShlDot);
        punct!(">>.", TokenKind::ShrDot);
        punct!("<<", TokenKind::Shl);
        punct!(">>", TokenKind::Shr);
        punct!("+.", TokenKind::PlusDot);
        punct!("-.", TokenKind::MinusDot);
        punct!("==", TokenKind::EqEq);
        punct!("!=", TokenKind::BangEq);
        punct!(">=", TokenKind::GtEq);
        if self.starts_with("0x") {
            let kind = self.lex_hex(start + 2)?;
            return Ok(Token { kind, start });
        }

        match ch {
            '+' => self.single(TokenKind::Plus),
            '-' => self.single(TokenKind::Minus),
            '&' => self.single(TokenKind::Amp),
            '|' => self.single(TokenKind::Pipe),
            '^' => self.single(TokenKind::Caret),
            '<' => self.single(TokenKind::Lt),
            ',' => self.single(TokenKind::Comma),
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            '$' => {
                let kind = self.lex_hex(start + 1)?;
                Ok(Token { kind, start })
            }
            '#' => {
                self.pos += 1;
                let name = self.lex_word();
                if name.is_empty() {
                    return Err(ParseError::UnexpectedToken {
                        column: start + 1,
                        token: "'#'".to_string(),
                    });
                }
                Ok(Token {
                    kind: TokenKind::Param(format!("#{name}")),
                    start,
                })
            }
            '0'..='9' => self.lex_decimal(),
            ch if ch.is_ascii_alphabetic() || ch == '_' => {
                let name = self.lex_word();
                Ok(Token {
                    kind: TokenKind::Ident(name.to_string()),
                    start,
                })
            }
            other => Err(ParseError::UnexpectedToken {
                column: start + 1,
                token: format!("'{}'", other.escape_default()),
            }),
        }
    }

    fn single(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        let start = self.pos;
        self.pos += 1;
        Ok(Token { kind, start })
    }

    /// Lexes hex digits starting at `digits`; more than two digits make a
    /// 16-bit constant.
    fn lex_hex(&mut self, digits: usize) -> Result<TokenKind, ParseError> {
        self.pos = digits;
        let literal = self.lex_word();
        let value = u16::from_str_radix(literal, 16).map_err(|_| ParseError::InvalidNumber {
            literal: literal.to_string(),
        })?;
        let width = if literal.len() > 2 {
            Width::W16
        } else {
            Width::W8
        };
        Ok(TokenKind::Number(value, width))
    }

    fn lex_decimal(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        let literal = self.lex_word();
        let value = literal
            .parse::<u16>()
            .map_err(|_| ParseError::InvalidNumber {
                literal: literal.to_string(),
            })?;
        let width = if value > 0xFF { Width::W16 } else { Width::W8 };
        Ok(Token {
            kind: TokenKind::Number(value, width),
            start,
        })
    }

    fn lex_word(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(self.peek_char(0), Some(ch) if ch.is_ascii_alphanumeric() || ch == '_') {
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek_char(0), Some(ch) if ch.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn starts_with(&self, value: &str) -> bool {
        self.input[self.pos..].starts_with(value)
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.bytes.get(self.pos + offset).map(|b| *b as char)
    }
}

#[derive(Debug)]
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_bit_or()?;
        if !matches!(self.current().kind, TokenKind::End) {
            return Err(self.unexpected_token());
        }
        Ok(expr)
    }

    fn parse_bit_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_bit_xor()?;
        while matches!(self.current().kind, TokenKind::Pipe) {
            self.bump();
            let rhs = self.parse_bit_xor()?;
            lhs = Expr::binary(BinOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_bit_xor(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_bit_and()?;
        while matches!(self.current().kind, TokenKind::Caret) {
            self.bump();
            let rhs = self.parse_bit_and()?;
            lhs = Expr::binary(BinOp::Xor, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_bit_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_equality()?;
        while matches!(self.current().kind, TokenKind::Amp) {
            self.bump();
            let rhs = self.parse_equality()?;
            lhs = Expr::binary(BinOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.current().kind {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::BangEq => BinOp::Ne,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_comparison()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_shift()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::GtEq => BinOp::Ge,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_shift()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_shift(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_add()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Shl => BinOp::Shl,
                TokenKind::Shr => BinOp::Shr,
                TokenKind::ShlDot => BinOp::Shl16,
                TokenKind::ShrDot => BinOp::Shr16,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_add()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_add(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                TokenKind::PlusDot => BinOp::Add16,
                TokenKind::MinusDot => BinOp::Sub16,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if matches!(&self.current().kind, TokenKind::Ident(name) if name == "not") {
            self.bump();
            let inner = self.parse_unary()?;
            return Ok(Expr::not(inner));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.current().kind.clone() {
            TokenKind::Number(value, width) => {
                self.bump();
                Ok(Expr::constant(value, width))
            }
            TokenKind::Param(name) => {
                self.bump();
                Ok(Expr::param(name))
            }
            TokenKind::Ident(name) => {
                self.bump();
                if matches!(self.current().kind, TokenKind::LParen) {
                    self.bump();
                    let args = self.parse_arguments()?;
                    return call_by_name(&name, args);
                }
                if PARAMS.contains(&name.as_str()) {
                    Ok(Expr::param(name))
                } else if REGISTERS.contains(&name.as_str()) {
                    Ok(Expr::reg(&name))
                } else {
                    Err(ParseError::UnknownIdentifier { name })
                }
            }
            TokenKind::LParen => {
                self.bump();
                let value = self.parse_bit_or()?;
                self.expect(TokenKind::RParen)?;
                Ok(value)
            }
            TokenKind::LBracket => {
                self.bump();
                let addr = self.parse_bit_or()?;
                self.expect(TokenKind::RBracket)?;
                Ok(Expr::mem(addr))
            }
            TokenKind::End => Err(ParseError::UnexpectedEof),
            _ => Err(self.unexpected_token()),
        }
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if matches!(self.current().kind, TokenKind::RParen) {
            self.bump();
            return Ok(args);
        }
        loop {
            args.push(self.parse_bit_or()?);
            match self.current().kind {
                TokenKind::Comma => self.bump(),
                TokenKind::RParen => {
                    self.bump();
                    return Ok(args);
                }
                TokenKind::End => return Err(ParseError::UnexpectedEof),
                _ => return Err(self.unexpected_token()),
            }
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ParseError> {
        if self.current().kind == kind {
            self.bump();
            return Ok(());
        }
        if matches!(self.current().kind, TokenKind::End) {
            return Err(ParseError::UnexpectedEof);
        }
        Err(self.unexpected_token())
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn unexpected_token(&self) -> ParseError {
        ParseError::UnexpectedToken {
            column: self.current().start + 1,
            token: token_kind_message(&self.current().kind),
        }
    }
}

fn call_by_name(name: &str, mut args: Vec<Expr>) -> Result<Expr, ParseError> {
    let bad_arity = |expected: usize, got: usize| ParseError::BadArity {
        name: name.to_string(),
        expected,
        got,
    };
    if name == "add16" {
        let got = args.len();
        return match (args.pop(), args.pop(), args.is_empty()) {
            (Some(rhs), Some(lhs), true) => Ok(Expr::binary(BinOp::Add16, lhs, rhs)),
            _ => Err(bad_arity(2, got)),
        };
    }
    let func = Func::from_name(name).ok_or_else(|| ParseError::UnknownFunction {
        name: name.to_string(),
    })?;
    if args.len() != func.arity() {
        return Err(bad_arity(func.arity(), args.len()));
    }
    Ok(Expr::call(func, args))
}

fn token_kind_message(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Number(value, _) => format!("number {value}"),
        TokenKind::Ident(name) => format!("identifier '{name}'"),
        TokenKind::Param(name) => format!("parameter '{name}'"),
        TokenKind::Plus => "'+'".to_string(),
        TokenKind::Minus => "'-'".to_string(),
        TokenKind::PlusDot => "'+.'".to_string(),
        TokenKind::MinusDot => "'-.'".to_string(),
        TokenKind::Amp => "'&'".to_string(),
        TokenKind::Pipe => "'|'".to_string(),
        TokenKind::Caret => "'^'".to_string(),
        TokenKind::EqEq => "'=='".to_string(),
        TokenKind::BangEq => "'!='".to_string(),
        TokenKind::Lt => "'<'".to_string(),
        TokenKind::GtEq => "'>='".to_string(),
        TokenKind::Shl => "'<<'".to_string(),
        TokenKind::Shr => "'>>'".to_string(),
        TokenKind::ShlDot => "'<<.'".to_string(),
        TokenKind::ShrDot => "'>>.'".to_string(),
        TokenKind::Comma => "','".to_string(),
        TokenKind::LParen => "'('".to_string(),
        TokenKind::RParen => "')'".to_string(),
        TokenKind::LBracket => "'['".to_string(),
        TokenKind::RBracket => "']'".to_string(),
        TokenKind::End => "end of input".to_string(),
    }
}
