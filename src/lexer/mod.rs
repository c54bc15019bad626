//! Formula-body tokenizer.
//!
//! Works on raw bytes with an explicit cursor so the prescanner can peek a
//! token and seek back. Whitespace and `\r` are skipped, `;` starts a comment
//! that runs to end of line, and a `\` joins the next line onto the current
//! one. Everything is lowercased on the way in.

pub mod tables;

use crate::backend::Complex;
use crate::source::Span;
pub use tables::{Func, Jump, Op, Var};

/// Longest name or constant the tokenizer accepts.
pub const MAX_TOKEN_LEN: usize = 32;

/// Why a token could not be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("unexpected end of file")]
    EndOfFile,
    #[error("illegal character")]
    IllegalCharacter,
    #[error("illegal variable name")]
    IllegalVariableName,
    #[error("token too long")]
    TokenTooLong,
    #[error("function used as a variable")]
    FuncUsedAsVar,
    #[error("jump is missing its condition")]
    JumpMissingBoolean,
    #[error("illegal character after jump")]
    JumpWithIllegalChar,
    #[error("undefined function")]
    UndefinedFunction,
    #[error("illegal operator")]
    IllegalOperator,
    #[error("ill-formed constant")]
    IllFormedConstant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paren {
    Open,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    NotAToken(TokenError),
    Parens(Paren),
    /// `p1..p5` and `ismand`.
    ParamVariable(Var),
    UserNamedVariable,
    PredefinedVariable(Var),
    RealConstant,
    ComplexConstant,
    Function(Func),
    /// `fn1..fn4`, bound at load time.
    ParamFunction(Func),
    FlowControl(Jump),
    Operator(Op),
    EndOfFormula,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    pub kind: TokenKind,
    /// Value of a real or complex constant, zero otherwise.
    pub value: Complex<f64>,
    pub span: Span,
}

impl Token {
    pub fn is_constant(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::RealConstant | TokenKind::ComplexConstant
        )
    }

    pub fn is_statement_end(&self) -> bool {
        matches!(self.kind, TokenKind::Operator(op) if op.ends_statement())
    }

    pub fn error(&self) -> Option<TokenError> {
        match self.kind {
            TokenKind::NotAToken(e) => Some(e),
            _ => None,
        }
    }
}

// ── Scanner ────────────────────────────────────────────────────────────────

/// Byte cursor over formula library text.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Scanner::at(src, 0)
    }

    pub fn at(src: &'a str, pos: usize) -> Self {
        Scanner {
            src: src.as_bytes(),
            pos: pos.min(src.len()),
        }
    }

    pub fn tell(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.src.len());
    }

    /// Raw next byte, no filtering.
    pub fn raw(&mut self) -> Option<u8> {
        let c = self.src.get(self.pos).copied()?;
        self.pos += 1;
        Some(c)
    }

    /// Next significant character, lowercased. `None` at end of text.
    /// A comment reads as the newline that ends it.
    pub fn get_char(&mut self) -> Option<u8> {
        let mut line_wrap = false;
        loop {
            let c = self.raw()?;
            match c {
                b'\r' | b' ' | b'\t' => {}
                b'\\' => line_wrap = true,
                b';' | b'\n' => {
                    if c == b';' {
                        while self.raw()? != b'\n' {}
                    }
                    if !line_wrap {
                        return Some(b'\n');
                    }
                    line_wrap = false;
                }
                _ => return Some(c.to_ascii_lowercase()),
            }
        }
    }

    /// Produce the next token. Never panics; failures come back as
    /// `TokenKind::NotAToken`.
    pub fn next_token(&mut self) -> Token {
        let Some(c) = self.get_char() else {
            let at = self.pos;
            return self.finish(String::new(), TokenKind::NotAToken(TokenError::EndOfFile), at);
        };
        let start = self.pos - 1;
        match c {
            b'0'..=b'9' | b'.' => self.constant(c, start),
            b'a'..=b'z' | b'_' => self.alpha(c, start),
            _ => self.punct(c, start),
        }
    }

    fn finish(&self, text: String, kind: TokenKind, start: usize) -> Token {
        Token {
            text,
            kind,
            value: Complex::default(),
            span: Span::new(start, self.pos.max(start)),
        }
    }

    fn constant(&mut self, first: u8, start: usize) -> Token {
        let (text, result) = self.read_number(first);
        match result {
            Ok(v) => Token {
                value: Complex::new(v, 0.0),
                ..self.finish(text, TokenKind::RealConstant, start)
            },
            Err(e) => self.finish(text, TokenKind::NotAToken(e), start),
        }
    }

    /// Digits, one optional `.`, an optional exponent with sign.
    fn read_number(&mut self, first: u8) -> (String, Result<f64, TokenError>) {
        let mut text = String::from(first as char);
        let mut got_decimal = first == b'.';
        let mut getting_base = true;
        let mut file_pos = self.pos;
        loop {
            let Some(c) = self.get_char() else {
                return (text, Err(TokenError::EndOfFile));
            };
            if c.is_ascii_digit() {
                text.push(c as char);
                file_pos = self.pos;
            } else if c == b'.' {
                text.push('.');
                if got_decimal || !getting_base {
                    return (text, Err(TokenError::IllFormedConstant));
                }
                got_decimal = true;
                file_pos = self.pos;
            } else {
                let last = text.as_bytes()[text.len() - 1];
                if c == b'e' && getting_base && (last.is_ascii_digit() || (last == b'.' && text.len() > 1)) {
                    text.push('e');
                    getting_base = false;
                    got_decimal = false;
                    file_pos = self.pos;
                    match self.get_char() {
                        Some(s @ (b'-' | b'+')) => {
                            text.push(s as char);
                            file_pos = self.pos;
                        }
                        _ => self.seek(file_pos),
                    }
                } else if c.is_ascii_alphabetic() || c == b'_' {
                    text.push(c as char);
                    return (text, Err(TokenError::IllFormedConstant));
                } else if last == b'e' || (last == b'.' && text.len() == 1) {
                    text.push(c as char);
                    return (text, Err(TokenError::IllFormedConstant));
                } else {
                    self.seek(file_pos);
                    let value = atof(&text);
                    return (text, Ok(value));
                }
            }
            if text.len() > MAX_TOKEN_LEN {
                return (text, Err(TokenError::TokenTooLong));
            }
        }
    }

    fn alpha(&mut self, first: u8, start: usize) -> Token {
        let mut text = String::from(first as char);
        let mut too_long = false;
        let mut last_pos = self.pos;
        let next = loop {
            let Some(c) = self.get_char() else {
                return self.finish(String::new(), TokenKind::NotAToken(TokenError::EndOfFile), start);
            };
            if c.is_ascii_alphanumeric() || c == b'_' {
                if text.len() < 79 {
                    text.push(c as char);
                }
                if text.len() > MAX_TOKEN_LEN {
                    too_long = true;
                }
                last_pos = self.pos;
            } else {
                break c;
            }
        };
        if next == b'.' {
            text.push('.');
            return self.finish(text, TokenKind::NotAToken(TokenError::IllegalVariableName), start);
        }
        self.seek(last_pos);
        if too_long {
            return self.finish(text, TokenKind::NotAToken(TokenError::TokenTooLong), start);
        }
        let kind = classify_name(&text, next);
        self.finish(text, kind, start)
    }

    fn punct(&mut self, c: u8, start: usize) -> Token {
        let mut text = String::from(c as char);
        match c {
            b'<' | b'>' | b'=' => {
                self.optional(b'=', &mut text);
            }
            b'!' => {
                if !self.optional(b'=', &mut text) {
                    return self.finish(text, TokenKind::NotAToken(TokenError::IllegalOperator), start);
                }
            }
            b'|' => {
                self.optional(b'|', &mut text);
            }
            b'&' => {
                if !self.optional(b'&', &mut text) {
                    return self.finish(text, TokenKind::NotAToken(TokenError::IllegalOperator), start);
                }
            }
            b'}' => return self.finish(text, TokenKind::EndOfFormula, start),
            b')' => return self.finish(text, TokenKind::Parens(Paren::Close), start),
            b'(' => return self.open_paren(start),
            b'\n' | b',' | b':' => return self.end_of_statement(c, start),
            b'+' | b'-' | b'*' | b'/' | b'^' => {}
            _ => {
                return self.finish(text, TokenKind::NotAToken(TokenError::IllegalCharacter), start);
            }
        };
        match Op::lookup(&text) {
            Some(op) => self.finish(text, TokenKind::Operator(op), start),
            None => self.finish(text, TokenKind::NotAToken(TokenError::IllegalOperator), start),
        }
    }

    /// Consume `want` if it is the next significant character.
    fn optional(&mut self, want: u8, text: &mut String) -> bool {
        let back = self.pos;
        if self.get_char() == Some(want) {
            text.push(want as char);
            true
        } else {
            self.seek(back);
            false
        }
    }

    /// A run of `,`, `:` and newlines collapses to one separator. The run
    /// is a `:` if it contains one. A run that reaches `}` ends the formula.
    fn end_of_statement(&mut self, first: u8, start: usize) -> Token {
        let mut colon = first == b':';
        let mut last_pos = self.pos;
        loop {
            match self.get_char() {
                Some(b'\n' | b',') => last_pos = self.pos,
                Some(b':') => {
                    colon = true;
                    last_pos = self.pos;
                }
                Some(b'}') => return self.finish("}".into(), TokenKind::EndOfFormula, start),
                _ => {
                    self.seek(last_pos);
                    break;
                }
            }
        }
        let op = if colon { Op::Colon } else { Op::Comma };
        self.finish(op.symbol().into(), TokenKind::Operator(op), start)
    }

    /// `(` either opens a group or starts a literal `(re,im)` pair.
    fn open_paren(&mut self, start: usize) -> Token {
        let after = self.pos;
        match self.complex_literal() {
            Some((text, v)) => {
                let kind = if v.y != 0.0 {
                    TokenKind::ComplexConstant
                } else {
                    TokenKind::RealConstant
                };
                Token {
                    value: v,
                    ..self.finish(text, kind, start)
                }
            }
            None => {
                self.seek(after);
                self.finish("(".into(), TokenKind::Parens(Paren::Open), start)
            }
        }
    }

    fn complex_literal(&mut self) -> Option<(String, Complex<f64>)> {
        let mut text = String::from("(");
        let x = self.signed_part(&mut text)?;
        if self.get_char()? != b',' {
            return None;
        }
        text.push(',');
        let y = self.signed_part(&mut text)?;
        if self.get_char()? != b')' {
            return None;
        }
        text.push(')');
        Some((text, Complex::new(x, y)))
    }

    fn signed_part(&mut self, text: &mut String) -> Option<f64> {
        let mut c = self.get_char()?;
        let negative = c == b'-';
        if negative {
            c = self.get_char()?;
        }
        if !(c.is_ascii_digit() || c == b'.') {
            return None;
        }
        let (digits, value) = self.read_number(c);
        let value = value.ok()?;
        if negative {
            text.push('-');
        }
        text.push_str(&digits);
        Some(if negative { -value } else { value })
    }
}

/// Lenient decimal parse: the longest numeric prefix, or zero.
pub fn atof(text: &str) -> f64 {
    let mut s = text.to_string();
    if s.starts_with('.') {
        s.insert(0, '0');
    }
    while !s.is_empty() {
        let candidate = if s.ends_with('.') { format!("{s}0") } else { s.clone() };
        if let Ok(v) = candidate.parse::<f64>() {
            return v;
        }
        s.pop();
    }
    0.0
}

fn classify_name(text: &str, next: u8) -> TokenKind {
    let func = Func::lookup(text);
    let jump = Jump::lookup(text);
    if next == b'(' {
        return match (func, jump) {
            (Some(f), _) if f.param_slot().is_some() => TokenKind::ParamFunction(f),
            (Some(f), _) => TokenKind::Function(f),
            (None, Some(j)) if j.takes_condition() => TokenKind::FlowControl(j),
            (None, Some(_)) => TokenKind::NotAToken(TokenError::JumpWithIllegalChar),
            (None, None) => TokenKind::NotAToken(TokenError::UndefinedFunction),
        };
    }
    if func.is_some() {
        return TokenKind::NotAToken(TokenError::FuncUsedAsVar);
    }
    if let Some(j) = jump {
        if j.takes_condition() {
            return TokenKind::NotAToken(TokenError::JumpMissingBoolean);
        }
        return if matches!(next, b',' | b'\n' | b':') {
            TokenKind::FlowControl(j)
        } else {
            TokenKind::NotAToken(TokenError::JumpWithIllegalChar)
        };
    }
    match Var::lookup(text) {
        Some(v) if v.is_param() => TokenKind::ParamVariable(v),
        Some(v) => TokenKind::PredefinedVariable(v),
        None => TokenKind::UserNamedVariable,
    }
}

/// Tokenize a formula body up to and including its closing `}`, or up to
/// the first token that fails.
pub fn lex_body(src: &str, body_start: usize) -> Vec<Token> {
    let mut scanner = Scanner::at(src, body_start);
    let mut tokens = Vec::new();
    loop {
        let tok = scanner.next_token();
        let stop = matches!(tok.kind, TokenKind::EndOfFormula | TokenKind::NotAToken(_));
        tokens.push(tok);
        if stop {
            return tokens;
        }
    }
}
