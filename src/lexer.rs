use once_cell::sync::Lazy;
use regex::bytes::Regex;
use std::fmt::{Display, Formatter};

use crate::token::{Token, TokenKind, KEYWORDS};
use crate::util::{Code, Log, Position};

static FLOAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?").unwrap());
static INT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+").unwrap());
static SYMBOL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_@][A-Za-z0-9_]*").unwrap());

/// A checkpoint into the lexer's materialized token buffer, used by the
/// combinator runtime to backtrack without re-lexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Checkpoint(pub usize);

#[derive(Debug, Clone)]
pub struct LexError {
    pub position: Position,
    pub message: String,
}

impl Display for LexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.position, self.message)
    }
}

/// Produces a forward-only, randomly re-seekable token stream from a source
/// string. Tokens are generated on demand and appended to an
/// internal buffer; the cursor may only move forward through `next`, but
/// `checkpoint`/`restore` let the combinator runtime rewind within what has
/// already been materialized.
pub struct Lexer<'c> {
    code: Code<'c>,
    offset: usize,
    line: usize,
    column: usize,
    buffer: Vec<Token>,
    cursor: usize,
    trace: Log<&'static str>,
}

impl<'c> Lexer<'c> {
    pub fn new(source: &'c str) -> Self {
        Self {
            code: Code::from(source),
            offset: 0,
            line: 1,
            column: 1,
            buffer: Vec::new(),
            cursor: 0,
            trace: Log::None,
        }
    }

    pub fn with_trace(mut self, trace: Log<&'static str>) -> Self {
        self.trace = trace;
        self
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.cursor)
    }

    pub fn restore(&mut self, checkpoint: Checkpoint) {
        debug_assert!(checkpoint.0 <= self.buffer.len());
        self.cursor = checkpoint.0;
    }

    /// Advance one token, materializing it if the cursor has reached the end
    /// of the buffer, and move the cursor past it.
    pub fn next(&mut self) -> Result<Token, LexError> {
        if self.cursor == self.buffer.len() {
            let token = self.scan_one()?;
            self.buffer.push(token);
        }
        let token = self.buffer[self.cursor].clone();
        self.cursor += 1;
        Ok(token)
    }

    /// Peek without consuming: same token `next()` would return.
    pub fn peek(&mut self) -> Result<Token, LexError> {
        let cp = self.checkpoint();
        let token = self.next()?;
        self.restore(cp);
        Ok(token)
    }

    fn bytes(&self) -> &[u8] {
        self.code.value
    }

    fn advance_bytes(&mut self, n: usize) {
        for &b in &self.bytes()[self.offset..self.offset + n] {
            if b == b'\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.offset += n;
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            let bytes = self.bytes();
            if self.offset >= bytes.len() {
                return;
            }
            let b = bytes[self.offset];
            if b == b' ' || b == b'\t' || b == b'\r' {
                self.advance_bytes(1);
                continue;
            }
            if b == b'#' {
                while self.offset < bytes.len() && self.bytes()[self.offset] != b'\n' {
                    self.advance_bytes(1);
                }
                continue;
            }
            return;
        }
    }

    fn scan_one(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace_and_comments();
        let start_offset = self.offset;
        let start_line = self.line;
        let start_column = self.column;
        let bytes = self.bytes();

        if self.offset >= bytes.len() {
            let tok = Token::eof(start_offset, start_line, start_column);
            self.trace.trace_success("LexemeSuccess", &tok, self.position());
            return Ok(tok);
        }

        let remaining = &bytes[self.offset..];
        let c = remaining[0];

        let token = match c {
            b'\n' => {
                self.advance_bytes(1);
                Token::new(TokenKind::Newline, "\n", start_offset, start_line, start_column)
            }
            b'(' | b'[' | b'{' => {
                self.advance_bytes(1);
                Token::new(TokenKind::LeftGroup, (c as char).to_string(), start_offset, start_line, start_column)
            }
            b')' | b']' | b'}' => {
                self.advance_bytes(1);
                Token::new(TokenKind::RightGroup, (c as char).to_string(), start_offset, start_line, start_column)
            }
            b':' => {
                self.advance_bytes(1);
                Token::new(TokenKind::Colon, ":", start_offset, start_line, start_column)
            }
            b',' => {
                self.advance_bytes(1);
                Token::new(TokenKind::Comma, ",", start_offset, start_line, start_column)
            }
            b'"' => self.scan_string(start_offset, start_line, start_column)?,
            b'0'..=b'9' => self.scan_number(start_offset, start_line, start_column),
            b'A'..=b'Z' | b'a'..=b'z' | b'_' | b'@' => {
                self.scan_symbol(start_offset, start_line, start_column)
            }
            b'=' => self.scan_one_or_two(b'=', TokenKind::Assign, TokenKind::Compare, start_offset, start_line, start_column),
            b'<' => self.scan_lt(start_offset, start_line, start_column),
            b'>' => self.scan_gt(start_offset, start_line, start_column),
            b'!' => self.scan_one_or_two(b'=', TokenKind::None, TokenKind::Compare, start_offset, start_line, start_column),
            b'.' => self.scan_one_or_two(b'.', TokenKind::Dot, TokenKind::Range, start_offset, start_line, start_column),
            b'*' | b'/' | b'%' => {
                self.advance_bytes(1);
                Token::new(TokenKind::MulDiv, (c as char).to_string(), start_offset, start_line, start_column)
            }
            b'+' | b'-' => {
                self.advance_bytes(1);
                Token::new(TokenKind::AddSub, (c as char).to_string(), start_offset, start_line, start_column)
            }
            b'&' => {
                self.advance_bytes(1);
                Token::new(TokenKind::BitAnd, "&", start_offset, start_line, start_column)
            }
            b'|' => {
                self.advance_bytes(1);
                Token::new(TokenKind::BitOr, "|", start_offset, start_line, start_column)
            }
            b'^' => {
                self.advance_bytes(1);
                Token::new(TokenKind::BitXor, "^", start_offset, start_line, start_column)
            }
            _ => {
                self.advance_bytes(1);
                Token::new(TokenKind::None, (c as char).to_string(), start_offset, start_line, start_column)
            }
        };

        if token.kind == TokenKind::None {
            self.trace.trace_failure("Lexeme", self.position());
        } else {
            self.trace.trace_success("LexemeSuccess", &token, self.position());
        }
        Ok(token)
    }

    fn scan_one_or_two(
        &mut self,
        second: u8,
        single_kind: TokenKind,
        double_kind: TokenKind,
        offset: usize,
        line: usize,
        column: usize,
    ) -> Token {
        let first = self.bytes()[self.offset];
        self.advance_bytes(1);
        if self.offset < self.bytes().len() && self.bytes()[self.offset] == second {
            self.advance_bytes(1);
            let text = format!("{}{}", first as char, second as char);
            Token::new(double_kind, text, offset, line, column)
        } else {
            Token::new(single_kind, (first as char).to_string(), offset, line, column)
        }
    }

    fn scan_lt(&mut self, offset: usize, line: usize, column: usize) -> Token {
        self.advance_bytes(1);
        let bytes = self.bytes();
        if self.offset < bytes.len() {
            match bytes[self.offset] {
                b'=' => {
                    self.advance_bytes(1);
                    return Token::new(TokenKind::Compare, "<=", offset, line, column);
                }
                b'<' => {
                    self.advance_bytes(1);
                    return Token::new(TokenKind::Bitshift, "<<", offset, line, column);
                }
                _ => {}
            }
        }
        Token::new(TokenKind::Compare, "<", offset, line, column)
    }

    fn scan_gt(&mut self, offset: usize, line: usize, column: usize) -> Token {
        self.advance_bytes(1);
        let bytes = self.bytes();
        if self.offset < bytes.len() {
            match bytes[self.offset] {
                b'=' => {
                    self.advance_bytes(1);
                    return Token::new(TokenKind::Compare, ">=", offset, line, column);
                }
                b'>' => {
                    self.advance_bytes(1);
                    return Token::new(TokenKind::Bitshift, ">>", offset, line, column);
                }
                _ => {}
            }
        }
        Token::new(TokenKind::Compare, ">", offset, line, column)
    }

    fn scan_number(&mut self, offset: usize, line: usize, column: usize) -> Token {
        let remaining = &self.bytes()[self.offset..];
        if let Some(m) = FLOAT_RE.find(remaining) {
            debug_assert_eq!(m.start(), 0);
            let len = m.end();
            let text = String::from_utf8_lossy(&remaining[..len]).into_owned();
            self.advance_bytes(len);
            return Token::new(TokenKind::Float, text, offset, line, column);
        }
        let m = INT_RE.find(remaining).expect("digit already observed");
        debug_assert_eq!(m.start(), 0);
        let len = m.end();
        let text = String::from_utf8_lossy(&remaining[..len]).into_owned();
        self.advance_bytes(len);
        Token::new(TokenKind::Integer, text, offset, line, column)
    }

    fn scan_symbol(&mut self, offset: usize, line: usize, column: usize) -> Token {
        let remaining = &self.bytes()[self.offset..];
        let m = SYMBOL_RE
            .find(remaining)
            .expect("identifier start already observed");
        debug_assert_eq!(m.start(), 0);
        let len = m.end();
        let text = String::from_utf8_lossy(&remaining[..len]).into_owned();
        self.advance_bytes(len);
        match text.as_str() {
            "true" | "false" => Token::new(TokenKind::Boolean, text, offset, line, column),
            "nil" => Token::new(TokenKind::Nil, text, offset, line, column),
            "and" | "or" | "xor" => Token::new(TokenKind::BoolOp, text, offset, line, column),
            _ if KEYWORDS.contains(&text.as_str()) => {
                Token::new(TokenKind::Keyword, text, offset, line, column)
            }
            _ => Token::new(TokenKind::Symbol, text, offset, line, column),
        }
    }

    fn scan_string(&mut self, offset: usize, line: usize, column: usize) -> Result<Token, LexError> {
        self.advance_bytes(1); // opening quote
        let mut value = String::new();
        loop {
            let bytes = self.bytes();
            if self.offset >= bytes.len() {
                return Err(LexError {
                    position: self.position(),
                    message: "unterminated string literal".to_string(),
                });
            }
            let b = bytes[self.offset];
            if b == b'"' {
                self.advance_bytes(1);
                break;
            }
            if b == b'\\' && self.offset + 1 < bytes.len() {
                let escaped = bytes[self.offset + 1];
                let replacement = match escaped {
                    b'n' => Some('\n'),
                    b't' => Some('\t'),
                    b'"' => Some('"'),
                    b'\'' => Some('\''),
                    b'\\' => Some('\\'),
                    _ => None,
                };
                match replacement {
                    Some(c) => {
                        value.push(c);
                        self.advance_bytes(2);
                    }
                    None => {
                        // Unknown escape: preserve the backslash and the following char.
                        value.push('\\');
                        value.push(escaped as char);
                        self.advance_bytes(2);
                    }
                }
                continue;
            }
            value.push(b as char);
            self.advance_bytes(1);
        }
        Ok(Token::new(TokenKind::String, value, offset, line, column))
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next().unwrap();
            let done = tok.kind == TokenKind::Eof;
            out.push(tok.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn lexes_arithmetic_expression() {
        assert_eq!(
            kinds("1 + 2 * 3\n"),
            vec![
                TokenKind::Integer,
                TokenKind::AddSub,
                TokenKind::Integer,
                TokenKind::MulDiv,
                TokenKind::Integer,
                TokenKind::Newline,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn float_widens_on_trailing_dot_digit() {
        let mut lexer = Lexer::new("1.0");
        let token = lexer.next().unwrap();
        assert_eq!(token.kind, TokenKind::Float);
        assert_eq!(token.text, "1.0");
    }

    #[test]
    fn lexing_is_idempotent() {
        let src = "x = 40\ny = 2\nx + y\n";
        assert_eq!(kinds(src), kinds(src));
    }

    #[test]
    fn keywords_retagged() {
        let mut lexer = Lexer::new("with a = 1, b = 2, a + b\n");
        let first = lexer.next().unwrap();
        assert_eq!(first.kind, TokenKind::Keyword);
        assert_eq!(first.text, "with");
    }

    #[test]
    fn string_escapes() {
        let mut lexer = Lexer::new(r#""a\nb\q""#);
        let token = lexer.next().unwrap();
        assert_eq!(token.kind, TokenKind::String);
        assert_eq!(token.text, "a\nb\\q");
    }

    #[test]
    fn checkpoint_restore_does_not_relex() {
        let mut lexer = Lexer::new("1 + 2\n");
        let cp = lexer.checkpoint();
        let first = lexer.next().unwrap();
        lexer.restore(cp);
        let again = lexer.next().unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn unknown_character_is_none_kind() {
        let mut lexer = Lexer::new("~\n");
        let token = lexer.next().unwrap();
        assert_eq!(token.kind, TokenKind::None);
    }
}
