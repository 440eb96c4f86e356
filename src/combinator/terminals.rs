use std::fmt::{Display, Formatter};

use super::{peek_significant, Context, Matched, ParseFailure, ParseResult, Recognizer};
use crate::ast::AstNode;
use crate::lexer::Lexer;
use crate::token::{TokenKind, TokenTag};

fn reject_if_unlexable(token: &crate::token::Token) -> Result<(), ParseFailure> {
    if token.kind == TokenKind::None {
        return Err(ParseFailure::fatal(
            token.clone(),
            format!("unrecognized character {:?}", token.text),
        ));
    }
    Ok(())
}

/// Matches when the next token's literal text equals `s`.
pub struct Literal(pub &'static str);

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "literal({:?})", self.0)
    }
}

impl Recognizer for Literal {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        let tok = peek_significant(lexer, ctx)?;
        reject_if_unlexable(&tok)?;
        if tok.text == self.0 {
            skip_and_consume(lexer, ctx)?;
            Ok(vec![AstNode::leaf(tok)])
        } else {
            Err(ParseFailure::non_fatal(
                tok.clone(),
                format!("expected literal {:?}, found {:?}", self.0, tok.text),
            ))
        }
    }
}

/// Matches when the next token's kind equals `k`.
pub struct Kind(pub TokenKind);

impl Display for Kind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "kind({:?})", self.0)
    }
}

impl Recognizer for Kind {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        let tok = peek_significant(lexer, ctx)?;
        reject_if_unlexable(&tok)?;
        if tok.kind == self.0 {
            skip_and_consume(lexer, ctx)?;
            Ok(vec![AstNode::leaf(tok)])
        } else {
            Err(ParseFailure::non_fatal(
                tok.clone(),
                format!("expected token kind {:?}, found {:?}", self.0, tok.kind),
            ))
        }
    }
}

/// Matches when the next token's grammatical tag equals `t`.
pub struct Tag(pub TokenTag);

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "tag({:?})", self.0)
    }
}

impl Recognizer for Tag {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        let tok = peek_significant(lexer, ctx)?;
        reject_if_unlexable(&tok)?;
        if tok.tag == self.0 {
            skip_and_consume(lexer, ctx)?;
            Ok(vec![AstNode::leaf(tok)])
        } else {
            Err(ParseFailure::non_fatal(
                tok.clone(),
                format!("expected token tag {:?}, found {:?}", self.0, tok.tag),
            ))
        }
    }
}

/// Matches any single token.
pub struct Next;

impl Display for Next {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "next()")
    }
}

impl Recognizer for Next {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        skip_insignificant_newlines_only(lexer, ctx)?;
        let tok = lexer
            .next()
            .map_err(|e| ParseFailure::fatal(crate::token::Token::eof(0, 0, 0), e.message))?;
        Ok(vec![AstNode::leaf(tok)])
    }
}

/// Succeeds when `child` succeeds and the stream is then at end of input.
pub struct Eof<C>(pub C);

impl<C: Recognizer> Display for Eof<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "eof({})", self.0)
    }
}

impl<C: Recognizer> Recognizer for Eof<C> {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        let nodes = self.0.parse(lexer, ctx)?;
        let tok = peek_significant(lexer, ctx)?;
        if tok.kind == TokenKind::Eof {
            Ok(nodes)
        } else {
            Err(ParseFailure::fatal(
                tok,
                "expected end of input".to_string(),
            ))
        }
    }
}

fn skip_insignificant_newlines_only(lexer: &mut Lexer, ctx: Context) -> Result<(), ParseFailure> {
    super::skip_insignificant_newlines(lexer, ctx)
}

fn skip_and_consume(lexer: &mut Lexer, ctx: Context) -> Result<(), ParseFailure> {
    skip_insignificant_newlines_only(lexer, ctx)?;
    lexer
        .next()
        .map_err(|e| ParseFailure::fatal(crate::token::Token::eof(0, 0, 0), e.message))?;
    Ok(())
}

#[allow(dead_code)]
pub(crate) fn empty() -> Matched {
    Vec::new()
}
