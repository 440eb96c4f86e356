//! A small combinator tree that parses a [`Lexer`](crate::lexer::Lexer)'s
//! token stream into an [`AstNode`], with backtracking and named capture.
//! Nodes are `Rc<dyn Recognizer>` so that a recursive grammar rule can tie a
//! knot onto itself (see [`wrappers::Recursive`]).

mod combine;
mod terminals;
mod wrappers;

use std::fmt::Display;
use std::rc::Rc;

use crate::ast::AstNode;
use crate::lexer::Lexer;
use crate::token::Token;

pub use combine::{Not, OneOrMore, Optional, Or, Seq, ZeroOrMore};
pub use terminals::{Eof, Kind, Literal, Next, Tag};
pub use wrappers::{Ignore, Name, Recursive};

/// Whitespace policy threaded down the combinator tree: whether intervening
/// newline tokens are skipped as insignificant. The root grammar sets this
/// to `false` so that a bare newline
/// still separates statements; productions for parenthesized/bracketed
/// sub-expressions flip it to `true` for their children.
#[derive(Debug, Clone, Copy)]
pub struct Context {
    pub skip_newlines: bool,
}

impl Context {
    pub fn root() -> Self {
        Self {
            skip_newlines: false,
        }
    }

    pub fn skipping_newlines(self) -> Self {
        Self {
            skip_newlines: true,
            ..self
        }
    }
}

/// A parse failure, carrying the offending token and whether the failure is
/// recoverable by backtracking.
#[derive(Debug, Clone)]
pub struct ParseFailure {
    pub fatal: bool,
    pub token: Token,
    pub message: String,
}

impl ParseFailure {
    pub fn non_fatal(token: Token, message: impl Into<String>) -> Self {
        Self {
            fatal: false,
            token,
            message: message.into(),
        }
    }

    pub fn fatal(token: Token, message: impl Into<String>) -> Self {
        Self {
            fatal: true,
            token,
            message: message.into(),
        }
    }

    pub fn escalate(mut self) -> Self {
        self.fatal = true;
        self
    }
}

/// The AST nodes contributed by a successful match. Most recognizers
/// contribute zero (ignored), one (a leaf or named subtree), or several
/// (a `seq`'s flattened children) nodes to their parent.
pub type Matched = Vec<AstNode>;

pub type ParseResult = Result<Matched, ParseFailure>;

/// A node in the combinator tree.
pub trait Recognizer: Display {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult;
}

/// Permanently drop insignificant newline tokens per `ctx.skip_newlines`,
/// leaving the cursor positioned right before the next non-newline token.
pub(crate) fn skip_insignificant_newlines(lexer: &mut Lexer, ctx: Context) -> Result<(), ParseFailure> {
    if !ctx.skip_newlines {
        return Ok(());
    }
    loop {
        let cp = lexer.checkpoint();
        let tok = lexer
            .next()
            .map_err(|e| ParseFailure::fatal(Token::eof(0, 0, 0), e.message))?;
        if tok.kind != crate::token::TokenKind::Newline {
            lexer.restore(cp);
            return Ok(());
        }
    }
}

/// Peek the next significant token per `ctx`, without net consumption.
pub(crate) fn peek_significant(lexer: &mut Lexer, ctx: Context) -> Result<Token, ParseFailure> {
    skip_insignificant_newlines(lexer, ctx)?;
    lexer
        .peek()
        .map_err(|e| ParseFailure::fatal(Token::eof(0, 0, 0), e.message))
}

pub fn rc<R: Recognizer + 'static>(r: R) -> Rc<dyn Recognizer> {
    Rc::new(r)
}
