use std::fmt::{Display, Formatter};
use std::rc::Rc;
use once_cell::unsync::OnceCell;

use super::{Context, ParseResult, Recognizer};
use crate::ast::AstNode;
use crate::lexer::Lexer;
use crate::token::Token;

/// Wraps `child`'s subtree in a single parent node tagged with the given
/// grammar-production name, always wrapping the inner recognizer's children
/// in one parent regardless of how many children it produced.
pub struct Name {
    pub label: &'static str,
    pub child: Rc<dyn Recognizer>,
}

impl Name {
    pub fn new(label: &'static str, child: Rc<dyn Recognizer>) -> Self {
        Self { label, child }
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "name({:?}, {})", self.label, self.child)
    }
}

impl Recognizer for Name {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        let start = lexer.checkpoint();
        let children = self.child.parse(lexer, ctx)?;
        let token = children
            .first()
            .map(|n| n.token.clone())
            .unwrap_or_else(|| synthetic_token(lexer, start));
        Ok(vec![AstNode::named(self.label, token, children)])
    }
}

fn synthetic_token(_lexer: &Lexer, _start: crate::lexer::Checkpoint) -> Token {
    Token::eof(0, 0, 0)
}

/// Succeeds iff `child` succeeds, but contributes no tree node to the parent.
pub struct Ignore(pub Rc<dyn Recognizer>);

impl Display for Ignore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ignore({})", self.0)
    }
}

impl Recognizer for Ignore {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        self.0.parse(lexer, ctx)?;
        Ok(Vec::new())
    }
}

/// Ties a recursive knot: an initially empty node is built, referenced from
/// its own definition, then bound once the full grammar is assembled.
/// Parsing before `set` is called is a programmer error.
pub struct Recursive {
    target: OnceCell<Rc<dyn Recognizer>>,
    label: &'static str,
}

impl Recursive {
    pub fn new(label: &'static str) -> Self {
        Self {
            target: OnceCell::new(),
            label,
        }
    }

    pub fn set(&self, target: Rc<dyn Recognizer>) {
        self.target
            .set(target)
            .unwrap_or_else(|_| panic!("recursive grammar rule {:?} already tied", self.label));
    }
}

impl Display for Recursive {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "self({})", self.label)
    }
}

impl Recognizer for Recursive {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        let target = self
            .target
            .get()
            .unwrap_or_else(|| panic!("recursive grammar rule {:?} never tied", self.label));
        target.parse(lexer, ctx)
    }
}
