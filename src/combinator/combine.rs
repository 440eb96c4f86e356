use std::fmt::{Display, Formatter};
use std::rc::Rc;

use super::{peek_significant, Context, ParseFailure, ParseResult, Recognizer};
use crate::ast::AstNode;
use crate::lexer::Lexer;

/// First matching alternative wins. A fatal
/// failure in any branch aborts immediately instead of trying the next one.
pub struct Or(pub Vec<Rc<dyn Recognizer>>);

impl Display for Or {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "or(")?;
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", c)?;
        }
        write!(f, ")")
    }
}

impl Recognizer for Or {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        let cp = lexer.checkpoint();
        let mut last_failure = None;
        for child in &self.0 {
            lexer.restore(cp);
            match child.parse(lexer, ctx) {
                Ok(nodes) => return Ok(nodes),
                Err(e) if e.fatal => return Err(e),
                Err(e) => last_failure = Some(e),
            }
        }
        lexer.restore(cp);
        Err(last_failure.unwrap_or_else(|| {
            ParseFailure::non_fatal(
                crate::token::Token::eof(0, 0, 0),
                "no alternative matched".to_string(),
            )
        }))
    }
}

/// All children must succeed in order. Once any
/// child has consumed input, a later failure is escalated to fatal: this
/// forbids silent rollback after partial consumption, giving useful error
/// locations.
pub struct Seq(pub Vec<Rc<dyn Recognizer>>);

impl Display for Seq {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "seq(")?;
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", c)?;
        }
        write!(f, ")")
    }
}

impl Recognizer for Seq {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        let start = lexer.checkpoint();
        let mut nodes = Vec::new();
        for (i, child) in self.0.iter().enumerate() {
            match child.parse(lexer, ctx) {
                Ok(mut child_nodes) => nodes.append(&mut child_nodes),
                Err(e) => {
                    let consumed = lexer.checkpoint() != start || i > 0;
                    return Err(if consumed { e.escalate() } else { e });
                }
            }
        }
        Ok(nodes)
    }
}

/// Matches `child` zero or more times; always succeeds.
pub struct ZeroOrMore(pub Rc<dyn Recognizer>);

impl Display for ZeroOrMore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "zmore({})", self.0)
    }
}

impl Recognizer for ZeroOrMore {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        let mut nodes = Vec::new();
        loop {
            let cp = lexer.checkpoint();
            match self.0.parse(lexer, ctx) {
                Ok(mut more) => {
                    if lexer.checkpoint() == cp && more.is_empty() {
                        // Non-consuming match: stop to avoid an infinite loop.
                        break;
                    }
                    nodes.append(&mut more);
                }
                Err(e) if e.fatal => return Err(e),
                Err(_) => {
                    lexer.restore(cp);
                    break;
                }
            }
        }
        Ok(nodes)
    }
}

/// Matches `child` one or more times.
pub struct OneOrMore(pub Rc<dyn Recognizer>);

impl Display for OneOrMore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "omore({})", self.0)
    }
}

impl Recognizer for OneOrMore {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        let inner = ZeroOrMore(self.0.clone());
        let cp = lexer.checkpoint();
        let nodes = inner.parse(lexer, ctx)?;
        if nodes.is_empty() && lexer.checkpoint() == cp {
            return Err(ParseFailure::non_fatal(
                peek_significant(lexer, ctx)?,
                "expected at least one match".to_string(),
            ));
        }
        Ok(nodes)
    }
}

/// Always succeeds; contributes `child`'s subtree if it matched, else
/// nothing. A fatal failure inside `child` still
/// propagates — only a clean, non-consuming non-fatal failure is swallowed.
pub struct Optional(pub Rc<dyn Recognizer>);

impl Display for Optional {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "optional({})", self.0)
    }
}

impl Recognizer for Optional {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        let cp = lexer.checkpoint();
        match self.0.parse(lexer, ctx) {
            Ok(nodes) => Ok(nodes),
            Err(e) if e.fatal => Err(e),
            Err(e) => {
                if lexer.checkpoint() != cp {
                    return Err(e.escalate());
                }
                lexer.restore(cp);
                Ok(Vec::new())
            }
        }
    }
}

/// Negative lookahead: succeeds when `child` fails, consuming exactly one
/// token.
pub struct Not(pub Rc<dyn Recognizer>);

impl Display for Not {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "not({})", self.0)
    }
}

impl Recognizer for Not {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        let cp = lexer.checkpoint();
        let outcome = self.0.parse(lexer, ctx);
        lexer.restore(cp);
        match outcome {
            Ok(_) => Err(ParseFailure::non_fatal(
                peek_significant(lexer, ctx)?,
                "negative lookahead matched".to_string(),
            )),
            Err(e) if e.fatal => Err(e),
            Err(_) => {
                let tok = peek_significant(lexer, ctx)?;
                super::skip_insignificant_newlines(lexer, ctx)?;
                let tok = lexer
                    .next()
                    .map_err(|e| ParseFailure::fatal(tok.clone(), e.message))?;
                Ok(vec![AstNode::leaf(tok)])
            }
        }
    }
}
