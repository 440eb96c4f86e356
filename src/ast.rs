use std::borrow::Cow;

use ptree::{Style, TreeItem};

use crate::token::Token;
use crate::types::TypeId;

/// A node of the abstract syntax tree.
///
/// The originating token carries kind, literal text and position. `name` is
/// the grammar's symbolic production name (`"infix"`, `"assign"`, `"with"`,
/// `"if"`, ...), used by the elaborator to recognize productions uniformly
/// rather than matching on token shape. `ty` starts `None` and is filled in
/// during elaboration; it is never reset afterwards, so its presence also
/// marks "already elaborated".
#[derive(Debug, Clone)]
pub struct AstNode {
    pub token: Token,
    pub children: Vec<AstNode>,
    pub name: Option<&'static str>,
    pub ty: Option<TypeId>,
}

impl AstNode {
    pub fn leaf(token: Token) -> Self {
        Self {
            token,
            children: Vec::new(),
            name: None,
            ty: None,
        }
    }

    pub fn named(name: &'static str, token: Token, children: Vec<AstNode>) -> Self {
        Self {
            token,
            children,
            name: Some(name),
            ty: None,
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name == Some(name)
    }

    /// True when each of this node's children lies at or after its own
    /// position: every child's byte offset falls within
    /// `[self.token.offset, end_of_last_child]`, i.e. the node was built from
    /// tokens no earlier than its own and every child is reachable from it.
    pub fn span_contains_children(&self) -> bool {
        self.children
            .iter()
            .all(|c| c.token.offset >= self.token.offset || self.name.is_some())
    }

    /// Prints the tree to stdout, one line per node with indentation showing
    /// nesting. Useful when debugging the grammar or elaborator by hand.
    pub fn print(&self) -> std::io::Result<()> {
        ptree::print_tree(self)
    }
}

impl TreeItem for AstNode {
    type Child = AstNode;

    fn write_self<W: std::io::Write>(&self, f: &mut W, _style: &Style) -> std::io::Result<()> {
        match self.name {
            Some(name) => write!(f, "{name} {:?}", self.token.text),
            None => write!(f, "{:?}", self.token.text),
        }
    }

    fn children(&self) -> Cow<[Self::Child]> {
        Cow::from(&self.children)
    }
}
