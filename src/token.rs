use std::fmt::{Display, Formatter};

/// The lexical category of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    None,
    Eof,
    Integer,
    Float,
    LeftGroup,
    RightGroup,
    Colon,
    Newline,
    Comma,
    Symbol,
    Keyword,
    Boolean,
    Nil,
    Assign,
    Compare,
    Dot,
    Range,
    MulDiv,
    AddSub,
    Bitshift,
    BoolOp,
    BitAnd,
    BitOr,
    BitXor,
    String,
}

/// The grammatical role of a token, used by the combinator runtime's `tag()`
/// recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenTag {
    Operand,
    Operator,
    InfixOperator,
    Grouping,
    None,
}

impl TokenKind {
    /// Default grammatical tag for a token kind, absent grammar-specific
    /// annotation (the grammar may still retag a node, e.g. unary `-`).
    pub fn default_tag(self) -> TokenTag {
        match self {
            TokenKind::Integer
            | TokenKind::Float
            | TokenKind::Symbol
            | TokenKind::Boolean
            | TokenKind::Nil
            | TokenKind::String => TokenTag::Operand,
            TokenKind::Compare
            | TokenKind::Range
            | TokenKind::MulDiv
            | TokenKind::AddSub
            | TokenKind::Bitshift
            | TokenKind::BoolOp
            | TokenKind::BitAnd
            | TokenKind::BitOr
            | TokenKind::BitXor => TokenTag::InfixOperator,
            TokenKind::Assign | TokenKind::Dot => TokenTag::Operator,
            TokenKind::LeftGroup | TokenKind::RightGroup => TokenTag::Grouping,
            _ => TokenTag::None,
        }
    }
}

pub const KEYWORDS: &[&str] = &[
    "with", "for", "some", "all", "in", "if", "then", "else", "where", "and", "or", "xor", "pass",
    "stop",
];

/// A single lexed unit of source text, owned by the lexer's token buffer and
/// borrowed by the AST.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub tag: TokenTag,
    pub text: String,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, offset: usize, line: usize, column: usize) -> Self {
        let tag = kind.default_tag();
        Self {
            kind,
            tag,
            text: text.into(),
            offset,
            line,
            column,
        }
    }

    pub fn eof(offset: usize, line: usize, column: usize) -> Self {
        Token::new(TokenKind::Eof, "", offset, line, column)
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == word
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({:?}) @{}:{}", self.kind, self.text, self.line, self.column)
    }
}
