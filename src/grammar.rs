//! The concrete grammar: a tree of combinators that turns a token stream into
//! a raw [`AstNode`], following the layered precedence-climbing shape
//! (`affix -> muldiv -> addsub -> ... -> application -> assign -> statement
//! -> root`). Two custom recognizers do the work the generic combinator
//! primitives can't express on their own:
//!
//! - [`FoldChain`] folds a left-associative binary chain (`a + b - c`) into
//!   nested two-child nodes, folding a chain of postfix operators onto a
//!   left operand instead of flattening them into one list.
//! - [`FlatChain`] is the same idea but for the type grammar's n-ary
//!   `*`/`&`/`|` operators, which stay flat (one node, N children) rather
//!   than nesting, and collapse to their single operand when only one
//!   appears.
//!
//! Every alternative a production tries is disambiguated by its *first*
//! token (a keyword, a bracket, an operator) before any consuming
//! sub-expression runs. `Seq` and `Optional` turn a failure fatal once a
//! child has consumed input, so an ambiguous shared prefix would abort the
//! whole alternation instead of backtracking — the grammar is built to never
//! need that fallback.

use std::fmt::{Display, Formatter};
use std::rc::Rc;

use crate::ast::AstNode;
use crate::combinator::{
    peek_significant, rc, Context, Eof, Ignore, Kind, Literal, Name, OneOrMore, Optional, Or,
    ParseFailure, ParseResult, Recognizer, Recursive, Seq,
};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

fn one(nodes: Vec<AstNode>) -> AstNode {
    nodes
        .into_iter()
        .next()
        .expect("grammar operand recognizer must yield exactly one node")
}

/// Folds `operand (operator operand)*` into a left-associative chain of
/// two-child nodes. When `operator` is `None`, operands are simply
/// juxtaposed (function application): the label is `"apply"` and each node's
/// token is the left operand's token; otherwise the label is `"infix"` and
/// each node's token is the matched operator (so the elaborator and compiler
/// dispatch on `node.token.text`/`kind` without inspecting the label).
struct FoldChain {
    label: &'static str,
    operand: Rc<dyn Recognizer>,
    operator: Option<Rc<dyn Recognizer>>,
}

impl Display for FoldChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "fold({})", self.label)
    }
}

impl Recognizer for FoldChain {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        let mut left = one(self.operand.parse(lexer, ctx)?);
        loop {
            let cp = lexer.checkpoint();
            let op_node = match &self.operator {
                Some(op) => match op.parse(lexer, ctx) {
                    Ok(nodes) => Some(one(nodes)),
                    Err(e) if e.fatal => return Err(e),
                    Err(_) => {
                        lexer.restore(cp);
                        None
                    }
                },
                None => None,
            };
            if self.operator.is_some() && op_node.is_none() {
                break;
            }
            match self.operand.parse(lexer, ctx) {
                Ok(nodes) => {
                    let right = one(nodes);
                    let token = op_node
                        .as_ref()
                        .map(|n| n.token.clone())
                        .unwrap_or_else(|| left.token.clone());
                    left = AstNode::named(self.label, token, vec![left, right]);
                }
                Err(e) if e.fatal => return Err(e),
                Err(e) => {
                    if self.operator.is_some() {
                        // An operator matched; an operand must follow.
                        return Err(e.escalate());
                    }
                    lexer.restore(cp);
                    break;
                }
            }
        }
        Ok(vec![left])
    }
}

/// Folds `operand (operator operand)*` into one flat node (`label`, all
/// operands as children), or passes the lone operand through unwrapped when
/// no operator ever matched (so a bare `Int` stays `Name("Int")` rather than
/// becoming a one-element product).
struct FlatChain {
    label: &'static str,
    operand: Rc<dyn Recognizer>,
    operator: Rc<dyn Recognizer>,
}

impl Display for FlatChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "flat({})", self.label)
    }
}

impl Recognizer for FlatChain {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        let mut parts = vec![one(self.operand.parse(lexer, ctx)?)];
        loop {
            let cp = lexer.checkpoint();
            match self.operator.parse(lexer, ctx) {
                Ok(_) => match self.operand.parse(lexer, ctx) {
                    Ok(nodes) => parts.push(one(nodes)),
                    Err(e) if e.fatal => return Err(e),
                    Err(e) => return Err(e.escalate()),
                },
                Err(e) if e.fatal => return Err(e),
                Err(_) => {
                    lexer.restore(cp);
                    break;
                }
            }
        }
        if parts.len() == 1 {
            Ok(parts)
        } else {
            let token = parts[0].token.clone();
            Ok(vec![AstNode::named(self.label, token, parts)])
        }
    }
}

/// A single optional leading `-` (spec: "affix -> value with optional unary
/// `-`"). Chaining is not supported; `--x` is two tokens the grammar does not
/// recognize as a double negation.
struct UnaryMinus {
    value: Rc<dyn Recognizer>,
}

impl Display for UnaryMinus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unary_minus({})", self.value)
    }
}

impl Recognizer for UnaryMinus {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        let cp = lexer.checkpoint();
        match rc(Literal("-")).parse(lexer, ctx) {
            Ok(nodes) => {
                let minus = one(nodes);
                let inner = one(self.value.parse(lexer, ctx)?);
                Ok(vec![AstNode::named("neg", minus.token, vec![inner])])
            }
            Err(e) if e.fatal => Err(e),
            Err(_) => {
                lexer.restore(cp);
                self.value.parse(lexer, ctx)
            }
        }
    }
}

/// `( expr )`, or `( expr .. expr [: expr] )` when a `..` follows the first
/// expression — both start with `(`, so they're handled in one recognizer
/// instead of two competing `Or` branches.
struct ParenOrRange {
    expr: Rc<dyn Recognizer>,
}

impl Display for ParenOrRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "paren_or_range")
    }
}

impl Recognizer for ParenOrRange {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        let open = one(rc(Literal("(")).parse(lexer, ctx)?);
        let inner_ctx = ctx.skipping_newlines();
        let first = one(self.expr.parse(lexer, inner_ctx)?);

        let cp = lexer.checkpoint();
        let range_dots = match rc(Kind(TokenKind::Range)).parse(lexer, inner_ctx) {
            Ok(nodes) => Some(one(nodes)),
            Err(e) if e.fatal => return Err(e),
            Err(_) => {
                lexer.restore(cp);
                None
            }
        };

        let node = if let Some(dots) = range_dots {
            let end = one(self.expr.parse(lexer, inner_ctx)?);
            let mut children = vec![first, end];
            let step_cp = lexer.checkpoint();
            match rc(Literal(":")).parse(lexer, inner_ctx) {
                Ok(_) => children.push(one(self.expr.parse(lexer, inner_ctx)?)),
                Err(e) if e.fatal => return Err(e),
                Err(_) => lexer.restore(step_cp),
            }
            AstNode::named("range", dots.token, children)
        } else {
            first
        };

        rc(Literal(")")).parse(lexer, inner_ctx)?;
        let _ = open;
        Ok(vec![node])
    }
}

/// `[ ]`, `[ e, e, ... ]`, or `[ e for x in iter ]` — all start with `[`, so
/// they share one recognizer rather than risk the fatal-cut aborting a
/// fallback mid-element.
struct ListOrComprehension {
    expr: Rc<dyn Recognizer>,
}

impl Display for ListOrComprehension {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "list_or_comprehension")
    }
}

impl Recognizer for ListOrComprehension {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        let open = one(rc(Literal("[")).parse(lexer, ctx)?);
        let inner_ctx = ctx.skipping_newlines();

        let close_cp = lexer.checkpoint();
        if rc(Literal("]")).parse(lexer, inner_ctx).is_ok() {
            return Ok(vec![AstNode::named("list", open.token, Vec::new())]);
        }
        lexer.restore(close_cp);

        let first = one(self.expr.parse(lexer, inner_ctx)?);

        let for_cp = lexer.checkpoint();
        if rc(Literal("for")).parse(lexer, inner_ctx).is_ok() {
            let binder = one(rc(Kind(TokenKind::Symbol)).parse(lexer, inner_ctx)?);
            rc(Literal("in")).parse(lexer, inner_ctx)?;
            let iterable = one(self.expr.parse(lexer, inner_ctx)?);
            rc(Literal("]")).parse(lexer, inner_ctx)?;
            return Ok(vec![AstNode::named(
                "comprehension",
                open.token,
                vec![first, binder, iterable],
            )]);
        }
        lexer.restore(for_cp);

        let mut elements = vec![first];
        loop {
            let comma_cp = lexer.checkpoint();
            if rc(Literal(",")).parse(lexer, inner_ctx).is_ok() {
                elements.push(one(self.expr.parse(lexer, inner_ctx)?));
            } else {
                lexer.restore(comma_cp);
                break;
            }
        }
        rc(Literal("]")).parse(lexer, inner_ctx)?;
        Ok(vec![AstNode::named("list", open.token, elements)])
    }
}

fn seq(children: Vec<Rc<dyn Recognizer>>) -> Rc<dyn Recognizer> {
    rc(Seq(children))
}

fn or(children: Vec<Rc<dyn Recognizer>>) -> Rc<dyn Recognizer> {
    rc(Or(children))
}

fn named(label: &'static str, child: Rc<dyn Recognizer>) -> Rc<dyn Recognizer> {
    rc(Name::new(label, child))
}

/// `if cond then a [else b]`.
fn build_if(expr: &Rc<dyn Recognizer>) -> Rc<dyn Recognizer> {
    named(
        "if",
        seq(vec![
            rc(Ignore(rc(Literal("if")))),
            expr.clone(),
            rc(Ignore(rc(Literal("then")))),
            expr.clone(),
            rc(Optional(seq(vec![rc(Ignore(rc(Literal("else")))), expr.clone()]))),
        ]),
    )
}

/// `for all|some x in iter body`.
fn build_quantifier(expr: &Rc<dyn Recognizer>) -> Rc<dyn Recognizer> {
    rc(Quantifier { expr: expr.clone() })
}

struct Quantifier {
    expr: Rc<dyn Recognizer>,
}

impl Display for Quantifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "quantifier")
    }
}

impl Recognizer for Quantifier {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        one(rc(Literal("for")).parse(lexer, ctx)?);
        let kind = one(or(vec![rc(Literal("all")), rc(Literal("some"))]).parse(lexer, ctx)?);
        let binder = one(rc(Kind(TokenKind::Symbol)).parse(lexer, ctx)?);
        rc(Literal("in")).parse(lexer, ctx)?;
        let iterable = one(self.expr.parse(lexer, ctx)?);
        let body = one(self.expr.parse(lexer, ctx)?);
        Ok(vec![AstNode::named(
            "quantify",
            kind.token,
            vec![binder, iterable, body],
        )])
    }
}

/// The atomic value grammar: literals, symbols, grouping/ranges, lists and
/// comprehensions, `if`, and quantifiers — everything `affix` descends into.
fn build_value(expr: &Rc<dyn Recognizer>) -> Rc<dyn Recognizer> {
    or(vec![
        rc(Kind(TokenKind::Float)),
        rc(Kind(TokenKind::Integer)),
        rc(Kind(TokenKind::Boolean)),
        rc(Kind(TokenKind::Nil)),
        rc(Kind(TokenKind::String)),
        rc(ParenOrRange { expr: expr.clone() }),
        rc(ListOrComprehension { expr: expr.clone() }),
        build_if(expr),
        build_quantifier(expr),
        rc(Kind(TokenKind::Symbol)),
    ])
}

fn fold_infix(operand: Rc<dyn Recognizer>, operator: Rc<dyn Recognizer>) -> Rc<dyn Recognizer> {
    rc(FoldChain {
        label: "infix",
        operand,
        operator: Some(operator),
    })
}

/// Builds the full expression grammar (`affix` through `application`) and
/// ties `expr_knot` to its top, so that nested occurrences inside
/// parens/lists/if/quantifier bodies can recurse back through it.
fn build_expression(expr_knot: &Rc<Recursive>) -> Rc<dyn Recognizer> {
    let expr_dyn: Rc<dyn Recognizer> = expr_knot.clone();
    let value = build_value(&expr_dyn);
    let affix: Rc<dyn Recognizer> = rc(UnaryMinus { value });

    let muldiv = fold_infix(affix, rc(Kind(TokenKind::MulDiv)));
    let addsub = fold_infix(muldiv, rc(Kind(TokenKind::AddSub)));
    let bitshift = fold_infix(addsub, rc(Kind(TokenKind::Bitshift)));
    let compare = fold_infix(bitshift, rc(Kind(TokenKind::Compare)));
    let bitand = fold_infix(compare, rc(Kind(TokenKind::BitAnd)));
    let bitxor = fold_infix(bitand, rc(Kind(TokenKind::BitXor)));
    let bitor = fold_infix(bitxor, rc(Kind(TokenKind::BitOr)));
    let and = fold_infix(bitor, rc(Literal("and")));
    let or_layer = fold_infix(and, rc(Literal("or")));

    rc(FoldChain {
        label: "apply",
        operand: or_layer,
        operator: None,
    })
}

/// Type-expression grammar producing the named node shapes
/// [`crate::types::TypeExpr::from_ast`] pattern-matches on.
fn build_type_expr(type_knot: &Rc<Recursive>) -> Rc<dyn Recognizer> {
    let type_dyn: Rc<dyn Recognizer> = type_knot.clone();

    let type_atom: Rc<dyn Recognizer> = rc(TypeAtom {
        type_expr: type_dyn.clone(),
    });
    let type_field: Rc<dyn Recognizer> = rc(TypeField { atom: type_atom });
    let type_function: Rc<dyn Recognizer> = rc(TypeFunction {
        left: type_field,
        type_expr: type_dyn,
    });
    let type_product = rc(FlatChain {
        label: "type_product",
        operand: type_function,
        operator: rc(Literal("*")),
    });
    let type_intersect = rc(FlatChain {
        label: "type_intersect",
        operand: type_product,
        operator: rc(Literal("&")),
    });
    rc(FlatChain {
        label: "type_union",
        operand: type_intersect,
        operator: rc(Literal("|")),
    })
}

/// `[T]`, `*T` (generator), `(T)` grouping, or a bare name.
struct TypeAtom {
    type_expr: Rc<dyn Recognizer>,
}

impl Display for TypeAtom {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "type_atom")
    }
}

impl Recognizer for TypeAtom {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        let cp = lexer.checkpoint();
        if let Ok(nodes) = rc(Literal("[")).parse(lexer, ctx) {
            let open = one(nodes);
            let inner = one(self.type_expr.parse(lexer, ctx)?);
            rc(Literal("]")).parse(lexer, ctx)?;
            return Ok(vec![AstNode::named("type_list", open.token, vec![inner])]);
        }
        lexer.restore(cp);
        if let Ok(nodes) = rc(Literal("*")).parse(lexer, ctx) {
            let star = one(nodes);
            let inner = one(self.type_expr.parse(lexer, ctx)?);
            return Ok(vec![AstNode::named(
                "type_generator",
                star.token,
                vec![inner],
            )]);
        }
        lexer.restore(cp);
        if let Ok(nodes) = rc(Literal("(")).parse(lexer, ctx) {
            let _ = one(nodes);
            let inner = one(self.type_expr.parse(lexer, ctx)?);
            rc(Literal(")")).parse(lexer, ctx)?;
            return Ok(vec![inner]);
        }
        lexer.restore(cp);
        rc(Kind(TokenKind::Symbol)).parse(lexer, ctx)
    }
}

/// `name: T` as a product field, or a bare type atom.
struct TypeField {
    atom: Rc<dyn Recognizer>,
}

impl Display for TypeField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "type_field")
    }
}

impl Recognizer for TypeField {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        let cp = lexer.checkpoint();
        if let Ok(nodes) = rc(Kind(TokenKind::Symbol)).parse(lexer, ctx) {
            let name = one(nodes);
            let colon_cp = lexer.checkpoint();
            if rc(Literal(":")).parse(lexer, ctx).is_ok() {
                let inner = one(self.atom.parse(lexer, ctx)?);
                return Ok(vec![AstNode::named(
                    "type_field",
                    name.token,
                    vec![inner],
                )]);
            }
            lexer.restore(colon_cp);
        }
        lexer.restore(cp);
        self.atom.parse(lexer, ctx)
    }
}

/// `a >> b`, right-associative (codomain recurses through the full
/// `type_expr`, so a `>>` chain nests as `a >> (b >> c)`).
struct TypeFunction {
    left: Rc<dyn Recognizer>,
    type_expr: Rc<dyn Recognizer>,
}

impl Display for TypeFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "type_function")
    }
}

impl Recognizer for TypeFunction {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        let domain = one(self.left.parse(lexer, ctx)?);
        let cp = lexer.checkpoint();
        if let Ok(nodes) = rc(Literal(">>")).parse(lexer, ctx) {
            let arrow = one(nodes);
            let codomain = one(self.type_expr.parse(lexer, ctx)?);
            return Ok(vec![AstNode::named(
                "type_function",
                arrow.token,
                vec![domain, codomain],
            )]);
        }
        lexer.restore(cp);
        Ok(vec![domain])
    }
}

/// Dispatches an `assign` production by peeking its leading tokens, avoiding
/// the fatal-cut that a naive `Or` of `Seq`s sharing a `symbol` prefix would
/// hit. Handles the plain, typed, range, and function-assignment forms.
struct AssignRule {
    expr: Rc<dyn Recognizer>,
    type_expr: Rc<dyn Recognizer>,
    assign: Rc<dyn Recognizer>,
}

impl Display for AssignRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "assign")
    }
}

impl Recognizer for AssignRule {
    fn parse(&self, lexer: &mut Lexer, ctx: Context) -> ParseResult {
        if let Some(with_node) = self.try_with(lexer, ctx)? {
            return Ok(vec![with_node]);
        }
        if let Some(node) = self.try_symbol_led(lexer, ctx)? {
            return Ok(vec![node]);
        }
        self.expr.parse(lexer, ctx)
    }
}

impl AssignRule {
    fn try_with(&self, lexer: &mut Lexer, ctx: Context) -> Result<Option<AstNode>, ParseFailure> {
        let cp = lexer.checkpoint();
        let with_tok = peek_significant(lexer, ctx)?;
        if !with_tok.is_keyword("with") {
            return Ok(None);
        }
        one(rc(Literal("with")).parse(lexer, ctx)?);

        let mut bindings = Vec::new();
        loop {
            let binding = one(self.assign.parse(lexer, ctx)?);
            let comma_cp = lexer.checkpoint();
            if rc(Literal(",")).parse(lexer, ctx).is_ok() {
                bindings.push(binding);
            } else {
                lexer.restore(comma_cp);
                bindings.push(binding);
                break;
            }
        }
        let _ = cp;
        Ok(Some(AstNode::named("with", with_tok, bindings)))
    }

    fn try_symbol_led(
        &self,
        lexer: &mut Lexer,
        ctx: Context,
    ) -> Result<Option<AstNode>, ParseFailure> {
        let start = lexer.checkpoint();
        let first = peek_significant(lexer, ctx)?;
        if first.kind != TokenKind::Symbol {
            return Ok(None);
        }
        let name = one(rc(Kind(TokenKind::Symbol)).parse(lexer, ctx)?);

        // h..t = e
        let range_cp = lexer.checkpoint();
        if rc(Kind(TokenKind::Range)).parse(lexer, ctx).is_ok() {
            let tail_cp = lexer.checkpoint();
            if let Ok(nodes) = rc(Kind(TokenKind::Symbol)).parse(lexer, ctx) {
                let tail = one(nodes);
                if rc(Literal("=")).parse(lexer, ctx).is_ok() {
                    let rhs = one(self.expr.parse(lexer, ctx)?);
                    return Ok(Some(AstNode::named(
                        "range_assign",
                        name.token,
                        vec![tail, rhs],
                    )));
                }
            }
            lexer.restore(tail_cp);
        }
        lexer.restore(range_cp);

        // x : T = e
        let colon_cp = lexer.checkpoint();
        if rc(Literal(":")).parse(lexer, ctx).is_ok() {
            let ty = one(self.type_expr.parse(lexer, ctx)?);
            rc(Literal("=")).parse(lexer, ctx)?;
            // When the annotation is the bare name `Type`, the right-hand
            // side defines a new structural type and is itself a type
            // expression, not a value — parse it through the type grammar
            // instead of the value grammar.
            let rhs = if ty.name.is_none() && ty.token.text == "Type" {
                one(self.type_expr.parse(lexer, ctx)?)
            } else {
                one(self.expr.parse(lexer, ctx)?)
            };
            return Ok(Some(AstNode::named(
                "typed_assign",
                name.token,
                vec![ty, rhs],
            )));
        }
        lexer.restore(colon_cp);

        // x = e
        let eq_cp = lexer.checkpoint();
        if rc(Literal("=")).parse(lexer, ctx).is_ok() {
            let rhs = one(self.expr.parse(lexer, ctx)?);
            return Ok(Some(AstNode::named("assign", name.token, vec![rhs])));
        }
        lexer.restore(eq_cp);

        // f arg1 .. argn = e
        let mut args = Vec::new();
        loop {
            let arg_cp = lexer.checkpoint();
            match rc(Kind(TokenKind::Symbol)).parse(lexer, ctx) {
                Ok(nodes) => args.push(one(nodes)),
                Err(_) => {
                    lexer.restore(arg_cp);
                    break;
                }
            }
        }
        if !args.is_empty() {
            let assign_cp = lexer.checkpoint();
            if rc(Literal("=")).parse(lexer, ctx).is_ok() {
                let body = one(self.expr.parse(lexer, ctx)?);
                let mut children = args;
                children.push(body);
                return Ok(Some(AstNode::named("func_assign", name.token, children)));
            }
            lexer.restore(assign_cp);
        }

        lexer.restore(start);
        Ok(None)
    }
}

/// The root grammar: a sequence of newline-terminated statements, followed
/// by end of input.
pub struct Grammar {
    root: Rc<dyn Recognizer>,
}

impl Grammar {
    pub fn new() -> Self {
        let expr_knot = Rc::new(Recursive::new("expr"));
        let application = build_expression(&expr_knot);
        expr_knot.set(application.clone());
        let expr_dyn: Rc<dyn Recognizer> = expr_knot;

        let type_knot = Rc::new(Recursive::new("type_expr"));
        let type_union = build_type_expr(&type_knot);
        type_knot.set(type_union);
        let type_dyn: Rc<dyn Recognizer> = type_knot;

        let assign_knot = Rc::new(Recursive::new("assign"));
        let assign_dyn: Rc<dyn Recognizer> = assign_knot.clone();
        let assign_rule: Rc<dyn Recognizer> = rc(AssignRule {
            expr: expr_dyn,
            type_expr: type_dyn,
            assign: assign_dyn.clone(),
        });
        assign_knot.set(assign_rule);

        let statement = rc(Seq(vec![assign_dyn, rc(Ignore(rc(Kind(TokenKind::Newline))))]));
        let root = rc(Eof(OneOrMore(statement)));

        Self { root }
    }

    pub fn parse(&self, source: &str) -> Result<AstNode, ParseFailure> {
        let mut lexer = Lexer::new(source);
        let nodes = self.root.parse(&mut lexer, Context::root())?;
        Ok(AstNode::named(
            "root",
            Token::new(TokenKind::Eof, "", 0, 1, 1),
            nodes,
        ))
    }
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statements(source: &str) -> Vec<AstNode> {
        Grammar::new().parse(source).unwrap().children
    }

    #[test]
    fn parses_arithmetic_precedence() {
        let stmts = statements("1 + 2 * 3\n");
        assert_eq!(stmts.len(), 1);
        let top = &stmts[0];
        assert!(top.is_named("infix"));
        assert_eq!(top.token.text, "+");
        assert!(top.children[1].is_named("infix"));
        assert_eq!(top.children[1].token.text, "*");
    }

    #[test]
    fn parses_globals_assignment_sequence() {
        let stmts = statements("x = 40\ny = 2\nx + y\n");
        assert_eq!(stmts.len(), 3);
        assert!(stmts[0].is_named("assign"));
        assert!(stmts[1].is_named("assign"));
        assert!(stmts[2].is_named("infix"));
    }

    #[test]
    fn parses_with_bindings_and_body() {
        let stmts = statements("with a = 10, b = 32, a + b\n");
        assert_eq!(stmts.len(), 1);
        let with = &stmts[0];
        assert!(with.is_named("with"));
        assert_eq!(with.children.len(), 3);
        assert!(with.children[0].is_named("assign"));
        assert!(with.children[1].is_named("assign"));
        assert!(with.children[2].is_named("infix"));
    }

    #[test]
    fn parses_typed_assignment() {
        let stmts = statements("x: Int = 1\n");
        assert!(stmts[0].is_named("typed_assign"));
        assert_eq!(stmts[0].children[0].token.text, "Int");
    }

    #[test]
    fn parses_function_assignment() {
        let stmts = statements("add a b = a + b\n");
        let node = &stmts[0];
        assert!(node.is_named("func_assign"));
        assert_eq!(node.token.text, "add");
        // a, b, body
        assert_eq!(node.children.len(), 3);
    }

    #[test]
    fn parses_type_definition_rhs_as_type_expression() {
        let stmts = statements("Point: Type = x: Int * y: Int\n");
        let node = &stmts[0];
        assert!(node.is_named("typed_assign"));
        assert_eq!(node.children[0].token.text, "Type");
        assert!(node.children[1].is_named("type_product"));
    }

    #[test]
    fn parses_function_application_by_juxtaposition() {
        let stmts = statements("f x y\n");
        let node = &stmts[0];
        assert!(node.is_named("apply"));
    }

    #[test]
    fn parses_if_then_else() {
        let stmts = statements("if x then 1 else 2\n");
        assert!(stmts[0].is_named("if"));
        assert_eq!(stmts[0].children.len(), 3);
    }

    #[test]
    fn parses_list_and_range_literal() {
        let stmts = statements("[1, 2, 3]\n");
        assert!(stmts[0].is_named("list"));
        assert_eq!(stmts[0].children.len(), 3);

        let stmts = statements("(1..10)\n");
        assert!(stmts[0].is_named("range"));
        assert_eq!(stmts[0].children.len(), 2);
    }

    #[test]
    fn parses_modulo_by_zero_source() {
        let stmts = statements("10 % 0\n");
        assert!(stmts[0].is_named("infix"));
        assert_eq!(stmts[0].token.text, "%");
    }
}
