//! Annotates a raw AST with a structural type on every node, resolving
//! names against a stack of [`Scope`]s. Elaboration stops at the first
//! failure: there is no error recovery, matching how the combinator runtime
//! above it also gives up at the first unrecoverable parse failure.

use std::fmt::{Display, Formatter};

use crate::ast::AstNode;
use crate::scope::{ConstValue, Scope};
use crate::token::TokenKind;
use crate::types::{generate_type, TypeExpr, TypeId, TypeRegistry};

#[derive(Debug, Clone)]
pub enum TypeError {
    UndeclaredName { name: String, line: usize, column: usize },
    TypeMismatch { message: String, line: usize, column: usize },
    Redeclaration { name: String, line: usize, column: usize },
    SelfAssignment { name: String, line: usize, column: usize },
    PrimitiveIntersection { message: String, line: usize, column: usize },
    NotAFunction { line: usize, column: usize },
    NotIterable { line: usize, column: usize },
    InvalidTypeExpr { message: String, line: usize, column: usize },
}

impl Display for TypeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeError::UndeclaredName { name, line, column } => {
                write!(f, "{}:{}: undeclared name {:?}", line, column, name)
            }
            TypeError::TypeMismatch { message, line, column } => {
                write!(f, "{}:{}: type mismatch: {}", line, column, message)
            }
            TypeError::Redeclaration { name, line, column } => {
                write!(f, "{}:{}: {:?} is already declared", line, column, name)
            }
            TypeError::SelfAssignment { name, line, column } => {
                write!(f, "{}:{}: self-assignment of {:?}", line, column, name)
            }
            TypeError::PrimitiveIntersection { message, line, column } => {
                write!(f, "{}:{}: {}", line, column, message)
            }
            TypeError::NotAFunction { line, column } => {
                write!(f, "{}:{}: callee is not a function", line, column)
            }
            TypeError::NotIterable { line, column } => {
                write!(f, "{}:{}: expected a list or generator", line, column)
            }
            TypeError::InvalidTypeExpr { message, line, column } => {
                write!(f, "{}:{}: {}", line, column, message)
            }
        }
    }
}

/// `TypeRegistry::intersection` reports an attempted intersection of a
/// primitive with its own distinct message; surface that as
/// `TypeError::PrimitiveIntersection` instead of the generic catch-all so
/// callers can match on it specifically.
fn type_expr_error(message: String, line: usize, column: usize) -> TypeError {
    if message.starts_with("cannot intersect primitive") {
        TypeError::PrimitiveIntersection { message, line, column }
    } else {
        TypeError::InvalidTypeExpr { message, line, column }
    }
}

pub struct Elaborator<'r> {
    pub registry: &'r mut TypeRegistry,
    pub scope: Scope,
}

impl<'r> Elaborator<'r> {
    pub fn new(registry: &'r mut TypeRegistry) -> Self {
        let scope = Scope::global(registry);
        Self { registry, scope }
    }

    /// Elaborates every top-level statement of a parsed `"root"` node in
    /// order, annotating each node's `ty` in place.
    pub fn elaborate_root(&mut self, root: &mut AstNode) -> Result<(), TypeError> {
        for stmt in &mut root.children {
            self.elaborate(stmt)?;
        }
        Ok(())
    }

    fn elaborate(&mut self, node: &mut AstNode) -> Result<TypeId, TypeError> {
        let ty = self.elaborate_kind(node)?;
        node.ty = Some(ty);
        Ok(ty)
    }

    fn elaborate_kind(&mut self, node: &mut AstNode) -> Result<TypeId, TypeError> {
        match node.name {
            None => self.elaborate_leaf(node),
            Some("infix") => self.elaborate_infix(node),
            Some("apply") => self.elaborate_apply(node),
            Some("neg") => self.elaborate_neg(node),
            Some("if") => self.elaborate_if(node),
            Some("quantify") => self.elaborate_quantify(node),
            Some("list") => self.elaborate_list(node),
            Some("comprehension") => self.elaborate_comprehension(node),
            Some("range") => self.elaborate_range(node),
            Some("assign") => self.elaborate_assign(node),
            Some("typed_assign") => self.elaborate_typed_assign(node),
            Some("range_assign") => self.elaborate_range_assign(node),
            Some("func_assign") => self.elaborate_func_assign(node),
            Some("with") => self.elaborate_with(node),
            Some(other) => unreachable!("grammar never produces node name {other:?}"),
        }
    }

    fn elaborate_leaf(&mut self, node: &AstNode) -> Result<TypeId, TypeError> {
        match node.token.kind {
            TokenKind::Integer => Ok(self.registry.int),
            TokenKind::Float => Ok(self.registry.float),
            TokenKind::Boolean => Ok(self.registry.bool_),
            TokenKind::Nil => Ok(self.registry.nil),
            TokenKind::String => Ok(self.registry.string),
            TokenKind::Symbol => self.resolve_symbol(node),
            other => unreachable!("unexpected leaf token kind {other:?}"),
        }
    }

    /// Symbol resolves against the variable map; failing that, against a
    /// declared type of the same name (whose own type is the built-in
    /// `Type`); otherwise it's undeclared.
    fn resolve_symbol(&self, node: &AstNode) -> Result<TypeId, TypeError> {
        let name = &node.token.text;
        if let Some(ty) = self.scope.lookup_var_type(name) {
            return Ok(ty);
        }
        if self.registry.lookup_named(name).is_some() {
            return Ok(self.registry.type_);
        }
        Err(TypeError::UndeclaredName {
            name: name.clone(),
            line: node.token.line,
            column: node.token.column,
        })
    }

    fn is_numeric(&self, ty: TypeId) -> bool {
        ty == self.registry.int || ty == self.registry.float
    }

    fn elaborate_infix(&mut self, node: &mut AstNode) -> Result<TypeId, TypeError> {
        let op = node.token.text.clone();
        let (line, column) = (node.token.line, node.token.column);
        let left_ty = self.elaborate(&mut node.children[0])?;
        let right_ty = self.elaborate(&mut node.children[1])?;

        match node.token.kind {
            TokenKind::MulDiv | TokenKind::AddSub => {
                if !self.is_numeric(left_ty) || !self.is_numeric(right_ty) {
                    return Err(TypeError::TypeMismatch {
                        message: format!("operator {op:?} requires numeric operands"),
                        line,
                        column,
                    });
                }
                if left_ty == self.registry.float || right_ty == self.registry.float {
                    Ok(self.registry.float)
                } else {
                    Ok(self.registry.int)
                }
            }
            TokenKind::Compare => {
                if !(self.is_numeric(left_ty) && self.is_numeric(right_ty))
                    && !self.registry.equal(left_ty, right_ty)
                {
                    return Err(TypeError::TypeMismatch {
                        message: "comparison operands must be the same type".to_string(),
                        line,
                        column,
                    });
                }
                Ok(self.registry.bool_)
            }
            TokenKind::Bitshift | TokenKind::BitAnd | TokenKind::BitOr | TokenKind::BitXor => {
                if left_ty != self.registry.int || right_ty != self.registry.int {
                    return Err(TypeError::TypeMismatch {
                        message: format!("operator {op:?} requires Int operands"),
                        line,
                        column,
                    });
                }
                Ok(self.registry.int)
            }
            TokenKind::BoolOp => {
                if left_ty != self.registry.bool_ || right_ty != self.registry.bool_ {
                    return Err(TypeError::TypeMismatch {
                        message: format!("operator {op:?} requires Bool operands"),
                        line,
                        column,
                    });
                }
                Ok(self.registry.bool_)
            }
            other => unreachable!("infix node carries non-operator token kind {other:?}"),
        }
    }

    fn elaborate_apply(&mut self, node: &mut AstNode) -> Result<TypeId, TypeError> {
        let (line, column) = (node.token.line, node.token.column);
        let callee_ty = self.elaborate(&mut node.children[0])?;
        let arg_ty = self.elaborate(&mut node.children[1])?;
        let Some((domain, codomain)) = self.registry.is_function(callee_ty) else {
            return Err(TypeError::NotAFunction { line, column });
        };
        if !self.registry.is_subtype(arg_ty, domain) {
            return Err(TypeError::TypeMismatch {
                message: "argument type does not match function domain".to_string(),
                line,
                column,
            });
        }
        Ok(codomain)
    }

    fn elaborate_neg(&mut self, node: &mut AstNode) -> Result<TypeId, TypeError> {
        let (line, column) = (node.token.line, node.token.column);
        let ty = self.elaborate(&mut node.children[0])?;
        if !self.is_numeric(ty) {
            return Err(TypeError::TypeMismatch {
                message: "unary - requires a numeric operand".to_string(),
                line,
                column,
            });
        }
        Ok(ty)
    }

    fn elaborate_if(&mut self, node: &mut AstNode) -> Result<TypeId, TypeError> {
        let (line, column) = (node.token.line, node.token.column);
        let cond_ty = self.elaborate(&mut node.children[0])?;
        if cond_ty != self.registry.bool_ {
            return Err(TypeError::TypeMismatch {
                message: "if condition must be Bool".to_string(),
                line,
                column,
            });
        }
        let then_ty = self.elaborate(&mut node.children[1])?;
        if let Some(else_branch) = node.children.get_mut(2) {
            let else_ty = self.elaborate(else_branch)?;
            if !self.registry.equal(then_ty, else_ty) {
                return Err(TypeError::TypeMismatch {
                    message: "if/else branches must have the same type".to_string(),
                    line,
                    column,
                });
            }
        }
        Ok(then_ty)
    }

    fn elaborate_quantify(&mut self, node: &mut AstNode) -> Result<TypeId, TypeError> {
        let (line, column) = (node.token.line, node.token.column);
        let binder_name = node.children[0].token.text.clone();
        let iterable_ty = self.elaborate(&mut node.children[1])?;
        let elem_ty = self
            .registry
            .is_list(iterable_ty)
            .or_else(|| self.registry.is_generator(iterable_ty))
            .ok_or(TypeError::NotIterable { line, column })?;

        self.scope.push();
        self.scope.define_var(binder_name, elem_ty, ConstValue::Opaque);
        let body_ty = self.elaborate(&mut node.children[2]);
        self.scope.pop();
        let body_ty = body_ty?;
        if body_ty != self.registry.bool_ {
            return Err(TypeError::TypeMismatch {
                message: "quantifier body must be Bool".to_string(),
                line,
                column,
            });
        }
        Ok(self.registry.bool_)
    }

    fn elaborate_list(&mut self, node: &mut AstNode) -> Result<TypeId, TypeError> {
        let (line, column) = (node.token.line, node.token.column);
        if node.children.is_empty() {
            return Ok(self.registry.list_of(self.registry.nil));
        }
        let mut elem_ty = None;
        for child in &mut node.children {
            let ty = self.elaborate(child)?;
            match elem_ty {
                None => elem_ty = Some(ty),
                Some(first) => {
                    if !self.registry.equal(first, ty) {
                        return Err(TypeError::TypeMismatch {
                            message: "list elements must share one type".to_string(),
                            line,
                            column,
                        });
                    }
                }
            }
        }
        Ok(self.registry.list_of(elem_ty.unwrap()))
    }

    fn elaborate_comprehension(&mut self, node: &mut AstNode) -> Result<TypeId, TypeError> {
        let (line, column) = (node.token.line, node.token.column);
        let binder_name = node.children[1].token.text.clone();
        let iterable_ty = self.elaborate(&mut node.children[2])?;
        let elem_ty = self
            .registry
            .is_list(iterable_ty)
            .or_else(|| self.registry.is_generator(iterable_ty))
            .ok_or(TypeError::NotIterable { line, column })?;

        self.scope.push();
        self.scope.define_var(binder_name, elem_ty, ConstValue::Opaque);
        let body_ty = self.elaborate(&mut node.children[0]);
        self.scope.pop();
        Ok(self.registry.list_of(body_ty?))
    }

    fn elaborate_range(&mut self, node: &mut AstNode) -> Result<TypeId, TypeError> {
        let (line, column) = (node.token.line, node.token.column);
        for child in &mut node.children {
            let ty = self.elaborate(child)?;
            if ty != self.registry.int {
                return Err(TypeError::TypeMismatch {
                    message: "range bounds must be Int".to_string(),
                    line,
                    column,
                });
            }
        }
        Ok(self.registry.generator_of(self.registry.int))
    }

    /// `x = e`: rebinding an existing name requires a subtype-compatible
    /// value; a fresh name is simply bound. `x = x` is rejected as
    /// self-assignment before the general subtype check runs.
    fn elaborate_assign(&mut self, node: &mut AstNode) -> Result<TypeId, TypeError> {
        let name = node.token.text.clone();
        let (line, column) = (node.token.line, node.token.column);

        if node.children[0].name.is_none()
            && node.children[0].token.kind == TokenKind::Symbol
            && node.children[0].token.text == name
        {
            return Err(TypeError::SelfAssignment { name, line, column });
        }

        let rhs_ty = self.elaborate(&mut node.children[0])?;
        match self.scope.lookup_var_type(&name) {
            Some(existing) if !self.registry.is_subtype(rhs_ty, existing) => {
                Err(TypeError::TypeMismatch {
                    message: format!("{name:?} already has an incompatible type"),
                    line,
                    column,
                })
            }
            Some(existing) => Ok(existing),
            None => {
                self.scope.define_var(name, rhs_ty, ConstValue::Opaque);
                Ok(rhs_ty)
            }
        }
    }

    /// `x: T = e`: always a fresh declaration; redeclaration of an existing
    /// name is rejected. `T == Type` defines a new named type instead of
    /// binding a value, `T == Enum` registers a new enum constant.
    fn elaborate_typed_assign(&mut self, node: &mut AstNode) -> Result<TypeId, TypeError> {
        let name = node.token.text.clone();
        let (line, column) = (node.token.line, node.token.column);
        if self.scope.lookup_var_type(&name).is_some() || self.registry.lookup_named(&name).is_some()
        {
            return Err(TypeError::Redeclaration { name, line, column });
        }

        let type_expr = TypeExpr::from_ast(&node.children[0])
            .map_err(|message| type_expr_error(message, line, column))?;
        let declared = generate_type(&type_expr, self.registry, &self.scope, Some(&name))
            .map_err(|message| type_expr_error(message, line, column))?;

        if declared == self.registry.type_ {
            let rhs_expr = TypeExpr::from_ast(&node.children[1])
                .map_err(|message| type_expr_error(message, line, column))?;
            let defined = generate_type(&rhs_expr, self.registry, &self.scope, Some(&name))
                .map_err(|message| type_expr_error(message, line, column))?;
            self.registry.rename(defined, name);
            return Ok(self.registry.type_);
        }

        if declared == self.registry.enum_ {
            let enum_ty = self.registry.register_enum(name.clone());
            self.elaborate(&mut node.children[1])?;
            self.scope.define_var(name, enum_ty, ConstValue::Opaque);
            return Ok(enum_ty);
        }

        let rhs_ty = self.elaborate(&mut node.children[1])?;
        if !self.registry.is_subtype(rhs_ty, declared) {
            return Err(TypeError::TypeMismatch {
                message: format!("{name:?}'s declared type does not accept its value"),
                line,
                column,
            });
        }
        self.scope.define_var(name, declared, ConstValue::Opaque);
        Ok(declared)
    }

    /// `h..t = e`: `e` must be a list/generator; `h` binds to the element
    /// type, `t` to the iterable's own type.
    fn elaborate_range_assign(&mut self, node: &mut AstNode) -> Result<TypeId, TypeError> {
        let head_name = node.token.text.clone();
        let tail_name = node.children[0].token.text.clone();
        let (line, column) = (node.token.line, node.token.column);

        let rhs_ty = self.elaborate(&mut node.children[1])?;
        let elem_ty = self
            .registry
            .is_list(rhs_ty)
            .or_else(|| self.registry.is_generator(rhs_ty))
            .ok_or(TypeError::NotIterable { line, column })?;

        self.scope.define_var(head_name, elem_ty, ConstValue::Opaque);
        self.scope.define_var(tail_name, rhs_ty, ConstValue::Opaque);
        Ok(rhs_ty)
    }

    /// `f a1 .. an = body`: enters a fresh scope and types the function.
    /// The surface grammar gives arguments no type annotations, so (decided
    /// in DESIGN.md) every argument is bound as `Int`, matching the only
    /// numeric default the rest of the type system has; a function needing
    /// a different argument type must go through `x: T = ...` instead.
    fn elaborate_func_assign(&mut self, node: &mut AstNode) -> Result<TypeId, TypeError> {
        let name = node.token.text.clone();
        let (line, column) = (node.token.line, node.token.column);
        if self.scope.lookup_var_type(&name).is_some() {
            return Err(TypeError::Redeclaration { name, line, column });
        }

        let arg_count = node.children.len() - 1;
        let arg_names: Vec<String> = node.children[..arg_count]
            .iter()
            .map(|c| c.token.text.clone())
            .collect();

        self.scope.push();
        for arg_name in &arg_names {
            self.scope.define_var(arg_name.clone(), self.registry.int, ConstValue::Opaque);
        }
        let body_ty = self.elaborate(&mut node.children[arg_count]);
        self.scope.pop();
        let body_ty = body_ty?;

        let mut fn_ty = body_ty;
        for _ in 0..arg_count {
            fn_ty = self.registry.function(self.registry.int, fn_ty);
        }
        self.scope.define_var(name, fn_ty, ConstValue::Opaque);
        Ok(fn_ty)
    }

    /// `with b1, ..., bk, body`: a fresh scope, bindings elaborated in
    /// sequence (each may see the ones before it), the final element is the
    /// body expression.
    fn elaborate_with(&mut self, node: &mut AstNode) -> Result<TypeId, TypeError> {
        self.scope.push();
        let mut result = self.registry.nil;
        for child in &mut node.children {
            result = match self.elaborate(child) {
                Ok(ty) => ty,
                Err(e) => {
                    self.scope.pop();
                    return Err(e);
                }
            };
        }
        self.scope.pop();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;

    fn elaborate(src: &str) -> Result<AstNode, TypeError> {
        let mut root = Grammar::new().parse(src).unwrap();
        let mut registry = TypeRegistry::new();
        let mut elaborator = Elaborator::new(&mut registry);
        elaborator.elaborate_root(&mut root)?;
        Ok(root)
    }

    #[test]
    fn widens_mixed_arithmetic_to_float() {
        let root = elaborate("1.0 + 2\n").unwrap();
        let registry = TypeRegistry::new();
        assert_eq!(root.children[0].ty, Some(registry.float));
    }

    #[test]
    fn rejects_self_assignment() {
        let err = elaborate("x = 1\nx = x\n").unwrap_err();
        assert!(matches!(err, TypeError::SelfAssignment { .. }));
    }

    #[test]
    fn rejects_redeclaration_of_typed_name() {
        let err = elaborate("x: Int = 1\nx: Int = 2\n").unwrap_err();
        assert!(matches!(err, TypeError::Redeclaration { .. }));
    }

    #[test]
    fn allows_plain_reassignment_with_subtype() {
        assert!(elaborate("x = 1\nx = 2\n").is_ok());
    }

    #[test]
    fn rejects_undeclared_name() {
        let err = elaborate("y\n").unwrap_err();
        assert!(matches!(err, TypeError::UndeclaredName { .. }));
    }

    #[test]
    fn rejects_type_mismatch_on_typed_assignment() {
        let err = elaborate("x: Int = 1.0\n").unwrap_err();
        assert!(matches!(err, TypeError::TypeMismatch { .. }));
    }

    #[test]
    fn with_bindings_see_each_other_in_sequence() {
        assert!(elaborate("with a = 10, b = a + 1, a + b\n").is_ok());
    }

    #[test]
    fn rejects_intersection_of_primitives() {
        let err = elaborate("T: Type = Int & Bool\n").unwrap_err();
        assert!(matches!(err, TypeError::PrimitiveIntersection { .. }));
    }
}
