use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use crate::ast::AstNode;
use crate::token::TokenKind;
use crate::types::TypeId;
use crate::types::TypeKind;
use crate::types::TypeRegistry;
use crate::util::Position;

use super::chunk::Chunk;
use super::opcode::{ArithFamily, Opcode};
use super::CompilerOptions;

/// Compilation failures. Unlike [`crate::checker::TypeError`] these don't mean
/// the program is ill-typed — an elaborated, well-typed AST can still name a
/// construct the fixed opcode table has no instruction for.
#[derive(Debug, Clone)]
pub enum CompileError {
    /// `%` with a `Float` operand; the VM's `MOD` handler only defines
    /// integer semantics (the opcode family table has no `MOD` width
    /// variants, unlike `MUL`/`DIV`/`ADD`/`SUB`).
    FloatModulo { line: usize, column: usize },
    /// A function was applied with a different argument count than its
    /// definition, or to an unknown/non-symbol callee.
    ArityMismatch { name: String, line: usize, column: usize },
    /// A construct that elaborates fine but has no bytecode representation
    /// under the fixed opcode table (`if`, quantifiers, list/comprehension
    /// literals, ranges and range-destructuring, first-class or partially
    /// applied functions, non-arithmetic infix operators).
    Unsupported {
        construct: &'static str,
        line: usize,
        column: usize,
    },
}

impl Display for CompileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::FloatModulo { line, column } => {
                write!(f, "{line}:{column}: % requires integer operands")
            }
            CompileError::ArityMismatch { name, line, column } => {
                write!(f, "{line}:{column}: {name:?} applied with the wrong number of arguments")
            }
            CompileError::Unsupported { construct, line, column } => {
                write!(f, "{line}:{column}: {construct} has no bytecode representation")
            }
        }
    }
}

#[derive(Clone)]
struct FunctionTemplate {
    params: Vec<String>,
    body: AstNode,
}

/// Lowers one elaborated root AST into a [`Chunk`].
///
/// Locals are addressed the way the original reference VM's `LOCAL` opcode
/// does: by offset from the top of the stack, not by a per-frame slot index.
/// Since every pushed value — not just named locals — shifts that offset,
/// the compiler tracks a running `stack_depth` and records each local's
/// absolute depth at the point it was bound (`depth_when_defined`); a later
/// reference's offset is `stack_depth - 1 - depth_when_defined`.
pub struct Compiler<'r> {
    chunk: Chunk,
    registry: &'r TypeRegistry,
    options: CompilerOptions,
    locals: Vec<(String, usize)>,
    frame_starts: Vec<usize>,
    stack_depth: usize,
    globals_by_name: HashMap<String, usize>,
    functions: HashMap<String, FunctionTemplate>,
}

/// Compiles `root` (already elaborated — every node's `ty` is `Some`, except
/// `func_assign` bodies and bindings, which this lowering never prints) into
/// a fresh [`Chunk`].
pub fn compile(root: &AstNode, registry: &TypeRegistry, options: CompilerOptions) -> Result<Chunk, CompileError> {
    Compiler::new(registry, options).compile_root(root)
}

impl<'r> Compiler<'r> {
    pub fn new(registry: &'r TypeRegistry, options: CompilerOptions) -> Self {
        Self {
            chunk: Chunk::new(),
            registry,
            options,
            locals: Vec::new(),
            frame_starts: Vec::new(),
            stack_depth: 0,
            globals_by_name: HashMap::new(),
            functions: HashMap::new(),
        }
    }

    pub fn compile_root(mut self, root: &AstNode) -> Result<Chunk, CompileError> {
        for statement in &root.children {
            self.compile_statement(statement)?;
        }
        if self.options.terminate {
            self.chunk.write_opcode(Opcode::Break);
        }
        Ok(self.chunk)
    }

    fn compile_statement(&mut self, node: &AstNode) -> Result<(), CompileError> {
        if node.is_named("func_assign") {
            self.register_function(node);
            return Ok(());
        }
        let depth_before = self.stack_depth;
        self.compile_expr(node)?;
        if self.stack_depth > depth_before {
            self.emit_print(node.ty);
        }
        Ok(())
    }

    /// Records a function's parameter names and body for later inlining at
    /// direct call sites; emits no bytecode of its own, mirroring the
    /// original compiler's "no print for a non-primitive statement type"
    /// rule (a `Function`-typed statement is never printable either).
    fn register_function(&mut self, node: &AstNode) {
        let name = node.token.text.clone();
        let arg_count = node.children.len() - 1;
        let params = node.children[..arg_count]
            .iter()
            .map(|c| c.token.text.clone())
            .collect();
        let body = node.children[arg_count].clone();
        self.functions.insert(name, FunctionTemplate { params, body });
    }

    /// Root-statement epilogue: dispatches on the elaborated type the way
    /// the original compiler's `compile_tree` does — only `Int`/`Float`/
    /// `String` get a print opcode, and crucially no `POP` follows either
    /// way, so an un-printed value (an assignment's result, say) is simply
    /// left on the stack for the next statement to build on top of.
    fn emit_print(&mut self, ty: Option<TypeId>) {
        let Some(ty) = ty else { return };
        if ty == self.registry.int {
            self.chunk.write_opcode(Opcode::PrintI64);
        } else if ty == self.registry.float {
            self.chunk.write_opcode(Opcode::PrintF64);
        } else if ty == self.registry.string {
            self.chunk.write_opcode(Opcode::PrintStr);
        }
    }

    /// Pushes exactly one value, net, for any expression shape the opcode
    /// table can represent; errors with [`CompileError::Unsupported`] for
    /// shapes it can't.
    fn compile_expr(&mut self, node: &AstNode) -> Result<(), CompileError> {
        self.options.trace.trace_success(
            "compile",
            &node.name.unwrap_or("leaf"),
            Position {
                line: node.token.line,
                column: node.token.column,
            },
        );
        match node.name {
            None => self.compile_leaf(node),
            Some("infix") => self.compile_infix(node),
            Some("neg") => self.compile_neg(node),
            Some("apply") => self.compile_apply(node),
            Some("assign") => self.compile_global_assign(node),
            Some("typed_assign") => self.compile_global_typed_assign(node),
            Some("with") => self.compile_with(node),
            Some(other) => Err(CompileError::Unsupported {
                construct: other,
                line: node.token.line,
                column: node.token.column,
            }),
        }
    }

    fn compile_leaf(&mut self, node: &AstNode) -> Result<(), CompileError> {
        match node.token.kind {
            TokenKind::Integer => {
                let n: i64 = node.token.text.parse().expect("lexer guarantees digits");
                let index = self.chunk.intern_int(n);
                self.chunk.write_indexed(Opcode::Load, Opcode::LoadLong, index);
            }
            TokenKind::Float => {
                let n: f64 = node.token.text.parse().expect("lexer guarantees a float literal");
                let index = self.chunk.intern_float(n);
                self.chunk.write_indexed(Opcode::Load, Opcode::LoadLong, index);
            }
            // Bool/Nil have no dedicated runtime representation; both ride
            // on the integer encoding, folding `false`/`nil` down to `0`.
            TokenKind::Boolean => {
                let n = if node.token.text == "true" { 1 } else { 0 };
                let index = self.chunk.intern_int(n);
                self.chunk.write_indexed(Opcode::Load, Opcode::LoadLong, index);
            }
            TokenKind::Nil => {
                let index = self.chunk.intern_int(0);
                self.chunk.write_indexed(Opcode::Load, Opcode::LoadLong, index);
            }
            TokenKind::String => {
                let index = self.chunk.intern_str(&node.token.text);
                self.chunk.write_indexed(Opcode::Load, Opcode::LoadLong, index);
            }
            TokenKind::Symbol => return self.compile_symbol(node),
            other => unreachable!("elaboration rejects non-value leaf token kind {other:?}"),
        }
        self.stack_depth += 1;
        Ok(())
    }

    fn compile_symbol(&mut self, node: &AstNode) -> Result<(), CompileError> {
        let name = &node.token.text;
        if let Some(&(_, depth)) = self.locals.iter().rev().find(|(n, _)| n == name) {
            let offset = self.stack_depth - 1 - depth;
            self.chunk.write_indexed(Opcode::Local, Opcode::LocalLong, offset);
        } else {
            let index = *self
                .globals_by_name
                .get(name)
                .expect("checker guarantees every free symbol resolves to a declared global");
            self.chunk.write_indexed(Opcode::Global, Opcode::GlobalLong, index);
        }
        self.stack_depth += 1;
        Ok(())
    }

    fn compile_infix(&mut self, node: &AstNode) -> Result<(), CompileError> {
        let (line, column) = (node.token.line, node.token.column);
        let left_ty = node.children[0].ty.expect("elaborated");
        let right_ty = node.children[1].ty.expect("elaborated");
        let left_float = left_ty == self.registry.float;
        let right_float = right_ty == self.registry.float;

        let family = match (node.token.kind, node.token.text.as_str()) {
            (TokenKind::MulDiv, "*") => ArithFamily::Mul,
            (TokenKind::MulDiv, "/") => ArithFamily::Div,
            (TokenKind::AddSub, "+") => ArithFamily::Add,
            (TokenKind::AddSub, "-") => ArithFamily::Sub,
            (TokenKind::MulDiv, "%") => {
                if left_float || right_float {
                    return Err(CompileError::FloatModulo { line, column });
                }
                self.compile_expr(&node.children[0])?;
                self.compile_expr(&node.children[1])?;
                self.chunk.write_opcode(Opcode::Mod);
                self.stack_depth -= 1;
                return Ok(());
            }
            _ => {
                return Err(CompileError::Unsupported {
                    construct: "comparison, boolean and bitwise operators",
                    line,
                    column,
                })
            }
        };
        self.compile_expr(&node.children[0])?;
        self.compile_expr(&node.children[1])?;
        self.chunk.write_opcode(Opcode::arithmetic(family, left_float, right_float));
        self.stack_depth -= 1;
        Ok(())
    }

    /// Lowers `-e` to `0 - e` so unary negation needs no opcode beyond the
    /// existing `SUB` family.
    fn compile_neg(&mut self, node: &AstNode) -> Result<(), CompileError> {
        let inner_ty = node.children[0].ty.expect("elaborated");
        let index = self.chunk.intern_int(0);
        self.chunk.write_indexed(Opcode::Load, Opcode::LoadLong, index);
        self.stack_depth += 1;
        self.compile_expr(&node.children[0])?;
        let right_float = inner_ty == self.registry.float;
        self.chunk.write_opcode(Opcode::arithmetic(ArithFamily::Sub, false, right_float));
        self.stack_depth -= 1;
        Ok(())
    }

    /// `x = e` at root scope: always binds a fresh global slot, even when
    /// `x` already exists — `SET_GLOBAL` only ever appends, so a rebinding
    /// is modeled as shadowing: the compiler's own
    /// name-to-index map moves on to the new slot, and the old slot's
    /// value is simply never read again.
    fn compile_global_assign(&mut self, node: &AstNode) -> Result<(), CompileError> {
        let name = node.token.text.clone();
        self.compile_expr(&node.children[0])?;
        self.bind_global(name);
        Ok(())
    }

    fn compile_global_typed_assign(&mut self, node: &AstNode) -> Result<(), CompileError> {
        if self.is_type_or_enum_definition(node) {
            return Ok(());
        }
        let name = node.token.text.clone();
        self.compile_expr(&node.children[1])?;
        self.bind_global(name);
        Ok(())
    }

    /// A `typed_assign` whose declared type is `Type` or `Enum` defines a
    /// name in the type registry, not a runtime value — there is nothing to
    /// push and nothing to print, the same way the original leaves a
    /// non-primitive statement result untouched.
    fn is_type_or_enum_definition(&self, node: &AstNode) -> bool {
        match node.ty {
            Some(ty) if ty == self.registry.type_ => true,
            Some(ty) => matches!(self.registry.get(ty).kind, TypeKind::EnumConst(_)),
            None => false,
        }
    }

    fn bind_global(&mut self, name: String) {
        let index = self.chunk.declare_global(name.clone());
        self.globals_by_name.insert(name, index);
        self.chunk.write_opcode(Opcode::SetGlobal);
        self.stack_depth -= 1;
    }

    fn push_frame(&mut self) {
        self.frame_starts.push(self.locals.len());
        self.options.trace.trace_success(
            "push_frame",
            &self.frame_starts.len(),
            Position {
                line: 0,
                column: self.stack_depth,
            },
        );
    }

    fn pop_frame(&mut self) -> usize {
        let start = self.frame_starts.pop().expect("frame stack is balanced");
        let count = self.locals.len() - start;
        self.locals.truncate(start);
        self.options.trace.trace_success(
            "pop_frame",
            &count,
            Position {
                line: 0,
                column: self.stack_depth,
            },
        );
        count
    }

    /// `with b1, ..., bk, body`: bindings are compiled as locals in the
    /// order written (so each may reference the ones before it), then the
    /// body; `POP_SCOPE` drops the bindings while leaving the body's single
    /// result on top, the same shape as a function-call frame.
    fn compile_with(&mut self, node: &AstNode) -> Result<(), CompileError> {
        self.push_frame();
        let (bindings, body) = node.children.split_at(node.children.len() - 1);
        let result = (|| {
            for binding in bindings {
                self.compile_local_binding(binding)?;
            }
            self.compile_expr(&body[0])
        })();
        let bound = self.pop_frame();
        result?;
        if bound > 0 {
            self.chunk.write_indexed(Opcode::PopScope, Opcode::PopScopeLong, bound);
            self.stack_depth -= bound;
        }
        Ok(())
    }

    /// A binding inside `with` (or a function's inlined argument frame)
    /// shadows a name with a local rather than declaring a global.
    fn compile_local_binding(&mut self, node: &AstNode) -> Result<(), CompileError> {
        match node.name {
            Some("assign") => {
                let name = node.token.text.clone();
                self.compile_expr(&node.children[0])?;
                self.locals.push((name, self.stack_depth - 1));
                Ok(())
            }
            Some("typed_assign") => {
                if self.is_type_or_enum_definition(node) {
                    return Err(CompileError::Unsupported {
                        construct: "local type/enum definition",
                        line: node.token.line,
                        column: node.token.column,
                    });
                }
                let name = node.token.text.clone();
                self.compile_expr(&node.children[1])?;
                self.locals.push((name, self.stack_depth - 1));
                Ok(())
            }
            _ => Err(CompileError::Unsupported {
                construct: "with-bindings other than assign/typed_assign",
                line: node.token.line,
                column: node.token.column,
            }),
        }
    }

    /// Inlines a direct, fully-saturated call to a known `func_assign`
    /// template: push each argument as a local bound to the matching
    /// parameter name (exactly like a `with`-binding), compile the body,
    /// then `POP_SCOPE`. No `CALL` opcode exists, so curried/partial
    /// application and calls through a function-typed value stay
    /// unsupported — only `f a1 a2 ... an` against a statically known `f`
    /// with exactly `n` parameters compiles.
    fn compile_apply(&mut self, node: &AstNode) -> Result<(), CompileError> {
        let (line, column) = (node.token.line, node.token.column);
        let mut args = Vec::new();
        let mut cursor = node;
        loop {
            args.push(&cursor.children[1]);
            if cursor.children[0].name == Some("apply") {
                cursor = &cursor.children[0];
            } else {
                break;
            }
        }
        args.reverse();
        let callee = &cursor.children[0];

        if callee.name.is_some() || callee.token.kind != TokenKind::Symbol {
            return Err(CompileError::Unsupported {
                construct: "application of a non-symbol callee",
                line,
                column,
            });
        }
        let name = callee.token.text.clone();
        let template = self.functions.get(&name).cloned().ok_or_else(|| CompileError::Unsupported {
            construct: "application of an unknown, shadowed, or first-class function value",
            line,
            column,
        })?;
        if template.params.len() != args.len() {
            return Err(CompileError::ArityMismatch { name, line, column });
        }

        self.push_frame();
        let result = (|| {
            for (param, arg) in template.params.iter().zip(args.iter()) {
                self.compile_expr(arg)?;
                self.locals.push((param.clone(), self.stack_depth - 1));
            }
            self.compile_expr(&template.body)
        })();
        let bound = self.pop_frame();
        result?;
        if bound > 0 {
            self.chunk.write_indexed(Opcode::PopScope, Opcode::PopScopeLong, bound);
            self.stack_depth -= bound;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::Elaborator;
    use crate::grammar::Grammar;
    use crate::value::Value;

    fn compile_source(src: &str) -> Result<Chunk, CompileError> {
        let mut root = Grammar::new().parse(src).unwrap();
        let mut registry = TypeRegistry::new();
        Elaborator::new(&mut registry).elaborate_root(&mut root).unwrap();
        compile(&root, &registry, CompilerOptions::default())
    }

    #[test]
    fn arithmetic_precedence_emits_mul_before_add() {
        let chunk = compile_source("1 + 2 * 3\n").unwrap();
        assert!(chunk.code.contains(&(Opcode::MulI64I64 as u8)));
        assert!(chunk.code.contains(&(Opcode::AddI64I64 as u8)));
        assert_eq!(*chunk.code.last().unwrap(), Opcode::PrintI64 as u8);
    }

    #[test]
    fn mixed_width_addition_widens_to_float() {
        let chunk = compile_source("1 + 2.0\n").unwrap();
        assert!(chunk.code.contains(&(Opcode::AddI64F64 as u8)));
        assert_eq!(*chunk.code.last().unwrap(), Opcode::PrintF64 as u8);
    }

    #[test]
    fn assignment_statement_emits_no_print() {
        let chunk = compile_source("x = 1\n").unwrap();
        assert!(!chunk.code.contains(&(Opcode::PrintI64 as u8)));
        assert_eq!(chunk.globals, vec!["x".to_string()]);
    }

    #[test]
    fn globals_are_created_in_declaration_order_and_only_last_statement_prints() {
        let chunk = compile_source("x = 40\ny = 2\nx + y\n").unwrap();
        assert_eq!(chunk.globals, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(chunk.code.iter().filter(|&&b| b == Opcode::PrintI64 as u8).count(), 1);
    }

    #[test]
    fn with_binding_pops_scope_after_use() {
        let chunk = compile_source("with x = 40, y = 2, x + y\n").unwrap();
        assert!(chunk.code.contains(&(Opcode::PopScope as u8)));
        assert_eq!(*chunk.code.last().unwrap(), Opcode::PrintI64 as u8);
    }

    #[test]
    fn modulo_by_float_operand_is_rejected() {
        let err = compile_source("1.0 % 2\n").unwrap_err();
        assert!(matches!(err, CompileError::FloatModulo { .. }));
    }

    #[test]
    fn if_expression_is_unsupported_by_the_compiler() {
        let err = compile_source("if true then 1 else 2\n").unwrap_err();
        assert!(matches!(err, CompileError::Unsupported { .. }));
    }

    #[test]
    fn direct_function_application_inlines_against_its_template() {
        let chunk = compile_source("double a = a + a\ndouble 21\n").unwrap();
        assert!(chunk.code.contains(&(Opcode::AddI64I64 as u8)));
        assert!(chunk.code.contains(&(Opcode::PopScope as u8)));
        assert_eq!(*chunk.code.last().unwrap(), Opcode::PrintI64 as u8);
    }

    #[test]
    fn wrong_arity_application_is_rejected() {
        let err = compile_source("double a = a + a\ndouble 1 2\n").unwrap_err();
        assert!(matches!(err, CompileError::ArityMismatch { .. }));
    }

    #[test]
    fn string_constants_intern_to_the_value_variant() {
        let chunk = compile_source("\"hi\"\n").unwrap();
        assert!(matches!(chunk.constants()[0], Value::Str(_)));
        assert_eq!(*chunk.code.last().unwrap(), Opcode::PrintStr as u8);
    }
}
