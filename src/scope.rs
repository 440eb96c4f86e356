//! Lexically scoped environments for the elaborator.
//!
//! Redesigns a C implementation's linked list of scope frames as a vector of
//! hash maps with an explicit push/pop API — that is exactly what [`Scope`]
//! is: a stack of [`Frame`]s, innermost last. Every chain still terminates
//! at the global frame (index 0); a name defined in an inner frame never
//! mutates an outer frame's binding.

use crate::types::{TypeId, TypeRegistry};
use crate::util::SymbolMap;

/// A constant captured for a variable binding, enough to drive constant
/// propagation and type inference of free occurrences without holding a
/// borrow into the AST being elaborated.
#[derive(Debug, Clone)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Nil,
    /// The binding's value is not a literal constant (e.g. a function or a
    /// compound expression); its type is still tracked in `variable_types`.
    Opaque,
}

#[derive(Debug, Default)]
struct Frame {
    variable_types: SymbolMap<TypeId>,
    variable_values: SymbolMap<ConstValue>,
    type_aliases: SymbolMap<TypeId>,
}

pub struct Scope {
    frames: Vec<Frame>,
}

impl Scope {
    /// The global frame. No bindings are pre-seeded here: primitive and
    /// built-in type names are resolved through the [`TypeRegistry`] itself,
    /// which the `generate_type`/lookup path falls back to once no scope
    /// frame shadows the name.
    pub fn global(_registry: &TypeRegistry) -> Self {
        Self {
            frames: vec![Frame::default()],
        }
    }

    pub fn push(&mut self) {
        self.frames.push(Frame::default());
    }

    pub fn pop(&mut self) {
        assert!(self.frames.len() > 1, "cannot pop the global scope");
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn define_var(&mut self, name: impl Into<String>, ty: TypeId, value: ConstValue) {
        let name = name.into();
        let frame = self.frames.last_mut().expect("scope stack is never empty");
        frame.variable_types.insert(name.clone(), ty);
        frame.variable_values.insert(name, value);
    }

    /// True if `name` is bound in the *current* (innermost) frame — used to
    /// detect redeclaration within the same scope.
    pub fn is_bound_locally(&self, name: &str) -> bool {
        self.frames
            .last()
            .expect("scope stack is never empty")
            .variable_types
            .contains(name)
    }

    pub fn lookup_var_type(&self, name: &str) -> Option<TypeId> {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.variable_types.get(name))
            .copied()
    }

    pub fn lookup_var_value(&self, name: &str) -> Option<&ConstValue> {
        self.frames.iter().rev().find_map(|f| f.variable_values.get(name))
    }

    pub fn define_type_alias(&mut self, name: impl Into<String>, ty: TypeId) {
        self.frames
            .last_mut()
            .expect("scope stack is never empty")
            .type_aliases
            .insert(name, ty);
    }

    pub fn lookup_type_alias(&self, name: &str) -> Option<TypeId> {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.type_aliases.get(name))
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_binding_does_not_leak_to_outer_scope() {
        let registry = TypeRegistry::new();
        let mut scope = Scope::global(&registry);
        scope.define_var("x", registry.int, ConstValue::Int(1));
        scope.push();
        scope.define_var("x", registry.string, ConstValue::Str("hi".into()));
        assert_eq!(scope.lookup_var_type("x"), Some(registry.string));
        scope.pop();
        assert_eq!(scope.lookup_var_type("x"), Some(registry.int));
    }

    #[test]
    fn redeclaration_detected_within_same_frame() {
        let registry = TypeRegistry::new();
        let mut scope = Scope::global(&registry);
        assert!(!scope.is_bound_locally("x"));
        scope.define_var("x", registry.int, ConstValue::Int(1));
        assert!(scope.is_bound_locally("x"));
    }
}
