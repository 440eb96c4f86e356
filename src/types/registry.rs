use super::{Field, Type, TypeId, TypeKind};
use crate::util::SymbolMap;

/// The process-wide, single-writer arena of type descriptors. Types are
/// allocated monotonically; nothing is ever removed during a compilation —
/// everything is freed en masse at shutdown (there is nothing to do here in
/// safe Rust beyond dropping the registry).
pub struct TypeRegistry {
    types: Vec<Type>,
    named: SymbolMap<TypeId>,
    pub int: TypeId,
    pub float: TypeId,
    pub bool_: TypeId,
    pub string: TypeId,
    pub nil: TypeId,
    pub type_: TypeId,
    pub enum_: TypeId,
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut types = Vec::new();
        let mut named = SymbolMap::new();
        let mut prim = |types: &mut Vec<Type>, named: &mut SymbolMap<TypeId>, name: &'static str| {
            let id = TypeId(types.len());
            types.push(Type {
                name: Some(name.to_string()),
                kind: TypeKind::Primitive(name),
            });
            named.insert(name, id);
            id
        };
        let int = prim(&mut types, &mut named, "Int");
        let float = prim(&mut types, &mut named, "Float");
        let bool_ = prim(&mut types, &mut named, "Bool");
        let string = prim(&mut types, &mut named, "String");
        let nil = prim(&mut types, &mut named, "Nil");
        let type_ = prim(&mut types, &mut named, "Type");
        let enum_ = prim(&mut types, &mut named, "Enum");
        Self {
            types,
            named,
            int,
            float,
            bool_,
            string,
            nil,
            type_,
            enum_,
        }
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.0]
    }

    pub fn lookup_named(&self, name: &str) -> Option<TypeId> {
        self.named.get(name).copied()
    }

    fn push(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.types.len());
        self.types.push(ty);
        id
    }

    /// Register a brand-new named type (`x: Type = ...`), binding `name` in
    /// the registry so later references resolve to it.
    pub fn register_named(&mut self, name: String, kind: TypeKind) -> TypeId {
        let id = self.push(Type {
            name: Some(name.clone()),
            kind,
        });
        self.named.insert(name, id);
        id
    }

    pub fn register_enum(&mut self, name: String) -> TypeId {
        self.register_named(name.clone(), TypeKind::EnumConst(name))
    }

    /// Binds an already-constructed structural type under `name`, as happens
    /// when `x: Type = <type-expr>` defines a fresh product/union/etc. and
    /// needs it addressable by name afterwards.
    pub fn rename(&mut self, id: TypeId, name: String) {
        self.types[id.0].name = Some(name.clone());
        self.named.insert(name, id);
    }

    pub fn product(&mut self, fields: Vec<Field>) -> TypeId {
        self.push(Type {
            name: None,
            kind: TypeKind::Product(fields),
        })
    }

    pub fn list_of(&mut self, elem: TypeId) -> TypeId {
        self.push(Type {
            name: None,
            kind: TypeKind::List(elem),
        })
    }

    pub fn generator_of(&mut self, elem: TypeId) -> TypeId {
        self.push(Type {
            name: None,
            kind: TypeKind::Generator(elem),
        })
    }

    pub fn function(&mut self, domain: TypeId, codomain: TypeId) -> TypeId {
        self.push(Type {
            name: None,
            kind: TypeKind::Function { domain, codomain },
        })
    }

    /// Intersection of participants; participants must be non-primitive, and
    /// nested unions and intersections are flattened rather than nested.
    pub fn intersection(&mut self, participants: &[TypeId]) -> Result<TypeId, String> {
        let mut fields = Vec::new();
        for &p in participants {
            match &self.get(p).kind {
                TypeKind::Primitive(name) => {
                    return Err(format!("cannot intersect primitive type {name}"))
                }
                TypeKind::Product(f) => fields.extend(f.clone()),
                TypeKind::Intersection(f) => fields.extend(f.clone()),
                _ => fields.push(Field {
                    name: None,
                    ty: p,
                }),
            }
        }
        Ok(self.push(Type {
            name: None,
            kind: TypeKind::Intersection(fields),
        }))
    }

    /// Union of participants; a participant that is a single-field product
    /// collapses to the field's type, tagged with the field's name. Nested
    /// unions are flattened.
    pub fn union(&mut self, participants: &[TypeId]) -> TypeId {
        let mut variants = Vec::new();
        for &p in participants {
            match &self.get(p).kind {
                TypeKind::Union(v) => variants.extend(v.clone()),
                TypeKind::Product(fields) if fields.len() == 1 => {
                    variants.push(fields[0].clone());
                }
                _ => variants.push(Field { name: None, ty: p }),
            }
        }
        self.push(Type {
            name: None,
            kind: TypeKind::Union(variants),
        })
    }

    /// Structural equality: `equal(T, T)` holds and `equal(a, b) =>
    /// equal(b, a)`. Identity short-circuits; otherwise kinds
    /// and field counts must agree and every corresponding subtype must be
    /// equal (primitives compared by name).
    pub fn equal(&self, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return true;
        }
        let ta = self.get(a);
        let tb = self.get(b);
        match (&ta.kind, &tb.kind) {
            (TypeKind::Primitive(x), TypeKind::Primitive(y)) => x == y,
            (TypeKind::Product(fa), TypeKind::Product(fb))
            | (TypeKind::Union(fa), TypeKind::Union(fb))
            | (TypeKind::Intersection(fa), TypeKind::Intersection(fb)) => {
                fa.len() == fb.len()
                    && fa
                        .iter()
                        .zip(fb.iter())
                        .all(|(x, y)| self.equal(x.ty, y.ty))
            }
            (
                TypeKind::Function {
                    domain: da,
                    codomain: ca,
                },
                TypeKind::Function {
                    domain: db,
                    codomain: cb,
                },
            ) => self.equal(*da, *db) && self.equal(*ca, *cb),
            (TypeKind::List(x), TypeKind::List(y)) => self.equal(*x, *y),
            (TypeKind::Generator(x), TypeKind::Generator(y)) => self.equal(*x, *y),
            (TypeKind::EnumConst(x), TypeKind::EnumConst(y)) => x == y,
            (TypeKind::Recursive(x), TypeKind::Recursive(y)) => x == y,
            _ => false,
        }
    }

    /// Conservative subtype relation: coincides with equality, except that
    /// a union is a supertype of any of its variants. An intersection is
    /// never subtype-related to a union or vice versa unless structurally
    /// equal.
    pub fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        if self.equal(sub, sup) {
            return true;
        }
        if let TypeKind::Union(variants) = &self.get(sup).kind {
            return variants.iter().any(|v| self.is_subtype(sub, v.ty));
        }
        false
    }

    pub fn is_list(&self, ty: TypeId) -> Option<TypeId> {
        match self.get(ty).kind {
            TypeKind::List(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn is_generator(&self, ty: TypeId) -> Option<TypeId> {
        match self.get(ty).kind {
            TypeKind::Generator(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn is_function(&self, ty: TypeId) -> Option<(TypeId, TypeId)> {
        match self.get(ty).kind {
            TypeKind::Function { domain, codomain } => Some((domain, codomain)),
            _ => None,
        }
    }

    pub fn display(&self, id: TypeId) -> String {
        match &self.get(id).kind {
            TypeKind::Primitive(name) => name.to_string(),
            TypeKind::Product(fields) => format!(
                "({})",
                fields
                    .iter()
                    .map(|f| match &f.name {
                        Some(n) => format!("{}: {}", n, self.display(f.ty)),
                        None => self.display(f.ty),
                    })
                    .collect::<Vec<_>>()
                    .join(" * ")
            ),
            TypeKind::Union(variants) => variants
                .iter()
                .map(|f| self.display(f.ty))
                .collect::<Vec<_>>()
                .join(" | "),
            TypeKind::Intersection(fields) => fields
                .iter()
                .map(|f| self.display(f.ty))
                .collect::<Vec<_>>()
                .join(" & "),
            TypeKind::Function { domain, codomain } => {
                format!("{} >> {}", self.display(*domain), self.display(*codomain))
            }
            TypeKind::List(elem) => format!("[{}]", self.display(*elem)),
            TypeKind::Generator(elem) => format!("*{}", self.display(*elem)),
            TypeKind::EnumConst(name) => name.clone(),
            TypeKind::Recursive(name) => name.clone(),
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_reflexive_and_symmetric() {
        let reg = TypeRegistry::new();
        assert!(reg.equal(reg.int, reg.int));
        assert!(reg.equal(reg.int, reg.int) == reg.equal(reg.int, reg.int));
    }

    #[test]
    fn union_is_supertype_of_variant() {
        let mut reg = TypeRegistry::new();
        let u = reg.union(&[reg.int, reg.string]);
        assert!(reg.is_subtype(reg.int, u));
        assert!(!reg.is_subtype(u, reg.int));
    }

    #[test]
    fn intersection_rejects_primitive() {
        let mut reg = TypeRegistry::new();
        assert!(reg.intersection(&[reg.int]).is_err());
    }

    #[test]
    fn single_field_product_collapses_in_union() {
        let mut reg = TypeRegistry::new();
        let some = reg.product(vec![Field {
            name: Some("Some".to_string()),
            ty: reg.int,
        }]);
        let u = reg.union(&[some, reg.nil]);
        assert!(reg.is_subtype(reg.int, u));
    }
}
