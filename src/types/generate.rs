use super::{Field, TypeId, TypeKind, TypeRegistry};
use crate::ast::AstNode;
use crate::scope::Scope;

/// A type expression, as produced by the grammar for the right-hand side of
/// a typed assignment (`x: T = e`) or a type alias. `generate_type`
/// interprets it as a recursive-descent walk building a [`TypeId`], not a
/// table lookup.
#[derive(Debug, Clone)]
pub enum TypeExpr {
    Name(String),
    Product(Vec<TypeExpr>),
    Intersection(Vec<TypeExpr>),
    Union(Vec<TypeExpr>),
    Function(Box<TypeExpr>, Box<TypeExpr>),
    List(Box<TypeExpr>),
    Generator(Box<TypeExpr>),
    Field(String, Box<TypeExpr>),
}

impl TypeExpr {
    /// Builds a [`TypeExpr`] from the grammar's type-expression AST shape:
    /// named nodes `type_product` / `type_intersect` / `type_union` /
    /// `type_function` / `type_list` / `type_generator` / `type_field`, and a
    /// bare `Symbol` token as a name reference.
    pub fn from_ast(node: &AstNode) -> Result<TypeExpr, String> {
        match node.name {
            Some("type_product") => Ok(TypeExpr::Product(
                node.children
                    .iter()
                    .map(TypeExpr::from_ast)
                    .collect::<Result<_, _>>()?,
            )),
            Some("type_intersect") => Ok(TypeExpr::Intersection(
                node.children
                    .iter()
                    .map(TypeExpr::from_ast)
                    .collect::<Result<_, _>>()?,
            )),
            Some("type_union") => Ok(TypeExpr::Union(
                node.children
                    .iter()
                    .map(TypeExpr::from_ast)
                    .collect::<Result<_, _>>()?,
            )),
            Some("type_function") => {
                let [domain, codomain] = &node.children[..] else {
                    return Err("function type requires domain and codomain".to_string());
                };
                Ok(TypeExpr::Function(
                    Box::new(TypeExpr::from_ast(domain)?),
                    Box::new(TypeExpr::from_ast(codomain)?),
                ))
            }
            Some("type_list") => Ok(TypeExpr::List(Box::new(TypeExpr::from_ast(
                &node.children[0],
            )?))),
            Some("type_generator") => Ok(TypeExpr::Generator(Box::new(TypeExpr::from_ast(
                &node.children[0],
            )?))),
            Some("type_field") => Ok(TypeExpr::Field(
                node.token.text.clone(),
                Box::new(TypeExpr::from_ast(&node.children[0])?),
            )),
            _ => Ok(TypeExpr::Name(node.token.text.clone())),
        }
    }
}

/// Interprets a [`TypeExpr`] into a registered [`TypeId`]. `self_name`, when
/// set, is the name of the type currently being defined, so that a bare
/// reference to it inside its own definition resolves to the back-reference
/// sentinel instead of an unresolved-name error.
pub fn generate_type(
    expr: &TypeExpr,
    registry: &mut TypeRegistry,
    scope: &Scope,
    self_name: Option<&str>,
) -> Result<TypeId, String> {
    match expr {
        TypeExpr::Name(name) => {
            if Some(name.as_str()) == self_name {
                return Ok(registry.register_named(
                    format!("{name}#recursive"),
                    TypeKind::Recursive(name.clone()),
                ));
            }
            scope
                .lookup_type_alias(name)
                .or_else(|| registry.lookup_named(name))
                .ok_or_else(|| format!("undeclared type {name:?}"))
        }
        TypeExpr::Product(parts) => {
            let mut fields = Vec::with_capacity(parts.len());
            for part in parts {
                fields.push(generate_field(part, registry, scope, self_name)?);
            }
            Ok(registry.product(fields))
        }
        TypeExpr::Intersection(parts) => {
            let mut ids = Vec::with_capacity(parts.len());
            for part in parts {
                ids.push(generate_type(part, registry, scope, self_name)?);
            }
            registry.intersection(&ids)
        }
        TypeExpr::Union(parts) => {
            let mut ids = Vec::with_capacity(parts.len());
            for part in parts {
                ids.push(generate_type(part, registry, scope, self_name)?);
            }
            Ok(registry.union(&ids))
        }
        TypeExpr::Function(domain, codomain) => {
            let d = generate_type(domain, registry, scope, self_name)?;
            let c = generate_type(codomain, registry, scope, self_name)?;
            Ok(registry.function(d, c))
        }
        TypeExpr::List(elem) => {
            let e = generate_type(elem, registry, scope, self_name)?;
            Ok(registry.list_of(e))
        }
        TypeExpr::Generator(elem) => {
            let e = generate_type(elem, registry, scope, self_name)?;
            Ok(registry.generator_of(e))
        }
        TypeExpr::Field(name, inner) => {
            let ty = generate_type(inner, registry, scope, self_name)?;
            Ok(registry.product(vec![Field {
                name: Some(name.clone()),
                ty,
            }]))
        }
    }
}

fn generate_field(
    expr: &TypeExpr,
    registry: &mut TypeRegistry,
    scope: &Scope,
    self_name: Option<&str>,
) -> Result<Field, String> {
    if let TypeExpr::Field(name, inner) = expr {
        let ty = generate_type(inner, registry, scope, self_name)?;
        Ok(Field {
            name: Some(name.clone()),
            ty,
        })
    } else {
        let ty = generate_type(expr, registry, scope, self_name)?;
        Ok(Field { name: None, ty })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_product_of_primitives() {
        let mut registry = TypeRegistry::new();
        let scope = Scope::global(&registry);
        let expr = TypeExpr::Product(vec![TypeExpr::Name("Int".into()), TypeExpr::Name("Bool".into())]);
        let id = generate_type(&expr, &mut registry, &scope, None).unwrap();
        assert_eq!(registry.display(id), "Int * Bool");
    }

    #[test]
    fn self_reference_becomes_recursive_sentinel() {
        let mut registry = TypeRegistry::new();
        let scope = Scope::global(&registry);
        let expr = TypeExpr::Name("List".into());
        let id = generate_type(&expr, &mut registry, &scope, Some("List")).unwrap();
        assert!(matches!(registry.get(id).kind, TypeKind::Recursive(_)));
    }
}
