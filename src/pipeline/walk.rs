//! Shape-directed rewriting shared by the transform and deserialize passes.
use serde_json::{Map, Value};

use crate::ir::{Param, ParamKind, Shape, Union};
use crate::registry::Scope;
use super::{Followed, Resolver, Target};

/// Per-field policy plugged into [`Walker`].
pub(crate) trait Rewrite {
    /// Output key for a declared field.
    fn key<'k>(&self, name: &'k str, param: &'k Param) -> &'k str;

    /// Last step on a declared field's value, after nested rewriting.
    fn finish(&self, value: Value, param: &Param) -> Value;
}

pub(crate) struct Walker<'r, R> {
    resolver: Resolver<'r>,
    rewrite: R,
}

impl<'r, R: Rewrite> Walker<'r, R> {
    pub(crate) fn new(resolver: Resolver<'r>, rewrite: R) -> Self {
        Self { resolver, rewrite }
    }

    /// Declared fields are rewritten; undeclared ones pass through as-is.
    pub(crate) fn object(&self, map: &Map<String, Value>, shape: &Shape) -> Map<String, Value> {
        let mut out = Map::with_capacity(map.len());
        for (name, value) in map {
            match shape.get(name) {
                Some(param) => {
                    let rewritten = self.param(value, param, shape.scope(), &Followed::default());
                    let rewritten = self.rewrite.finish(rewritten, param);
                    out.insert(self.rewrite.key(name, param).to_string(), rewritten);
                }
                None => {
                    out.insert(name.clone(), value.clone());
                }
            }
        }
        out
    }

    pub(crate) fn param(&self, value: &Value, param: &Param, scope: &Scope, followed: &Followed<'_>) -> Value {
        match (&param.kind, value) {
            (ParamKind::Object(shape), Value::Object(map)) => Value::Object(self.object(map, shape)),
            (ParamKind::Array(of), Value::Array(items)) => Value::Array(
                items.iter().map(|item| self.param(item, of, scope, &Followed::default())).collect(),
            ),
            (ParamKind::Union(union), _) => self.union(value, union, scope, followed),
            (ParamKind::Reference(name), Value::Object(_) | Value::Array(_)) => {
                match self.resolver.resolve(name, scope) {
                    Target::Type(_) if followed.contains(scope, name) => value.clone(),
                    Target::Type(def) => self.param(value, &def.root, &def.scope, &followed.with(scope, name)),
                    _ => value.clone(),
                }
            }
            _ => value.clone(),
        }
    }

    /// A tagged variant wins; otherwise objects go through the first variant
    /// that is object-shaped.
    fn union(&self, value: &Value, union: &Union, scope: &Scope, followed: &Followed<'_>) -> Value {
        if let Some(variant) = union.select_tagged(value) {
            return self.param(value, &variant.param, scope, followed);
        }
        if !value.is_object() {
            return value.clone();
        }
        union
            .variants
            .iter()
            .find(|v| self.resolver.object_of(&v.param, scope).is_some())
            .map(|v| self.param(value, &v.param, scope, followed))
            .unwrap_or_else(|| value.clone())
    }
}
