//! Shape-directed coercion of raw request payloads.
use serde_json::{Map, Value};

use crate::ir::{Definition, Param, ParamKind, Primitive, Shape, Union};
use crate::registry::{Registry, Scope};
use super::scalar::coerce_value;
use super::{Followed, Resolver, Target};

pub struct Coercer<'r> {
    resolver: Resolver<'r>,
}

impl<'r> Coercer<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { resolver: Resolver::new(registry) }
    }

    /// Coerce the declared fields of an object payload. Undeclared fields and
    /// non-object payloads are left for the validator to reject.
    pub fn coerce(&self, payload: &Value, shape: &Shape) -> Value {
        match payload {
            Value::Object(map) => Value::Object(self.object(map, shape)),
            other => other.clone(),
        }
    }

    pub fn coerce_definition(&self, payload: &Value, definition: &Definition) -> Value {
        self.param(payload, &definition.root, &definition.scope, &Followed::default())
    }

    fn object(&self, map: &Map<String, Value>, shape: &Shape) -> Map<String, Value> {
        map.iter()
            .map(|(name, value)| {
                let coerced = match shape.get(name) {
                    Some(param) => self.param(value, param, shape.scope(), &Followed::default()),
                    None => value.clone(),
                };
                (name.clone(), coerced)
            })
            .collect()
    }

    fn param(&self, value: &Value, param: &Param, scope: &Scope, followed: &Followed<'_>) -> Value {
        if value.is_null() {
            return Value::Null;
        }
        match &param.kind {
            ParamKind::Primitive(primitive) => coerce_value(value, *primitive),
            ParamKind::Literal(Value::Bool(_)) => coerce_value(value, Primitive::Boolean),
            ParamKind::Literal(Value::Number(n)) if n.is_f64() => coerce_value(value, Primitive::Number),
            ParamKind::Literal(Value::Number(_)) => coerce_value(value, Primitive::Integer),
            ParamKind::Literal(_) => value.clone(),
            ParamKind::Object(shape) => self.coerce(value, shape),
            ParamKind::Array(of) => match value {
                Value::Array(items) => Value::Array(
                    items.iter().map(|item| self.param(item, of, scope, &Followed::default())).collect(),
                ),
                other => other.clone(),
            },
            ParamKind::Union(union) => self.union(value, union, scope, followed),
            ParamKind::Reference(name) => match self.resolver.resolve(name, scope) {
                Target::Type(_) if followed.contains(scope, name) => value.clone(),
                Target::Type(def) => self.param(value, &def.root, &def.scope, &followed.with(scope, name)),
                Target::Enum(_) => coerce_value(value, Primitive::String),
                Target::Unresolved => value.clone(),
            },
        }
    }

    /// Tagged variant first, then boolean, then the first object-shaped variant.
    fn union(&self, value: &Value, union: &Union, scope: &Scope, followed: &Followed<'_>) -> Value {
        if let Some(variant) = union.select_tagged(value) {
            return self.param(value, &variant.param, scope, followed);
        }
        if union.has_boolean_variant() {
            let coerced = coerce_value(value, Primitive::Boolean);
            if coerced.is_boolean() {
                return coerced;
            }
        }
        if value.is_object() {
            if let Some(variant) = union
                .variants
                .iter()
                .find(|v| self.resolver.object_of(&v.param, scope).is_some())
            {
                return self.param(value, &variant.param, scope, followed);
            }
        }
        value.clone()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
