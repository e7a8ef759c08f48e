//! Values leaving storage: per-field decode functions, no renames.
use serde_json::Value;

use crate::ir::{Definition, Param, Shape};
use crate::registry::Registry;
use super::walk::{Rewrite, Walker};
use super::{Followed, Resolver};

pub struct Deserializer<'r> {
    walker: Walker<'r, Decoding>,
}

struct Decoding;

impl Rewrite for Decoding {
    fn key<'k>(&self, name: &'k str, _param: &'k Param) -> &'k str {
        name
    }

    fn finish(&self, value: Value, param: &Param) -> Value {
        match &param.decode {
            Some(decoder) if !value.is_null() => decoder.apply(&value),
            _ => value,
        }
    }
}

impl<'r> Deserializer<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { walker: Walker::new(Resolver::new(registry), Decoding) }
    }

    pub fn deserialize(&self, stored: &Value, shape: &Shape) -> Value {
        match stored {
            Value::Object(map) => Value::Object(self.walker.object(map, shape)),
            other => other.clone(),
        }
    }

    pub fn deserialize_definition(&self, stored: &Value, definition: &Definition) -> Value {
        self.walker.param(stored, &definition.root, &definition.scope, &Followed::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Coercer, Transformer};
    use crate::registry::{Scope, TypeDef};
    use serde_json::json;

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register_type(&Scope::Global, "money", TypeDef::object(|s| {
                s.field(
                    "cents",
                    Param::integer().rename("amount_cents").decode(|v| {
                        v.as_i64().map(|c| json!(c as f64 / 100.0)).unwrap_or_else(|| v.clone())
                    }),
                );
                s.field("currency", Param::string().store("EUR"));
            }))
            .unwrap();
        registry.freeze();
        registry
    }

    fn shape() -> Shape {
        let mut shape = Shape::new(Scope::Global);
        shape.insert("total", Param::reference("money"));
        shape.insert("note", Param::string().nullable().decode(|v| json!(v.as_str().map(str::to_uppercase))));
        shape
    }

    #[test]
    fn decodes_nested_fields_without_renaming() {
        let registry = registry();
        let stored = json!({"total": {"cents": 1250, "currency": "USD"}, "note": null});
        let out = Deserializer::new(&registry).deserialize(&stored, &shape());
        assert_eq!(out, json!({"total": {"cents": 12.5, "currency": "USD"}, "note": null}));
    }

    #[test]
    fn coerce_then_deserialize_is_stable() {
        let registry = registry();
        let shape = shape();
        let payload = json!({"total": {"cents": "1250", "currency": "EUR"}});
        let coerced = Coercer::new(&registry).coerce(&payload, &shape);
        let once = Deserializer::new(&registry).deserialize(&coerced, &shape);
        assert_eq!(once, json!({"total": {"cents": 12.5, "currency": "EUR"}}));
        // transform renames and stores, deserialize leaves names alone
        let transformed = Transformer::new(&registry).transform(&coerced, &shape);
        assert_eq!(transformed, json!({"total": {"amount_cents": 1250, "currency": "EUR"}}));
        assert_eq!(Coercer::new(&registry).coerce(&coerced, &shape), coerced);
    }
}
