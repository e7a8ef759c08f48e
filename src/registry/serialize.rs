//! Plain-tree export of every registered type and enum.
//!
//! Pass one expands each descriptor into a JSON tree, resolving references
//! through the descriptor's own scope so they come out qualified. Pass two runs
//! over the finished map and sets `recursive` on entries whose tree names
//! their own qualified name. Only direct self-reference counts: a cycle through
//! another type (A → B → A) leaves both entries non-recursive.
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::ir::{Param, ParamKind, Shape};
use super::{Descriptor, Registry, Resolved, Scope};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Serialized {
    pub types: IndexMap<String, Value>,
    pub enums: IndexMap<String, Value>,
}

impl Serialized {
    pub fn to_json(&self) -> Value {
        json!({
            "types": self.types,
            "enums": self.enums,
        })
    }
}

pub(crate) fn serialize(registry: &Registry, only: Option<&Scope>) -> Serialized {
    let mut out = Serialized::default();
    let in_scope = |scope: &Scope| only.is_none_or(|wanted| wanted == scope);

    // 1) expand every builder into a plain tree
    for descriptor in registry.store().types().iter() {
        if !in_scope(&descriptor.scope()) {
            continue;
        }
        let definition = descriptor.definition();
        let mut tree = param_tree(registry, &definition.root, &definition.scope);
        if let (Some(text), Value::Object(map)) = (&definition.description, &mut tree) {
            map.insert("description".into(), Value::from(text.clone()));
        }
        strip_field_flags(&mut tree);
        out.types.insert(descriptor.qualified_name().to_string(), tree);
    }

    for descriptor in registry.store().enums().iter() {
        if !in_scope(&descriptor.scope()) {
            continue;
        }
        let mut o = json!({ "values": descriptor.values() });
        if let Some(text) = descriptor.description() {
            o["description"] = Value::from(text);
        }
        out.enums.insert(descriptor.qualified_name().to_string(), o);
    }

    // 2) self-reference needs the entry itself to be present
    let names: Vec<String> = out.types.keys().cloned().collect();
    for name in names {
        if let Some(Value::Object(map)) = out.types.get_mut(&name) {
            let recursive = map.values().any(|v| references(v, &name));
            map.insert("recursive".into(), Value::Bool(recursive));
        }
    }

    debug!(types = out.types.len(), enums = out.enums.len(), "serialized registry");
    out
}

/// Root entries are not fields; optional/nullable would only be noise there.
fn strip_field_flags(tree: &mut Value) {
    if let Value::Object(map) = tree {
        map.remove("optional");
        map.remove("nullable");
    }
}

fn references(tree: &Value, qualified_name: &str) -> bool {
    match tree {
        Value::Object(map) => {
            let direct = map.get("kind").and_then(Value::as_str) == Some("reference")
                && map.get("reference").and_then(Value::as_str) == Some(qualified_name);
            direct || map.values().any(|v| references(v, qualified_name))
        }
        Value::Array(items) => items.iter().any(|v| references(v, qualified_name)),
        _ => false,
    }
}

pub(crate) fn shape_tree(registry: &Registry, shape: &Shape) -> Value {
    let mut props = Map::new();
    for (name, param) in shape.iter() {
        props.insert(name.clone(), param_tree(registry, param, shape.scope()));
    }
    Value::Object(props)
}

pub(crate) fn param_tree(registry: &Registry, param: &Param, scope: &Scope) -> Value {
    let mut o = match &param.kind {
        ParamKind::Primitive(p) => json!({ "kind": p.name() }),
        ParamKind::Object(shape) => json!({
            "kind": "object",
            "shape": shape_tree(registry, shape),
        }),
        ParamKind::Array(of) => json!({
            "kind": "array",
            "of": param_tree(registry, of, scope),
        }),
        ParamKind::Union(union) => {
            let variants = union
                .variants
                .iter()
                .map(|variant| {
                    let mut v = param_tree(registry, &variant.param, scope);
                    if let (Some(tag), Value::Object(map)) = (&variant.tag, &mut v) {
                        map.insert("tag".into(), Value::from(tag.clone()));
                    }
                    v
                })
                .collect::<Vec<_>>();
            let mut o = json!({ "kind": "union", "variants": variants });
            if let Some(field) = &union.discriminator {
                o["discriminator"] = Value::from(field.clone());
            }
            o
        }
        ParamKind::Literal(value) => json!({ "kind": "literal", "value": value }),
        ParamKind::Reference(name) => match registry.resolve(name, scope) {
            Some(Resolved::Type(found)) => json!({
                "kind": "reference",
                "reference": found.qualified_name(),
            }),
            Some(Resolved::Enum(found)) => json!({
                "kind": "string",
                "enum": found.qualified_name(),
            }),
            // forward/cross-scope reference that never resolved
            None => json!({ "kind": "unknown", "unresolved": name }),
        },
    };

    o["nullable"] = Value::Bool(param.nullable);
    o["optional"] = Value::Bool(param.optional);
    if let Some(value) = &param.default { o["default"] = value.clone(); }
    if let Some(name) = &param.rename { o["as"] = Value::from(name.clone()); }
    if let Some(value) = &param.store { o["store"] = value.clone(); }
    if let Some(m) = param.min { o["min"] = number(m); }
    if let Some(m) = param.max { o["max"] = number(m); }
    if let Some(text) = &param.description { o["description"] = Value::from(text.clone()); }
    o
}

// Helper: prefer emitting integers when exact
fn number(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TypeDef;
    use crate::ir::{Union, Variant};

    fn registry() -> Registry {
        let mut registry = Registry::new();
        let invoice = Scope::owner("invoice");
        registry.register_enum(&Scope::Global, "status", vec!["draft".into(), "sent".into()]).unwrap();
        registry
            .register_type(&Scope::Global, "node", TypeDef::object(|s| {
                s.field("children", Param::array(Param::reference("node")).optional());
            }))
            .unwrap();
        registry
            .register_type(&invoice, "", TypeDef::object(|s| {
                s.field("status", Param::reference("status"));
                s.field("line", Param::reference("line").nullable());
                s.field("later", Param::reference("not_declared_yet"));
            }))
            .unwrap();
        registry
            .register_type(&invoice, "line", TypeDef::object(|s| {
                s.field("amount", Param::integer().min(1.0));
            }).describe("One invoice line"))
            .unwrap();
        registry
    }

    #[test]
    fn references_are_qualified_through_owner_scope() {
        let out = registry().serialize_all();
        let invoice = &out.types["invoice"];
        assert_eq!(invoice["shape"]["line"]["reference"], "invoice_line");
        assert_eq!(invoice["shape"]["line"]["nullable"], true);
        assert_eq!(invoice["shape"]["status"]["enum"], "status");
        assert_eq!(invoice["shape"]["later"]["kind"], "unknown");
        assert_eq!(out.types["invoice_line"]["description"], "One invoice line");
        assert_eq!(out.types["invoice_line"]["shape"]["amount"]["min"], 1);
        assert_eq!(out.enums["status"]["values"], json!(["draft", "sent"]));
    }

    #[test]
    fn recursive_flag_is_one_hop() {
        let mut registry = registry();
        registry
            .register_type(&Scope::Global, "a", TypeDef::object(|s| { s.field("b", Param::reference("b")); }))
            .unwrap();
        registry
            .register_type(&Scope::Global, "b", TypeDef::object(|s| { s.field("a", Param::reference("a")); }))
            .unwrap();
        let out = registry.serialize_all();
        assert_eq!(out.types["node"]["recursive"], true);
        assert_eq!(out.types["invoice"]["recursive"], false);
        assert_eq!(out.types["a"]["recursive"], false);
        assert_eq!(out.types["b"]["recursive"], false);
    }

    #[test]
    fn serialize_is_stable_and_scopable() {
        let registry = registry();
        assert_eq!(registry.serialize_all(), registry.serialize_all());
        let scoped = registry.serialize_scope(&Scope::owner("invoice"));
        let names: Vec<&String> = scoped.types.keys().collect();
        assert_eq!(names, ["invoice", "invoice_line"]);
        assert!(scoped.enums.is_empty());
    }

    #[test]
    fn union_variants_carry_tags() {
        let mut registry = Registry::new();
        registry
            .register_type(&Scope::Global, "payment", TypeDef::union(Union::discriminated("type", vec![
                Variant::tagged("card", Param::reference("card")),
            ])))
            .unwrap();
        let out = registry.serialize_all();
        assert_eq!(out.types["payment"]["discriminator"], "type");
        assert_eq!(out.types["payment"]["variants"][0]["tag"], "card");
        assert!(out.types["payment"].get("optional").is_none());
    }
}
