// Strongly-typed structural definitions. Payloads stay `serde_json::Value`; the
// declared side is expressed here.
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::registry::Scope;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    String,
    Integer,
    Number,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Time,
    Uuid,
    Unknown,                 // accepts anything
}

/// Scalar decode function applied when values leave storage.
#[derive(Clone)]
pub struct Decoder(Arc<dyn Fn(&Value) -> Value + Send + Sync>);

#[derive(Debug, Clone)]
pub enum ParamKind {
    Primitive(Primitive),
    Object(Shape),           // inline nested shape
    Array(Box<Param>),       // element param
    Union(Union),
    Literal(Value),
    Reference(String),       // custom type or enum, resolved through the owning scope
}

#[derive(Debug, Clone, Default)]
pub struct Union {
    pub discriminator: Option<String>,
    pub variants: Vec<Variant>,
}

#[derive(Debug, Clone)]
pub struct Variant {
    pub tag: Option<String>,
    pub param: Param,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub kind: ParamKind,
    pub nullable: bool,
    pub optional: bool,
    pub default: Option<Value>,
    /// Internal name the field is rewritten to (`as`).
    pub rename: Option<String>,
    /// Literal written over the field after transformation.
    pub store: Option<Value>,
    /// String length, numeric value or array length bounds, depending on kind.
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub description: Option<String>,
    pub decode: Option<Decoder>,
}

/// Expanded field tree of an object type, bound to the scope that declared it.
#[derive(Debug, Clone, Default)]
pub struct Shape {
    scope: Scope,
    params: IndexMap<String, Param>,
}

/// Expanded form of a registered type: an object or a union root.
#[derive(Debug, Clone)]
pub struct Definition {
    pub scope: Scope,
    pub root: Param,
    pub description: Option<String>,
}

/// Collects params while a deferred builder runs.
#[derive(Debug)]
pub struct ShapeBuilder {
    shape: Shape,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Primitive {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "string" => Self::String,
            "integer" => Self::Integer,
            "number" | "float" => Self::Number,
            "decimal" => Self::Decimal,
            "boolean" => Self::Boolean,
            "date" => Self::Date,
            "datetime" => Self::DateTime,
            "time" => Self::Time,
            "uuid" => Self::Uuid,
            "unknown" => Self::Unknown,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Time => "time",
            Self::Uuid => "uuid",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Number | Self::Decimal)
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Decoder {
    pub fn new(f: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn apply(&self, value: &Value) -> Value {
        (self.0)(value)
    }
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Decoder(..)")
    }
}

impl ParamKind {
    /// Name used in serialized trees and issue metadata.
    pub fn kind_name(&self) -> &str {
        match self {
            Self::Primitive(p) => p.name(),
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::Union(_) => "union",
            Self::Literal(_) => "literal",
            Self::Reference(name) => name,
        }
    }
}

impl Union {
    pub fn new(variants: Vec<Variant>) -> Self {
        Self { discriminator: None, variants }
    }

    pub fn discriminated(discriminator: impl Into<String>, variants: Vec<Variant>) -> Self {
        Self { discriminator: Some(discriminator.into()), variants }
    }

    pub fn has_boolean_variant(&self) -> bool {
        self.variants
            .iter()
            .any(|v| matches!(v.param.kind, ParamKind::Primitive(Primitive::Boolean)))
    }

    /// Variant whose tag equals the discriminator value found in `value`.
    /// `None` when the union has no discriminator or nothing matches.
    pub fn select_tagged(&self, value: &Value) -> Option<&Variant> {
        let field = self.discriminator.as_deref()?;
        let tag = value.get(field)?.as_str()?;
        self.variants.iter().find(|v| v.tag.as_deref() == Some(tag))
    }
}

impl Variant {
    pub fn new(param: Param) -> Self {
        Self { tag: None, param }
    }

    pub fn tagged(tag: impl Into<String>, param: Param) -> Self {
        Self { tag: Some(tag.into()), param }
    }
}

impl Param {
    pub fn new(kind: ParamKind) -> Self {
        Self {
            kind,
            nullable: false,
            optional: false,
            default: None,
            rename: None,
            store: None,
            min: None,
            max: None,
            description: None,
            decode: None,
        }
    }

    pub fn primitive(p: Primitive) -> Self { Self::new(ParamKind::Primitive(p)) }
    pub fn string() -> Self { Self::primitive(Primitive::String) }
    pub fn integer() -> Self { Self::primitive(Primitive::Integer) }
    pub fn number() -> Self { Self::primitive(Primitive::Number) }
    pub fn decimal() -> Self { Self::primitive(Primitive::Decimal) }
    pub fn boolean() -> Self { Self::primitive(Primitive::Boolean) }
    pub fn date() -> Self { Self::primitive(Primitive::Date) }
    pub fn datetime() -> Self { Self::primitive(Primitive::DateTime) }
    pub fn time() -> Self { Self::primitive(Primitive::Time) }
    pub fn uuid() -> Self { Self::primitive(Primitive::Uuid) }
    pub fn unknown() -> Self { Self::primitive(Primitive::Unknown) }

    pub fn reference(name: impl Into<String>) -> Self {
        Self::new(ParamKind::Reference(name.into()))
    }

    pub fn object(shape: Shape) -> Self { Self::new(ParamKind::Object(shape)) }
    pub fn array(of: Param) -> Self { Self::new(ParamKind::Array(Box::new(of))) }
    pub fn union(union: Union) -> Self { Self::new(ParamKind::Union(union)) }
    pub fn literal(value: impl Into<Value>) -> Self { Self::new(ParamKind::Literal(value.into())) }

    pub fn optional(mut self) -> Self { self.optional = true; self }
    pub fn nullable(mut self) -> Self { self.nullable = true; self }
    pub fn min(mut self, min: f64) -> Self { self.min = Some(min); self }
    pub fn max(mut self, max: f64) -> Self { self.max = Some(max); self }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.rename = Some(name.into());
        self
    }

    pub fn store(mut self, value: impl Into<Value>) -> Self {
        self.store = Some(value.into());
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn decode(mut self, f: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        self.decode = Some(Decoder::new(f));
        self
    }

    pub fn as_primitive(&self) -> Option<Primitive> {
        match self.kind {
            ParamKind::Primitive(p) => Some(p),
            _ => None,
        }
    }
}

impl Shape {
    pub fn new(scope: Scope) -> Self {
        Self { scope, params: IndexMap::new() }
    }

    pub fn scope(&self) -> &Scope { &self.scope }
    pub fn get(&self, name: &str) -> Option<&Param> { self.params.get(name) }
    pub fn contains(&self, name: &str) -> bool { self.params.contains_key(name) }
    pub fn len(&self) -> usize { self.params.len() }
    pub fn is_empty(&self) -> bool { self.params.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Param)> {
        self.params.iter()
    }

    pub fn insert(&mut self, name: impl Into<String>, param: Param) {
        self.params.insert(name.into(), param);
    }
}

impl Definition {
    pub fn shape(&self) -> Option<&Shape> {
        match &self.root.kind {
            ParamKind::Object(shape) => Some(shape),
            _ => None,
        }
    }

    pub fn union(&self) -> Option<&Union> {
        match &self.root.kind {
            ParamKind::Union(union) => Some(union),
            _ => None,
        }
    }
}

impl ShapeBuilder {
    pub fn new(scope: Scope) -> Self {
        Self { shape: Shape::new(scope) }
    }

    pub fn scope(&self) -> &Scope { self.shape.scope() }

    pub fn field(&mut self, name: impl Into<String>, param: Param) -> &mut Self {
        self.shape.insert(name, param);
        self
    }

    /// Inline nested object bound to the same scope.
    pub fn object(&self, build: impl FnOnce(&mut ShapeBuilder)) -> Param {
        let mut nested = ShapeBuilder::new(self.scope().clone());
        build(&mut nested);
        Param::object(nested.build())
    }

    /// Array of inline nested objects.
    pub fn array_of(&self, build: impl FnOnce(&mut ShapeBuilder)) -> Param {
        Param::array(self.object(build))
    }

    pub fn build(self) -> Shape {
        self.shape
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_keeps_declaration_order_and_scope() {
        let scope = Scope::owner("invoice");
        let mut b = ShapeBuilder::new(scope.clone());
        b.field("title", Param::string());
        let address = b.object(|s| {
            s.field("street", Param::string().rename("street_name"));
        });
        b.field("address", address);
        let shape = b.build();

        let names: Vec<&String> = shape.iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["title", "address"]);
        match &shape.get("address").unwrap().kind {
            ParamKind::Object(nested) => assert_eq!(nested.scope(), &scope),
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn tagged_variant_selection() {
        let union = Union::discriminated("type", vec![
            Variant::tagged("card", Param::reference("card")),
            Variant::tagged("bank", Param::reference("bank")),
        ]);
        let hit = union.select_tagged(&json!({"type": "bank"})).unwrap();
        assert_eq!(hit.tag.as_deref(), Some("bank"));
        assert!(union.select_tagged(&json!({"type": "cash"})).is_none());
        assert!(union.select_tagged(&json!("bank")).is_none());
    }

    #[test]
    fn primitive_names_round_trip() {
        for p in [Primitive::String, Primitive::DateTime, Primitive::Uuid, Primitive::Unknown] {
            assert_eq!(Primitive::from_name(p.name()), Some(p));
        }
        assert_eq!(Primitive::from_name("invoice"), None);
    }
}
