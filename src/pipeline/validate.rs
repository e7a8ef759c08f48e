//! Exhaustive validation against a closed-world shape.
//!
//! Every violation becomes an [`Issue`]; nothing fails fast. The returned
//! params are the payload restricted to declared fields, with defaults filled
//! in for absent ones.
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::ir::{Definition, Param, ParamKind, Shape, Union};
use crate::issue::{Issue, IssueCode, PathSegment};
use crate::registry::{Registry, Scope};
use super::scalar::{json_kind, matches_primitive};
use super::{Followed, Resolver, Target};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    pub params: Value,
    pub issues: Vec<Issue>,
}

pub struct Validator<'r> {
    resolver: Resolver<'r>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn to_json(&self) -> Value {
        json!({
            "valid": self.is_valid(),
            "params": self.params,
            "issues": self.issues,
        })
    }
}

fn child(path: &[PathSegment], segment: impl Into<PathSegment>) -> Vec<PathSegment> {
    let mut out = path.to_vec();
    out.push(segment.into());
    out
}

fn type_invalid(path: &[PathSegment], expected: &str, value: &Value) -> Issue {
    Issue::of(IssueCode::TypeInvalid, path.to_vec())
        .with_meta("expected", expected)
        .with_meta("actual", json_kind(value))
}

impl<'r> Validator<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { resolver: Resolver::new(registry) }
    }

    pub fn validate(&self, payload: &Value, shape: &Shape) -> Validation {
        let mut issues = Vec::new();
        let params = match payload {
            Value::Object(map) => Value::Object(self.object(map, shape, &[], &mut issues)),
            other => {
                issues.push(type_invalid(&[], "object", other));
                other.clone()
            }
        };
        Validation { params, issues }
    }

    /// Validate against a registered type; union roots are accepted too.
    pub fn validate_definition(&self, payload: &Value, definition: &Definition) -> Validation {
        let mut issues = Vec::new();
        let params = self.param(payload, &definition.root, &definition.scope, &[], &mut issues, &Followed::default());
        Validation { params, issues }
    }

    fn object(
        &self,
        map: &Map<String, Value>,
        shape: &Shape,
        path: &[PathSegment],
        issues: &mut Vec<Issue>,
    ) -> Map<String, Value> {
        let mut out = Map::new();
        for (name, param) in shape.iter() {
            match map.get(name) {
                Some(value) => {
                    let at = child(path, name.as_str());
                    let checked = self.param(value, param, shape.scope(), &at, issues, &Followed::default());
                    out.insert(name.clone(), checked);
                }
                None => match &param.default {
                    Some(default) => {
                        out.insert(name.clone(), default.clone());
                    }
                    None if !param.optional => {
                        issues.push(Issue::of(IssueCode::FieldMissing, child(path, name.as_str())));
                    }
                    None => {}
                },
            }
        }
        for name in map.keys().filter(|name| !shape.contains(name)) {
            issues.push(Issue::of(IssueCode::FieldUnknown, child(path, name.as_str())));
        }
        out
    }

    fn param(
        &self,
        value: &Value,
        param: &Param,
        scope: &Scope,
        path: &[PathSegment],
        issues: &mut Vec<Issue>,
        followed: &Followed<'_>,
    ) -> Value {
        if value.is_null() {
            if !param.nullable {
                issues.push(Issue::of(IssueCode::ValueNull, path.to_vec()));
            }
            return Value::Null;
        }
        match &param.kind {
            ParamKind::Primitive(primitive) => {
                if matches_primitive(value, *primitive) {
                    self.bounds(value, param, path, issues);
                } else {
                    issues.push(type_invalid(path, primitive.name(), value));
                }
                value.clone()
            }
            ParamKind::Literal(expected) => {
                if value != expected {
                    issues.push(Issue::of(IssueCode::ValueInvalid, path.to_vec()).with_meta("expected", expected.clone()));
                }
                value.clone()
            }
            ParamKind::Object(shape) => match value {
                Value::Object(map) => Value::Object(self.object(map, shape, path, issues)),
                other => {
                    issues.push(type_invalid(path, "object", other));
                    other.clone()
                }
            },
            ParamKind::Array(of) => match value {
                Value::Array(items) => {
                    self.bounds(value, param, path, issues);
                    let checked = items
                        .iter()
                        .enumerate()
                        .map(|(index, item)| {
                            self.param(item, of, scope, &child(path, index), issues, &Followed::default())
                        })
                        .collect();
                    Value::Array(checked)
                }
                other => {
                    issues.push(type_invalid(path, "array", other));
                    other.clone()
                }
            },
            ParamKind::Union(union) => self.union(value, union, scope, path, issues, followed),
            ParamKind::Reference(name) => match self.resolver.resolve(name, scope) {
                Target::Type(_) if followed.contains(scope, name) => {
                    debug!(reference = %name, %scope, "reference cycle matches nothing");
                    issues.push(Issue::of(IssueCode::ValueInvalid, path.to_vec()).with_meta("reference", name.as_str()));
                    value.clone()
                }
                Target::Type(def) => {
                    self.param(value, &def.root, &def.scope, path, issues, &followed.with(scope, name))
                }
                Target::Enum(descriptor) => {
                    match value.as_str() {
                        None => issues.push(type_invalid(path, "string", value)),
                        Some(s) if !descriptor.contains(s) => issues.push(
                            Issue::of(IssueCode::ValueInvalid, path.to_vec())
                                .with_meta("allowed", descriptor.values().to_vec()),
                        ),
                        Some(_) => {}
                    }
                    value.clone()
                }
                Target::Unresolved => value.clone(),
            },
        }
    }

    /// Length or magnitude against the param's `min`/`max`.
    fn bounds(&self, value: &Value, param: &Param, path: &[PathSegment], issues: &mut Vec<Issue>) {
        let (measured, too_small, too_large) = match value {
            Value::String(s) => (s.chars().count() as f64, IssueCode::StringTooShort, IssueCode::StringTooLong),
            Value::Array(items) => (items.len() as f64, IssueCode::ArrayTooSmall, IssueCode::ArrayTooLarge),
            Value::Number(n) => match n.as_f64() {
                Some(f) => (f, IssueCode::NumberTooSmall, IssueCode::NumberTooLarge),
                None => return,
            },
            _ => return,
        };
        if let Some(min) = param.min.filter(|min| measured < *min) {
            issues.push(Issue::of(too_small, path.to_vec()).with_meta("min", min));
        }
        if let Some(max) = param.max.filter(|max| measured > *max) {
            issues.push(Issue::of(too_large, path.to_vec()).with_meta("max", max));
        }
    }

    /// Tagged unions select by discriminator; untagged ones take the first
    /// variant that validates cleanly.
    fn union(
        &self,
        value: &Value,
        union: &Union,
        scope: &Scope,
        path: &[PathSegment],
        issues: &mut Vec<Issue>,
        followed: &Followed<'_>,
    ) -> Value {
        if let Some(discriminator) = &union.discriminator {
            return self.tagged(value, union, discriminator, scope, path, issues, followed);
        }
        for variant in &union.variants {
            let mut scratch = Vec::new();
            let checked = self.param(value, &variant.param, scope, path, &mut scratch, followed);
            if scratch.is_empty() {
                return checked;
            }
        }
        let kinds: Vec<&str> = union.variants.iter().map(|v| v.param.kind.kind_name()).collect();
        issues.push(Issue::of(IssueCode::ValueInvalid, path.to_vec()).with_meta("variants", kinds));
        value.clone()
    }

    #[allow(clippy::too_many_arguments)]
    fn tagged(
        &self,
        value: &Value,
        union: &Union,
        discriminator: &str,
        scope: &Scope,
        path: &[PathSegment],
        issues: &mut Vec<Issue>,
        followed: &Followed<'_>,
    ) -> Value {
        let Value::Object(map) = value else {
            issues.push(type_invalid(path, "object", value));
            return value.clone();
        };
        let Some(tag) = map.get(discriminator) else {
            issues.push(Issue::of(IssueCode::FieldMissing, child(path, discriminator)));
            return value.clone();
        };
        let Some(variant) = union.select_tagged(value) else {
            let tags: Vec<&str> = union.variants.iter().filter_map(|v| v.tag.as_deref()).collect();
            issues.push(Issue::of(IssueCode::ValueInvalid, child(path, discriminator)).with_meta("allowed", tags));
            return value.clone();
        };

        // The discriminator belongs to the union, not necessarily to the variant's shape.
        let declared = self
            .resolver
            .object_of(&variant.param, scope)
            .and_then(|object| object.shape().map(|shape| shape.contains(discriminator)))
            .unwrap_or(true);
        if declared {
            return self.param(value, &variant.param, scope, path, issues, followed);
        }
        let mut rest = map.clone();
        rest.remove(discriminator);
        let mut checked = self.param(&Value::Object(rest), &variant.param, scope, path, issues, followed);
        if let Value::Object(out) = &mut checked {
            out.insert(discriminator.to_string(), tag.clone());
        }
        checked
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
