//! Request-time passes over untyped payloads.
//!
//! Each pass walks a [`Shape`] against a `serde_json::Value` and reads the
//! (frozen) registry only to resolve references:
//!
//! - `coerce`: best-effort scalar conversion toward declared primitives.
//! - `validate`: exhaustive issue collection plus defaults.
//! - `transform`: API names to internal names, store literals.
//! - `deserialize`: decode functions on values leaving storage.
//!
//! [`RequestPipeline`] chains the first three.
mod coerce;
mod deserialize;
pub mod scalar;
mod transform;
mod validate;
mod walk;

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::ir::{Definition, Param, ParamKind, Shape};
use crate::registry::{EnumDescriptor, Registry, Resolved, Scope};

pub use coerce::Coercer;
pub use deserialize::Deserializer;
pub use scalar::coerce_value;
pub use transform::Transformer;
pub use validate::{Validation, Validator};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// What a reference points at, from the point of view of a pass.
#[derive(Debug, Clone)]
pub(crate) enum Target {
    Type(Arc<Definition>),
    Enum(Arc<EnumDescriptor>),
    Unresolved,
}

/// Reference resolution with a cache scoped to one request.
pub(crate) struct Resolver<'r> {
    registry: &'r Registry,
    cache: RefCell<HashMap<(Scope, String), Target>>,
}

/// An object shape reached either inline or through a named type.
pub(crate) enum ObjectRef<'p> {
    Inline(&'p Shape),
    Named(Arc<Definition>),
}

/// References followed at the current value position, as a borrowed parent
/// chain. A pass starts a fresh chain whenever it descends into a field or an
/// item; a reference already on the chain is a cycle that consumes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Followed<'a> {
    reference: Option<(&'a Scope, &'a str)>,
    parent: Option<&'a Followed<'a>>,
}

/// Coerce, validate and transform in one call.
pub struct RequestPipeline<'r> {
    registry: &'r Registry,
    coerce: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl<'r> Resolver<'r> {
    pub(crate) fn new(registry: &'r Registry) -> Self {
        Self { registry, cache: RefCell::new(HashMap::new()) }
    }

    pub(crate) fn resolve(&self, name: &str, scope: &Scope) -> Target {
        let key = (scope.clone(), name.to_string());
        if let Some(hit) = self.cache.borrow().get(&key) {
            return hit.clone();
        }
        let target = match self.registry.resolve(name, scope) {
            Some(Resolved::Type(found)) => Target::Type(found.definition()),
            Some(Resolved::Enum(found)) => Target::Enum(found),
            None => {
                debug!(reference = name, %scope, "unresolved reference treated as unknown");
                Target::Unresolved
            }
        };
        self.cache.borrow_mut().insert(key, target.clone());
        target
    }

    /// The object shape `param` stands for, following one reference.
    pub(crate) fn object_of<'p>(&self, param: &'p Param, scope: &Scope) -> Option<ObjectRef<'p>> {
        match &param.kind {
            ParamKind::Object(shape) => Some(ObjectRef::Inline(shape)),
            ParamKind::Reference(name) => match self.resolve(name, scope) {
                Target::Type(def) if def.shape().is_some() => Some(ObjectRef::Named(def)),
                _ => None,
            },
            _ => None,
        }
    }
}

impl<'a> Followed<'a> {
    pub(crate) fn with(&'a self, scope: &'a Scope, name: &'a str) -> Followed<'a> {
        Followed { reference: Some((scope, name)), parent: Some(self) }
    }

    pub(crate) fn contains(&self, scope: &Scope, name: &str) -> bool {
        let mut cursor = Some(self);
        while let Some(link) = cursor {
            if link.reference.is_some_and(|(s, n)| s == scope && n == name) {
                return true;
            }
            cursor = link.parent;
        }
        false
    }
}

impl ObjectRef<'_> {
    pub(crate) fn shape(&self) -> Option<&Shape> {
        match self {
            Self::Inline(shape) => Some(shape),
            Self::Named(def) => def.shape(),
        }
    }
}

impl<'r> RequestPipeline<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry, coerce: true }
    }

    /// Skip the coercion pass; payloads are validated as sent.
    pub fn without_coercion(mut self) -> Self {
        self.coerce = false;
        self
    }

    /// Run the passes against an object shape. `params` on the result holds
    /// the transformed payload.
    pub fn process(&self, payload: &Value, shape: &Shape) -> Validation {
        let coerced = if self.coerce {
            Coercer::new(self.registry).coerce(payload, shape)
        } else {
            payload.clone()
        };
        let validation = Validator::new(self.registry).validate(&coerced, shape);
        trace!(issues = validation.issues.len(), "validated payload");
        let params = Transformer::new(self.registry).transform(&validation.params, shape);
        Validation { params, ..validation }
    }

    /// Same as [`process`](Self::process) for a registered type, whose root
    /// may also be a union. `None` when the name does not resolve to a type.
    pub fn process_type(&self, payload: &Value, name: &str, scope: &Scope) -> Option<Validation> {
        let definition = self.registry.definition(name, scope)?;
        let coerced = if self.coerce {
            Coercer::new(self.registry).coerce_definition(payload, &definition)
        } else {
            payload.clone()
        };
        let validation = Validator::new(self.registry).validate_definition(&coerced, &definition);
        let params = Transformer::new(self.registry).transform_definition(&validation.params, &definition);
        Some(Validation { params, ..validation })
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
