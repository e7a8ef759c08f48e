//! API names to internal names.
//!
//! Present fields are renamed through their `as` option, nested objects and
//! references are followed, and a `store` literal replaces whatever the client
//! sent for that field. Tagged unions pick their variant from the payload's own
//! discriminator before recursing.
use serde_json::Value;
use tracing::trace;

use crate::ir::{Definition, Param, Shape};
use crate::registry::Registry;
use super::walk::{Rewrite, Walker};
use super::{Followed, Resolver};

pub struct Transformer<'r> {
    walker: Walker<'r, Renaming>,
}

struct Renaming;

impl Rewrite for Renaming {
    fn key<'k>(&self, name: &'k str, param: &'k Param) -> &'k str {
        param.rename.as_deref().unwrap_or(name)
    }

    fn finish(&self, value: Value, param: &Param) -> Value {
        match &param.store {
            Some(stored) => {
                trace!(from = %value, to = %stored, "store literal applied");
                stored.clone()
            }
            None => value,
        }
    }
}

impl<'r> Transformer<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { walker: Walker::new(Resolver::new(registry), Renaming) }
    }

    /// Non-object payloads come back unchanged.
    pub fn transform(&self, payload: &Value, shape: &Shape) -> Value {
        match payload {
            Value::Object(map) => Value::Object(self.walker.object(map, shape)),
            other => other.clone(),
        }
    }

    pub fn transform_definition(&self, payload: &Value, definition: &Definition) -> Value {
        self.walker.param(payload, &definition.root, &definition.scope, &Followed::default())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
