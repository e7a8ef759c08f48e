//! Declare-time errors. These are fatal: nothing in the crate recovers from them.
use thiserror::Error;

use crate::registry::Scope;

#[derive(Debug, Error)]
pub enum DeclareError {
    #[error("{kind} `{name}` is already registered globally")]
    DuplicateGlobal { kind: &'static str, name: String },

    #[error("registry is frozen; cannot register {kind} `{name}` in {scope}")]
    Frozen { kind: &'static str, name: String, scope: Scope },

    #[error("invalid option for `{name}`: {reason}")]
    InvalidOption { name: String, reason: String },

    #[error("unknown entity `{0}`")]
    UnknownEntity(String),

    #[error("declaration document: at JSON path {path} → {message}")]
    Document { path: String, message: String },
}

impl DeclareError {
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption { name: name.into(), reason: reason.into() }
    }
}

pub type DeclareResult<T> = Result<T, DeclareError>;
