//! Structural type registry and request pipeline for JSON APIs.
//!
//! Types are declared once (directly, through a [`decl::Document`], or
//! derived from an [`catalog::EntityCatalog`] by the [`builder`]), stored as
//! deferred builders in a [`registry::Registry`], and expanded on first use.
//! Requests are then run through the [`pipeline`]: coerce, validate,
//! transform, and on the way back out, deserialize.
pub mod builder;
pub mod catalog;
pub mod decl;
pub mod error;
pub mod ir;
pub mod issue;
pub mod pipeline;
pub mod registry;

pub use error::{DeclareError, DeclareResult};
pub use ir::{Definition, Param, ParamKind, Primitive, Shape, Union, Variant};
pub use issue::{Issue, IssueCode, PathSegment};
pub use pipeline::{RequestPipeline, Validation};
pub use registry::{Registry, Scope, TypeDef};
