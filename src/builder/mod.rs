//! Derived type synthesis over the entity graph.
//!
//! - `tree`: include and sort selection trees, bounded by [`MAX_DEPTH`] and
//!   the [`Visited`] path.
//! - `union`: discriminated unions for STI variants and polymorphic
//!   associations.
//! - `representation`: an entity's own root type from its attributes and
//!   associations.
//!
//! Everything built here is registered, so builders run during boot, before
//! the registry is frozen. Registration doubles as memoization: a name that is
//! already present is reused instead of rebuilt.
mod representation;
mod tree;
mod union;

use crate::catalog::EntityCatalog;
use crate::registry::Registry;

/// Deepest nesting level a derived tree may reach.
pub const MAX_DEPTH: usize = 3;

/// Global enum referenced by every sortable leaf.
pub const SORT_DIRECTION: &str = "sort_direction";

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeKind {
    Include,
    Sort,
}

/// Entities expanded on the current path, as a borrowed parent chain.
/// Branching pushes a new link on the stack; siblings never see each other.
#[derive(Debug, Clone, Copy, Default)]
pub struct Visited<'a> {
    entity: Option<&'a str>,
    parent: Option<&'a Visited<'a>>,
}

pub struct TypeBuilder<'a, C: EntityCatalog + ?Sized> {
    registry: &'a mut Registry,
    catalog: &'a C,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl TreeKind {
    pub fn base_name(self) -> &'static str {
        match self {
            Self::Include => "include",
            Self::Sort => "sort",
        }
    }

    /// Name of the derived type for `entity` at `depth`.
    pub fn type_name(self, entity: &str, depth: usize) -> String {
        if depth == 0 {
            self.base_name().to_string()
        } else {
            format!("{entity}_{}", self.base_name())
        }
    }
}

impl<'a> Visited<'a> {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn with(&'a self, entity: &'a str) -> Visited<'a> {
        Visited { entity: Some(entity), parent: Some(self) }
    }

    pub fn contains(&self, name: &str) -> bool {
        let mut cursor = Some(self);
        while let Some(link) = cursor {
            if link.entity == Some(name) {
                return true;
            }
            cursor = link.parent;
        }
        false
    }

    pub fn len(&self) -> usize {
        let mut n = 0;
        let mut cursor = Some(self);
        while let Some(link) = cursor {
            n += usize::from(link.entity.is_some());
            cursor = link.parent;
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a, C: EntityCatalog + ?Sized> TypeBuilder<'a, C> {
    pub fn new(registry: &'a mut Registry, catalog: &'a C) -> Self {
        Self { registry, catalog }
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    pub fn catalog(&self) -> &'a C {
        self.catalog
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
