//! Descriptors: a short name, its scope-qualified name, and a deferred payload.
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::ir::{Definition, Param, ShapeBuilder, Union};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Namespace a descriptor is registered under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    #[default]
    Global,
    /// Owner-local namespace identified by its prefix.
    Owner(String),
}

pub type ObjectBuildFn = Arc<dyn Fn(&mut ShapeBuilder) + Send + Sync>;
pub type UnionBuildFn = Arc<dyn Fn(&ShapeBuilder) -> Union + Send + Sync>;

/// Deferred type payload. Nothing runs until the descriptor is first expanded.
#[derive(Clone)]
pub enum TypeDef {
    Object { build: ObjectBuildFn, description: Option<String> },
    Union { build: UnionBuildFn, description: Option<String> },
}

pub struct TypeDescriptor {
    short_name: String,
    qualified_name: String,
    owner: Option<String>,
    def: TypeDef,
    expanded: OnceCell<Arc<Definition>>,
}

#[derive(Debug, Clone)]
pub struct EnumDescriptor {
    short_name: String,
    qualified_name: String,
    owner: Option<String>,
    values: Vec<String>,
    description: Option<String>,
}

/// Common accessors used by the store's namespaces.
pub trait Descriptor {
    const KIND: &'static str;
    fn short_name(&self) -> &str;
    fn qualified_name(&self) -> &str;
    fn owner(&self) -> Option<&str>;

    fn scope(&self) -> Scope {
        match self.owner() {
            Some(prefix) => Scope::Owner(prefix.to_string()),
            None => Scope::Global,
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Scope {
    pub fn owner(prefix: impl Into<String>) -> Self {
        Self::Owner(prefix.into())
    }

    pub fn prefix(&self) -> Option<&str> {
        match self {
            Self::Global => None,
            Self::Owner(prefix) => Some(prefix),
        }
    }

    /// Owner prefix alone for the empty short name (the owner's root type),
    /// `<prefix>_<name>` otherwise. Global names are their own qualified name.
    pub fn qualify(&self, name: &str) -> String {
        match self {
            Self::Global => name.to_string(),
            Self::Owner(prefix) if name.is_empty() => prefix.clone(),
            Self::Owner(prefix) => format!("{prefix}_{name}"),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global scope"),
            Self::Owner(prefix) => write!(f, "scope `{prefix}`"),
        }
    }
}

impl TypeDef {
    pub fn object(build: impl Fn(&mut ShapeBuilder) + Send + Sync + 'static) -> Self {
        Self::Object { build: Arc::new(build), description: None }
    }

    /// Object built from an already-assembled field list.
    pub fn fields(fields: Vec<(String, Param)>) -> Self {
        Self::object(move |s| {
            for (name, param) in &fields {
                s.field(name.clone(), param.clone());
            }
        })
    }

    pub fn union(union: Union) -> Self {
        Self::union_with(move |_| union.clone())
    }

    /// Union whose variants may need inline objects bound to the owning scope.
    pub fn union_with(build: impl Fn(&ShapeBuilder) -> Union + Send + Sync + 'static) -> Self {
        Self::Union { build: Arc::new(build), description: None }
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        match &mut self {
            Self::Object { description, .. } | Self::Union { description, .. } => {
                *description = Some(text.into());
            }
        }
        self
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object { description, .. } => f.debug_struct("Object").field("description", description).finish(),
            Self::Union { description, .. } => f.debug_struct("Union").field("description", description).finish(),
        }
    }
}

/// Run a deferred builder against a fresh builder bound to `scope`.
pub fn expand(def: &TypeDef, scope: &Scope) -> Definition {
    match def {
        TypeDef::Object { build, description } => {
            let mut builder = ShapeBuilder::new(scope.clone());
            build(&mut builder);
            Definition {
                scope: scope.clone(),
                root: Param::object(builder.build()),
                description: description.clone(),
            }
        }
        TypeDef::Union { build, description } => {
            let builder = ShapeBuilder::new(scope.clone());
            Definition {
                scope: scope.clone(),
                root: Param::union(build(&builder)),
                description: description.clone(),
            }
        }
    }
}

impl TypeDescriptor {
    pub fn new(scope: &Scope, short_name: impl Into<String>, def: TypeDef) -> Self {
        let short_name = short_name.into();
        Self {
            qualified_name: scope.qualify(&short_name),
            owner: scope.prefix().map(str::to_string),
            short_name,
            def,
            expanded: OnceCell::new(),
        }
    }

    /// Expanded definition, built on first use and cached afterwards.
    pub fn definition(&self) -> Arc<Definition> {
        self.expanded
            .get_or_init(|| {
                tracing::trace!(name = %self.qualified_name, "expanding type");
                Arc::new(expand(&self.def, &self.scope()))
            })
            .clone()
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded.get().is_some()
    }
}

impl Descriptor for TypeDescriptor {
    const KIND: &'static str = "type";
    fn short_name(&self) -> &str { &self.short_name }
    fn qualified_name(&self) -> &str { &self.qualified_name }
    fn owner(&self) -> Option<&str> { self.owner.as_deref() }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("qualified_name", &self.qualified_name)
            .field("def", &self.def)
            .field("expanded", &self.is_expanded())
            .finish()
    }
}

impl EnumDescriptor {
    pub fn new(scope: &Scope, short_name: impl Into<String>, values: Vec<String>) -> Self {
        let short_name = short_name.into();
        Self {
            qualified_name: scope.qualify(&short_name),
            owner: scope.prefix().map(str::to_string),
            short_name,
            values,
            description: None,
        }
    }

    pub fn with_description(mut self, text: Option<String>) -> Self {
        self.description = text;
        self
    }

    pub fn values(&self) -> &[String] { &self.values }
    pub fn description(&self) -> Option<&str> { self.description.as_deref() }

    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

impl Descriptor for EnumDescriptor {
    const KIND: &'static str = "enum";
    fn short_name(&self) -> &str { &self.short_name }
    fn qualified_name(&self) -> &str { &self.qualified_name }
    fn owner(&self) -> Option<&str> { self.owner.as_deref() }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn qualified_names() {
        let invoice = Scope::owner("invoice");
        assert_eq!(invoice.qualify(""), "invoice");
        assert_eq!(invoice.qualify("include"), "invoice_include");
        assert_eq!(Scope::Global.qualify("address"), "address");
    }

    #[test]
    fn expansion_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let descriptor = TypeDescriptor::new(&Scope::owner("invoice"), "line", TypeDef::object(move |s| {
            counter.fetch_add(1, Ordering::SeqCst);
            s.field("amount", Param::integer());
        }));
        assert!(!descriptor.is_expanded());
        let first = descriptor.definition();
        let second = descriptor.definition();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.scope, Scope::owner("invoice"));
        assert!(first.shape().unwrap().contains("amount"));
    }
}
