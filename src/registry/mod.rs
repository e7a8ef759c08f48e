//! Descriptor registry.
//!
//! A registry is booted (`Registry::new`), filled with type and enum
//! declarations, then frozen. Registration after `freeze` is an error, so the
//! load-then-serve lifecycle is enforced rather than conventional. Once frozen
//! the registry is `Send + Sync` and only read; expansion is memoized through a
//! thread-safe `OnceCell` per descriptor.
//!
//! Lookup is two-tier: owner-local first, then global. A missing name is
//! `None`, never an error, so forward and cross-scope references degrade to
//! "unresolved".
pub mod descriptor;
pub mod serialize;
pub mod store;

use std::sync::Arc;

use tracing::debug;

use crate::error::{DeclareError, DeclareResult};
use crate::ir::{Definition, Param, Union, Variant};

pub use descriptor::{Descriptor, EnumDescriptor, Scope, TypeDef, TypeDescriptor, expand};
pub use serialize::Serialized;
pub use store::DescriptorStore;

/// Suffix of the filter union synthesized for every enum.
pub const FILTER_SUFFIX: &str = "_filter";

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Default)]
pub struct Registry {
    store: DescriptorStore,
    frozen: bool,
}

/// Result of resolving a name in a scope.
#[derive(Debug, Clone)]
pub enum Resolved {
    Type(Arc<TypeDescriptor>),
    Enum(Arc<EnumDescriptor>),
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Registry {
    /// A registry in its boot phase.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn freeze(&mut self) {
        debug!(
            types = self.store.types().len(),
            enums = self.store.enums().len(),
            "registry frozen"
        );
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn store(&self) -> &DescriptorStore {
        &self.store
    }

    fn ensure_booting(&self, kind: &'static str, name: &str, scope: &Scope) -> DeclareResult<()> {
        if self.frozen {
            return Err(DeclareError::Frozen { kind, name: name.to_string(), scope: scope.clone() });
        }
        Ok(())
    }

    /// Register a type and return its qualified name.
    pub fn register_type(&mut self, scope: &Scope, name: &str, def: TypeDef) -> DeclareResult<String> {
        self.ensure_booting(TypeDescriptor::KIND, name, scope)?;
        let descriptor = self
            .store
            .types_mut()
            .register(scope, TypeDescriptor::new(scope, name, def))?;
        Ok(descriptor.qualified_name().to_string())
    }

    /// Register an enum, plus its `<name>_filter` union unless the scope already has one.
    pub fn register_enum(&mut self, scope: &Scope, name: &str, values: Vec<String>) -> DeclareResult<String> {
        self.register_enum_described(scope, name, values, None)
    }

    pub fn register_enum_described(
        &mut self,
        scope: &Scope,
        name: &str,
        values: Vec<String>,
        description: Option<String>,
    ) -> DeclareResult<String> {
        self.ensure_booting(EnumDescriptor::KIND, name, scope)?;
        if values.is_empty() {
            return Err(DeclareError::invalid(name, "enum needs at least one value"));
        }
        let descriptor = EnumDescriptor::new(scope, name, values).with_description(description);
        let descriptor = self.store.enums_mut().register(scope, descriptor)?;

        let filter_name = format!("{name}{FILTER_SUFFIX}");
        if self.store.types().get(&filter_name, scope).is_none() {
            debug!(enum_name = name, filter = %filter_name, "synthesizing enum filter");
            self.register_type(scope, &filter_name, enum_filter(name))?;
        }
        Ok(descriptor.qualified_name().to_string())
    }

    /// Owner-local types, then local enums, then global, then qualified names.
    pub fn resolve(&self, name: &str, scope: &Scope) -> Option<Resolved> {
        let types = self.store.types();
        let enums = self.store.enums();
        if let Scope::Owner(_) = scope {
            if let Some(found) = types.get(name, scope) {
                return Some(Resolved::Type(found));
            }
            if let Some(found) = enums.get(name, scope) {
                return Some(Resolved::Enum(found));
            }
        }
        if let Some(found) = types.get(name, &Scope::Global) {
            return Some(Resolved::Type(found));
        }
        if let Some(found) = enums.get(name, &Scope::Global) {
            return Some(Resolved::Enum(found));
        }
        types
            .get_qualified(name)
            .map(Resolved::Type)
            .or_else(|| enums.get_qualified(name).map(Resolved::Enum))
    }

    pub fn resolve_type(&self, name: &str, scope: &Scope) -> Option<Arc<TypeDescriptor>> {
        match self.resolve(name, scope)? {
            Resolved::Type(found) => Some(found),
            Resolved::Enum(_) => None,
        }
    }

    pub fn resolve_enum(&self, name: &str, scope: &Scope) -> Option<Arc<EnumDescriptor>> {
        match self.resolve(name, scope)? {
            Resolved::Enum(found) => Some(found),
            Resolved::Type(_) => None,
        }
    }

    /// Expanded definition of a type, if it resolves.
    pub fn definition(&self, name: &str, scope: &Scope) -> Option<Arc<Definition>> {
        self.resolve_type(name, scope).map(|t| t.definition())
    }

    /// Whether `name` is registered in exactly `scope` (no fallback).
    pub fn has_type_in(&self, name: &str, scope: &Scope) -> bool {
        self.store.types().get(name, scope).is_some()
    }

    /// Qualified name a reference resolves to from `scope`.
    pub fn qualified_name_of(&self, name: &str, scope: &Scope) -> Option<String> {
        match self.resolve(name, scope)? {
            Resolved::Type(found) => Some(found.qualified_name().to_string()),
            Resolved::Enum(found) => Some(found.qualified_name().to_string()),
        }
    }

    pub fn serialize_all(&self) -> Serialized {
        serialize::serialize(self, None)
    }

    pub fn serialize_scope(&self, scope: &Scope) -> Serialized {
        serialize::serialize(self, Some(scope))
    }
}

/// `<enum>` or `{eq?: <enum>, in?: [<enum>]}`.
fn enum_filter(enum_name: &str) -> TypeDef {
    let enum_name = enum_name.to_string();
    TypeDef::union_with(move |b| {
        let operators = b.object(|s| {
            s.field("eq", Param::reference(enum_name.clone()).optional());
            s.field("in", Param::array(Param::reference(enum_name.clone())).optional());
        });
        Union::new(vec![
            Variant::new(Param::reference(enum_name.clone())),
            Variant::new(operators),
        ])
    })
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ParamKind;

    fn status_values() -> Vec<String> {
        vec!["draft".into(), "sent".into()]
    }

    #[test]
    fn enum_registers_filter_union() {
        let mut registry = Registry::new();
        registry.register_enum(&Scope::Global, "status", status_values()).unwrap();

        let filter = registry.definition("status_filter", &Scope::Global).unwrap();
        let union = filter.union().expect("filter is a union");
        assert_eq!(union.variants.len(), 2);
        assert!(matches!(&union.variants[0].param.kind, ParamKind::Reference(n) if n == "status"));
        let ParamKind::Object(ops) = &union.variants[1].param.kind else {
            panic!("second variant must be an object");
        };
        assert!(ops.get("eq").unwrap().optional);
        let in_param = ops.get("in").unwrap();
        assert!(in_param.optional);
        assert!(matches!(&in_param.kind, ParamKind::Array(of) if matches!(&of.kind, ParamKind::Reference(n) if n == "status")));
    }

    #[test]
    fn local_enum_filter_is_synthesized_once() {
        let mut registry = Registry::new();
        let scope = Scope::owner("invoice");
        registry.register_enum(&scope, "status", status_values()).unwrap();
        let before = registry.resolve_type("status_filter", &scope).unwrap();
        registry.register_enum(&scope, "status", vec!["paid".into()]).unwrap();
        let after = registry.resolve_type("status_filter", &scope).unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.qualified_name(), "invoice_status_filter");
        assert_eq!(registry.resolve_enum("status", &scope).unwrap().values(), ["paid"]);
    }

    #[test]
    fn registration_after_freeze_fails() {
        let mut registry = Registry::new();
        registry.freeze();
        let err = registry
            .register_type(&Scope::Global, "address", TypeDef::object(|_| {}))
            .unwrap_err();
        assert!(matches!(err, DeclareError::Frozen { .. }));
        assert!(registry.register_enum(&Scope::Global, "status", status_values()).is_err());
    }

    #[test]
    fn empty_enum_is_rejected() {
        let mut registry = Registry::new();
        let err = registry.register_enum(&Scope::Global, "status", vec![]).unwrap_err();
        assert!(matches!(err, DeclareError::InvalidOption { .. }));
    }

    #[test]
    fn resolving_twice_is_structurally_equal() {
        let mut registry = Registry::new();
        let scope = Scope::owner("invoice");
        registry
            .register_type(&scope, "line", TypeDef::object(|s| {
                s.field("amount", Param::integer().min(1.0));
            }))
            .unwrap();
        let a = registry.definition("line", &scope).unwrap();
        let b = registry.definition("line", &scope).unwrap();
        assert_eq!(format!("{a:?}"), format!("{b:?}"));
        assert!(registry.definition("missing", &scope).is_none());
    }

    #[test]
    fn local_enum_shadows_global_type() {
        let mut registry = Registry::new();
        let scope = Scope::owner("invoice");
        registry.register_type(&Scope::Global, "status", TypeDef::object(|_| {})).unwrap();
        registry.register_enum(&scope, "status", status_values()).unwrap();
        assert!(matches!(registry.resolve("status", &scope), Some(Resolved::Enum(_))));
        assert!(matches!(registry.resolve("status", &Scope::Global), Some(Resolved::Type(_))));
    }
}
