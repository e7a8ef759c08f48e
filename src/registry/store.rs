//! Dual-scope descriptor store.
//!
//! Each namespace keeps a global table, one table per owner, and an index by
//! qualified name. Global names are unique; owner-local names overwrite.
use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::{DeclareError, DeclareResult};
use super::descriptor::{Descriptor, EnumDescriptor, Scope, TypeDescriptor};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug)]
pub struct Namespace<D> {
    global: IndexMap<String, Arc<D>>,
    local: IndexMap<String, IndexMap<String, Arc<D>>>,
    qualified: HashMap<String, Arc<D>>,
}

#[derive(Debug, Default)]
pub struct DescriptorStore {
    types: Namespace<TypeDescriptor>,
    enums: Namespace<EnumDescriptor>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl<D> Default for Namespace<D> {
    fn default() -> Self {
        Self { global: IndexMap::new(), local: IndexMap::new(), qualified: HashMap::new() }
    }
}

impl<D: Descriptor> Namespace<D> {
    /// Fails if `descriptor`'s short name already exists globally.
    pub fn register_global(&mut self, descriptor: D) -> DeclareResult<Arc<D>> {
        let name = descriptor.short_name().to_string();
        if self.global.contains_key(&name) {
            return Err(DeclareError::DuplicateGlobal { kind: D::KIND, name });
        }
        let descriptor = Arc::new(descriptor);
        debug!(kind = D::KIND, name = %name, "registered global");
        self.qualified.insert(descriptor.qualified_name().to_string(), descriptor.clone());
        self.global.insert(name, descriptor.clone());
        Ok(descriptor)
    }

    /// Always succeeds; a previous descriptor under the same owner and name is replaced.
    pub fn register_local(&mut self, owner: &str, descriptor: D) -> Arc<D> {
        let name = descriptor.short_name().to_string();
        let descriptor = Arc::new(descriptor);
        let table = self.local.entry(owner.to_string()).or_default();
        if table.insert(name.clone(), descriptor.clone()).is_some() {
            warn!(kind = D::KIND, owner, name = %name, "overwrote local declaration");
        } else {
            debug!(kind = D::KIND, owner, name = %name, "registered local");
        }
        self.qualified.insert(descriptor.qualified_name().to_string(), descriptor.clone());
        descriptor
    }

    pub fn register(&mut self, scope: &Scope, descriptor: D) -> DeclareResult<Arc<D>> {
        match scope {
            Scope::Global => self.register_global(descriptor),
            Scope::Owner(owner) => Ok(self.register_local(owner, descriptor)),
        }
    }

    /// Exact-scope lookup with no fallback.
    pub fn get(&self, name: &str, scope: &Scope) -> Option<Arc<D>> {
        match scope {
            Scope::Global => self.global.get(name).cloned(),
            Scope::Owner(owner) => self.local.get(owner)?.get(name).cloned(),
        }
    }

    pub fn get_qualified(&self, qualified_name: &str) -> Option<Arc<D>> {
        self.qualified.get(qualified_name).cloned()
    }

    /// Owner-local first, then global, then by qualified name.
    pub fn resolve(&self, name: &str, scope: &Scope) -> Option<Arc<D>> {
        if let Scope::Owner(_) = scope {
            if let Some(found) = self.get(name, scope) {
                return Some(found);
            }
        }
        self.global.get(name).cloned().or_else(|| self.get_qualified(name))
    }

    /// Global descriptors first, then each owner's locals in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<D>> {
        self.global.values().chain(self.local.values().flat_map(|table| table.values()))
    }

    pub fn in_scope(&self, scope: &Scope) -> Vec<Arc<D>> {
        match scope {
            Scope::Global => self.global.values().cloned().collect(),
            Scope::Owner(owner) => self
                .local
                .get(owner)
                .map(|table| table.values().cloned().collect())
                .unwrap_or_default(),
        }
    }

    pub fn len(&self) -> usize {
        self.global.len() + self.local.values().map(IndexMap::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DescriptorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn types(&self) -> &Namespace<TypeDescriptor> { &self.types }
    pub fn types_mut(&mut self) -> &mut Namespace<TypeDescriptor> { &mut self.types }
    pub fn enums(&self) -> &Namespace<EnumDescriptor> { &self.enums }
    pub fn enums_mut(&mut self) -> &mut Namespace<EnumDescriptor> { &mut self.enums }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Param;
    use crate::registry::TypeDef;

    fn object(field: &'static str) -> TypeDef {
        TypeDef::object(move |s| {
            s.field(field, Param::string());
        })
    }

    #[test]
    fn duplicate_global_is_fatal() {
        let mut ns = Namespace::<TypeDescriptor>::default();
        ns.register_global(TypeDescriptor::new(&Scope::Global, "address", object("street"))).unwrap();
        let err = ns
            .register_global(TypeDescriptor::new(&Scope::Global, "address", object("city")))
            .unwrap_err();
        assert!(matches!(err, DeclareError::DuplicateGlobal { kind: "type", .. }));
    }

    #[test]
    fn local_overwrites_and_shadows_global() {
        let owner = Scope::owner("invoice");
        let mut ns = Namespace::<TypeDescriptor>::default();
        ns.register(&Scope::Global, TypeDescriptor::new(&Scope::Global, "address", object("street"))).unwrap();
        ns.register(&owner, TypeDescriptor::new(&owner, "address", object("city"))).unwrap();
        ns.register(&owner, TypeDescriptor::new(&owner, "address", object("zip"))).unwrap();

        let local = ns.resolve("address", &owner).unwrap();
        assert_eq!(local.qualified_name(), "invoice_address");
        assert!(local.definition().shape().unwrap().contains("zip"));

        let global = ns.resolve("address", &Scope::owner("customer")).unwrap();
        assert_eq!(global.qualified_name(), "address");
        assert_eq!(ns.len(), 2);
    }

    #[test]
    fn resolve_by_qualified_name_and_missing() {
        let owner = Scope::owner("customer");
        let mut ns = Namespace::<TypeDescriptor>::default();
        ns.register(&owner, TypeDescriptor::new(&owner, "include", object("orders"))).unwrap();
        let found = ns.resolve("customer_include", &Scope::owner("invoice")).unwrap();
        assert_eq!(found.short_name(), "include");
        assert!(ns.resolve("nope", &owner).is_none());
    }
}
