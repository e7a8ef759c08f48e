//! Discriminated unions over entity variants.
//!
//! A variant contributes only when its entity already has a root type in its
//! own scope (the "companion" type). Variants without one are skipped; a union
//! with no variants left is not built.
use tracing::{debug, trace};

use crate::catalog::{AssociationDescriptor, AssociationTarget, EntityCatalog};
use crate::error::{DeclareError, DeclareResult};
use crate::ir::{Param, Union, Variant};
use crate::registry::{Scope, TypeDef};
use super::TypeBuilder;

impl<'a, C: EntityCatalog + ?Sized> TypeBuilder<'a, C> {
    /// Union of the STI variants of `entity`, registered as `name` in `scope`.
    /// `discriminator` overrides the entity's own discriminator field.
    pub fn build_union(
        &mut self,
        scope: &Scope,
        name: &str,
        entity: &str,
        discriminator: Option<&str>,
    ) -> DeclareResult<Option<String>> {
        let catalog: &'a C = self.catalog;
        let base = catalog
            .entity(entity)
            .ok_or_else(|| DeclareError::UnknownEntity(entity.to_string()))?;
        let discriminator = discriminator
            .or(base.discriminator.as_deref())
            .ok_or_else(|| DeclareError::invalid(name, format!("entity `{entity}` has no discriminator")))?;

        let tagged = base.variants.iter().map(|v| (v.tag.as_str(), v.entity.as_str()));
        self.register_union(scope, name, discriminator, tagged)
    }

    /// Union over a polymorphic association's targets, tagged by entity name.
    /// Memoized under the association's name, so associations sharing a
    /// target set within one scope share one union.
    pub fn build_association_union(
        &mut self,
        scope: &Scope,
        association: &AssociationDescriptor,
    ) -> DeclareResult<Option<String>> {
        let AssociationTarget::Polymorphic(targets) = &association.target else {
            return Err(DeclareError::invalid(&association.name, "association is not polymorphic"));
        };
        if self.registry.has_type_in(&association.name, scope) {
            return Ok(Some(scope.qualify(&association.name)));
        }
        let discriminator = association
            .discriminator
            .clone()
            .unwrap_or_else(|| format!("{}_type", association.name));
        let tagged = targets.iter().map(|t| (t.as_str(), t.as_str()));
        self.register_union(scope, &association.name, &discriminator, tagged)
    }

    fn register_union<'t>(
        &mut self,
        scope: &Scope,
        name: &str,
        discriminator: &str,
        tagged: impl Iterator<Item = (&'t str, &'t str)>,
    ) -> DeclareResult<Option<String>> {
        let mut variants = Vec::new();
        for (tag, entity) in tagged {
            match self.companion_type(entity) {
                Some(type_name) => variants.push(Variant::tagged(tag, Param::reference(type_name))),
                None => trace!(union = name, tag, entity, "variant has no companion type; skipped"),
            }
        }
        if variants.is_empty() {
            debug!(union = name, "no resolvable variants");
            return Ok(None);
        }
        let union = Union::discriminated(discriminator, variants);
        let qualified = self.registry.register_type(scope, name, TypeDef::union(union))?;
        Ok(Some(qualified))
    }

    /// Qualified root type of `entity`'s own scope, if registered.
    pub(crate) fn companion_type(&self, entity: &str) -> Option<String> {
        let scope = self.catalog.entity(entity)?.scope()?;
        self.registry
            .has_type_in("", &scope)
            .then(|| scope.qualify(""))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EntityDescriptor, EntityGraph};
    use crate::registry::Registry;

    fn graph() -> EntityGraph {
        EntityGraph::new()
            .with(
                EntityDescriptor::new("payment")
                    .discriminated_by("kind")
                    .variant("card", "card_payment")
                    .variant("bank", "bank_payment")
                    .variant("cash", "cash_payment"),
            )
            .with(EntityDescriptor::new("card_payment").owned_by("card_payment"))
            .with(EntityDescriptor::new("bank_payment").owned_by("bank_payment"))
            .with(EntityDescriptor::new("cash_payment"))
    }

    fn register_roots(registry: &mut Registry) {
        for owner in ["card_payment", "bank_payment"] {
            registry
                .register_type(&Scope::owner(owner), "", TypeDef::object(|s| {
                    s.field("amount", Param::integer());
                }))
                .unwrap();
        }
    }

    #[test]
    fn unresolvable_variants_are_skipped() {
        let graph = graph();
        let mut registry = Registry::new();
        register_roots(&mut registry);
        let built = TypeBuilder::new(&mut registry, &graph)
            .build_union(&Scope::Global, "payment", "payment", None)
            .unwrap();
        assert_eq!(built.as_deref(), Some("payment"));

        let definition = registry.definition("payment", &Scope::Global).unwrap();
        let union = definition.union().unwrap();
        assert_eq!(union.discriminator.as_deref(), Some("kind"));
        let tags: Vec<_> = union.variants.iter().filter_map(|v| v.tag.as_deref()).collect();
        assert_eq!(tags, ["card", "bank"]);
    }

    #[test]
    fn no_companions_means_no_union() {
        let graph = graph();
        let mut registry = Registry::new();
        let built = TypeBuilder::new(&mut registry, &graph)
            .build_union(&Scope::Global, "payment", "payment", Some("type"))
            .unwrap();
        assert!(built.is_none());
        assert!(registry.definition("payment", &Scope::Global).is_none());
    }

    #[test]
    fn association_union_is_memoized_by_name() {
        let graph = graph();
        let mut registry = Registry::new();
        register_roots(&mut registry);
        let scope = Scope::owner("invoice");
        let association = AssociationDescriptor::polymorphic(
            "settled_by",
            vec!["card_payment".into(), "bank_payment".into()],
            "settled_by_type",
        );
        let mut builder = TypeBuilder::new(&mut registry, &graph);
        let first = builder.build_association_union(&scope, &association).unwrap();
        let second = builder.build_association_union(&scope, &association).unwrap();
        assert_eq!(first.as_deref(), Some("invoice_settled_by"));
        assert_eq!(first, second);

        let definition = registry.definition("settled_by", &scope).unwrap();
        let union = definition.union().unwrap();
        assert_eq!(union.discriminator.as_deref(), Some("settled_by_type"));
        assert_eq!(union.variants[0].tag.as_deref(), Some("card_payment"));
    }

    #[test]
    fn non_polymorphic_association_is_rejected() {
        let graph = graph();
        let mut registry = Registry::new();
        let association = AssociationDescriptor::to_one("card", "card_payment");
        let err = TypeBuilder::new(&mut registry, &graph)
            .build_association_union(&Scope::Global, &association)
            .unwrap_err();
        assert!(matches!(err, DeclareError::InvalidOption { .. }));
    }
}
