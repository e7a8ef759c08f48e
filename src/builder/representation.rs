//! An entity's own root type (the empty short name in its owner scope).
use tracing::debug;

use crate::catalog::{AssociationTarget, Cardinality, EntityCatalog, EntityDescriptor};
use crate::error::{DeclareError, DeclareResult};
use crate::ir::Param;
use crate::registry::{Scope, TypeDef};
use super::TypeBuilder;

impl<'a, C: EntityCatalog + ?Sized> TypeBuilder<'a, C> {
    /// Register `entity`'s representation and return its qualified name.
    pub fn build_representation(&mut self, entity: &str) -> DeclareResult<String> {
        let mut built = self.build_representations(&[entity])?;
        Ok(built.remove(0))
    }

    /// Register the representations of `entities`, in two passes.
    ///
    /// Every root type is registered first; polymorphic association unions
    /// are built afterwards, so they see the companion roots of the whole
    /// batch regardless of the order entities are listed in. Entity targets
    /// are plain references resolved lazily.
    pub fn build_representations(&mut self, entities: &[&str]) -> DeclareResult<Vec<String>> {
        let catalog: &'a C = self.catalog;
        let mut roots = Vec::with_capacity(entities.len());
        for entity in entities {
            let descriptor = catalog
                .entity(entity)
                .ok_or_else(|| DeclareError::UnknownEntity(entity.to_string()))?;
            let scope = descriptor
                .scope()
                .ok_or_else(|| DeclareError::invalid(*entity, "entity has no owner scope"))?;
            let fields = self.root_fields(descriptor);
            let qualified = self.registry.register_type(&scope, "", TypeDef::fields(fields))?;
            roots.push((descriptor, scope, qualified));
        }

        let mut built = Vec::with_capacity(roots.len());
        for (descriptor, scope, qualified) in roots {
            self.association_unions(descriptor, &scope)?;
            built.push(qualified);
        }
        Ok(built)
    }

    fn root_fields(&self, descriptor: &EntityDescriptor) -> Vec<(String, Param)> {
        let mut fields: Vec<(String, Param)> = Vec::new();
        for attribute in &descriptor.attributes {
            let mut param = match &attribute.enum_name {
                Some(enum_name) => Param::reference(enum_name.clone()),
                None => Param::primitive(attribute.kind),
            };
            if attribute.nullable {
                param = param.nullable();
            }
            fields.push((attribute.name.clone(), param));
        }

        for association in &descriptor.associations {
            let target = match &association.target {
                AssociationTarget::Entity(target) => self
                    .catalog
                    .entity(target)
                    .and_then(|t| t.scope())
                    .map(|s| Param::reference(s.qualify("")))
                    .unwrap_or_else(|| {
                        debug!(entity = %descriptor.name, association = %association.name, "association target has no type");
                        Param::unknown()
                    }),
                // the owner-local union of the same name, built in the second pass
                AssociationTarget::Polymorphic(_) => Param::reference(association.name.clone()),
            };
            let mut param = match association.cardinality {
                Cardinality::One => target.nullable(),
                Cardinality::Many => Param::array(target),
            };
            if !association.mandatory {
                param = param.optional();
            }
            fields.push((association.name.clone(), param));
        }
        fields
    }

    fn association_unions(&mut self, descriptor: &EntityDescriptor, scope: &Scope) -> DeclareResult<()> {
        for association in descriptor.associations.iter().filter(|a| a.is_polymorphic()) {
            if self.build_association_union(scope, association)?.is_none() {
                debug!(entity = %descriptor.name, association = %association.name, "no union; field stays unresolved");
            }
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
