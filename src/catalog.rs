//! Entity and association introspection.
//!
//! The builders never talk to a persistence layer directly; they read entity
//! metadata through [`EntityCatalog`]. [`EntityGraph`] is the in-memory
//! implementation used by declaration documents and tests.
use std::collections::HashMap;

use serde::Deserialize;

use crate::ir::Primitive;
use crate::registry::Scope;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    #[default]
    One,
    Many,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationTarget {
    Entity(String),
    /// Any of the listed entities; the concrete one is named by the discriminator.
    Polymorphic(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssociationDescriptor {
    pub name: String,
    pub target: AssociationTarget,
    #[serde(default)]
    pub cardinality: Cardinality,
    /// Always included; clients cannot switch it off.
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub discriminator: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeDescriptor {
    pub name: String,
    #[serde(rename = "type", deserialize_with = "de_primitive")]
    pub kind: Primitive,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default, rename = "enum")]
    pub enum_name: Option<String>,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub filterable: bool,
}

/// Single-table-inheritance subtype: its tag and the entity that models it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantDescriptor {
    pub tag: String,
    pub entity: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityDescriptor {
    pub name: String,
    /// Owner prefix of this entity's representation types.
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeDescriptor>,
    #[serde(default)]
    pub associations: Vec<AssociationDescriptor>,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub variants: Vec<VariantDescriptor>,
}

pub trait EntityCatalog {
    fn entity(&self, name: &str) -> Option<&EntityDescriptor>;
}

#[derive(Debug, Default)]
pub struct EntityGraph {
    entities: HashMap<String, EntityDescriptor>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

fn de_primitive<'de, D: serde::Deserializer<'de>>(de: D) -> Result<Primitive, D::Error> {
    let name = String::deserialize(de)?;
    Primitive::from_name(&name)
        .ok_or_else(|| serde::de::Error::custom(format!("unknown attribute type `{name}`")))
}

impl AssociationDescriptor {
    pub fn to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: AssociationTarget::Entity(target.into()),
            cardinality: Cardinality::One,
            mandatory: false,
            sortable: false,
            discriminator: None,
        }
    }

    pub fn to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self { cardinality: Cardinality::Many, ..Self::to_one(name, target) }
    }

    pub fn polymorphic(name: impl Into<String>, targets: Vec<String>, discriminator: impl Into<String>) -> Self {
        Self {
            target: AssociationTarget::Polymorphic(targets),
            discriminator: Some(discriminator.into()),
            ..Self::to_one(name, String::new())
        }
    }

    pub fn mandatory(mut self) -> Self { self.mandatory = true; self }
    pub fn sortable(mut self) -> Self { self.sortable = true; self }

    pub fn is_polymorphic(&self) -> bool {
        matches!(self.target, AssociationTarget::Polymorphic(_))
    }

    pub fn target_entity(&self) -> Option<&str> {
        match &self.target {
            AssociationTarget::Entity(name) => Some(name),
            AssociationTarget::Polymorphic(_) => None,
        }
    }
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, kind: Primitive) -> Self {
        Self { name: name.into(), kind, nullable: false, enum_name: None, sortable: false, filterable: false }
    }

    pub fn nullable(mut self) -> Self { self.nullable = true; self }
    pub fn sortable(mut self) -> Self { self.sortable = true; self }
    pub fn filterable(mut self) -> Self { self.filterable = true; self }

    pub fn with_enum(mut self, name: impl Into<String>) -> Self {
        self.enum_name = Some(name.into());
        self
    }
}

impl EntityDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn association(mut self, association: AssociationDescriptor) -> Self {
        self.associations.push(association);
        self
    }

    pub fn variant(mut self, tag: impl Into<String>, entity: impl Into<String>) -> Self {
        self.variants.push(VariantDescriptor { tag: tag.into(), entity: entity.into() });
        self
    }

    pub fn discriminated_by(mut self, field: impl Into<String>) -> Self {
        self.discriminator = Some(field.into());
        self
    }

    /// Scope holding this entity's representation types, if it has one.
    pub fn scope(&self) -> Option<Scope> {
        self.owner.as_ref().map(Scope::owner)
    }
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: EntityDescriptor) {
        self.entities.insert(entity.name.clone(), entity);
    }

    pub fn with(mut self, entity: EntityDescriptor) -> Self {
        self.insert(entity);
        self
    }

    pub fn len(&self) -> usize { self.entities.len() }
    pub fn is_empty(&self) -> bool { self.entities.is_empty() }
}

impl EntityCatalog for EntityGraph {
    fn entity(&self, name: &str) -> Option<&EntityDescriptor> {
        self.entities.get(name)
    }
}

impl FromIterator<EntityDescriptor> for EntityGraph {
    fn from_iter<I: IntoIterator<Item = EntityDescriptor>>(iter: I) -> Self {
        let mut graph = Self::new();
        for entity in iter {
            graph.insert(entity);
        }
        graph
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entity_decodes_from_json() {
        let entity: EntityDescriptor = serde_json::from_value(json!({
            "name": "invoice",
            "owner": "invoice",
            "attributes": [
                {"name": "number", "type": "string", "sortable": true},
                {"name": "status", "type": "string", "enum": "status"}
            ],
            "associations": [
                {"name": "customer", "target": {"entity": "customer"}},
                {"name": "lines", "target": {"entity": "line"}, "cardinality": "many", "mandatory": true},
                {"name": "source", "target": {"polymorphic": ["order", "quote"]}, "discriminator": "source_type"}
            ]
        }))
        .unwrap();
        assert_eq!(entity.attributes[0].kind, Primitive::String);
        assert_eq!(entity.attributes[1].enum_name.as_deref(), Some("status"));
        assert_eq!(entity.associations[1].cardinality, Cardinality::Many);
        assert!(entity.associations[2].is_polymorphic());
        assert_eq!(entity.scope(), Some(Scope::owner("invoice")));
    }

    #[test]
    fn unknown_attribute_type_is_rejected() {
        let err = serde_json::from_value::<AttributeDescriptor>(json!({"name": "x", "type": "blob"}))
            .unwrap_err();
        assert!(err.to_string().contains("unknown attribute type"));
    }
}
