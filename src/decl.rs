//! Declaration documents: enums, types, entities and derived types as JSON.
//!
//! ```json
//! {
//!   "enums":    [{"name": "status", "values": ["draft", "sent"]}],
//!   "types":    [{"name": "", "scope": "invoice", "params": {"title": {"type": "string"}}}],
//!   "entities": [{"name": "invoice", "owner": "invoice", "associations": []}],
//!   "derive":   [{"kind": "include", "entity": "invoice"}]
//! }
//! ```
//!
//! Decode errors carry the JSON path of the offending node. Loading boots a
//! fresh registry and freezes it once everything is declared.
use indexmap::IndexMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::builder::TypeBuilder;
use crate::catalog::{EntityCatalog, EntityDescriptor, EntityGraph};
use crate::error::{DeclareError, DeclareResult};
use crate::ir::{Param, Primitive, Shape, Union, Variant};
use crate::registry::{Registry, Scope, TypeDef};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    #[serde(default)]
    pub enums: Vec<EnumDecl>,
    #[serde(default)]
    pub types: Vec<TypeDecl>,
    #[serde(default)]
    pub entities: Vec<EntityDescriptor>,
    #[serde(default)]
    pub derive: Vec<DeriveDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumDecl {
    pub name: String,
    pub values: Vec<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    #[default]
    Object,
    Union,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeDecl {
    pub name: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub kind: TypeKind,
    #[serde(default)]
    pub params: IndexMap<String, ParamDecl>,
    #[serde(default)]
    pub variants: Vec<ParamDecl>,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// One field, array element or union variant.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamDecl {
    /// Primitive name, `object`, `array`, `union`, `literal`, or a type/enum name.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub shape: Option<IndexMap<String, ParamDecl>>,
    #[serde(default)]
    pub of: Option<Box<ParamDecl>>,
    #[serde(default)]
    pub variants: Option<Vec<ParamDecl>>,
    #[serde(default)]
    pub discriminator: Option<String>,
    /// Variant tag inside a discriminated union.
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default, rename = "as")]
    pub rename: Option<String>,
    #[serde(default)]
    pub store: Option<Value>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A derived type to build from the entity catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum DeriveDecl {
    Representation {
        entity: String,
    },
    Include {
        entity: String,
        #[serde(default)]
        scope: Option<String>,
    },
    Sort {
        entity: String,
        #[serde(default)]
        scope: Option<String>,
    },
    Union {
        name: String,
        entity: String,
        #[serde(default)]
        scope: Option<String>,
        #[serde(default)]
        discriminator: Option<String>,
    },
}

/// A frozen registry plus the catalog it was derived from.
#[derive(Debug)]
pub struct Loaded {
    pub registry: Registry,
    pub catalog: EntityGraph,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

/// Deserialize with JSON-path context in error messages.
fn from_str_with_path<T: DeserializeOwned>(src: &str) -> DeclareResult<T> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| DeclareError::Document {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}

fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8]) -> DeclareResult<T> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| DeclareError::Document {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}

fn scope_of(owner: Option<&str>) -> Scope {
    owner.map(Scope::owner).unwrap_or_default()
}

impl Document {
    pub fn parse(src: &str) -> DeclareResult<Self> {
        from_str_with_path(src)
    }

    pub fn from_slice(bytes: &[u8]) -> DeclareResult<Self> {
        from_slice_with_path(bytes)
    }

    /// Boot a registry from this document and freeze it.
    pub fn load(self) -> DeclareResult<Loaded> {
        let mut registry = Registry::new();
        let catalog = self.declare(&mut registry)?;
        registry.freeze();
        info!(
            types = registry.store().types().len(),
            enums = registry.store().enums().len(),
            entities = catalog.len(),
            "declarations loaded"
        );
        Ok(Loaded { registry, catalog })
    }

    /// Register everything into a registry that is still booting.
    ///
    /// Representations are derived before the other derived types, so
    /// unions and trees can see every entity's root type.
    pub fn declare(self, registry: &mut Registry) -> DeclareResult<EntityGraph> {
        for decl in &self.enums {
            let scope = scope_of(decl.scope.as_deref());
            registry.register_enum_described(&scope, &decl.name, decl.values.clone(), decl.description.clone())?;
        }
        for decl in &self.types {
            let scope = scope_of(decl.scope.as_deref());
            registry.register_type(&scope, &decl.name, decl.to_type_def(&scope)?)?;
        }

        let catalog: EntityGraph = self.entities.into_iter().collect();
        let mut representations = Vec::new();
        let mut others = Vec::new();
        for derive in &self.derive {
            match derive {
                DeriveDecl::Representation { entity } => representations.push(entity.as_str()),
                other => others.push(other),
            }
        }
        let mut builder = TypeBuilder::new(registry, &catalog);
        // every root first, so unions and trees see all companions
        let built = builder.build_representations(&representations)?;
        debug!(?built, "representations derived");
        for derive in others {
            derive.apply(&mut builder)?;
        }
        Ok(catalog)
    }
}

impl TypeDecl {
    fn to_type_def(&self, scope: &Scope) -> DeclareResult<TypeDef> {
        let label = scope.qualify(&self.name);
        let def = match self.kind {
            TypeKind::Object => {
                if !self.variants.is_empty() {
                    return Err(DeclareError::invalid(label, "object types take `params`, not `variants`"));
                }
                let fields = self
                    .params
                    .iter()
                    .map(|(name, decl)| Ok((name.clone(), decl.to_param(scope, name)?)))
                    .collect::<DeclareResult<Vec<_>>>()?;
                TypeDef::fields(fields)
            }
            TypeKind::Union => {
                if !self.params.is_empty() {
                    return Err(DeclareError::invalid(label, "union types take `variants`, not `params`"));
                }
                TypeDef::union(union_of(&self.variants, self.discriminator.as_deref(), scope, &label)?)
            }
        };
        Ok(match &self.description {
            Some(text) => def.describe(text.clone()),
            None => def,
        })
    }
}

fn union_of(decls: &[ParamDecl], discriminator: Option<&str>, scope: &Scope, at: &str) -> DeclareResult<Union> {
    if decls.is_empty() {
        return Err(DeclareError::invalid(at, "union has no variants"));
    }
    let mut variants = Vec::with_capacity(decls.len());
    for (index, decl) in decls.iter().enumerate() {
        let param = decl.to_param(scope, &format!("{at}[{index}]"))?;
        let variant = match (&decl.tag, discriminator) {
            (Some(tag), Some(_)) => Variant::tagged(tag.clone(), param),
            (None, Some(_)) => return Err(DeclareError::invalid(at, "discriminated union variant needs a `tag`")),
            (_, None) => Variant::new(param),
        };
        variants.push(variant);
    }
    Ok(match discriminator {
        Some(field) => Union::discriminated(field, variants),
        None => Union::new(variants),
    })
}

impl ParamDecl {
    /// `at` names the param in error messages.
    pub fn to_param(&self, scope: &Scope, at: &str) -> DeclareResult<Param> {
        let mut param = match self.kind.as_str() {
            "object" => {
                let fields = self
                    .shape
                    .as_ref()
                    .ok_or_else(|| DeclareError::invalid(at, "object param needs a `shape`"))?;
                let mut shape = Shape::new(scope.clone());
                for (name, decl) in fields {
                    shape.insert(name.clone(), decl.to_param(scope, &format!("{at}.{name}"))?);
                }
                Param::object(shape)
            }
            "array" => {
                let of = self
                    .of
                    .as_ref()
                    .ok_or_else(|| DeclareError::invalid(at, "array param needs `of`"))?;
                Param::array(of.to_param(scope, &format!("{at}[]"))?)
            }
            "union" => {
                let variants = self
                    .variants
                    .as_deref()
                    .ok_or_else(|| DeclareError::invalid(at, "union param needs `variants`"))?;
                Param::union(union_of(variants, self.discriminator.as_deref(), scope, at)?)
            }
            "literal" => {
                let value = self
                    .value
                    .clone()
                    .ok_or_else(|| DeclareError::invalid(at, "literal param needs a `value`"))?;
                Param::literal(value)
            }
            other => match Primitive::from_name(other) {
                Some(primitive) => Param::primitive(primitive),
                None => Param::reference(other),
            },
        };
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(DeclareError::invalid(at, format!("min {min} exceeds max {max}")));
            }
        }
        param.optional = self.optional;
        param.nullable = self.nullable;
        param.default = self.default.clone();
        param.rename = self.rename.clone();
        param.store = self.store.clone();
        param.min = self.min;
        param.max = self.max;
        param.description = self.description.clone();
        Ok(param)
    }
}

impl DeriveDecl {
    fn apply<C: EntityCatalog + ?Sized>(&self, builder: &mut TypeBuilder<'_, C>) -> DeclareResult<()> {
        let built = match self {
            // batched by `Document::declare`
            Self::Representation { .. } => None,
            Self::Include { entity, scope } => {
                let scope = self.scope_for(builder, entity, scope.as_deref());
                builder.include_tree(&scope, entity)?
            }
            Self::Sort { entity, scope } => {
                let scope = self.scope_for(builder, entity, scope.as_deref());
                builder.sort_tree(&scope, entity)?
            }
            Self::Union { name, entity, scope, discriminator } => {
                builder.build_union(&scope_of(scope.as_deref()), name, entity, discriminator.as_deref())?
            }
        };
        debug!(derive = ?self, built = ?built, "derived");
        Ok(())
    }

    /// Explicit scope, else the entity's owner scope, else global.
    fn scope_for<C: EntityCatalog + ?Sized>(
        &self,
        builder: &TypeBuilder<'_, C>,
        entity: &str,
        explicit: Option<&str>,
    ) -> Scope {
        match explicit {
            Some(owner) => Scope::owner(owner),
            None => builder
                .catalog()
                .entity(entity)
                .and_then(|e| e.scope())
                .unwrap_or_default(),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ParamKind;
    use crate::pipeline::RequestPipeline;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "enums": [
                {"name": "status", "values": ["draft", "sent"], "description": "Invoice state"}
            ],
            "types": [
                {
                    "name": "address",
                    "params": {
                        "street": {"type": "string", "as": "street_name", "min": 1},
                        "zip": {"type": "string", "optional": true}
                    }
                },
                {
                    "name": "",
                    "scope": "invoice",
                    "params": {
                        "title": {"type": "string"},
                        "status": {"type": "status", "default": "draft"},
                        "billing": {"type": "address"},
                        "lines": {"type": "array", "of": {
                            "type": "object",
                            "shape": {"qty": {"type": "integer", "min": 1}}
                        }}
                    }
                },
                {
                    "name": "contact",
                    "kind": "union",
                    "discriminator": "via",
                    "variants": [
                        {"type": "object", "tag": "mail", "shape": {"via": {"type": "literal", "value": "mail"}}},
                        {"type": "object", "tag": "phone", "shape": {
                            "via": {"type": "literal", "value": "phone", "store": "telephone"},
                            "number": {"type": "string"}
                        }}
                    ]
                }
            ],
            "entities": [
                {
                    "name": "customer",
                    "owner": "customer",
                    "attributes": [{"name": "name", "type": "string"}],
                    "associations": [{"name": "invoices", "target": {"entity": "invoice"}, "cardinality": "many"}]
                },
                {
                    "name": "invoice",
                    "owner": "invoice",
                    "associations": [{"name": "customer", "target": {"entity": "customer"}}]
                }
            ],
            "derive": [
                {"kind": "include", "entity": "invoice"},
                {"kind": "representation", "entity": "customer"}
            ]
        })
    }

    #[test]
    fn loads_and_freezes() {
        let loaded = Document::parse(&document().to_string()).unwrap().load().unwrap();
        let registry = &loaded.registry;
        assert!(registry.is_frozen());
        assert_eq!(loaded.catalog.len(), 2);

        assert!(registry.resolve_enum("status", &Scope::Global).is_some());
        assert!(registry.resolve_type("status_filter", &Scope::Global).is_some());
        assert!(registry.has_type_in("include", &Scope::owner("invoice")));
        assert!(registry.has_type_in("", &Scope::owner("customer")));

        let invoice = registry.definition("", &Scope::owner("invoice")).unwrap();
        let shape = invoice.shape().unwrap();
        assert_eq!(shape.get("status").unwrap().default, Some(json!("draft")));
        assert!(matches!(&shape.get("lines").unwrap().kind, ParamKind::Array(_)));
    }

    #[test]
    fn loaded_registry_drives_the_pipeline() {
        let loaded = Document::parse(&document().to_string()).unwrap().load().unwrap();
        let pipeline = RequestPipeline::new(&loaded.registry);

        let payload = json!({"title": "Q3", "billing": {"street": "Main"}, "lines": [{"qty": "2"}]});
        let result = pipeline.process_type(&payload, "", &Scope::owner("invoice")).unwrap();
        assert!(result.is_valid(), "{:?}", result.issues);
        assert_eq!(
            result.params,
            json!({"title": "Q3", "status": "draft", "billing": {"street_name": "Main"}, "lines": [{"qty": 2}]})
        );

        let phone = json!({"via": "phone", "number": "555"});
        let result = pipeline.process_type(&phone, "contact", &Scope::Global).unwrap();
        assert!(result.is_valid(), "{:?}", result.issues);
        assert_eq!(result.params, json!({"via": "telephone", "number": "555"}));
    }

    #[test]
    fn decode_errors_carry_the_json_path() {
        let src = json!({"types": [{"name": "x", "params": {"a": {"type": "string", "optinal": true}}}]});
        let err = Document::parse(&src.to_string()).unwrap_err();
        match err {
            DeclareError::Document { path, message } => {
                assert!(path.starts_with("types[0].params"), "{path}");
                assert!(message.contains("optinal"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn structural_mistakes_are_invalid_options() {
        let missing_shape = json!({"types": [{"name": "x", "params": {"a": {"type": "object"}}}]});
        let err = Document::parse(&missing_shape.to_string()).unwrap().load().unwrap_err();
        assert!(matches!(err, DeclareError::InvalidOption { .. }));

        let untagged = json!({"types": [{
            "name": "u", "kind": "union", "discriminator": "t",
            "variants": [{"type": "string"}]
        }]});
        let err = Document::parse(&untagged.to_string()).unwrap().load().unwrap_err();
        assert!(matches!(err, DeclareError::InvalidOption { .. }));

        let duplicate = json!({"enums": [
            {"name": "s", "values": ["a"]},
            {"name": "s", "values": ["b"]}
        ]});
        let err = Document::parse(&duplicate.to_string()).unwrap().load().unwrap_err();
        assert!(matches!(err, DeclareError::DuplicateGlobal { .. }));
    }

    #[test]
    fn misspelled_derive_options_are_rejected() {
        let src = json!({"derive": [{"kind": "sort", "entity": "invoice", "scop": "elsewhere"}]});
        let err = Document::parse(&src.to_string()).unwrap_err();
        match err {
            DeclareError::Document { path, message } => {
                assert!(path.starts_with("derive[0]"), "{path}");
                assert!(message.contains("scop"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn polymorphic_association_resolves_whatever_the_derive_order() {
        for derive in [["invoice", "order"], ["order", "invoice"]] {
            let src = json!({
                "entities": [
                    {
                        "name": "invoice",
                        "owner": "invoice",
                        "associations": [{
                            "name": "source",
                            "target": {"polymorphic": ["order"]},
                            "discriminator": "source_type"
                        }]
                    },
                    {"name": "order", "owner": "order", "attributes": [{"name": "ref", "type": "string"}]}
                ],
                "derive": derive.map(|entity| json!({"kind": "representation", "entity": entity}))
            });
            let loaded = Document::parse(&src.to_string()).unwrap().load().unwrap();
            assert!(loaded.registry.has_type_in("source", &Scope::owner("invoice")), "{derive:?}");

            let exported = loaded.registry.serialize_all();
            assert_eq!(exported.types["invoice"]["shape"]["source"]["reference"], "invoice_source", "{derive:?}");

            let pipeline = RequestPipeline::new(&loaded.registry);
            let payload = json!({"source": {"source_type": "order", "ref": 7}});
            let result = pipeline.process_type(&payload, "", &Scope::owner("invoice")).unwrap();
            assert!(result.is_valid(), "{derive:?}: {:?}", result.issues);
            assert_eq!(result.params, json!({"source": {"source_type": "order", "ref": "7"}}));
        }
    }

    #[test]
    fn unknown_derived_entity_fails() {
        let src = json!({"derive": [{"kind": "sort", "entity": "ghost"}]});
        let err = Document::parse(&src.to_string()).unwrap().load().unwrap_err();
        assert!(matches!(err, DeclareError::UnknownEntity(ref name) if name == "ghost"));
    }
}
