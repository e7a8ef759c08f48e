//! Include and sort trees.
//!
//! Both mirror an entity's associations as a nested object type. Include
//! trees let a client switch associations on (`true`) or select into them
//! (a nested include object); sort trees map sortable attributes to a
//! direction and sortable associations to the target's sort tree.
//!
//! Work is bounded per path: the visited chain grows by one entity per level
//! and depth stops at [`MAX_DEPTH`], so cycles end in boolean leaves (include)
//! or omissions (sort).
use tracing::{debug, trace};

use crate::catalog::{AssociationDescriptor, AssociationTarget, EntityCatalog, EntityDescriptor};
use crate::error::{DeclareError, DeclareResult};
use crate::ir::{Param, Union, Variant};
use crate::registry::{Scope, TypeDef};
use super::{MAX_DEPTH, SORT_DIRECTION, TreeKind, TypeBuilder, Visited};

impl<'a, C: EntityCatalog + ?Sized> TypeBuilder<'a, C> {
    /// Build (or reuse) the include tree of `entity`, registered in `scope`.
    /// Returns the qualified name, or `None` when there is nothing to include.
    pub fn include_tree(&mut self, scope: &Scope, entity: &str) -> DeclareResult<Option<String>> {
        self.tree(TreeKind::Include, scope, entity)
    }

    /// Build (or reuse) the sort tree of `entity`, registered in `scope`.
    pub fn sort_tree(&mut self, scope: &Scope, entity: &str) -> DeclareResult<Option<String>> {
        if self.registry.resolve_enum(SORT_DIRECTION, &Scope::Global).is_none() {
            self.registry
                .register_enum(&Scope::Global, SORT_DIRECTION, vec!["asc".into(), "desc".into()])?;
        }
        self.tree(TreeKind::Sort, scope, entity)
    }

    fn tree(&mut self, kind: TreeKind, scope: &Scope, entity: &str) -> DeclareResult<Option<String>> {
        let catalog: &'a C = self.catalog;
        let root = catalog
            .entity(entity)
            .ok_or_else(|| DeclareError::UnknownEntity(entity.to_string()))?;
        let built = self.build_tree(kind, scope, root, &Visited::root(), 0)?;
        debug!(kind = kind.base_name(), entity, built = ?built, "derived tree");
        Ok(built)
    }

    /// Whether a tree for `entity` at `depth` would have any field at all.
    pub(crate) fn has_expandable_content(
        &self,
        kind: TreeKind,
        entity: &EntityDescriptor,
        visited: &Visited<'_>,
        depth: usize,
    ) -> bool {
        if depth >= MAX_DEPTH {
            return false;
        }
        if kind == TreeKind::Sort && entity.attributes.iter().any(|a| a.sortable) {
            return true;
        }
        let path = visited.with(&entity.name);
        for association in &entity.associations {
            match &association.target {
                AssociationTarget::Polymorphic(_) => {
                    if kind == TreeKind::Include && !association.mandatory {
                        return true;
                    }
                }
                AssociationTarget::Entity(target) => {
                    if kind == TreeKind::Sort && !association.sortable {
                        continue;
                    }
                    if path.contains(target) {
                        if kind == TreeKind::Include && !association.mandatory {
                            return true;
                        }
                        continue;
                    }
                    // an optional association can always be switched on
                    if kind == TreeKind::Include && !association.mandatory {
                        return true;
                    }
                    if let Some(next) = self.catalog.entity(target) {
                        if self.has_expandable_content(kind, next, &path, depth + 1) {
                            return true;
                        }
                    }
                }
            }
        }
        false
    }

    fn build_tree(
        &mut self,
        kind: TreeKind,
        scope: &Scope,
        entity: &'a EntityDescriptor,
        visited: &Visited<'_>,
        depth: usize,
    ) -> DeclareResult<Option<String>> {
        if !self.has_expandable_content(kind, entity, visited, depth) {
            trace!(entity = %entity.name, depth, "nothing to expand");
            return Ok(None);
        }

        let name = kind.type_name(&entity.name, depth);
        if self.registry.has_type_in(&name, scope) {
            return Ok(Some(scope.qualify(&name)));
        }
        if depth >= MAX_DEPTH {
            // frontier stub, normally unreachable behind has_expandable_content
            return Ok(Some(scope.qualify(&name)));
        }

        let catalog: &'a C = self.catalog;
        let path = visited.with(&entity.name);
        let mut fields: Vec<(String, Param)> = Vec::new();

        if kind == TreeKind::Sort {
            for attribute in entity.attributes.iter().filter(|a| a.sortable) {
                fields.push((attribute.name.clone(), Param::reference(SORT_DIRECTION).optional()));
            }
        }

        for association in &entity.associations {
            let switch = kind == TreeKind::Include && !association.mandatory;
            let target = match &association.target {
                AssociationTarget::Polymorphic(_) => {
                    if switch {
                        fields.push((association.name.clone(), Param::boolean().optional()));
                    }
                    continue;
                }
                AssociationTarget::Entity(target) => target,
            };
            if kind == TreeKind::Sort && !association.sortable {
                continue;
            }
            if path.contains(target) {
                if switch {
                    fields.push((association.name.clone(), Param::boolean().optional()));
                }
                continue;
            }
            if let Some(imported) = self.imported_tree(kind, scope, target) {
                fields.push((association.name.clone(), association_param(kind, association, imported)));
                continue;
            }
            let Some(next) = catalog.entity(target) else {
                debug!(association = %association.name, target = %target, "association target not in catalog");
                if switch {
                    fields.push((association.name.clone(), Param::boolean().optional()));
                }
                continue;
            };
            match self.build_tree(kind, scope, next, &path, depth + 1)? {
                Some(type_name) => {
                    fields.push((association.name.clone(), association_param(kind, association, type_name)));
                }
                None if switch => {
                    fields.push((association.name.clone(), Param::boolean().optional()));
                }
                None => {}
            }
        }

        trace!(name = %name, depth, fields = fields.len(), "registering derived tree");
        let qualified = self.registry.register_type(scope, &name, TypeDef::fields(fields))?;
        Ok(Some(qualified))
    }

    /// Root tree already built in the target entity's own scope.
    fn imported_tree(&self, kind: TreeKind, scope: &Scope, target: &str) -> Option<String> {
        let target_scope = self.catalog.entity(target)?.scope()?;
        if &target_scope == scope || !self.registry.has_type_in(kind.base_name(), &target_scope) {
            return None;
        }
        Some(target_scope.qualify(kind.base_name()))
    }
}

/// Mandatory include associations and all sort associations reference the
/// nested tree directly; optional include associations accept `true/false`
/// or a nested selector.
fn association_param(kind: TreeKind, association: &AssociationDescriptor, type_name: String) -> Param {
    if kind == TreeKind::Include && !association.mandatory {
        Param::union(Union::new(vec![
            Variant::new(Param::boolean()),
            Variant::new(Param::reference(type_name)),
        ]))
        .optional()
    } else {
        Param::reference(type_name).optional()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
