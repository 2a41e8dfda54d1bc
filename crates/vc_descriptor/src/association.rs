use alloc::sync::{Arc, Weak};

use vc_utils::WeakKeyMap;

use crate::component::{Component, Instance, resolution_type};
use crate::error::MetaError;
use crate::registry::MetadataRegistry;
use crate::ty::Type;

// -----------------------------------------------------------------------------
// AssociationTable

/// Secondary objects attached to primary ones, held weakly on both sides.
#[derive(Default)]
pub(crate) struct AssociationTable(WeakKeyMap<dyn Component, Vec<Weak<dyn Component>>>);

impl AssociationTable {
    pub fn create(&mut self, primary: &Instance, secondary: &Instance) -> Result<(), MetaError> {
        if Arc::ptr_eq(primary, secondary) {
            return Err(MetaError::invalid(
                "secondary",
                "an object cannot be associated with itself",
            ));
        }
        let list = self.0.get_or_insert_with(primary, Vec::new);
        list.retain(|weak| weak.strong_count() > 0);
        if list.iter().any(|weak| is(weak, secondary)) {
            return Err(MetaError::DuplicateAssociation);
        }
        list.push(Arc::downgrade(secondary));
        Ok(())
    }

    pub fn remove(&mut self, primary: &Instance, secondary: &Instance) -> bool {
        let Some(list) = self.0.get_mut(primary) else {
            return false;
        };
        let found = list.iter().any(|weak| is(weak, secondary));
        list.retain(|weak| weak.strong_count() > 0 && !is(weak, secondary));
        if list.is_empty() {
            self.0.remove(primary);
        }
        found
    }

    pub fn remove_all(&mut self, primary: &Instance) -> bool {
        self.0.remove(primary).is_some()
    }

    /// Live secondaries of `primary`, oldest first.
    pub fn secondaries(&self, primary: &Instance) -> Vec<Instance> {
        self.0
            .get(primary)
            .map(|list| list.iter().filter_map(Weak::upgrade).collect())
            .unwrap_or_default()
    }
}

#[inline]
fn is(weak: &Weak<dyn Component>, instance: &Instance) -> bool {
    core::ptr::addr_eq(weak.as_ptr(), Arc::as_ptr(instance))
}

// -----------------------------------------------------------------------------
// Registry operations

impl MetadataRegistry {
    /// Attaches `secondary` to `primary` without keeping either alive.
    ///
    /// # Errors
    ///
    /// [`MetaError::InvalidArgument`] if both are the same object and
    /// [`MetaError::DuplicateAssociation`] if the pair already exists.
    pub fn create_association(&self, primary: &Instance, secondary: &Instance) -> Result<(), MetaError> {
        self.lock_associations().create(primary, secondary)
    }

    /// Returns `false` if the pair was not associated.
    pub fn remove_association(&self, primary: &Instance, secondary: &Instance) -> bool {
        self.lock_associations().remove(primary, secondary)
    }

    /// Drops every association of `primary`.
    pub fn remove_associations(&self, primary: &Instance) -> bool {
        self.lock_associations().remove_all(primary)
    }

    /// The object standing in for `primary` when it is used as a `ty`.
    ///
    /// That is `primary` itself if it is a `ty` already, otherwise the last
    /// associated secondary that is one. Failing both, a sited primary in
    /// design mode may be represented by its designer. Returns `primary` when
    /// nothing matches.
    pub fn association(&self, ty: &Type, primary: &Instance) -> Instance {
        if resolution_type(primary).is_subtype_of(ty) {
            return primary.clone();
        }

        // Collected under the lock, inspected outside it.
        let secondaries = self.lock_associations().secondaries(primary);
        if let Some(found) = secondaries
            .into_iter()
            .rfind(|secondary| resolution_type(secondary).is_subtype_of(ty))
        {
            return found;
        }

        primary
            .site()
            .filter(|site| site.design_mode())
            .and_then(|site| site.designer_host())
            .and_then(|host| host.designer(primary))
            .filter(|designer| resolution_type(designer).is_subtype_of(ty))
            .unwrap_or_else(|| primary.clone())
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use crate::component::{Component, DesignerHost, Instance, Site};
    use crate::error::MetaError;
    use crate::registry::MetadataRegistry;
    use crate::ty::Type;

    struct Thing {
        ty: Type,
        site: Option<Arc<dyn Site>>,
    }

    impl Component for Thing {
        fn component_type(&self) -> Type {
            self.ty.clone()
        }

        fn site(&self) -> Option<Arc<dyn Site>> {
            self.site.clone()
        }
    }

    fn thing(ty: &Type) -> Instance {
        Arc::new(Thing {
            ty: ty.clone(),
            site: None,
        })
    }

    #[test]
    fn round_trip() {
        let button = Type::builder("Button").build().unwrap();
        let accessor = Type::builder("Accessor").build().unwrap();
        let registry = MetadataRegistry::new();

        let primary = thing(&button);
        let secondary = thing(&accessor);

        assert!(Arc::ptr_eq(&registry.association(&accessor, &primary), &primary));
        registry.create_association(&primary, &secondary).unwrap();
        assert!(Arc::ptr_eq(&registry.association(&accessor, &primary), &secondary));
        assert!(Arc::ptr_eq(&registry.association(&button, &primary), &primary));

        assert_eq!(
            registry.create_association(&primary, &secondary),
            Err(MetaError::DuplicateAssociation)
        );
        assert!(matches!(
            registry.create_association(&primary, &primary),
            Err(MetaError::InvalidArgument { .. })
        ));

        assert!(registry.remove_association(&primary, &secondary));
        assert!(!registry.remove_association(&primary, &secondary));
        assert!(Arc::ptr_eq(&registry.association(&accessor, &primary), &primary));
    }

    #[test]
    fn later_matches_win_and_dead_entries_vanish() {
        let button = Type::builder("Button").build().unwrap();
        let accessor = Type::builder("Accessor").build().unwrap();
        let registry = MetadataRegistry::new();

        let primary = thing(&button);
        let first = thing(&accessor);
        let second = thing(&accessor);
        registry.create_association(&primary, &first).unwrap();
        registry.create_association(&primary, &second).unwrap();
        assert!(Arc::ptr_eq(&registry.association(&accessor, &primary), &second));

        drop(second);
        assert!(Arc::ptr_eq(&registry.association(&accessor, &primary), &first));

        assert!(registry.remove_associations(&primary));
        assert!(!registry.remove_associations(&primary));
    }

    #[test]
    fn designer_stands_in_at_design_time() {
        struct Host(Instance);

        impl DesignerHost for Host {
            fn designer(&self, _component: &Instance) -> Option<Instance> {
                Some(self.0.clone())
            }
        }

        struct Designing(Arc<Host>);

        impl Site for Designing {
            fn design_mode(&self) -> bool {
                true
            }

            fn designer_host(&self) -> Option<Arc<dyn DesignerHost>> {
                Some(self.0.clone())
            }
        }

        let button = Type::builder("Button").build().unwrap();
        let designer_ty = Type::builder("ButtonDesigner").build().unwrap();
        let registry = MetadataRegistry::new();

        let designer = thing(&designer_ty);
        let primary: Instance = Arc::new(Thing {
            ty: button,
            site: Some(Arc::new(Designing(Arc::new(Host(designer.clone()))))),
        });

        assert!(Arc::ptr_eq(&registry.association(&designer_ty, &primary), &designer));
    }
}
