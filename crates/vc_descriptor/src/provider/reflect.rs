use alloc::sync::{Arc, Weak};
use core::any::TypeId;
use std::sync::{Mutex, OnceLock, PoisonError, RwLock};

use super::{MetadataProvider, Next};
use crate::attribute::{AttributeCollection, AttributeRef, DefaultEvent, DefaultProperty};
use crate::component::Instance;
use crate::descriptor::{DefaultConverter, TypeConverter, TypeDescriptor};
use crate::error::MetaError;
use crate::member::{
    EventCollection, EventDescriptor, Member, MemberCollection, PropertyCollection,
    PropertyDescriptor,
};
use crate::ty::{EditorRef, Module, Type, TypeTable};

// -----------------------------------------------------------------------------
// ReflectedType

/// Lazily filled metadata snapshot of one type.
///
/// Base and interface snapshots are linked at creation, so refreshing a type
/// must also drop the snapshots of its subtypes. A snapshot never holds its
/// own type: member lists are kept only while something else uses them, since
/// their descriptors refer back to the type.
struct ReflectedType {
    base: Option<Arc<ReflectedType>>,
    interfaces: Vec<Arc<ReflectedType>>,
    attributes: OnceLock<AttributeCollection>,
    properties: Mutex<Option<Weak<[PropertyDescriptor]>>>,
    events: Mutex<Option<Weak<[EventDescriptor]>>>,
}

impl ReflectedType {
    /// Type attributes: interfaces, then base, then own declarations and sources.
    ///
    /// Later entries override earlier ones of the same kind. The flag is
    /// `false` when a source failed; such a list is not cached.
    fn load_attributes(&self, ty: &Type) -> Result<(AttributeCollection, bool), MetaError> {
        if let Some(done) = self.attributes.get() {
            return Ok((done.clone(), true));
        }

        let mut complete = true;
        let mut list: Vec<AttributeRef> = Vec::new();
        let inherited = self
            .interfaces
            .iter()
            .zip(ty.interfaces())
            .chain(self.base.iter().zip(ty.base()));
        for (snapshot, inherited_ty) in inherited {
            let (attrs, ok) = snapshot.load_attributes(inherited_ty)?;
            complete &= ok;
            list.extend(attrs.iter().cloned());
        }

        let decl = ty.decl();
        list.extend(decl.attributes.iter().cloned());
        for source in &decl.attribute_sources {
            match source() {
                Ok(attrs) => list.extend(attrs),
                Err(MetaError::Cancelled) => return Err(MetaError::Cancelled),
                Err(err) => {
                    log::warn!("skipping an attribute source of `{ty}`: {err}");
                    complete = false;
                }
            }
        }

        let collection = AttributeCollection::new(list);
        if complete {
            Ok((self.attributes.get_or_init(|| collection).clone(), true))
        } else {
            Ok((collection, false))
        }
    }

    fn attributes(&self, ty: &Type) -> Result<AttributeCollection, MetaError> {
        self.load_attributes(ty).map(|(attrs, _)| attrs)
    }

    /// Own properties, then inherited ones not hidden by an own declaration.
    fn properties(&self, ty: &Type) -> PropertyCollection {
        remembered(&self.properties, || {
            let own = ty
                .decl()
                .properties
                .iter()
                .map(|decl| PropertyDescriptor::from_decl(decl, ty))
                .collect();
            let inherited = self
                .base
                .as_ref()
                .zip(ty.base())
                .map(|(base, base_ty)| base.properties(base_ty));
            with_inherited(own, inherited)
        })
    }

    fn events(&self, ty: &Type) -> EventCollection {
        remembered(&self.events, || {
            let own = ty
                .decl()
                .events
                .iter()
                .map(|decl| EventDescriptor::from_decl(decl, ty))
                .collect();
            let inherited = self
                .base
                .as_ref()
                .zip(ty.base())
                .map(|(base, base_ty)| base.events(base_ty));
            with_inherited(own, inherited)
        })
    }
}

/// Returns the list still in use, or builds and remembers a new one.
fn remembered<M: Member>(
    memo: &Mutex<Option<Weak<[M]>>>,
    build: impl FnOnce() -> Vec<M>,
) -> MemberCollection<M> {
    let mut memo = memo.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(live) = memo.as_ref().and_then(Weak::upgrade) {
        return MemberCollection::from_shared(live);
    }
    let shared: Arc<[M]> = build().into();
    *memo = Some(Arc::downgrade(&shared));
    MemberCollection::from_shared(shared)
}

fn with_inherited<M: Member>(mut list: Vec<M>, inherited: Option<MemberCollection<M>>) -> Vec<M> {
    if let Some(inherited) = inherited {
        let own = list.len();
        for member in inherited.iter() {
            let name = member.member().name();
            if !list[..own].iter().any(|m| m.member().name() == name) {
                list.push(member.clone());
            }
        }
    }
    list
}

// -----------------------------------------------------------------------------
// ReflectProvider

/// The provider every chain ends in.
///
/// Answers from the metadata declared through [`Type::builder`], keeping one
/// snapshot per queried ("populated") type until the type is refreshed or
/// dropped.
#[derive(Default)]
pub struct ReflectProvider {
    types: RwLock<TypeTable<Arc<ReflectedType>>>,
}

impl ReflectProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self, ty: &Type) -> Arc<ReflectedType> {
        let types = self.types.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(found) = types.get(ty.handle()) {
            return found.clone();
        }
        drop(types);

        let fresh = Arc::new(ReflectedType {
            base: ty.base().map(|base| self.snapshot(base)),
            interfaces: ty.interfaces().iter().map(|i| self.snapshot(i)).collect(),
            attributes: OnceLock::new(),
            properties: Mutex::new(None),
            events: Mutex::new(None),
        });

        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
        types.get_or_insert_with(ty.handle(), || fresh).clone()
    }

    /// Returns `true` if metadata of `ty` has been queried since its last refresh.
    pub fn is_populated(&self, ty: &Type) -> bool {
        let types = self.types.read().unwrap_or_else(PoisonError::into_inner);
        types.contains_key(ty.handle())
    }

    /// Lists the live populated types, optionally restricted to `module`.
    pub fn populated_types(&self, module: Option<&Module>) -> Vec<Type> {
        let types = self.types.read().unwrap_or_else(PoisonError::into_inner);
        types
            .live()
            .into_iter()
            .map(|(handle, _)| Type::from_handle(handle))
            .filter(|ty| module.is_none_or(|m| ty.module() == m))
            .collect()
    }

    /// Drops the snapshots of `ty` and every populated subtype.
    ///
    /// Returns `true` if a live snapshot was dropped.
    pub fn refresh(&self, ty: &Type) -> bool {
        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
        let mut dropped = false;
        types.retain(|handle, _| {
            let keep = !Type::from_handle(handle.clone()).is_subtype_of(ty);
            dropped |= !keep;
            keep
        });
        dropped
    }
}

impl MetadataProvider for ReflectProvider {
    fn provider_name(&self) -> &str {
        "ReflectProvider"
    }

    fn type_descriptor(
        &self,
        _next: &Next<'_>,
        ty: &Type,
        instance: Option<&Instance>,
    ) -> Option<Arc<dyn TypeDescriptor>> {
        Some(Arc::new(ReflectDescriptor {
            ty: ty.clone(),
            snapshot: self.snapshot(ty),
            instance: instance.cloned(),
        }))
    }

    fn extended_descriptor(
        &self,
        _next: &Next<'_>,
        instance: &Instance,
    ) -> Option<Arc<dyn TypeDescriptor>> {
        let properties = match instance.site() {
            Some(site) => site
                .extender_providers()
                .iter()
                .filter(|provider| provider.can_extend(instance))
                .flat_map(|provider| provider.extender_properties())
                .collect(),
            None => PropertyCollection::empty(),
        };
        Some(Arc::new(ExtenderDescriptor { properties }))
    }

    fn create_instance(&self, _next: &Next<'_>, ty: &Type) -> Option<Instance> {
        ty.decl().factory.as_ref().map(|factory| factory())
    }
}

// -----------------------------------------------------------------------------
// Descriptors

/// Reflected view of a type, bound to the queried instance if any.
struct ReflectDescriptor {
    ty: Type,
    snapshot: Arc<ReflectedType>,
    instance: Option<Instance>,
}

impl ReflectDescriptor {
    fn ancestors(&self) -> impl Iterator<Item = &Type> {
        core::iter::successors(Some(&self.ty), |ty| ty.base())
    }
}

impl TypeDescriptor for ReflectDescriptor {
    fn descriptor_name(&self) -> &str {
        "ReflectDescriptor"
    }

    fn attributes(&self) -> Result<AttributeCollection, MetaError> {
        self.snapshot.attributes(&self.ty)
    }

    fn properties(&self) -> Result<PropertyCollection, MetaError> {
        Ok(self.snapshot.properties(&self.ty))
    }

    fn events(&self) -> Result<EventCollection, MetaError> {
        Ok(self.snapshot.events(&self.ty))
    }

    fn class_name(&self) -> Option<String> {
        Some(self.ty.name().into())
    }

    fn component_name(&self) -> Option<String> {
        self.instance.as_ref()?.site()?.name()
    }

    fn converter(&self) -> Option<Arc<dyn TypeConverter>> {
        let declared = self.ancestors().find_map(|ty| ty.decl().converter.clone());
        Some(declared.unwrap_or_else(|| Arc::new(DefaultConverter)))
    }

    fn default_property(&self) -> Option<PropertyDescriptor> {
        let attrs = self.snapshot.attributes(&self.ty).ok()?;
        let name = &attrs.get_of::<DefaultProperty>()?.0;
        self.snapshot.properties(&self.ty).find(name).cloned()
    }

    fn default_event(&self) -> Option<EventDescriptor> {
        let attrs = self.snapshot.attributes(&self.ty).ok()?;
        let name = &attrs.get_of::<DefaultEvent>()?.0;
        self.snapshot.events(&self.ty).find(name).cloned()
    }

    fn editor(&self, kind: TypeId) -> Option<EditorRef> {
        self.ancestors()
            .find_map(|ty| ty.decl().editors.get(&kind).cloned())
    }

    fn property_owner(&self, _property: Option<&PropertyDescriptor>) -> Option<Instance> {
        self.instance.clone()
    }
}

/// Properties contributed by the extender providers of an instance's site.
struct ExtenderDescriptor {
    properties: PropertyCollection,
}

impl TypeDescriptor for ExtenderDescriptor {
    fn descriptor_name(&self) -> &str {
        "ExtenderDescriptor"
    }

    fn properties(&self) -> Result<PropertyCollection, MetaError> {
        Ok(self.properties.clone())
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;
    use core::sync::atomic::{AtomicBool, Ordering};

    use super::ReflectProvider;
    use crate::attribute::{Browsable, Category, Description};
    use crate::error::MetaError;
    use crate::ty::{Module, PropertyDecl, Type};

    #[test]
    fn inherited_members_follow_own() {
        let text = Type::builder("Text").build().unwrap();
        let base = Type::builder("Base")
            .property(PropertyDecl::new("Name", &text))
            .property(PropertyDecl::new("Tag", &text))
            .build()
            .unwrap();
        let derived = Type::builder("Derived")
            .base(&base)
            .property(PropertyDecl::new("Tag", &text).attribute(Browsable(false)))
            .property(PropertyDecl::new("Size", &text))
            .build()
            .unwrap();

        let provider = ReflectProvider::new();
        let inherited = provider.snapshot(&base).properties(&base);
        let props = provider.snapshot(&derived).properties(&derived);
        let names: Vec<&str> = props.iter().map(|p| p.name()).collect();
        assert_eq!(names, ["Tag", "Size", "Name"]);
        assert_eq!(props[0].component_type(), &derived);
        assert_eq!(props[2].component_type(), &base);
        assert!(crate::member::Member::ptr_eq(&props[2], &inherited[0]));

        // Lists are shared while in use and rebuilt once released.
        assert!(props.ptr_eq(&provider.snapshot(&derived).properties(&derived)));
        drop(props);
        let rebuilt = provider.snapshot(&derived).properties(&derived);
        assert!(crate::member::Member::ptr_eq(&rebuilt[2], &inherited[0]));
    }

    #[test]
    fn own_attributes_override_inherited() {
        let iface = Type::builder("IThing")
            .as_interface()
            .attribute(Category::new("Iface"))
            .attribute(Description::new("from interface"))
            .build()
            .unwrap();
        let base = Type::builder("Base")
            .attribute(Category::new("Base"))
            .build()
            .unwrap();
        let ty = Type::builder("Thing")
            .base(&base)
            .interface(&iface)
            .attribute(Browsable(false))
            .build()
            .unwrap();

        let attrs = ReflectProvider::new().snapshot(&ty).attributes(&ty).unwrap();
        assert_eq!(attrs.get_of::<Category>(), Some(&Category::new("Base")));
        assert!(attrs.contains(&Description::new("from interface")));
        assert!(attrs.contains(&Browsable(false)));
    }

    #[test]
    fn failed_sources_are_retried() {
        let failed_once = Arc::new(AtomicBool::new(false));
        let flag = failed_once.clone();
        let ty = Type::builder("Flaky")
            .attribute(Browsable(true))
            .attribute_source(move || {
                if flag.swap(true, Ordering::SeqCst) {
                    Ok(vec![Arc::new(Category::new("Late")) as _])
                } else {
                    Err(MetaError::AttributeSource {
                        owner: "Flaky".into(),
                        message: "not ready".into(),
                    })
                }
            })
            .build()
            .unwrap();

        let provider = ReflectProvider::new();
        let first = provider.snapshot(&ty).attributes(&ty).unwrap();
        assert!(first.contains(&Browsable(true)));
        assert!(first.get_of::<Category>().is_none());
        assert!(failed_once.load(Ordering::SeqCst));

        let second = provider.snapshot(&ty).attributes(&ty).unwrap();
        assert_eq!(second.get_of::<Category>(), Some(&Category::new("Late")));
        let third = provider.snapshot(&ty).attributes(&ty).unwrap();
        assert!(second.ptr_eq(&third));
    }

    #[test]
    fn cancellation_propagates() {
        let ty = Type::builder("Cancelled")
            .attribute_source(|| Err(MetaError::Cancelled))
            .build()
            .unwrap();
        let result = ReflectProvider::new().snapshot(&ty).attributes(&ty);
        assert_eq!(result, Err(MetaError::Cancelled));
    }

    #[test]
    fn refresh_drops_subtypes() {
        let module = Module::new("app", "shapes");
        let a = Type::builder("A").module(&module).build().unwrap();
        let b = Type::builder("B").base(&a).build().unwrap();
        let other = Type::builder("Other").build().unwrap();

        let provider = ReflectProvider::new();
        provider.snapshot(&b);
        provider.snapshot(&other);
        assert!(provider.is_populated(&a));
        assert_eq!(provider.populated_types(Some(&module)), vec![a.clone()]);

        assert!(provider.refresh(&a));
        assert!(!provider.is_populated(&a));
        assert!(!provider.is_populated(&b));
        assert!(provider.is_populated(&other));
        assert!(!provider.refresh(&a));
    }

    #[test]
    fn dropped_types_leave_the_table() {
        let text = Type::builder("Text").build().unwrap();
        let provider = ReflectProvider::new();
        for i in 0..100 {
            let ty = Type::builder(&format!("Transient{i}"))
                .property(PropertyDecl::new("Text", &text))
                .build()
                .unwrap();
            let snapshot = provider.snapshot(&ty);
            assert_eq!(snapshot.properties(&ty).len(), 1);
            assert!(provider.is_populated(&ty));
        }

        // Only the root, reached through every base link, is still alive.
        assert_eq!(provider.populated_types(None), vec![Type::object()]);
    }
}
