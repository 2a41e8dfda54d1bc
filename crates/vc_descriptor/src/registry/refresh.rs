use core::fmt;

use super::MetadataRegistry;
use crate::component::{Instance, Subject, resolution_type};
use crate::ty::{Module, Type};

// -----------------------------------------------------------------------------
// RefreshEvent

/// What a refresh invalidated.
#[derive(Clone)]
pub enum RefreshEvent {
    /// Metadata of the type and its subtypes.
    Type(Type),
    /// Metadata of one instance.
    Instance(Instance),
}

impl RefreshEvent {
    /// The affected type. For an instance, the type its chain resolves through.
    pub fn ty(&self) -> Type {
        match self {
            Self::Type(ty) => ty.clone(),
            Self::Instance(instance) => resolution_type(instance),
        }
    }

    #[inline]
    pub fn instance(&self) -> Option<&Instance> {
        match self {
            Self::Type(_) => None,
            Self::Instance(instance) => Some(instance),
        }
    }
}

impl fmt::Debug for RefreshEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(ty) => f.debug_tuple("Type").field(ty).finish(),
            Self::Instance(instance) => f
                .debug_tuple("Instance")
                .field(&resolution_type(instance))
                .finish(),
        }
    }
}

// -----------------------------------------------------------------------------
// Refresh

impl MetadataRegistry {
    /// Invalidates metadata of `ty` and its subtypes.
    ///
    /// Returns `true`, after bumping the version and notifying listeners, if
    /// a provider chain or a reflected snapshot was affected.
    pub fn refresh_type(&self, ty: &Type) -> bool {
        self.refresh_type_inner(ty, false)
    }

    /// Invalidates metadata of `instance`, including its type.
    ///
    /// Every stage cache of `instance` is cleared. Returns `true`, after
    /// bumping the version and sending a [`RefreshEvent::Instance`], if the
    /// instance had a cache or its type was affected.
    pub fn refresh_instance(&self, instance: &Instance) -> bool {
        self.refresh_instance_inner(instance, false)
    }

    /// Refreshes every registered or populated type declared in `module`.
    ///
    /// Listeners receive one event per affected type.
    pub fn refresh_module(&self, module: &Module) -> bool {
        self.refresh_where(|ty| ty.module() == module)
    }

    /// Refreshes every registered or populated type of the assembly named `assembly`.
    pub fn refresh_assembly(&self, assembly: &str) -> bool {
        self.refresh_where(|ty| ty.module().assembly() == assembly)
    }

    // -------------------------------------------------------------------------
    // Internals

    /// Refreshes after a registration change, which always counts as affecting.
    pub(super) fn refresh_subject(&self, subject: Subject<'_>) {
        match subject {
            Subject::Type(ty) => {
                self.refresh_type_inner(ty, true);
            }
            Subject::Instance(instance) => {
                self.refresh_instance_inner(instance, true);
            }
        }
    }

    fn refresh_instance_inner(&self, instance: &Instance, force: bool) -> bool {
        let invalidated = self.invalidate(&resolution_type(instance));
        let cleared = self.clear_instance_cache(instance);
        let affected = invalidated || cleared || force;
        if affected {
            self.bump_and_notify(RefreshEvent::Instance(instance.clone()));
        }
        affected
    }

    fn refresh_type_inner(&self, ty: &Type, force: bool) -> bool {
        let affected = self.invalidate(ty) || force;
        if affected {
            self.bump_and_notify(RefreshEvent::Type(ty.clone()));
        }
        affected
    }

    /// Drops reflected snapshots of `target` and its subtypes.
    ///
    /// Returns `true` if a snapshot was dropped or a chain within `target`
    /// holds registered providers.
    fn invalidate(&self, target: &Type) -> bool {
        let registered = self.read_tables().has_providers_within(target);
        let dropped = self.reflect.refresh(target);
        registered || dropped
    }

    fn refresh_where(&self, belongs: impl Fn(&Type) -> bool) -> bool {
        let mut targets = self.read_tables().registered_types();
        for ty in self.reflect.populated_types(None) {
            if !targets.contains(&ty) {
                targets.push(ty);
            }
        }
        targets.retain(|ty| belongs(ty));

        let mut any = false;
        for ty in &targets {
            any |= self.refresh_type_inner(ty, false);
        }
        any
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread;

    use indexmap::IndexMap;

    use super::RefreshEvent;
    use crate::attribute::{
        AttributeRef, Browsable, Category, DefaultProperty, Description, ExtenderProvided,
    };
    use crate::component::{Component, ExtenderProvider, FilterService, Instance, Site};
    use crate::descriptor::TypeDescriptor;
    use crate::error::MetaError;
    use crate::member::{EventDescriptor, PropertyCollection, PropertyDescriptor};
    use crate::pipeline;
    use crate::provider::{ExternalHandler, ExternalHandlerProvider, MetadataProvider, Next};
    use crate::registry::MetadataRegistry;
    use crate::ty::{Module, PropertyDecl, Type};

    // Fixtures ---------------------------------------------------------------

    struct Widget {
        ty: Type,
        site: Option<Arc<dyn Site>>,
        custom: Option<Box<dyn TypeDescriptor>>,
        foreign: bool,
    }

    impl Component for Widget {
        fn component_type(&self) -> Type {
            self.ty.clone()
        }

        fn site(&self) -> Option<Arc<dyn Site>> {
            self.site.clone()
        }

        fn custom_descriptor(&self) -> Option<&dyn TypeDescriptor> {
            self.custom.as_deref()
        }

        fn is_foreign(&self) -> bool {
            self.foreign
        }
    }

    fn widget(ty: &Type) -> Instance {
        Arc::new(Widget {
            ty: ty.clone(),
            site: None,
            custom: None,
            foreign: false,
        })
    }

    fn sited(ty: &Type, site: Arc<dyn Site>) -> Instance {
        Arc::new(Widget {
            ty: ty.clone(),
            site: Some(site),
            custom: None,
            foreign: false,
        })
    }

    fn text() -> Type {
        Type::builder("Text").build().unwrap()
    }

    fn panel() -> Type {
        let text = text();
        Type::builder("Panel")
            .property(PropertyDecl::new("Visible", &text))
            .property(PropertyDecl::new("Handle", &text).attribute(Browsable(false)))
            .build()
            .unwrap()
    }

    fn names(props: &PropertyCollection) -> Vec<&str> {
        props.iter().map(|p| p.name()).collect()
    }

    /// Answers `None` for every type descriptor request.
    struct Silent;

    impl MetadataProvider for Silent {
        fn provider_name(&self) -> &str {
            "Silent"
        }

        fn type_descriptor(
            &self,
            _next: &Next<'_>,
            _ty: &Type,
            _instance: Option<&Instance>,
        ) -> Option<Arc<dyn TypeDescriptor>> {
            None
        }
    }

    // Tests ------------------------------------------------------------------

    #[test]
    fn repeated_queries_are_identical() {
        let ty = panel();
        let registry = MetadataRegistry::new();
        let instance = widget(&ty);

        let first = registry.attributes(&instance).unwrap();
        let second = registry.attributes(&instance).unwrap();
        assert!(first.ptr_eq(&second));

        let first = registry.properties(&instance).unwrap();
        let second = registry.properties(&instance).unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(names(&first), ["Visible", "Handle"]);
    }

    #[test]
    fn refresh_recomputes_from_reflection() {
        let ty = panel();
        let registry = MetadataRegistry::new();
        let instance = widget(&ty);

        let before = registry.properties(&instance).unwrap();
        assert!(registry.refresh_type(&ty));
        let after = registry.properties(&instance).unwrap();
        assert!(!before.ptr_eq(&after));
        assert_eq!(before, after);

        // Nothing populated or registered any more.
        let unrelated = Type::builder("Unrelated").build().unwrap();
        let version = registry.metadata_version();
        assert!(!registry.refresh_type(&unrelated));
        assert_eq!(registry.metadata_version(), version);
    }

    #[test]
    fn subtypes_fall_back_to_base_chain() {
        let a = Type::builder("A").build().unwrap();
        let b = Type::builder("B").base(&a).build().unwrap();
        let registry = MetadataRegistry::new();

        registry
            .add_attributes(&a, vec![Arc::new(Category::new("Shapes"))])
            .unwrap();

        let on_a = registry.attributes(&a).unwrap();
        let on_b = registry.attributes(&b).unwrap();
        assert_eq!(on_a, on_b);
        assert_eq!(on_b.get_of::<Category>(), Some(&Category::new("Shapes")));
    }

    #[test]
    fn attribute_filter_hides_members() {
        let ty = panel();
        let registry = MetadataRegistry::new();
        let instance = widget(&ty);

        let shown: AttributeRef = Arc::new(Browsable(true));
        let hidden: AttributeRef = Arc::new(Browsable(false));

        let props = registry.query(&instance).filter(&[shown.clone()]).properties().unwrap();
        assert_eq!(names(&props), ["Visible"]);
        let again = registry.query(&instance).filter(&[shown]).properties().unwrap();
        assert!(props.ptr_eq(&again));

        let props = registry.query(&instance).filter(&[hidden]).properties().unwrap();
        assert_eq!(names(&props), ["Handle"]);
    }

    #[test]
    fn removing_a_provider_restores_reflection() {
        let ty = panel();
        let registry = MetadataRegistry::new();
        let instance = widget(&ty);

        let provider = registry
            .add_attributes(&instance, vec![Arc::new(Description::new("Instance only"))])
            .unwrap();
        assert!(registry.attributes(&instance).unwrap().get_of::<Description>().is_some());
        assert!(!registry.attributes(&ty).unwrap().get_of::<Description>().is_some());

        assert!(registry.remove_provider(&provider, &instance));
        assert!(!registry.remove_provider(&provider, &instance));
        assert!(!registry.attributes(&instance).unwrap().get_of::<Description>().is_some());
    }

    #[test]
    fn silent_provider_reports_missing_result() {
        let ty = panel();
        let registry = MetadataRegistry::new();
        registry.add_provider(Arc::new(Silent), &ty);

        let err = registry.properties(&ty).unwrap_err();
        assert_eq!(
            err,
            MetaError::MissingResult {
                provider: "Silent".into(),
                method: "type_descriptor",
            }
        );
    }

    #[test]
    fn listeners_see_every_bump() {
        let ty = panel();
        let registry = MetadataRegistry::new();
        let events = Arc::new(Mutex::new(Vec::new()));

        let sink = events.clone();
        let id = registry.subscribe_refreshed(move |event| {
            sink.lock().unwrap().push(event.ty());
        });

        let before = registry.metadata_version();
        registry
            .add_attributes(&ty, vec![Arc::new(Category::new("X"))])
            .unwrap();
        let instance = widget(&ty);
        registry.refresh_instance(&instance);
        assert_eq!(registry.metadata_version(), before + 2);
        assert_eq!(*events.lock().unwrap(), [ty.clone(), ty.clone()]);

        assert!(registry.unsubscribe_refreshed(id));
        assert!(!registry.unsubscribe_refreshed(id));
        registry.refresh_type(&ty);
        assert_eq!(events.lock().unwrap().len(), 2);
    }

    #[test]
    fn module_refresh_notifies_each_type() {
        let module = Module::new("Shapes.dll", "Shapes");
        let other = Module::new("Other.dll", "Other");
        let a = Type::builder("A").module(&module).build().unwrap();
        let b = Type::builder("B").module(&module).build().unwrap();
        let c = Type::builder("C").module(&other).build().unwrap();

        let registry = MetadataRegistry::new();
        for ty in [&a, &b, &c] {
            registry.attributes(ty).unwrap();
        }

        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        registry.subscribe_refreshed(move |event| {
            assert!(matches!(event, RefreshEvent::Type(_)));
            counter.fetch_add(1, Ordering::Relaxed);
        });

        assert!(registry.refresh_module(&module));
        assert_eq!(count.load(Ordering::Relaxed), 2);
        assert!(registry.reflect().is_populated(&c));
        assert!(!registry.reflect().is_populated(&a));

        assert!(registry.refresh_assembly("Other.dll"));
        assert_eq!(count.load(Ordering::Relaxed), 3);
        assert!(!registry.refresh_assembly("Other.dll"));
    }

    #[test]
    fn concurrent_first_queries_agree() {
        let a = Type::builder("A").build().unwrap();
        let b = Type::builder("B").base(&a).build().unwrap();
        let ty = Type::builder("C")
            .base(&b)
            .property(PropertyDecl::new("Size", &text()))
            .build()
            .unwrap();
        let registry = Arc::new(MetadataRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let ty = ty.clone();
                thread::spawn(move || registry.properties(&ty).unwrap())
            })
            .collect();
        let results: Vec<PropertyCollection> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        for result in &results {
            assert_eq!(result, &results[0]);
        }
        // root, A, B and C
        assert_eq!(registry.node_count(), 4);
    }

    #[test]
    fn foreign_instances_use_external_handler() {
        struct Handler;

        impl ExternalHandler for Handler {
            fn class_name(&self, _instance: &Instance) -> Option<String> {
                Some("ForeignThing".into())
            }

            fn attributes(&self, _instance: &Instance) -> Result<Vec<AttributeRef>, MetaError> {
                Ok(vec![Arc::new(Category::new("Foreign"))])
            }

            fn properties(
                &self,
                _instance: &Instance,
            ) -> Result<Vec<PropertyDescriptor>, MetaError> {
                Ok(Vec::new())
            }

            fn events(
                &self,
                _instance: &Instance,
            ) -> Result<Vec<EventDescriptor>, MetaError> {
                Ok(Vec::new())
            }
        }

        let registry = MetadataRegistry::new();
        registry.add_provider(
            Arc::new(ExternalHandlerProvider::new(Arc::new(Handler))),
            &Type::foreign(),
        );

        let foreign: Instance = Arc::new(Widget {
            ty: panel(),
            site: None,
            custom: None,
            foreign: true,
        });
        let attrs = registry.attributes(&foreign).unwrap();
        assert_eq!(attrs.get_of::<Category>(), Some(&Category::new("Foreign")));
        assert_eq!(
            registry.query(&foreign).class_name().unwrap().as_deref(),
            Some("ForeignThing")
        );

        let native = widget(&panel());
        assert_eq!(
            registry.query(&native).class_name().unwrap().as_deref(),
            Some("Panel")
        );
    }

    #[test]
    fn custom_descriptor_leads_the_merge() {
        struct Own(PropertyCollection);

        impl TypeDescriptor for Own {
            fn properties(&self) -> Result<PropertyCollection, MetaError> {
                Ok(self.0.clone())
            }
        }

        let ty = panel();
        let own = PropertyDescriptor::builder("Own", &ty, &text()).build().unwrap();
        let instance: Instance = Arc::new(Widget {
            ty: ty.clone(),
            site: None,
            custom: Some(Box::new(Own(PropertyCollection::new(vec![own])))),
            foreign: false,
        });
        let registry = MetadataRegistry::new();

        let props = registry.properties(&instance).unwrap();
        assert_eq!(names(&props), ["Own", "Visible", "Handle"]);
        assert!(props.ptr_eq(&registry.properties(&instance).unwrap()));

        let plain = registry.query(&instance).no_custom_descriptor().properties().unwrap();
        assert_eq!(names(&plain), ["Visible", "Handle"]);
    }

    /// Adds one extender property, also called `Visible`.
    struct Extender(PropertyDescriptor);

    impl ExtenderProvider for Extender {
        fn can_extend(&self, _component: &Instance) -> bool {
            true
        }

        fn extender_properties(&self) -> Vec<PropertyDescriptor> {
            vec![self.0.clone()]
        }
    }

    /// Removes `Handle` and counts its property calls.
    struct DropHandle {
        calls: AtomicUsize,
        cacheable: bool,
    }

    impl FilterService for DropHandle {
        fn filter_properties(
            &self,
            _component: &Instance,
            properties: &mut IndexMap<String, PropertyDescriptor>,
        ) -> bool {
            self.calls.fetch_add(1, Ordering::Relaxed);
            properties.shift_remove("Handle");
            self.cacheable
        }
    }

    struct Host {
        service: Arc<DropHandle>,
        extenders: Vec<Arc<dyn ExtenderProvider>>,
    }

    impl Site for Host {
        fn filter_service(&self) -> Option<Arc<dyn FilterService>> {
            Some(self.service.clone())
        }

        fn extender_providers(&self) -> Vec<Arc<dyn ExtenderProvider>> {
            self.extenders.clone()
        }
    }

    /// An instance of `ty` on a site with a `ToolTip` extender and [`DropHandle`].
    fn hosted(ty: &Type, cacheable: bool) -> (Instance, Arc<DropHandle>) {
        let tip_owner = Type::builder("ToolTip").build().unwrap();
        let tip = PropertyDescriptor::builder("Visible", &tip_owner, &text())
            .attribute(ExtenderProvided::new("toolTip1"))
            .build()
            .unwrap();
        let service = Arc::new(DropHandle {
            calls: AtomicUsize::new(0),
            cacheable,
        });
        let extender: Arc<dyn ExtenderProvider> = Arc::new(Extender(tip));
        let site: Arc<dyn Site> = Arc::new(Host {
            service: service.clone(),
            extenders: vec![extender],
        });
        (sited(ty, site), service)
    }

    #[test]
    fn filter_service_and_extenders() {
        let ty = panel();
        for cacheable in [true, false] {
            let (instance, service) = hosted(&ty, cacheable);
            let registry = MetadataRegistry::new();

            let props = registry.properties(&instance).unwrap();
            assert_eq!(names(&props), ["Visible", "Visible"]);
            assert!(props[1].is_extender());

            registry.properties(&instance).unwrap();
            let expected = if cacheable { 1 } else { 2 };
            assert_eq!(service.calls.load(Ordering::Relaxed), expected);
        }
    }

    #[test]
    fn refresh_instance_clears_every_stage() {
        let ty = panel();
        let (instance, service) = hosted(&ty, true);
        let registry = MetadataRegistry::new();
        let shown: AttributeRef = Arc::new(Browsable(true));

        registry.attributes(&instance).unwrap();
        let props = registry.query(&instance).filter(&[shown.clone()]).properties().unwrap();
        registry.query(&instance).filter(&[shown.clone()]).events().unwrap();
        assert_eq!(names(&props), ["Visible", "Visible"]);

        let cache = registry.instance_cache(&instance);
        {
            let cache = pipeline::lock(&cache);
            assert!(cache.attributes.initialize.is_some());
            assert!(cache.attributes.filter.is_some());
            assert!(cache.properties.initialize.is_some());
            assert!(cache.properties.merge.is_some());
            assert!(cache.properties.filter.is_some());
            assert!(cache.properties.attribute_filter.is_some());
            assert!(cache.events.initialize.is_some());
            assert!(cache.events.filter.is_some());
            assert!(cache.events.attribute_filter.is_some());
        }

        assert!(registry.refresh_instance(&instance));
        assert!(pipeline::lock(&cache).is_empty());

        let again = registry.query(&instance).filter(&[shown]).properties().unwrap();
        assert_eq!(service.calls.load(Ordering::Relaxed), 2);
        assert!(!props.ptr_eq(&again));
        assert_eq!(names(&again), ["Visible", "Visible"]);
    }

    #[test]
    fn unrelated_bump_reruns_filters() {
        let ty = panel();
        let (instance, service) = hosted(&ty, true);
        let registry = MetadataRegistry::new();
        let shown: AttributeRef = Arc::new(Browsable(true));
        let query = || registry.query(&instance).filter(&[shown.clone()]).properties().unwrap();

        let first = query();
        assert!(first.ptr_eq(&query()));
        assert_eq!(service.calls.load(Ordering::Relaxed), 1);

        let unrelated = Type::builder("Unrelated").build().unwrap();
        registry
            .add_attributes(&unrelated, vec![Arc::new(Category::new("Elsewhere"))])
            .unwrap();

        let second = query();
        assert_eq!(service.calls.load(Ordering::Relaxed), 2);
        assert!(!first.ptr_eq(&second));
        assert_eq!(first, second);

        // Only the filter stages ran again.
        assert!(first.same_elements(&second));
    }

    #[test]
    fn untouched_instances_refresh_quietly() {
        let ty = panel();
        let registry = MetadataRegistry::new();
        let instance = widget(&ty);

        let version = registry.metadata_version();
        assert!(!registry.refresh_instance(&instance));
        assert_eq!(registry.metadata_version(), version);

        registry.properties(&instance).unwrap();
        assert!(registry.refresh_instance(&instance));
        assert_eq!(registry.metadata_version(), version + 1);
    }

    #[test]
    fn custom_descriptor_falls_back_for_scalars() {
        struct Own(PropertyCollection);

        impl TypeDescriptor for Own {
            fn properties(&self) -> Result<PropertyCollection, MetaError> {
                Ok(self.0.clone())
            }
        }

        struct Renamed;

        impl TypeDescriptor for Renamed {
            fn class_name(&self) -> Option<String> {
                Some("Renamed".into())
            }
        }

        let text = text();
        let ty = Type::builder("Panel")
            .attribute(DefaultProperty::new("Visible"))
            .property(PropertyDecl::new("Visible", &text))
            .build()
            .unwrap();
        let own = PropertyDescriptor::builder("Own", &ty, &text).build().unwrap();
        let instance: Instance = Arc::new(Widget {
            ty: ty.clone(),
            site: None,
            custom: Some(Box::new(Own(PropertyCollection::new(vec![own])))),
            foreign: false,
        });
        let registry = MetadataRegistry::new();
        let query = registry.query(&instance);

        assert!(query.converter().is_ok());
        assert_eq!(query.class_name().unwrap().as_deref(), Some("Panel"));
        assert_eq!(query.default_property().unwrap().unwrap().name(), "Visible");
        let owner = query.property_owner(None).unwrap().unwrap();
        assert!(Arc::ptr_eq(&owner, &instance));

        let renamed: Instance = Arc::new(Widget {
            ty: ty.clone(),
            site: None,
            custom: Some(Box::new(Renamed)),
            foreign: false,
        });
        let query = registry.query(&renamed);
        assert_eq!(query.class_name().unwrap().as_deref(), Some("Renamed"));
        assert_eq!(
            query.no_custom_descriptor().class_name().unwrap().as_deref(),
            Some("Panel")
        );
    }

    #[test]
    fn dropped_types_release_their_chains() {
        let text = text();
        let registry = MetadataRegistry::new();
        for i in 0..100 {
            let ty = Type::builder(&format!("Transient{i}"))
                .property(PropertyDecl::new("Text", &text))
                .build()
                .unwrap();
            assert_eq!(registry.properties(&ty).unwrap().len(), 1);
            registry.properties(&widget(&ty)).unwrap();
        }

        // Dead caches not yet pruned keep a few types around.
        assert!(registry.node_count() < 50);
        assert!(registry.reflect().populated_types(None).len() < 50);

        let ty = panel();
        registry.properties(&ty).unwrap();
        assert!(registry.reflect().populated_types(None).contains(&ty));
    }
}
