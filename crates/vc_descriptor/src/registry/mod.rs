//! The metadata registry: provider chains, queries, refresh and associations.
//!
//! ## Menu
//!
//! - [`MetadataRegistry`]: the context object every operation goes through.
//! - [`RefreshEvent`]: what refresh listeners receive.
//! - [`NodeKey`], [`ListenerId`]: handles for diagnostics and unsubscription.

// -----------------------------------------------------------------------------
// Modules

mod node;
mod refresh;

// -----------------------------------------------------------------------------
// Exports

pub use node::NodeKey;
pub use refresh::RefreshEvent;

// -----------------------------------------------------------------------------
// MetadataRegistry

use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use vc_utils::WeakKeyMap;

use crate::association::AssociationTable;
use crate::attribute::{AttributeCollection, AttributeRef};
use crate::component::{Component, Instance, Subject, resolution_type};
use crate::descriptor::TypeDescriptor;
use crate::error::MetaError;
use crate::member::{EventCollection, PropertyCollection};
use crate::pipeline::{InstanceCache, Query};
use crate::provider::{AttributeProvider, ChainLink, Fault, MetadataProvider, Next, ReflectProvider};
use crate::ty::Type;

use node::ProviderTables;

/// A refresh listener.
pub type RefreshListener = Arc<dyn Fn(&RefreshEvent) + Send + Sync>;

/// Identifies a listener registered with [`MetadataRegistry::subscribe_refreshed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Resolves metadata of types and instances through provider chains.
///
/// All methods take `&self`; the registry is meant to be shared, for example
/// behind an `Arc`. Provider callbacks and refresh listeners never run while
/// an internal lock is held, so they may call back into the registry.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use vc_descriptor::attribute::{Browsable, Category};
/// use vc_descriptor::registry::MetadataRegistry;
/// use vc_descriptor::ty::Type;
///
/// let a = Type::builder("A").attribute(Browsable(true)).build().unwrap();
/// let b = Type::builder("B").base(&a).build().unwrap();
///
/// let registry = MetadataRegistry::new();
/// let before = registry.metadata_version();
/// registry.add_attributes(&a, vec![Arc::new(Category::new("Shapes"))]).unwrap();
/// assert!(registry.metadata_version() > before);
///
/// // B has no registrations of its own and falls back to A's chain.
/// let attrs = registry.attributes(&b).unwrap();
/// assert!(attrs.contains(&Category::new("Shapes")));
/// assert!(attrs.contains(&Browsable(true)));
/// ```
pub struct MetadataRegistry {
    tables: RwLock<ProviderTables>,
    reflect: Arc<ReflectProvider>,
    caches: Mutex<WeakKeyMap<dyn Component, Arc<Mutex<InstanceCache>>>>,
    associations: Mutex<AssociationTable>,
    version: AtomicU64,
    collision_index: AtomicU64,
    listeners: RwLock<Vec<(ListenerId, RefreshListener)>>,
    next_listener: AtomicU64,
}

impl Default for MetadataRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataRegistry {
    /// Creates a registry with a fresh reflection provider.
    pub fn new() -> Self {
        Self::with_reflect(ReflectProvider::new())
    }

    /// Creates a registry ending every chain in `reflect`.
    pub fn with_reflect(reflect: ReflectProvider) -> Self {
        Self {
            tables: RwLock::default(),
            reflect: Arc::new(reflect),
            caches: Mutex::default(),
            associations: Mutex::default(),
            version: AtomicU64::new(0),
            collision_index: AtomicU64::new(0),
            listeners: RwLock::default(),
            next_listener: AtomicU64::new(0),
        }
    }

    /// The reflection provider chains end in.
    #[inline]
    pub fn reflect(&self) -> &ReflectProvider {
        &self.reflect
    }

    // -------------------------------------------------------------------------
    // Queries

    /// Starts a query against a type or instance.
    #[inline]
    pub fn query<'a>(&'a self, subject: impl Into<Subject<'a>>) -> Query<'a> {
        Query::new(self, subject.into())
    }

    /// Unfiltered attributes of `subject`.
    pub fn attributes<'a>(
        &'a self,
        subject: impl Into<Subject<'a>>,
    ) -> Result<AttributeCollection, MetaError> {
        self.query(subject).attributes()
    }

    /// Unfiltered properties of `subject`.
    pub fn properties<'a>(
        &'a self,
        subject: impl Into<Subject<'a>>,
    ) -> Result<PropertyCollection, MetaError> {
        self.query(subject).properties()
    }

    /// Unfiltered events of `subject`.
    pub fn events<'a>(&'a self, subject: impl Into<Subject<'a>>) -> Result<EventCollection, MetaError> {
        self.query(subject).events()
    }

    /// Asks the chain of `subject` for its primary descriptor.
    ///
    /// A chain answering `None` is reported as [`MetaError::MissingResult`].
    pub fn type_descriptor<'a>(
        &'a self,
        subject: impl Into<Subject<'a>>,
    ) -> Result<Arc<dyn TypeDescriptor>, MetaError> {
        let subject = subject.into();
        let chain = self.subject_chain(subject);
        let fault = Fault::default();
        Next::new(self, &chain, &fault)
            .type_descriptor(&subject.resolution_type(), subject.instance())
            .ok_or_else(|| fault.into_error("type_descriptor"))
    }

    /// Asks the chain of `instance` for the members its surroundings contribute.
    pub fn extended_descriptor(
        &self,
        instance: &Instance,
    ) -> Result<Arc<dyn TypeDescriptor>, MetaError> {
        let chain = self.subject_chain(Subject::Instance(instance));
        let fault = Fault::default();
        Next::new(self, &chain, &fault)
            .extended_descriptor(instance)
            .ok_or_else(|| fault.into_error("extended_descriptor"))
    }

    /// Creates an instance of `ty` through its chain.
    ///
    /// Returns `None` if no provider knows how to.
    pub fn create_instance(&self, ty: &Type) -> Option<Instance> {
        let chain = self.type_chain(ty);
        let fault = Fault::default();
        Next::new(self, &chain, &fault).create_instance(ty)
    }

    // -------------------------------------------------------------------------
    // Registration

    /// Pushes `provider` in front of the chain of `subject`, then refreshes it.
    pub fn add_provider<'a>(&self, provider: Arc<dyn MetadataProvider>, subject: impl Into<Subject<'a>>) {
        let subject = subject.into();
        log::debug!(
            "adding provider `{}` for {}",
            provider.provider_name(),
            subject.resolution_type()
        );
        {
            let mut tables = self.write_tables();
            match subject {
                Subject::Type(ty) => {
                    tables.add_type_provider(provider, ty);
                }
                Subject::Instance(instance) => {
                    tables.add_instance_provider(provider, instance);
                }
            }
        }
        self.refresh_subject(subject);
    }

    /// Splices `provider` out of the chain of `subject`, then refreshes it.
    ///
    /// Returns `false` if `provider` was not registered for `subject`.
    pub fn remove_provider<'a>(
        &self,
        provider: &Arc<dyn MetadataProvider>,
        subject: impl Into<Subject<'a>>,
    ) -> bool {
        let subject = subject.into();
        let removed = {
            let mut tables = self.write_tables();
            match subject {
                Subject::Type(ty) => tables.remove_type_provider(provider, ty),
                Subject::Instance(instance) => tables.remove_instance_provider(provider, instance),
            }
        };
        if removed {
            log::debug!(
                "removed provider `{}` for {}",
                provider.provider_name(),
                subject.resolution_type()
            );
            self.refresh_subject(subject);
        }
        removed
    }

    /// Adds `attributes` to `subject` through an [`AttributeProvider`].
    ///
    /// Returns the provider, which can be passed to
    /// [`remove_provider`](Self::remove_provider) to undo the addition.
    pub fn add_attributes<'a>(
        &self,
        subject: impl Into<Subject<'a>>,
        attributes: Vec<AttributeRef>,
    ) -> Result<Arc<dyn MetadataProvider>, MetaError> {
        let provider: Arc<dyn MetadataProvider> = Arc::new(AttributeProvider::new(attributes)?);
        self.add_provider(provider.clone(), subject);
        Ok(provider)
    }

    // -------------------------------------------------------------------------
    // Diagnostics

    /// Returns the head node of the chain of `ty`, creating missing nodes.
    ///
    /// Without `create_delegator`, a type lacking registrations resolves to the
    /// node of its nearest registered ancestor.
    pub fn resolve_node(&self, ty: &Type, create_delegator: bool) -> NodeKey {
        self.write_tables().resolve_type(ty, create_delegator)
    }

    /// The number of provider nodes, including chains of dropped types or
    /// instances that have not been collected yet.
    pub fn node_count(&self) -> usize {
        self.read_tables().node_count()
    }

    /// The global metadata version, bumped on every effective refresh.
    #[inline]
    pub fn metadata_version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    // -------------------------------------------------------------------------
    // Listeners

    /// Registers `listener` to run after every effective refresh.
    pub fn subscribe_refreshed(
        &self,
        listener: impl Fn(&RefreshEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe_refreshed(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        before != listeners.len()
    }

    // -------------------------------------------------------------------------
    // Internals

    #[inline]
    fn read_tables(&self) -> RwLockReadGuard<'_, ProviderTables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn write_tables(&self) -> RwLockWriteGuard<'_, ProviderTables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    pub(crate) fn lock_associations(&self) -> MutexGuard<'_, AssociationTable> {
        self.associations.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn lock_caches(&self) -> MutexGuard<'_, WeakKeyMap<dyn Component, Arc<Mutex<InstanceCache>>>> {
        self.caches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshots the current chain of `ty`, creating its nodes on first use.
    pub(crate) fn type_chain(&self, ty: &Type) -> Vec<ChainLink> {
        {
            let tables = self.read_tables();
            if let Some(head) = tables.lookup_type(ty, true) {
                return tables.chain(Some(head), &self.reflect);
            }
        }
        let mut tables = self.write_tables();
        let head = tables.resolve_type(ty, true);
        tables.chain(Some(head), &self.reflect)
    }

    fn subject_chain(&self, subject: Subject<'_>) -> Vec<ChainLink> {
        match subject {
            Subject::Type(ty) => self.type_chain(ty),
            Subject::Instance(instance) => {
                // Runs component callbacks, so it must not hold the tables lock.
                let ty = resolution_type(instance);
                self.read_tables().instance_chain(instance, ty, &self.reflect)
            }
        }
    }

    /// The stage cache of `instance`, created on first use.
    pub(crate) fn instance_cache(&self, instance: &Instance) -> Arc<Mutex<InstanceCache>> {
        self.lock_caches()
            .get_or_insert_with(instance, Arc::default)
            .clone()
    }

    /// Clears every stage of `instance`'s cache.
    ///
    /// Returns `false` if the instance has none yet.
    fn clear_instance_cache(&self, instance: &Instance) -> bool {
        let cache = self.lock_caches().get(instance).cloned();
        match cache {
            Some(cache) => {
                crate::pipeline::lock(&cache).clear();
                true
            }
            None => false,
        }
    }

    pub(crate) fn next_collision_index(&self) -> u64 {
        self.collision_index.fetch_add(1, Ordering::Relaxed)
    }

    /// Bumps the version, then runs every listener outside the lock.
    fn bump_and_notify(&self, event: RefreshEvent) {
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        log::debug!("metadata version {version}: refreshed {event:?}");
        let listeners: Vec<RefreshListener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }
}

impl fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataRegistry")
            .field("version", &self.metadata_version())
            .field("nodes", &self.node_count())
            .finish_non_exhaustive()
    }
}
