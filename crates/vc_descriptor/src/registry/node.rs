use alloc::sync::Arc;

use slotmap::{SlotMap, new_key_type};
use vc_utils::WeakKeyMap;
use vc_utils::hash::HashSet;

use crate::component::{Component, Instance};
use crate::provider::{ChainLink, MetadataProvider, ReflectProvider};
use crate::ty::{Type, TypeTable};

// -----------------------------------------------------------------------------
// ProviderNode

new_key_type! {
    /// Handle of a node in the provider arena.
    pub struct NodeKey;
}

/// What a node answers with.
pub(crate) enum NodeKind {
    /// A registered provider; forwards to `next`.
    Provider(Arc<dyn MetadataProvider>),
    /// Continues with the chain of the given ancestor. Always a tail.
    Delegate(Type),
    /// The reflection provider. Tail of the root type chain.
    Reflect,
}

pub(crate) struct ProviderNode {
    kind: NodeKind,
    next: Option<NodeKey>,
}

/// The result of scanning one chain during a refresh.
#[derive(Default, Clone, Copy)]
pub(crate) struct ChainScan {
    /// The chain holds at least one registered provider.
    pub providers: bool,
}

// -----------------------------------------------------------------------------
// ProviderTables

/// Node count below which dead chains are left alone.
const MIN_COLLECT_THRESHOLD: usize = 16;

/// Provider chains of every type and instance.
///
/// Type chains live in `types` once a provider was added for the type (or for
/// the root, once anything was resolved). Types without registrations get a
/// delegating node in `delegators` instead, so a later registration can be
/// spliced in front of it.
///
/// All three tables are keyed weakly. Nodes no longer reachable from a live
/// key are freed by [`collect`](Self::collect), which runs on node creation
/// once the arena has doubled since the last pass.
pub(crate) struct ProviderTables {
    nodes: SlotMap<NodeKey, ProviderNode>,
    types: TypeTable<NodeKey>,
    delegators: TypeTable<NodeKey>,
    instances: WeakKeyMap<dyn Component, NodeKey>,
    collect_at: usize,
}

impl Default for ProviderTables {
    fn default() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            types: TypeTable::new(),
            delegators: TypeTable::new(),
            instances: WeakKeyMap::new(),
            collect_at: MIN_COLLECT_THRESHOLD,
        }
    }
}

impl ProviderTables {
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the registered head node of `ty`, if resolved already.
    #[inline]
    pub fn lookup_type(&self, ty: &Type, create_delegator: bool) -> Option<NodeKey> {
        match self.types.get(ty.handle()) {
            Some(&key) => Some(key),
            None if create_delegator => self.delegators.get(ty.handle()).copied(),
            None => None,
        }
    }

    /// Returns the head node for `ty`, creating missing nodes.
    ///
    /// Without `create_delegator`, a type lacking registrations resolves to
    /// the node of its nearest ancestor that has one.
    pub fn resolve_type(&mut self, ty: &Type, create_delegator: bool) -> NodeKey {
        if let Some(key) = self.lookup_type(ty, create_delegator) {
            return key;
        }
        let Some(base) = ty.conceptual_base() else {
            let key = self.insert_node(NodeKind::Reflect, None);
            self.types.insert(ty.handle(), key);
            return key;
        };
        if !create_delegator {
            return self.resolve_type(&base, false);
        }

        // Resolve ancestors first so every chain bottoms out in the root node.
        self.resolve_type(&base, true);
        let key = self.insert_node(NodeKind::Delegate(base), None);
        self.delegators.insert(ty.handle(), key);
        key
    }

    /// Returns the head node of an instance-specific chain.
    #[inline]
    pub fn lookup_instance(&self, instance: &Instance) -> Option<NodeKey> {
        self.instances.get(instance).copied()
    }

    /// Snapshots the chain starting at `head`.
    pub fn chain(&self, mut head: Option<NodeKey>, reflect: &Arc<ReflectProvider>) -> Vec<ChainLink> {
        let mut links = Vec::new();
        while let Some(node) = head.and_then(|key| self.nodes.get(key)) {
            links.push(match &node.kind {
                NodeKind::Provider(provider) => ChainLink::Provider(provider.clone()),
                NodeKind::Delegate(ancestor) => ChainLink::Delegate(ancestor.clone()),
                NodeKind::Reflect => ChainLink::Provider(reflect.clone()),
            });
            head = node.next;
        }
        links
    }

    /// Snapshots the instance chain, ending with the chain of `ty`.
    ///
    /// `ty` is the resolution type of `instance`, computed by the caller.
    pub fn instance_chain(
        &self,
        instance: &Instance,
        ty: Type,
        reflect: &Arc<ReflectProvider>,
    ) -> Vec<ChainLink> {
        let mut links = self.chain(self.lookup_instance(instance), reflect);
        links.push(ChainLink::Delegate(ty));
        links
    }

    pub fn add_type_provider(&mut self, provider: Arc<dyn MetadataProvider>, ty: &Type) -> NodeKey {
        let next = self.resolve_type(ty, true);
        let head = self.insert_node(NodeKind::Provider(provider), Some(next));
        self.types.insert(ty.handle(), head);
        self.debug_check(Some(head));
        head
    }

    pub fn add_instance_provider(
        &mut self,
        provider: Arc<dyn MetadataProvider>,
        instance: &Instance,
    ) -> NodeKey {
        let next = self.lookup_instance(instance);
        let head = self.insert_node(NodeKind::Provider(provider), next);
        self.instances.insert(instance, head);
        head
    }

    /// Splices `provider` out of the chain of `ty`.
    ///
    /// Returns `false` if it was not registered there.
    pub fn remove_type_provider(&mut self, provider: &Arc<dyn MetadataProvider>, ty: &Type) -> bool {
        let Some(head) = self.types.get(ty.handle()).copied() else {
            return false;
        };
        let Some((prev, found, next)) = self.find_provider(head, provider) else {
            return false;
        };

        match prev {
            Some(prev) => self.relink(prev, next),
            None => match next {
                // A delegator stays reachable through `delegators`.
                Some(next) if !self.is_delegate(next) => {
                    self.types.insert(ty.handle(), next);
                }
                _ => {
                    self.types.remove(ty.handle());
                }
            },
        }
        self.nodes.remove(found);
        self.debug_check(self.types.get(ty.handle()).copied());
        true
    }

    pub fn remove_instance_provider(
        &mut self,
        provider: &Arc<dyn MetadataProvider>,
        instance: &Instance,
    ) -> bool {
        let Some(head) = self.lookup_instance(instance) else {
            return false;
        };
        let Some((prev, found, next)) = self.find_provider(head, provider) else {
            return false;
        };

        match (prev, next) {
            (Some(prev), next) => self.relink(prev, next),
            (None, Some(next)) => {
                self.instances.insert(instance, next);
            }
            (None, None) => {
                self.instances.remove(instance);
            }
        }
        self.nodes.remove(found);
        true
    }

    /// Scans the chain registered for `ty` without following delegation.
    #[cfg(test)]
    pub fn scan_type(&self, ty: &Type) -> ChainScan {
        self.scan(self.types.get(ty.handle()).copied())
    }

    /// Returns `true` if `target` or one of its subtypes has a registered provider.
    pub fn has_providers_within(&self, target: &Type) -> bool {
        self.types.live().into_iter().any(|(handle, &head)| {
            Type::from_handle(handle).is_subtype_of(target) && self.scan(Some(head)).providers
        })
    }

    /// Live types with an explicit chain.
    pub fn registered_types(&self) -> Vec<Type> {
        self.types
            .live()
            .into_iter()
            .map(|(handle, _)| Type::from_handle(handle))
            .collect()
    }

    /// Frees every node no longer reachable from a live type or instance.
    ///
    /// Freeing a delegator releases its ancestor, which may free further
    /// chains, so passes repeat until nothing changes. Returns the number of
    /// freed nodes.
    pub fn collect(&mut self) -> usize {
        let before = self.nodes.len();
        loop {
            let reachable = self.reachable_nodes();
            let count = self.nodes.len();
            self.nodes.retain(|key, _| reachable.contains(&key));
            if self.nodes.len() == count {
                break;
            }
        }
        self.types.prune();
        self.delegators.prune();
        self.instances.prune();

        let freed = before - self.nodes.len();
        if freed > 0 {
            log::trace!("freed {freed} provider nodes of dropped types or instances");
        }
        freed
    }

    // -------------------------------------------------------------------------
    // Internals

    /// Inserts a node, collecting dead chains first once the arena has grown.
    fn insert_node(&mut self, kind: NodeKind, next: Option<NodeKey>) -> NodeKey {
        if self.nodes.len() >= self.collect_at {
            self.collect();
            self.collect_at = usize::max(self.nodes.len() * 2, MIN_COLLECT_THRESHOLD);
        }
        self.nodes.insert(ProviderNode { kind, next })
    }

    fn scan(&self, mut head: Option<NodeKey>) -> ChainScan {
        let mut scan = ChainScan::default();
        while let Some(node) = head.and_then(|key| self.nodes.get(key)) {
            match node.kind {
                NodeKind::Provider(_) => scan.providers = true,
                NodeKind::Delegate(_) | NodeKind::Reflect => break,
            }
            head = node.next;
        }
        scan
    }

    /// Returns `(previous, found, next)` for the node holding `provider`.
    fn find_provider(
        &self,
        head: NodeKey,
        provider: &Arc<dyn MetadataProvider>,
    ) -> Option<(Option<NodeKey>, NodeKey, Option<NodeKey>)> {
        let mut prev = None;
        let mut current = Some(head);
        while let Some(key) = current {
            let node = self.nodes.get(key)?;
            match &node.kind {
                NodeKind::Provider(p) if core::ptr::addr_eq(Arc::as_ptr(p), Arc::as_ptr(provider)) => {
                    return Some((prev, key, node.next));
                }
                NodeKind::Provider(_) => {}
                NodeKind::Delegate(_) | NodeKind::Reflect => return None,
            }
            prev = Some(key);
            current = node.next;
        }
        None
    }

    fn relink(&mut self, prev: NodeKey, next: Option<NodeKey>) {
        if let Some(node) = self.nodes.get_mut(prev) {
            node.next = next;
        }
    }

    fn is_delegate(&self, key: NodeKey) -> bool {
        matches!(
            self.nodes.get(key),
            Some(ProviderNode {
                kind: NodeKind::Delegate(_),
                ..
            })
        )
    }

    /// Nodes on the chain of a live key.
    fn reachable_nodes(&self) -> HashSet<NodeKey> {
        let heads: Vec<NodeKey> = self
            .types
            .live()
            .into_iter()
            .chain(self.delegators.live())
            .map(|(_, &key)| key)
            .chain(self.instances.live().into_iter().map(|(_, &key)| key))
            .collect();

        let mut reachable = HashSet::default();
        for head in heads {
            let mut current = Some(head);
            while let Some(key) = current {
                if !reachable.insert(key) {
                    break;
                }
                current = self.nodes.get(key).and_then(|node| node.next);
            }
        }
        reachable
    }

    /// Every type chain must end in a delegate or the reflection node.
    #[inline]
    fn debug_check(&self, head: Option<NodeKey>) {
        #[cfg(all(debug_assertions, feature = "debug"))]
        {
            let mut current = head;
            let mut tail = None;
            while let Some(node) = current.and_then(|key| self.nodes.get(key)) {
                tail = Some(&node.kind);
                current = node.next;
            }
            debug_assert!(
                tail.is_none_or(|kind| !matches!(kind, NodeKind::Provider(_))),
                "type chain does not end in a delegate or the reflection node"
            );
        }
        #[cfg(not(all(debug_assertions, feature = "debug")))]
        let _ = head;
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use super::{MIN_COLLECT_THRESHOLD, ProviderTables};
    use crate::provider::{ChainLink, MetadataProvider, ReflectProvider};
    use crate::ty::Type;

    struct Named;

    impl MetadataProvider for Named {}

    fn shape(chain: &[ChainLink]) -> Vec<&'static str> {
        chain
            .iter()
            .map(|link| match link {
                ChainLink::Provider(p) if p.provider_name() == "ReflectProvider" => "reflect",
                ChainLink::Provider(_) => "provider",
                ChainLink::Delegate(_) => "delegate",
            })
            .collect()
    }

    #[test]
    fn lazy_delegation() {
        let reflect = Arc::new(ReflectProvider::new());
        let a = Type::builder("A").build().unwrap();
        let b = Type::builder("B").base(&a).build().unwrap();

        let mut tables = ProviderTables::default();
        let key = tables.resolve_type(&b, true);
        assert_eq!(tables.resolve_type(&b, true), key);
        // root reflect node, plus one delegator for each of A and B
        assert_eq!(tables.node_count(), 3);
        assert_eq!(shape(&tables.chain(Some(key), &reflect)), ["delegate"]);

        let root = tables.resolve_type(&Type::object(), true);
        assert_eq!(tables.resolve_type(&b, false), root);
        assert_eq!(tables.lookup_type(&b, false), None);
    }

    #[test]
    fn stacking_and_splicing() {
        let reflect = Arc::new(ReflectProvider::new());
        let a = Type::builder("A").build().unwrap();
        let first: Arc<dyn MetadataProvider> = Arc::new(Named);
        let second: Arc<dyn MetadataProvider> = Arc::new(Named);

        let mut tables = ProviderTables::default();
        tables.add_type_provider(first.clone(), &a);
        let head = tables.add_type_provider(second.clone(), &a);
        assert_eq!(
            shape(&tables.chain(Some(head), &reflect)),
            ["provider", "provider", "delegate"]
        );
        assert!(tables.scan_type(&a).providers);

        assert!(tables.remove_type_provider(&first, &a));
        assert!(!tables.remove_type_provider(&first, &a));
        let head = tables.lookup_type(&a, false).unwrap();
        assert_eq!(shape(&tables.chain(Some(head), &reflect)), ["provider", "delegate"]);

        // Removing the last provider falls back to the delegator table.
        assert!(tables.remove_type_provider(&second, &a));
        assert_eq!(tables.lookup_type(&a, false), None);
        let head = tables.resolve_type(&a, true);
        assert_eq!(shape(&tables.chain(Some(head), &reflect)), ["delegate"]);
        assert!(!tables.scan_type(&a).providers);
    }

    #[test]
    fn root_providers_end_in_reflection() {
        let reflect = Arc::new(ReflectProvider::new());
        let root = Type::object();
        let provider: Arc<dyn MetadataProvider> = Arc::new(Named);

        let mut tables = ProviderTables::default();
        let head = tables.add_type_provider(provider.clone(), &root);
        assert_eq!(shape(&tables.chain(Some(head), &reflect)), ["provider", "reflect"]);

        assert!(tables.remove_type_provider(&provider, &root));
        let head = tables.lookup_type(&root, false).unwrap();
        assert_eq!(shape(&tables.chain(Some(head), &reflect)), ["reflect"]);
        assert_eq!(tables.node_count(), 1);
    }

    #[test]
    fn dropped_types_free_their_nodes() {
        let provider: Arc<dyn MetadataProvider> = Arc::new(Named);
        let kept = Type::builder("Kept").build().unwrap();

        let mut tables = ProviderTables::default();
        tables.add_type_provider(provider.clone(), &kept);
        // root reflect node, plus the delegator and provider of Kept
        assert_eq!(tables.node_count(), 3);

        for i in 0..100 {
            let base = Type::builder(&format!("Base{i}")).build().unwrap();
            let derived = Type::builder(&format!("Derived{i}")).base(&base).build().unwrap();
            tables.add_type_provider(provider.clone(), &derived);
            assert!(tables.has_providers_within(&base));
        }
        assert!(tables.node_count() < 2 * MIN_COLLECT_THRESHOLD);

        // A delegator pins its ancestor, so dead chains go over several passes.
        tables.collect();
        assert_eq!(tables.node_count(), 3);
        assert_eq!(tables.registered_types().len(), 2);
        assert!(tables.lookup_type(&kept, false).is_some());
    }
}
