//! Runtime type model consumed by the metadata pipeline.
//!
//! Rust has no runtime class hierarchy, so types describing components are
//! built at runtime with [`Type::builder`]. A [`Type`] carries:
//!
//! - **identity**: a process-unique [`TypeKey`]; equality and hashing use it.
//! - **hierarchy**: an optional base type and a list of interface types.
//! - **location**: the [`Module`] (and through it, the assembly) it lives in.
//! - **declarations**: attributes, properties, events, converter, editors and
//!   an optional instance factory, read by the reflection provider.
//!
//! Two synthetic types exist: [`Type::object`] is the root of every hierarchy,
//! and [`Type::foreign`] stands in for any foreign object.

// -----------------------------------------------------------------------------
// Modules

mod decl;
mod module;

// -----------------------------------------------------------------------------
// Exports

pub use decl::{AttributeSource, EditorRef, EventDecl, InstanceFactory, PropertyDecl};
pub use module::Module;

pub(crate) use decl::TypeDecl;

/// A table keyed weakly by [`Type`] identity.
pub(crate) type TypeTable<V> = vc_utils::WeakKeyMap<TypeData, V>;

// -----------------------------------------------------------------------------
// Type

use alloc::sync::Arc;
use core::any::TypeId;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;

use crate::attribute::{Attribute, AttributeRef};
use crate::component::Instance;
use crate::descriptor::TypeConverter;
use crate::error::MetaError;

/// Process-unique identity of a [`Type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(u64);

impl TypeKey {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

pub(crate) struct TypeData {
    key: TypeKey,
    name: Box<str>,
    base: Option<Type>,
    interfaces: Vec<Type>,
    is_interface: bool,
    module: Module,
    decl: TypeDecl,
}

/// A cheap-to-clone handle to a runtime type.
#[derive(Clone)]
pub struct Type(Arc<TypeData>);

static OBJECT: LazyLock<Type> = LazyLock::new(|| Type::synthetic("Object", None));
static FOREIGN: LazyLock<Type> =
    LazyLock::new(|| Type::synthetic("ForeignObject", Some(Type::object())));

impl Type {
    fn synthetic(name: &str, base: Option<Type>) -> Self {
        Self(Arc::new(TypeData {
            key: TypeKey::next(),
            name: name.into(),
            base,
            interfaces: Vec::new(),
            is_interface: false,
            module: Module::new("vc_descriptor", "builtin"),
            decl: TypeDecl::default(),
        }))
    }

    /// Starts building a new type called `name`.
    pub fn builder(name: &str) -> TypeBuilder {
        TypeBuilder {
            name: name.into(),
            base: None,
            interfaces: Vec::new(),
            is_interface: false,
            module: Module::dynamic(),
            decl: TypeDecl::default(),
        }
    }

    /// The root type. Every class derives from it.
    #[inline]
    pub fn object() -> Type {
        OBJECT.clone()
    }

    /// The marker type every foreign object collapses to.
    #[inline]
    pub fn foreign() -> Type {
        FOREIGN.clone()
    }

    #[inline]
    pub fn key(&self) -> TypeKey {
        self.0.key
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Returns the declared base class, if any.
    #[inline]
    pub fn base(&self) -> Option<&Type> {
        self.0.base.as_ref()
    }

    #[inline]
    pub fn interfaces(&self) -> &[Type] {
        &self.0.interfaces
    }

    #[inline]
    pub fn is_interface(&self) -> bool {
        self.0.is_interface
    }

    #[inline]
    pub fn module(&self) -> &Module {
        &self.0.module
    }

    /// Returns `true` for [`Type::object`].
    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.key == OBJECT.0.key
    }

    /// The next more general type used when walking provider chains.
    ///
    /// Interfaces have no base class and map to the root; the root has none.
    pub fn conceptual_base(&self) -> Option<Type> {
        if self.is_root() {
            return None;
        }
        match &self.0.base {
            Some(base) if !self.0.is_interface => Some(base.clone()),
            _ => Some(Type::object()),
        }
    }

    /// Returns `true` if `self` is `other`, derives from it, or implements it.
    ///
    /// Every type is a subtype of the root.
    pub fn is_subtype_of(&self, other: &Type) -> bool {
        if self == other || other.is_root() {
            return true;
        }
        if self.0.interfaces.iter().any(|i| i.is_subtype_of(other)) {
            return true;
        }
        match &self.0.base {
            Some(base) => base.is_subtype_of(other),
            None => false,
        }
    }

    #[inline]
    pub(crate) fn decl(&self) -> &TypeDecl {
        &self.0.decl
    }

    /// The shared allocation, used as the key of a [`TypeTable`].
    #[inline]
    pub(crate) fn handle(&self) -> &Arc<TypeData> {
        &self.0
    }

    #[inline]
    pub(crate) fn from_handle(handle: Arc<TypeData>) -> Self {
        Self(handle)
    }
}

impl PartialEq for Type {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.0.key == other.0.key
    }
}

impl Eq for Type {}

impl Hash for Type {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.key.hash(state);
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self.name())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

// -----------------------------------------------------------------------------
// TypeBuilder

/// Builder returned by [`Type::builder`].
///
/// # Example
///
/// ```
/// use vc_descriptor::attribute::Browsable;
/// use vc_descriptor::ty::{PropertyDecl, Type};
///
/// let text = Type::builder("Text").build().unwrap();
/// let control = Type::builder("Control")
///     .attribute(Browsable(true))
///     .property(PropertyDecl::new("Text", &text))
///     .build()
///     .unwrap();
/// let button = Type::builder("Button").base(&control).build().unwrap();
///
/// assert!(button.is_subtype_of(&control));
/// assert_eq!(button.conceptual_base(), Some(control));
/// ```
pub struct TypeBuilder {
    name: Box<str>,
    base: Option<Type>,
    interfaces: Vec<Type>,
    is_interface: bool,
    module: Module,
    decl: TypeDecl,
}

impl TypeBuilder {
    /// Sets the base class.
    pub fn base(mut self, base: &Type) -> Self {
        self.base = Some(base.clone());
        self
    }

    /// Adds an implemented interface.
    pub fn interface(mut self, interface: &Type) -> Self {
        self.interfaces.push(interface.clone());
        self
    }

    /// Declares this type as an interface.
    pub fn as_interface(mut self) -> Self {
        self.is_interface = true;
        self
    }

    pub fn module(mut self, module: &Module) -> Self {
        self.module = module.clone();
        self
    }

    pub fn attribute(self, attribute: impl Attribute) -> Self {
        self.attribute_ref(Arc::new(attribute))
    }

    pub fn attribute_ref(mut self, attribute: AttributeRef) -> Self {
        self.decl.attributes.push(attribute);
        self
    }

    /// Adds a lazily evaluated attribute source.
    pub fn attribute_source(
        mut self,
        source: impl Fn() -> Result<Vec<AttributeRef>, MetaError> + Send + Sync + 'static,
    ) -> Self {
        self.decl.attribute_sources.push(Arc::new(source));
        self
    }

    pub fn property(mut self, property: PropertyDecl) -> Self {
        self.decl.properties.push(property);
        self
    }

    pub fn event(mut self, event: EventDecl) -> Self {
        self.decl.events.push(event);
        self
    }

    pub fn converter(mut self, converter: Arc<dyn TypeConverter>) -> Self {
        self.decl.converter = Some(converter);
        self
    }

    /// Registers an editor under the editor kind `K`.
    pub fn editor<K: ?Sized + 'static>(mut self, editor: EditorRef) -> Self {
        self.decl.editors.insert(TypeId::of::<K>(), editor);
        self
    }

    /// Sets the factory used by `create_instance`.
    pub fn factory(mut self, factory: impl Fn() -> Instance + Send + Sync + 'static) -> Self {
        self.decl.factory = Some(Arc::new(factory));
        self
    }

    /// Validates the declarations and creates the type.
    ///
    /// Fails if a name is blank, a member name is declared twice,
    /// the base is an interface, or an interface entry is not an interface.
    pub fn build(self) -> Result<Type, MetaError> {
        validate_name("name", &self.name)?;

        if let Some(base) = &self.base
            && base.is_interface()
        {
            return Err(MetaError::invalid("base", "an interface cannot be a base class"));
        }
        if self.interfaces.iter().any(|i| !i.is_interface()) {
            return Err(MetaError::invalid("interface", "type is not an interface"));
        }

        validate_members(&self.decl)?;

        let base = match self.base {
            Some(base) => Some(base),
            None if self.is_interface => None,
            None => Some(Type::object()),
        };

        Ok(Type(Arc::new(TypeData {
            key: TypeKey::next(),
            name: self.name,
            base,
            interfaces: self.interfaces,
            is_interface: self.is_interface,
            module: self.module,
            decl: self.decl,
        })))
    }
}

/// Member names must be valid and unique per member kind.
fn validate_members(decl: &TypeDecl) -> Result<(), MetaError> {
    let mut seen = vc_utils::hash::HashSet::default();
    for property in &decl.properties {
        validate_name("property", &property.name)?;
        if !seen.insert(&*property.name) {
            return Err(MetaError::invalid("property", "duplicate property name"));
        }
    }
    seen.clear();
    for event in &decl.events {
        validate_name("event", &event.name)?;
        if !seen.insert(&*event.name) {
            return Err(MetaError::invalid("event", "duplicate event name"));
        }
    }
    Ok(())
}

/// Member and type names must contain a non-whitespace character.
pub(crate) fn validate_name(argument: &'static str, name: &str) -> Result<(), MetaError> {
    if name.trim().is_empty() {
        Err(MetaError::invalid(argument, "name must not be blank"))
    } else {
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::{Module, Type};
    use crate::error::MetaError;
    use crate::ty::{EventDecl, PropertyDecl};

    #[test]
    fn hierarchy() {
        let shape = Type::builder("IShape").as_interface().build().unwrap();
        let a = Type::builder("A").interface(&shape).build().unwrap();
        let b = Type::builder("B").base(&a).build().unwrap();

        assert!(b.is_subtype_of(&a));
        assert!(b.is_subtype_of(&shape));
        assert!(b.is_subtype_of(&Type::object()));
        assert!(!a.is_subtype_of(&b));

        assert_eq!(b.conceptual_base(), Some(a.clone()));
        assert_eq!(a.conceptual_base(), Some(Type::object()));
        assert_eq!(shape.conceptual_base(), Some(Type::object()));
        assert_eq!(Type::object().conceptual_base(), None);
        assert_eq!(Type::foreign().conceptual_base(), Some(Type::object()));
    }

    #[test]
    fn identity_is_per_build() {
        let a = Type::builder("Same").build().unwrap();
        let b = Type::builder("Same").build().unwrap();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert!(Type::object().is_root());
    }

    #[test]
    fn rejects_invalid_declarations() {
        let text = Type::builder("Text").build().unwrap();
        assert!(matches!(
            Type::builder("  ").build(),
            Err(MetaError::InvalidArgument { argument: "name", .. })
        ));
        assert!(
            Type::builder("A")
                .property(PropertyDecl::new("X", &text))
                .property(PropertyDecl::new("X", &text))
                .build()
                .is_err()
        );
        assert!(Type::builder("A").interface(&text).build().is_err());

        let i = Type::builder("I").as_interface().build().unwrap();
        assert!(Type::builder("A").base(&i).build().is_err());
    }

    #[test]
    fn members_are_kept_after_validation() {
        let text = Type::builder("Text").build().unwrap();
        let handler = Type::builder("Handler").build().unwrap();
        let ty = Type::builder("Button")
            .property(PropertyDecl::new("Text", &text))
            .property(PropertyDecl::new("Tag", &text))
            .event(EventDecl::new("Click", &handler))
            // Same name as a property, but another member kind.
            .event(EventDecl::new("Text", &handler))
            .build()
            .unwrap();
        assert_eq!(ty.decl().properties.len(), 2);
        assert_eq!(ty.decl().events.len(), 2);

        assert!(matches!(
            Type::builder("A")
                .event(EventDecl::new("Click", &handler))
                .event(EventDecl::new("Click", &handler))
                .build(),
            Err(MetaError::InvalidArgument { argument: "event", .. })
        ));
    }

    #[test]
    fn module_equality() {
        let m = Module::new("app", "ui");
        let t = Type::builder("T").module(&m).build().unwrap();
        assert_eq!(t.module(), &Module::new("app", "ui"));
        assert_eq!(t.module().assembly(), "app");
    }
}
