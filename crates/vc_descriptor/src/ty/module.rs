use alloc::sync::Arc;
use core::fmt;

// -----------------------------------------------------------------------------
// Module

struct ModuleData {
    assembly: Box<str>,
    name: Box<str>,
}

/// The unit a [`Type`](crate::ty::Type) is declared in.
///
/// A module belongs to exactly one assembly. Both are plain names:
/// refreshing a module or an assembly refreshes every type declared in it.
///
/// Equality compares names, so two handles built from the same names are
/// the same module.
#[derive(Clone)]
pub struct Module(Arc<ModuleData>);

impl Module {
    /// Creates a module `name` in `assembly`.
    pub fn new(assembly: &str, name: &str) -> Self {
        Self(Arc::new(ModuleData {
            assembly: assembly.into(),
            name: name.into(),
        }))
    }

    /// The module types land in when none is specified.
    pub fn dynamic() -> Self {
        Self::new("<dynamic>", "<dynamic>")
    }

    /// Returns the module name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Returns the owning assembly name.
    #[inline]
    pub fn assembly(&self) -> &str {
        &self.0.assembly
    }
}

impl PartialEq for Module {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.assembly == other.0.assembly && self.0.name == other.0.name)
    }
}

impl Eq for Module {}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.assembly(), self.name())
    }
}
