use alloc::borrow::Cow;

use super::{Attribute, eq_by_value};

// -----------------------------------------------------------------------------
// Auxiliary macro

/// Implement [`Attribute`] through `PartialEq`, with an optional
/// "is default" predicate.
macro_rules! impl_attribute {
    ($ty:ty) => {
        impl Attribute for $ty {
            fn equals(&self, other: &dyn Attribute) -> bool {
                eq_by_value(self, other)
            }
        }
    };
    ($ty:ty, |$this:ident| $is_default:expr) => {
        impl Attribute for $ty {
            fn equals(&self, other: &dyn Attribute) -> bool {
                eq_by_value(self, other)
            }

            fn is_default_attribute(&self) -> bool {
                let $this = self;
                $is_default
            }
        }
    };
}

// -----------------------------------------------------------------------------
// Browsable

/// Whether a member shows up in browsing surfaces. Defaults to `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Browsable(pub bool);

impl Default for Browsable {
    fn default() -> Self {
        Self(true)
    }
}

impl_attribute!(Browsable, |this| this.0);

// -----------------------------------------------------------------------------
// ReadOnly

/// Whether a property rejects writes. Defaults to `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadOnly(pub bool);

impl_attribute!(ReadOnly, |this| !this.0);

// -----------------------------------------------------------------------------
// Text attributes

/// The group a member is listed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category(pub Cow<'static, str>);

impl Category {
    /// The category of members that declare none.
    pub const DEFAULT: &'static str = "Misc";

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }
}

impl Default for Category {
    fn default() -> Self {
        Self(Cow::Borrowed(Self::DEFAULT))
    }
}

impl_attribute!(Category, |this| this.0 == Category::DEFAULT);

/// Free-form member description.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Description(pub Cow<'static, str>);

impl Description {
    pub fn new(text: impl Into<Cow<'static, str>>) -> Self {
        Self(text.into())
    }
}

impl_attribute!(Description, |this| this.0.is_empty());

/// Name shown instead of the member name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisplayName(pub Cow<'static, str>);

impl DisplayName {
    pub fn new(text: impl Into<Cow<'static, str>>) -> Self {
        Self(text.into())
    }
}

impl_attribute!(DisplayName, |this| this.0.is_empty());

// -----------------------------------------------------------------------------
// Defaults

/// Names the default property of a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultProperty(pub Cow<'static, str>);

impl DefaultProperty {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }
}

impl_attribute!(DefaultProperty);

/// Names the default event of a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultEvent(pub Cow<'static, str>);

impl DefaultEvent {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }
}

impl_attribute!(DefaultEvent);

// -----------------------------------------------------------------------------
// ExtenderProvided

/// Marks a property contributed by an extender provider.
///
/// Carries the site name of the providing component, used to disambiguate
/// colliding member names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtenderProvided(pub Option<Cow<'static, str>>);

impl ExtenderProvided {
    pub fn new(provider: impl Into<Cow<'static, str>>) -> Self {
        Self(Some(provider.into()))
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl_attribute!(ExtenderProvided);

// -----------------------------------------------------------------------------
// Tests
