//! Hash containers with a fixed seed, plus pre-hashed values.

// -----------------------------------------------------------------------------
// Modules

mod hasher;
mod pre_hashed;

// -----------------------------------------------------------------------------
// Exports

pub use hasher::{FixedHashState, FixedHasher};
pub use hasher::{NoOpHashState, NoOpHasher};

pub use pre_hashed::Hashed;

/// A [`hashbrown::HashMap`] using [`FixedHashState`], so iteration order
/// only depends on the inserted keys.
pub type HashMap<K, V> = hashbrown::HashMap<K, V, FixedHashState>;

/// A [`hashbrown::HashSet`] using [`FixedHashState`].
pub type HashSet<T> = hashbrown::HashSet<T, FixedHashState>;

// -----------------------------------------------------------------------------
// Re-export crates

pub use foldhash;
pub use hashbrown;
