#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

// -----------------------------------------------------------------------------
// Allocation paths

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

pub mod attribute;
pub mod component;
pub mod descriptor;
pub mod error;
pub mod member;
pub mod pipeline;
pub mod provider;
pub mod registry;
pub mod ty;

mod association;

// -----------------------------------------------------------------------------
// Top-level exports

pub use error::MetaError;
pub use registry::MetadataRegistry;
