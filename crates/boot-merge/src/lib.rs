//! Type-checked deep merge for layered configuration trees.
//!
//! Layers are folded left to right into a mutable accumulator:
//! - Objects: deep-merge by key (recursive)
//! - Arrays: merged element-wise, lengths must match
//! - Scalars: override (last wins)
//! - Null: overrides objects, never scalars or arrays
//!
//! Arrays of objects carrying an identity field can instead be merged by
//! identity with [`merge_named_items`].

mod engine;
mod error;
mod named;

pub use engine::{has_compatible_type, merge, merge_objects, merge_value, MergeEngine};
pub use error::MergeError;
pub use named::{identity_of, is_truthy, merge_named_items, DEFAULT_IDENTITY_KEY};
