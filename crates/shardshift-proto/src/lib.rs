//! shardshift value types.
//!
//! This crate defines the runtime values stored in table rows and used as
//! partition keys, together with their scalar types. All types derive rkyv
//! (storage) and serde (for coordinators that ship extracted rows elsewhere).
//!
//! # Modules
//!
//! - [`value`] - Runtime values, scalar types and partition-key ordering
//! - [`error`] - Type checking errors

pub mod error;
pub mod value;

pub use error::Error;
pub use value::{ScalarType, Value};
