//! Generic graph infrastructure for parent-linked messages.
//!
//! This module provides the core primitives the thread resolver builds on:
//!
//! - [`IdentityHash`]: 32-byte SHA3-256 hash identifying a message author
//! - [`ParentLinked`]: trait for records that point at their parents by id
//! - Graph algorithms: cycle checks and topological sorting
//!
//! # Example
//!
//! ```ignore
//! use threadtree::dag::{reaches, ParentLinked};
//!
//! // Would linking `m` under `parent` make `m` its own ancestor?
//! let cyclic = reaches(&parent, m.id(), |id| store.message(id));
//! ```

mod hash;
pub mod ops;

pub use hash::{IdentityHash, IDENTITY_HASH_LEN};
pub use ops::{nodes_in_topological_order, reaches, ParentLinked};
