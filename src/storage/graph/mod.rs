//! Graph store implementations.
//!
//! # Available Stores
//!
//! | Store | Use Case | Features |
//! |-------|----------|----------|
//! | [`InMemoryGraphStore`] | Testing, snapshots | JSON snapshot load, no persistence |

mod memory;

pub use memory::{InMemoryGraphStore, StoreSnapshot};

// Re-export trait for convenience
pub use crate::storage::traits::graph::GraphStore;
