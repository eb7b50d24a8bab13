//! Storage layer abstraction.
//!
//! kgview never owns the graph tables. It reads them through the
//! [`GraphStore`] contract and only triggers writes through the opaque
//! `build_graph` / `clear` operations.

pub mod graph;
pub mod traits;

pub use graph::InMemoryGraphStore;
pub use traits::GraphStore;
