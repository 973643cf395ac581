//! submgr-state: the authoritative subscriber store.
//!
//! Backed by [redb](https://docs.rs/redb). Subscribers are JSON-serialized
//! into a single table keyed by subscriber id, so iteration order is id
//! order. Nodes are not stored here; they come from the fleet config and
//! are joined with the subscribers into a [`Snapshot`] per operation.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.
//!
//! [`Snapshot`]: submgr_core::Snapshot

pub mod error;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use store::StateStore;
