//! Key/value cache layer.
//!
//! Three key families: `schema:{tenant}` (one hour), `trace:{tenant}:…`
//! (five minutes), and `origin:{hostname}` (written by provisioning,
//! read-only here). Entries are immutable JSON snapshots; an overwrite is
//! a new entry, and last-write-wins is tolerated.

pub mod client;
pub mod queries;

pub use client::{init_pool, KvError, KvPool, KvResult};
pub use queries::origins;
pub use queries::schema_cache;
pub use queries::trace_cache;
