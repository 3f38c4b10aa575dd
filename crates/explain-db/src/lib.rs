//! Tenant-scoped query layer over the CMS relational store.
//!
//! Every table lives inside a per-tenant schema and is addressed as
//! `{tenant}.craft_*`. The [`Tenant`] type is the only way to obtain that
//! prefix, and its constructor is the validation gate.

pub mod pool;
pub mod queries;
pub mod tenant;
pub mod testing;

pub use pool::{DbError, DbPool, DbResult, open_pool};
pub use tenant::Tenant;
