//! Product catalog: domain types, the remote backend client and the local
//! authoritative product list.

pub mod api_types;
pub mod client;
pub mod local;
pub mod types;

pub use client::{CatalogApi, StoreClient};
pub use types::{Product, PullOutcome, SyncDirection, SyncResult, SyncStatus, Variant};
