//! Durable TTL-aware key/value cache.
//!
//! All durable reads and writes in the sync subsystem go through this
//! module: the TTL-governed cache namespace (product lists, variations) and
//! the non-expiring slots holding the catalog snapshot and last-sync
//! timestamp. Expiry is lazy: an entry read past its TTL is deleted by that
//! read and reported absent.

mod keys;
mod store;

pub use keys::{
  ttl_long, ttl_products, ttl_short, ttl_variations, CatalogCacheKey, LAST_SYNC_SLOT,
  SNAPSHOT_SLOT,
};
pub use store::{CacheStore, SqliteStore};
