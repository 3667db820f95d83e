//! Cache key namespace and default TTLs.

use chrono::Duration;
use sha2::{Digest, Sha256};

/// Durable slot holding the full product list persisted after a pull.
/// No TTL: freshness is governed by the last-sync timestamp instead.
pub const SNAPSHOT_SLOT: &str = "remote-catalog-snapshot";

/// Durable slot holding the ISO-8601 timestamp of the last successful pull.
pub const LAST_SYNC_SLOT: &str = "last-sync-timestamp";

/// Default TTL for short-lived entries.
#[allow(dead_code)]
pub fn ttl_short() -> Duration {
  Duration::minutes(5)
}

/// Default TTL for cached product lists.
pub fn ttl_products() -> Duration {
  Duration::minutes(15)
}

/// Default TTL for cached variation data.
pub fn ttl_variations() -> Duration {
  Duration::minutes(30)
}

/// Default TTL for long-lived entries.
#[allow(dead_code)]
pub fn ttl_long() -> Duration {
  Duration::minutes(60)
}

/// TTL-governed cache keys, independent of the durable slots above.
///
/// These TTLs are looser than the 60-second freshness window the merged-read
/// path enforces; an entry here can be valid while the coordinator already
/// considers the snapshot stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogCacheKey {
  /// The merged product list served to read-only consumers.
  ProductsList,
  /// Variation data for a single product.
  Variations { product_id: String },
  /// Variation data for the whole catalog.
  AllVariations,
}

impl CatalogCacheKey {
  /// Stable, fixed-length key string for the underlying store.
  pub fn cache_hash(&self) -> String {
    let input = match self {
      Self::ProductsList => "products-list".to_string(),
      Self::Variations { product_id } => format!("variations-{}", product_id),
      Self::AllVariations => "all-variations".to_string(),
    };

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  /// Default TTL for entries written under this key.
  pub fn default_ttl(&self) -> Duration {
    match self {
      Self::ProductsList => ttl_products(),
      Self::Variations { .. } | Self::AllVariations => ttl_variations(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hashes_are_stable_and_distinct() {
    let a = CatalogCacheKey::ProductsList.cache_hash();
    let b = CatalogCacheKey::ProductsList.cache_hash();
    assert_eq!(a, b);

    let v1 = CatalogCacheKey::Variations {
      product_id: "p1".into(),
    };
    let v2 = CatalogCacheKey::Variations {
      product_id: "p2".into(),
    };
    assert_ne!(v1.cache_hash(), v2.cache_hash());
    assert_ne!(a, CatalogCacheKey::AllVariations.cache_hash());
  }

  #[test]
  fn ttl_classes_are_ordered() {
    assert!(ttl_short() < ttl_products());
    assert!(ttl_products() < ttl_variations());
    assert!(ttl_variations() < ttl_long());
  }

  #[test]
  fn ttl_by_key() {
    assert_eq!(CatalogCacheKey::ProductsList.default_ttl(), ttl_products());
    assert_eq!(
      CatalogCacheKey::AllVariations.default_ttl(),
      ttl_variations()
    );
  }
}
