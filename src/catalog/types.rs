//! Domain types for the product catalog and sync results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A sized variant of a product with its own stock count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
  pub size: String,
  pub stock: i64,
}

/// A catalog product.
///
/// `stock` equals the sum of all variant stocks for products created or
/// edited locally. Products pulled from the remote backend are taken as-is,
/// even when they violate that rule. Stock is signed because purchases are
/// applied without clamping and can drive it negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
  pub id: String,
  pub slug: String,
  pub name: String,
  #[serde(default)]
  pub subtitle: String,
  #[serde(default)]
  pub description: String,
  /// Price in minor currency units (cents).
  pub price: i64,
  pub currency: String,
  #[serde(default)]
  pub category: String,
  #[serde(default)]
  pub images: Vec<String>,
  #[serde(default)]
  pub tags: BTreeSet<String>,
  pub stock: i64,
  #[serde(default)]
  pub variants: Vec<Variant>,
}

impl Product {
  /// Recompute `stock` as the sum of variant stocks.
  ///
  /// Applied whenever a product enters the catalog through local editing
  /// paths. No-op for products without variants.
  pub fn normalize_stock(&mut self) {
    if !self.variants.is_empty() {
      self.stock = self.variants.iter().map(|v| v.stock).sum();
    }
  }
}

/// Which side a sync operation reads from and writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
  /// Remote to local.
  Pull,
  /// Local to remote.
  Push,
  /// Pull, then push.
  Both,
}

impl SyncDirection {
  pub fn includes_pull(self) -> bool {
    matches!(self, SyncDirection::Pull | SyncDirection::Both)
  }

  pub fn includes_push(self) -> bool {
    matches!(self, SyncDirection::Push | SyncDirection::Both)
  }
}

/// Structured outcome of a sync run.
///
/// `success` is false only when a top-level error aborted the run. Per-item
/// push failures increment `failed` and append one error line each, but do
/// not abort the run or flip `success`.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
  pub success: bool,
  pub synced: usize,
  pub failed: usize,
  pub errors: Vec<String>,
}

impl Default for SyncResult {
  fn default() -> Self {
    Self {
      success: true,
      synced: 0,
      failed: 0,
      errors: Vec::new(),
    }
  }
}

/// Derived sync state, computed from the durable snapshot and last-sync slots.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
  pub synced: bool,
  pub last_sync: Option<DateTime<Utc>>,
  pub product_count: usize,
}

/// Tri-state outcome of a remote pull.
///
/// An empty remote list signals "no data available" rather than an error,
/// and must never overwrite a previously persisted snapshot. Encoding that
/// rule as a type keeps the fallback policy explicit at every call site.
#[derive(Debug, Clone)]
pub enum PullOutcome {
  Products(Vec<Product>),
  Empty,
}

impl From<Vec<Product>> for PullOutcome {
  fn from(products: Vec<Product>) -> Self {
    if products.is_empty() {
      PullOutcome::Empty
    } else {
      PullOutcome::Products(products)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn direction_legs() {
    assert!(SyncDirection::Pull.includes_pull());
    assert!(!SyncDirection::Pull.includes_push());
    assert!(!SyncDirection::Push.includes_pull());
    assert!(SyncDirection::Push.includes_push());
    assert!(SyncDirection::Both.includes_pull());
    assert!(SyncDirection::Both.includes_push());
  }

  #[test]
  fn normalize_stock_sums_variants() {
    let mut product = Product {
      id: "p1".into(),
      slug: "p1".into(),
      name: "P1".into(),
      subtitle: String::new(),
      description: String::new(),
      price: 1000,
      currency: "USD".into(),
      category: String::new(),
      images: Vec::new(),
      tags: BTreeSet::new(),
      stock: 99,
      variants: vec![
        Variant {
          size: "S".into(),
          stock: 2,
        },
        Variant {
          size: "M".into(),
          stock: 3,
        },
      ],
    };
    product.normalize_stock();
    assert_eq!(product.stock, 5);
  }

  #[test]
  fn normalize_stock_keeps_variantless_products() {
    let mut product = Product {
      id: "p1".into(),
      slug: "p1".into(),
      name: "P1".into(),
      subtitle: String::new(),
      description: String::new(),
      price: 1000,
      currency: "USD".into(),
      category: String::new(),
      images: Vec::new(),
      tags: BTreeSet::new(),
      stock: 7,
      variants: Vec::new(),
    };
    product.normalize_stock();
    assert_eq!(product.stock, 7);
  }

  #[test]
  fn empty_pull_is_not_products() {
    assert!(matches!(PullOutcome::from(Vec::new()), PullOutcome::Empty));
  }
}
