//! Serde types matching the remote commerce API payloads.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs. The backend
//! serves prices as decimal strings and ids as either numbers or strings; the
//! conversions here normalize both.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

use super::types::{Product, Variant};

/// Product ids arrive as numbers from some backends and strings from others.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum NumOrStr {
    Num(u64),
    Str(String),
  }

  Ok(match NumOrStr::deserialize(deserializer)? {
    NumOrStr::Num(n) => n.to_string(),
    NumOrStr::Str(s) => s,
  })
}

fn default_currency() -> String {
  "USD".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiImage {
  pub src: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiTag {
  pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiVariant {
  #[serde(default)]
  pub size: String,
  pub stock: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiProduct {
  #[serde(deserialize_with = "id_as_string")]
  pub id: String,
  #[serde(default)]
  pub slug: String,
  pub name: String,
  #[serde(default)]
  pub subtitle: String,
  #[serde(default)]
  pub description: String,
  /// Decimal string, e.g. "29.90".
  pub price: Option<String>,
  #[serde(default = "default_currency")]
  pub currency: String,
  #[serde(default)]
  pub category: String,
  #[serde(default)]
  pub images: Vec<ApiImage>,
  #[serde(default)]
  pub tags: Vec<ApiTag>,
  pub stock: Option<i64>,
  #[serde(default)]
  pub variants: Vec<ApiVariant>,
}

impl ApiProduct {
  /// Convert the wire record into a domain product.
  ///
  /// The remote backend is authoritative after a pull, so stock fields are
  /// taken as-is even when the product-level stock does not equal the sum of
  /// its variants.
  pub fn into_product(self) -> Product {
    let tags: BTreeSet<String> = self.tags.into_iter().map(|t| t.name).collect();

    Product {
      id: self.id,
      slug: self.slug,
      name: self.name,
      subtitle: self.subtitle,
      description: self.description,
      price: self.price.as_deref().map(parse_price_minor).unwrap_or(0),
      currency: self.currency,
      category: self.category,
      images: self.images.into_iter().map(|i| i.src).collect(),
      tags,
      stock: self.stock.unwrap_or(0),
      variants: self
        .variants
        .into_iter()
        .map(|v| Variant {
          size: v.size,
          stock: v.stock.unwrap_or(0),
        })
        .collect(),
    }
  }
}

/// Payload shape for pushing a product to the remote backend.
#[derive(Debug, Serialize)]
pub struct ApiProductWrite<'a> {
  pub id: &'a str,
  pub slug: &'a str,
  pub name: &'a str,
  pub subtitle: &'a str,
  pub description: &'a str,
  pub price: String,
  pub currency: &'a str,
  pub category: &'a str,
  pub images: &'a [String],
  pub tags: &'a BTreeSet<String>,
  pub stock: i64,
  pub variants: &'a [Variant],
}

impl<'a> ApiProductWrite<'a> {
  pub fn from_product(product: &'a Product) -> Self {
    Self {
      id: &product.id,
      slug: &product.slug,
      name: &product.name,
      subtitle: &product.subtitle,
      description: &product.description,
      price: format_price_minor(product.price),
      currency: &product.currency,
      category: &product.category,
      images: &product.images,
      tags: &product.tags,
      stock: product.stock,
      variants: &product.variants,
    }
  }
}

/// Body for the stock-update endpoint.
#[derive(Debug, Serialize)]
pub struct ApiStockUpdate {
  pub stock: i64,
}

/// Parse a decimal price string into minor units. Malformed input maps to 0.
pub fn parse_price_minor(price: &str) -> i64 {
  let trimmed = price.trim();
  let (whole, frac) = match trimmed.split_once('.') {
    Some((w, f)) => (w, f),
    None => (trimmed, ""),
  };

  let Ok(whole) = whole.parse::<i64>() else {
    return 0;
  };
  let negative = trimmed.starts_with('-');

  // Truncate or pad the fractional part to exactly two digits.
  let mut frac = frac.to_string();
  frac.truncate(2);
  while frac.len() < 2 {
    frac.push('0');
  }
  let Ok(frac) = frac.parse::<i64>() else {
    return 0;
  };

  if negative {
    whole * 100 - frac
  } else {
    whole * 100 + frac
  }
}

/// Format minor units back into the backend's decimal string.
pub fn format_price_minor(minor: i64) -> String {
  let sign = if minor < 0 { "-" } else { "" };
  let abs = minor.abs();
  format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}
