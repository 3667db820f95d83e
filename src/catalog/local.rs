//! The authoritative local product catalog.
//!
//! Used as the source for the push leg and as the fallback dataset when the
//! remote backend is unreachable and no fresh snapshot exists. Loaded from a
//! YAML file named in config when one is present, else a small bundled
//! catalog ships with the binary.

use color_eyre::{eyre::eyre, Result};
use std::collections::BTreeSet;
use std::path::Path;

use crate::config::Config;

use super::types::{Product, Variant};

/// Load the local catalog per config, falling back to the bundled one.
pub fn load(config: &Config) -> Result<Vec<Product>> {
  match &config.catalog.path {
    Some(path) => load_from_path(path),
    None => Ok(bundled()),
  }
}

fn load_from_path(path: &Path) -> Result<Vec<Product>> {
  let contents = std::fs::read_to_string(path)
    .map_err(|e| eyre!("Failed to read catalog file {}: {}", path.display(), e))?;
  parse(&contents).map_err(|e| eyre!("Failed to parse catalog file {}: {}", path.display(), e))
}

/// Parse a YAML catalog. Products edited through local files keep the
/// product-level stock equal to the sum of their variant stocks.
pub fn parse(contents: &str) -> Result<Vec<Product>, serde_yaml::Error> {
  let mut products: Vec<Product> = serde_yaml::from_str(contents)?;
  for product in &mut products {
    product.normalize_stock();
  }
  Ok(products)
}

/// The catalog bundled into the binary.
pub fn bundled() -> Vec<Product> {
  let mut products = vec![
    product(
      "tee-classic",
      "Classic Tee",
      "Everyday organic cotton tee",
      2990,
      "tees",
      &["cotton", "basics"],
      &[("S", 4), ("M", 6), ("L", 5)],
    ),
    product(
      "hoodie-heavy",
      "Heavyweight Hoodie",
      "400gsm brushed fleece hoodie",
      7900,
      "hoodies",
      &["fleece", "winter"],
      &[("M", 3), ("L", 3), ("XL", 2)],
    ),
    product(
      "cap-canvas",
      "Canvas Cap",
      "Unstructured six-panel cap",
      2400,
      "accessories",
      &["canvas"],
      &[("One Size", 12)],
    ),
  ];
  for p in &mut products {
    p.normalize_stock();
  }
  products
}

fn product(
  slug: &str,
  name: &str,
  subtitle: &str,
  price: i64,
  category: &str,
  tags: &[&str],
  variants: &[(&str, i64)],
) -> Product {
  Product {
    id: slug.to_string(),
    slug: slug.to_string(),
    name: name.to_string(),
    subtitle: subtitle.to_string(),
    description: String::new(),
    price,
    currency: "USD".to_string(),
    category: category.to_string(),
    images: vec![format!("https://cdn.example.com/{}.jpg", slug)],
    tags: tags.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
    stock: 0,
    variants: variants
      .iter()
      .map(|(size, stock)| Variant {
        size: size.to_string(),
        stock: *stock,
      })
      .collect(),
  }
}
