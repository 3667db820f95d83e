//! Remote catalog client: the trait seam and its HTTP implementation.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::StatusCode;
use std::time::Duration;
use url::Url;

use crate::config::Config;
use crate::error::SyncError;

use super::api_types::{ApiProduct, ApiProductWrite, ApiStockUpdate};
use super::types::Product;

/// The remote calls have no deadline in the backend contract; an unbounded
/// hang would stall every sync path, so requests carry an explicit timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const PER_PAGE: usize = 100;

/// Contract the sync subsystem expects from the remote commerce backend.
///
/// An empty product list signals "no data available", not an error. Push and
/// stock updates return `Ok(false)` for ordinary rejection; `Err` is reserved
/// for transport-level failures.
#[async_trait]
pub trait CatalogApi: Send + Sync {
  async fn list_products(&self) -> Result<Vec<Product>, SyncError>;

  async fn push_product(&self, product: &Product) -> Result<bool, SyncError>;

  async fn update_stock(&self, product_id: &str, new_stock: i64) -> Result<bool, SyncError>;
}

/// HTTP client for the remote commerce backend.
#[derive(Clone)]
pub struct StoreClient {
  http: reqwest::Client,
  base: Url,
  token: String,
}

impl StoreClient {
  pub fn new(config: &Config) -> Result<Self> {
    let token = Config::api_token()?;

    let base = Url::parse(&config.store.url)
      .map_err(|e| eyre!("Invalid store URL {}: {}", config.store.url, e))?;

    let http = reqwest::Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self { http, base, token })
  }

  fn products_url(&self, segments: &[&str]) -> Result<Url, SyncError> {
    let mut url = self.base.clone();
    {
      let mut path = url
        .path_segments_mut()
        .map_err(|_| SyncError::Network(format!("store URL cannot be a base: {}", self.base)))?;
      path.pop_if_empty().push("products");
      for segment in segments {
        path.push(segment);
      }
    }
    Ok(url)
  }
}

#[async_trait]
impl CatalogApi for StoreClient {
  /// Fetch the full remote catalog, following pagination.
  async fn list_products(&self) -> Result<Vec<Product>, SyncError> {
    let mut all_products = Vec::new();
    let mut page = 1usize;

    loop {
      let url = self.products_url(&[])?;
      let response = self
        .http
        .get(url)
        .bearer_auth(&self.token)
        .query(&[("page", page.to_string()), ("per_page", PER_PAGE.to_string())])
        .send()
        .await?
        .error_for_status()?;

      let batch: Vec<ApiProduct> = response.json().await?;
      let batch_len = batch.len();

      all_products.extend(batch.into_iter().map(ApiProduct::into_product));

      if batch_len < PER_PAGE {
        break;
      }
      page += 1;
    }

    Ok(all_products)
  }

  /// Push one product. A 4xx response is an ordinary rejection, not an error.
  async fn push_product(&self, product: &Product) -> Result<bool, SyncError> {
    let url = self.products_url(&[&product.id])?;
    let response = self
      .http
      .put(url)
      .bearer_auth(&self.token)
      .json(&ApiProductWrite::from_product(product))
      .send()
      .await?;

    interpret_write_status(response.status(), "push", &product.id)
  }

  async fn update_stock(&self, product_id: &str, new_stock: i64) -> Result<bool, SyncError> {
    let url = self.products_url(&[product_id, "stock"])?;
    let response = self
      .http
      .put(url)
      .bearer_auth(&self.token)
      .json(&ApiStockUpdate { stock: new_stock })
      .send()
      .await?;

    interpret_write_status(response.status(), "stock update", product_id)
  }
}

fn interpret_write_status(
  status: StatusCode,
  operation: &str,
  product_id: &str,
) -> Result<bool, SyncError> {
  if status.is_success() {
    Ok(true)
  } else if status.is_client_error() {
    Ok(false)
  } else {
    Err(SyncError::Network(format!(
      "{} for {} failed with status {}",
      operation, product_id, status
    )))
  }
}
