//! Typed errors for the cache and sync subsystem.

use thiserror::Error;

/// Errors produced by the cache store, the remote catalog client and the
/// sync coordinator. The coordinator's public surface converts all of these
/// into structured results or fallbacks; they never escape to callers.
#[derive(Debug, Error)]
pub enum SyncError {
  /// Remote call failed (connection refused, DNS, non-retryable HTTP error).
  #[error("remote request failed: {0}")]
  Network(String),

  /// Remote call exceeded the request deadline.
  #[error("remote request timed out: {0}")]
  Timeout(String),

  /// A referenced product id was absent during a stock sync.
  #[error("product not found: {0}")]
  NotFound(String),

  /// The durable store is unavailable or returned corrupt data.
  #[error("cache storage error: {0}")]
  Storage(String),

  /// A cached or wire payload failed to (de)serialize.
  #[error("serialization error: {0}")]
  Serialize(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for SyncError {
  fn from(e: rusqlite::Error) -> Self {
    SyncError::Storage(e.to_string())
  }
}

impl From<reqwest::Error> for SyncError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      SyncError::Timeout(e.to_string())
    } else {
      SyncError::Network(e.to_string())
    }
  }
}
