use async_trait::async_trait;

use crate::core::errors::Result;
use crate::core::models::data::Input;

/// Port for resolving path-like fragments (`#/keys/alice.asc`) to bytes.
///
/// Implementations live in `adapters::fetch` (e.g. HttpFetcher).
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `path`, keeping its last segment as the filename.
    async fn fetch(&self, path: &str) -> Result<Input>;
}
