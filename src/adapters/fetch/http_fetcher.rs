use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use crate::core::errors::{KeydropError, Result};
use crate::core::models::data::Input;
use crate::core::traits::fetcher::Fetcher;

/// Timeout for a single fragment fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolves `#/<path>` fragments against a base URL.
pub struct HttpFetcher {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url).map_err(|e| KeydropError::InvalidConfig {
            detail: format!("fetch.base_url '{base_url}' is not a URL: {e}"),
        })?;
        // Url::join replaces the last segment unless the base ends with '/'.
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(format!("keydrop/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| KeydropError::InvalidConfig {
                detail: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self { base_url, client })
    }

    /// Absolute URL of a fragment path.
    pub fn url_of(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| KeydropError::Fetch {
                url: path.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Last non-empty path segment of `url`.
fn filename_of(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, path: &str) -> Result<Input> {
        let url = self.url_of(path)?;
        let failed = |reason: String| KeydropError::Fetch {
            url: url.to_string(),
            reason,
        };
        tracing::debug!(%url, "fetching fragment path");

        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(failed(format!(
                "server response status {}",
                resp.status().as_u16()
            )));
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let data = resp.bytes().await.map_err(|e| failed(e.to_string()))?;

        Ok(Input {
            data: data.to_vec(),
            filename: filename_of(&url),
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_join_below_base() {
        let fetcher = HttpFetcher::new("https://keys.example.org/drop").unwrap();
        assert_eq!(
            fetcher.url_of("/team/alice.asc").unwrap().as_str(),
            "https://keys.example.org/drop/team/alice.asc"
        );
    }

    #[test]
    fn filename_is_last_segment() {
        let url = Url::parse("https://keys.example.org/team/alice.asc").unwrap();
        assert_eq!(filename_of(&url).as_deref(), Some("alice.asc"));
        let root = Url::parse("https://keys.example.org/").unwrap();
        assert_eq!(filename_of(&root), None);
    }

    #[test]
    fn invalid_base_url_is_a_config_error() {
        assert!(matches!(
            HttpFetcher::new("not a url"),
            Err(KeydropError::InvalidConfig { .. })
        ));
    }
}
