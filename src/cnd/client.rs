//! HTTP client for the coordination service (cnd)

use super::payload::LedgerAction;
use super::siren::{self, Entity, SwapSnapshot};
use crate::config::CndConfig;
use crate::error::{TrackerError, TrackerResult};

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

const SIREN_JSON: &str = "application/vnd.siren+json";

/// Source of swap observations and ledger action details
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SwapSource: Send + Sync {
    /// Hrefs of all swaps currently known to the service
    async fn list_swaps(&self) -> TrackerResult<Vec<String>>;

    /// Current events and offered action of one swap
    async fn fetch_swap(&self, href: &str) -> TrackerResult<SwapSnapshot>;

    /// Ledger action behind an offered action's handle
    async fn fetch_ledger_action(&self, handle: &str) -> TrackerResult<LedgerAction>;
}

/// Polls cnd's siren API
pub struct CndClient {
    http: reqwest::Client,
    base_url: String,
}

impl CndClient {
    pub fn new(config: &CndConfig) -> TrackerResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, href: &str) -> String {
        resolve_href(&self.base_url, href)
    }

    async fn get<T: DeserializeOwned>(&self, href: &str, accept: &str) -> TrackerResult<T> {
        let url = self.url(href);
        debug!(%url, "GET");

        let response = self
            .http
            .get(&url)
            .header(ACCEPT, accept)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl SwapSource for CndClient {
    async fn list_swaps(&self) -> TrackerResult<Vec<String>> {
        let collection: Entity = self.get("/swaps", SIREN_JSON).await?;
        Ok(siren::swap_hrefs(&collection))
    }

    async fn fetch_swap(&self, href: &str) -> TrackerResult<SwapSnapshot> {
        let entity: Entity = self.get(href, SIREN_JSON).await?;
        siren::parse_swap(href, entity)
    }

    async fn fetch_ledger_action(&self, handle: &str) -> TrackerResult<LedgerAction> {
        self.get(handle, "application/json")
            .await
            .map_err(|e| TrackerError::DetailFetch(format!("{}: {}", handle, e)))
    }
}

/// Hrefs are usually paths relative to the service root
fn resolve_href(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{}{}", base_url, href)
    } else {
        format!("{}/{}", base_url, href)
    }
}
