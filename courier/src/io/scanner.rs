//! Inventory scanning against the asset index.
//!
//! The [`InventoryScanner`] trait decouples the scan cycle from the HTTP
//! index. Tests use scripted scanners that return fixed records.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::core::types::AssetRecord;
use crate::io::http::{HttpRetry, with_retry};

pub trait InventoryScanner {
    /// All assets `owner` holds in the configured collection, in index order.
    fn scan(&self, owner: &str) -> Result<Vec<AssetRecord>>;
}

/// Scanner backed by the AtomicAssets HTTP API.
pub struct AtomicAssetsScanner {
    client: Client,
    assets_url: String,
    collection: String,
    limit: u32,
    retry: HttpRetry,
}

impl AtomicAssetsScanner {
    pub fn new(
        client: Client,
        base_url: &str,
        collection: &str,
        limit: u32,
        retry: HttpRetry,
    ) -> Self {
        Self {
            client,
            assets_url: format!("{}/atomicassets/v1/assets", base_url.trim_end_matches('/')),
            collection: collection.to_string(),
            limit,
            retry,
        }
    }
}

impl InventoryScanner for AtomicAssetsScanner {
    #[instrument(skip(self), fields(collection = %self.collection, limit = self.limit))]
    fn scan(&self, owner: &str) -> Result<Vec<AssetRecord>> {
        let limit = self.limit.to_string();
        let params = [
            ("limit", limit.as_str()),
            ("collection_name", self.collection.as_str()),
            ("owner", owner),
        ];
        let body = with_retry(&self.retry, "inventory scan", || -> reqwest::Result<String> {
            self.client
                .get(&self.assets_url)
                .query(&params)
                .send()?
                .error_for_status()?
                .text()
        })?;
        debug!(bytes = body.len(), "inventory response received");
        let records = parse_assets_response(&body)?;
        if records.len() >= self.limit as usize {
            warn!(
                count = records.len(),
                "inventory page is full; assets beyond the limit are not scanned"
            );
        }
        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
struct AssetsResponse {
    data: Vec<AssetRecord>,
}

/// Parse the index's `{"success": .., "data": [..]}` envelope.
pub fn parse_assets_response(body: &str) -> Result<Vec<AssetRecord>> {
    let response: AssetsResponse =
        serde_json::from_str(body).context("parse inventory response")?;
    Ok(response.data)
}
