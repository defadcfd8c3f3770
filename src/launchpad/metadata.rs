//! Off-chain token metadata: the JSON document the on-chain metadata URI
//! points at, and where it gets stored.

use crate::launchpad::error::{LaunchpadError, LaunchpadResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Links shown alongside the token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataExtensions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

impl MetadataExtensions {
    pub fn is_empty(&self) -> bool {
        self.twitter.is_none() && self.telegram.is_none() && self.website.is_none()
    }
}

/// Token metadata JSON in the shape wallets and explorers read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadataDocument {
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub description: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "MetadataExtensions::is_empty")]
    pub extensions: MetadataExtensions,
}

/// Persists a metadata document and returns the URI it can be fetched from.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn store(&self, document: &TokenMetadataDocument) -> LaunchpadResult<String>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(alias = "metadataUri", alias = "url")]
    uri: String,
}

/// Uploads documents as JSON to an HTTP endpoint that answers with `{"uri": ...}`
/// (or `metadataUri`).
pub struct HttpMetadataStore {
    client: Client,
    upload_url: String,
}

impl HttpMetadataStore {
    pub fn new(upload_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            upload_url: upload_url.into(),
        })
    }
}

#[async_trait]
impl MetadataStore for HttpMetadataStore {
    #[instrument(skip(self, document), fields(symbol = %document.symbol, url = %self.upload_url))]
    async fn store(&self, document: &TokenMetadataDocument) -> LaunchpadResult<String> {
        let response = self
            .client
            .post(&self.upload_url)
            .json(document)
            .send()
            .await
            .map_err(|e| LaunchpadError::NetworkTransient {
                attempts: 1,
                message: format!("metadata upload failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Metadata upload rejected");
            let error = format!("metadata upload returned HTTP {}", status);
            return Err(if status.is_server_error() {
                LaunchpadError::NetworkTransient { attempts: 1, message: error }
            } else {
                LaunchpadError::internal(error)
            });
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| LaunchpadError::internal(format!("metadata upload response unreadable: {}", e)))?;
        if body.uri.trim().is_empty() {
            return Err(LaunchpadError::internal("metadata upload returned an empty uri"));
        }
        debug!(uri = %body.uri, "Metadata stored");
        Ok(body.uri)
    }
}
