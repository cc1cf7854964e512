use async_trait::async_trait;
use log::{debug, warn};
use reqwest::StatusCode;
use serde::Deserialize;

use quiz_core::model::{Snapshot, SnapshotDocument};

use crate::repository::{RemoteDocument, RemoteStore, StorageError, VersionToken};

/// Where the remote document lives and how to authenticate against it.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl RemoteConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
        }
    }
}

/// Envelope returned by the bin-style document host: the document itself
/// under `record`, plus server-side metadata carrying the version counter.
#[derive(Debug, Deserialize)]
struct BinEnvelope {
    record: serde_json::Value,
    #[serde(default)]
    metadata: Option<BinMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct BinMetadata {
    #[serde(default)]
    version: Option<u64>,
}

/// `RemoteStore` over a single JSON document hosted behind an HTTP API.
///
/// Reads `GET {base}/latest`, writes `PUT {base}`. The API key travels in the
/// `X-Master-Key` header; the version token is echoed back through `If-Match`
/// so the host can reject writes based on a stale read.
pub struct HttpRemoteStore {
    config: RemoteConfig,
    client: reqwest::Client,
}

impl HttpRemoteStore {
    #[must_use]
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header("X-Master-Key", key),
            None => request,
        }
    }

    fn token_from(metadata: Option<BinMetadata>, snapshot: &Snapshot) -> VersionToken {
        if let Some(version) = metadata.and_then(|m| m.version) {
            return VersionToken::new(version.to_string());
        }
        // Hosts without version metadata: fall back to the document's own
        // timestamp, which last-writer-wins compares anyway.
        let stamp = snapshot
            .last_updated()
            .map_or_else(|| "0".to_owned(), |t| t.to_rfc3339());
        VersionToken::new(stamp)
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn read(&self) -> Result<Option<RemoteDocument>, StorageError> {
        let url = format!("{}/latest", self.config.base_url);
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StorageError::Connection(format!(
                "read returned {}",
                response.status()
            )));
        }

        let envelope: BinEnvelope = response
            .json()
            .await
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        // A record we cannot decode is "no data", not a failure: the caller
        // keeps whatever it already has.
        let document: SnapshotDocument = match serde_json::from_value(envelope.record) {
            Ok(document) => document,
            Err(err) => {
                warn!("remote record failed to decode, treating as empty: {err}");
                return Ok(None);
            }
        };
        let snapshot = match document.into_snapshot() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("remote record failed validation, treating as empty: {err}");
                return Ok(None);
            }
        };

        let token = Self::token_from(envelope.metadata, &snapshot);
        debug!("remote read ok, token={}", token.as_str());
        Ok(Some(RemoteDocument { snapshot, token }))
    }

    async fn write(
        &self,
        snapshot: &Snapshot,
        token: Option<&VersionToken>,
    ) -> Result<VersionToken, StorageError> {
        let document = snapshot.to_document();
        let mut request = self
            .authorized(self.client.put(&self.config.base_url))
            .json(&document);
        if let Some(token) = token {
            request = request.header("If-Match", token.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
                return Err(StorageError::Conflict);
            }
            status => {
                return Err(StorageError::Connection(format!("write returned {status}")));
            }
        }

        let metadata = response
            .json::<BinEnvelope>()
            .await
            .ok()
            .and_then(|envelope| envelope.metadata);
        Ok(Self::token_from(metadata, snapshot))
    }
}
