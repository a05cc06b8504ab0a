//! Object storage seam.
//!
//! The processor only needs to fetch the uploaded bytes to confirm the object
//! is really there before cataloguing it. The production implementation talks
//! to an S3-like HTTP store; tests and local runs use the in-memory one.

use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object `{key}` not found in `{source_name}`")]
    NotFound { source_name: String, key: String },
    #[error("object fetch failed: {0}")]
    Fetch(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the payload of `key` from the bucket/source it was uploaded to.
    async fn fetch(&self, source: &str, key: &str) -> Result<Bytes, ObjectStoreError>;
}

/// Characters that cannot appear raw in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'%');

/// Fetches objects over HTTP from an S3-compatible store
/// (`GET {base_url}/{bucket}/{key}`).
pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpObjectStore {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn fetch(&self, source: &str, key: &str) -> Result<Bytes, ObjectStoreError> {
        let encoded_key = utf8_percent_encode(key, PATH_SEGMENT);
        let url = format!("{}/{}/{}", self.base_url, source, encoded_key);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| ObjectStoreError::Fetch(err.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound {
                source_name: source.to_string(),
                key: key.to_string(),
            });
        }

        let response = response
            .error_for_status()
            .map_err(|err| ObjectStoreError::Fetch(err.to_string()))?;

        response
            .bytes()
            .await
            .map_err(|err| ObjectStoreError::Fetch(err.to_string()))
    }
}

/// In-memory store for tests and local runs.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Bytes>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, source: &str, key: &str, payload: impl Into<Bytes>) {
        self.objects
            .lock()
            .expect("object store mutex poisoned")
            .insert((source.to_string(), key.to_string()), payload.into());
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn fetch(&self, source: &str, key: &str) -> Result<Bytes, ObjectStoreError> {
        self.objects
            .lock()
            .expect("object store mutex poisoned")
            .get(&(source.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound {
                source_name: source.to_string(),
                key: key.to_string(),
            })
    }
}
