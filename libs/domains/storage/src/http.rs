use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::store::ObjectStore;

/// Connection settings for the storage gateway.
#[derive(Debug, Clone)]
pub struct ObjectStoreConfig {
    pub url: String,
    pub token: Option<String>,
}

/// reqwest client for the storage gateway's bucket/object API.
pub struct HttpObjectStore {
    client: reqwest::Client,
    base: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    objects: Vec<ListedObject>,
}

#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
}

impl HttpObjectStore {
    pub fn new(config: ObjectStoreConfig) -> StorageResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(StorageError::from)?;
        Ok(Self {
            client,
            base: config.url.trim_end_matches('/').to_string(),
            token: config.token,
        })
    }

    fn bucket_url(&self, bucket: &str) -> String {
        format!("{}/b/{}", self.base, bucket)
    }

    fn object_url(&self, bucket: &str, name: &str) -> String {
        format!("{}/b/{}/o/{}", self.base, bucket, name)
    }

    /// Public (unauthenticated) URL for an object; used to build result
    /// locators for buckets with a public-read policy.
    pub fn public_object_url(&self, bucket: &str, name: &str) -> String {
        self.object_url(bucket, name)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn ensure_bucket(&self, bucket: &str, public_read: bool) -> StorageResult<()> {
        debug!(bucket, public_read, "Ensuring bucket");
        let response = self
            .authed(self.client.put(self.bucket_url(bucket)))
            .json(&json!({ "public_read": public_read }))
            .send()
            .await?;
        // 409: the bucket already exists, which is what we wanted anyway.
        if response.status().is_success() || response.status().as_u16() == 409 {
            return Ok(());
        }
        Err(StorageError::Status {
            status: response.status().as_u16(),
            path: bucket.to_string(),
        })
    }

    async fn put(&self, bucket: &str, name: &str, content: Bytes) -> StorageResult<()> {
        let response = self
            .authed(self.client.put(self.object_url(bucket, name)))
            .body(content)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(StorageError::Status {
                status: response.status().as_u16(),
                path: format!("{}/{}", bucket, name),
            });
        }
        Ok(())
    }

    async fn get(&self, bucket: &str, name: &str) -> StorageResult<Bytes> {
        let response = self
            .authed(self.client.get(self.object_url(bucket, name)))
            .send()
            .await?;
        if response.status().as_u16() == 404 {
            return Err(StorageError::NotFound(format!("{}/{}", bucket, name)));
        }
        if !response.status().is_success() {
            return Err(StorageError::Status {
                status: response.status().as_u16(),
                path: format!("{}/{}", bucket, name),
            });
        }
        Ok(response.bytes().await?)
    }

    async fn delete(&self, bucket: &str, name: &str) -> StorageResult<()> {
        let response = self
            .authed(self.client.delete(self.object_url(bucket, name)))
            .send()
            .await?;
        if response.status().is_success() || response.status().as_u16() == 404 {
            return Ok(());
        }
        Err(StorageError::Status {
            status: response.status().as_u16(),
            path: format!("{}/{}", bucket, name),
        })
    }

    async fn list(&self, bucket: &str, max: usize) -> StorageResult<Vec<String>> {
        let response = self
            .authed(self.client.get(format!("{}/o", self.bucket_url(bucket))))
            .query(&[("limit", max)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(StorageError::Status {
                status: response.status().as_u16(),
                path: bucket.to_string(),
            });
        }
        let listing: Listing = response.json().await?;
        Ok(listing
            .objects
            .into_iter()
            .take(max)
            .map(|o| o.name)
            .collect())
    }
}
