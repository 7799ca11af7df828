use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, Result};

/// Client for the object-storage REST API holding question photos.
/// Uploads go through the service key; reads use the public-object URL.
#[derive(Clone)]
pub struct ImageStore {
    client: reqwest::Client,
    base_url: String,
    key: String,
    bucket: String,
}

impl ImageStore {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.storage_url.trim_end_matches('/').to_string(),
            key: cfg.storage_key.clone(),
            bucket: cfg.storage_bucket.clone(),
        })
    }

    /// Store one image and return its publicly resolvable URL.
    /// A failed upload aborts the submission before any record is created.
    pub async fn upload(
        &self,
        original_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String> {
        let object = object_name(original_name);
        let url = format!("{}/object/{}/{}", self.base_url, self.bucket, object);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::CACHE_CONTROL, "max-age=3600")
            .body(bytes)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(AppError::Upload(format!("{status}: {detail}")));
        }

        let public_url = format!(
            "{}/object/public/{}/{}",
            self.base_url, self.bucket, object
        );
        info!(url = %public_url, "Photo uploaded");
        Ok(public_url)
    }
}

/// Unique object name: millisecond timestamp + random suffix + original extension.
fn object_name(original_name: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    match original_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => format!("{millis}-{suffix}.{ext}"),
        _ => format!("{millis}-{suffix}"),
    }
}
