//! Reading upload: multipart POST of the weight+image pair.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use reqwest::multipart;
use reqwest::StatusCode;

use crate::error::UploadError;

/// The weight+image pair a cycle hands to the backend. Both halves are
/// required by construction; a reading missing either is never uploaded.
#[derive(Debug, Clone)]
pub struct UploadReading {
    pub weight: f64,
    pub image: Arc<Vec<u8>>,
    pub captured_at: DateTime<Utc>,
}

/// Where finished readings go.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn upload(&self, reading: &UploadReading) -> Result<(), UploadError>;
}

pub struct BackendClient {
    http: reqwest::Client,
    url: String,
    device_id: String,
    key: Option<String>,
}

impl BackendClient {
    pub fn new(
        url: String,
        device_id: String,
        key: Option<String>,
        timeout_secs: u64,
    ) -> Result<BackendClient, UploadError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(BackendClient {
            http,
            url,
            device_id,
            key,
        })
    }
}

#[async_trait]
impl Backend for BackendClient {
    async fn upload(&self, reading: &UploadReading) -> Result<(), UploadError> {
        let image = multipart::Part::bytes(reading.image.as_ref().clone())
            .file_name("image.jpg")
            .mime_str("image/jpeg")?;
        let form = multipart::Form::new()
            .text("weight", reading.weight.to_string())
            .text("device_id", self.device_id.clone())
            .text(
                "timestamp",
                reading.captured_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            )
            .part("image", image);

        let mut request = self.http.post(&self.url).multipart(form);
        if let Some(key) = &self.key {
            request = request.query(&[("key", key)]);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        // The backend answers 201 for a stored reading; anything else means
        // it did not take it.
        if status != StatusCode::CREATED {
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        debug!("backend stored reading: {body}");
        Ok(())
    }
}
