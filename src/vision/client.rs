//! OpenAI-compatible chat-completions client for the vision check.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::debug;
use serde::Deserialize;
use tokio::time::Instant;

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::reading::ItemResult;

use super::{build_instructions, parse_items, Analyzer};

pub struct OpenAiVision {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    /// Built once from the configured items; identical for every request.
    instructions: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiVision {
    pub fn new(cfg: &AnalysisConfig, api_key: String) -> Result<OpenAiVision, AnalysisError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(OpenAiVision {
            http,
            endpoint: format!("{}/chat/completions", cfg.api_base.trim_end_matches('/')),
            api_key,
            model: cfg.model.clone(),
            instructions: build_instructions(&cfg.items),
        })
    }
}

#[async_trait]
impl Analyzer for OpenAiVision {
    async fn analyze(&self, jpeg: &[u8]) -> Result<Vec<ItemResult>, AnalysisError> {
        let started = Instant::now();
        let data_uri = format!("data:image/jpeg;base64,{}", BASE64.encode(jpeg));
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": self.instructions },
                { "role": "user", "content": [
                    { "type": "text", "text": "Check this order photo against the expected items." },
                    { "type": "image_url", "image_url": { "url": data_uri } },
                ] },
            ],
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse = response.json().await?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        let verdicts = parse_items(&content)?;
        debug!(
            "vision verdict on {} items in {}ms",
            verdicts.len(),
            started.elapsed().as_millis(),
        );
        Ok(verdicts)
    }
}
