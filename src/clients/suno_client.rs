use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::config::settings::SongConfig;
use crate::error::{AppError, AppResult};

const SUNO_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongGenerationRequest {
    /// Theme the lyrics are written around
    pub topic: String,
    /// Comma-separated style tags
    pub tags: String,
}

/// A generated clip as reported by the music service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SunoClip {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// External music generation service: submit a job, then poll it by id
#[async_trait]
pub trait MusicGenerator: Send + Sync {
    async fn submit(&self, request: &SongGenerationRequest) -> AppResult<SunoClip>;
    async fn fetch_clip(&self, clip_id: &str) -> AppResult<SunoClip>;
}

#[derive(Debug, Clone)]
pub struct SunoClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl SunoClient {
    /// Returns `Ok(None)` when no API key is configured
    pub fn from_config(config: &SongConfig) -> AppResult<Option<Self>> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };

        let client = crate::utils::http_client::new_api_client(Duration::from_secs(SUNO_REQUEST_TIMEOUT_SECS))?;
        Ok(Some(Self {
            client,
            api_key,
            base_url: config.base_url.clone(),
        }))
    }

    async fn error_from_response(response: reqwest::Response, action: &str) -> AppError {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
        AppError::External(format!("Suno {} error ({}): {}", action, status, error_text))
    }
}

#[async_trait]
impl MusicGenerator for SunoClient {
    #[instrument(skip(self, request), fields(tags = %request.tags))]
    async fn submit(&self, request: &SongGenerationRequest) -> AppResult<SunoClip> {
        let url = format!("{}/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response, "generate").await);
        }

        let clip: SunoClip = response
            .json()
            .await
            .map_err(|e| AppError::External(format!("Failed to parse Suno generate response: {}", e)))?;

        debug!("Suno accepted song job {}", clip.id);
        Ok(clip)
    }

    #[instrument(skip(self), fields(clip_id = %clip_id))]
    async fn fetch_clip(&self, clip_id: &str) -> AppResult<SunoClip> {
        let url = format!("{}/clips?ids={}", self.base_url, urlencoding::encode(clip_id));

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response, "clip lookup").await);
        }

        let clips: Vec<SunoClip> = response
            .json()
            .await
            .map_err(|e| AppError::External(format!("Failed to parse Suno clips response: {}", e)))?;

        clips
            .into_iter()
            .find(|clip| clip.id == clip_id)
            .ok_or_else(|| AppError::External(format!("Suno returned no clip for id {}", clip_id)))
    }
}
