use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct SongRequest {
    #[serde(default)]
    pub roast: String,
    pub style: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongResponse {
    pub status: String,
    pub audio_url: String,
    pub image_url: Option<String>,
    pub title: String,
    pub clip_id: String,
    pub metadata: Value,
}
