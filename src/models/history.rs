use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::analysis::AnalysisResult;

/// Longest prompt preview kept in a history record, in characters.
/// The full length is still available as `result.characters`.
pub const MAX_STORED_PROMPT_CHARS: usize = 1_000;

const TRUNCATION_MARKER: char = '…';

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Prompt preview, cut to [`MAX_STORED_PROMPT_CHARS`]
    pub prompt: String,
    #[serde(default)]
    pub prompt_truncated: bool,
    pub result: AnalysisResult,
}

impl HistoryRecord {
    pub fn new(prompt: &str, result: AnalysisResult) -> Self {
        let (prompt, prompt_truncated) = prompt_preview(prompt);
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            prompt,
            prompt_truncated,
            result,
        }
    }
}

fn prompt_preview(prompt: &str) -> (String, bool) {
    match prompt.char_indices().nth(MAX_STORED_PROMPT_CHARS) {
        Some((cut, _)) => {
            let mut preview = prompt[..cut].to_string();
            preview.push(TRUNCATION_MARKER);
            (preview, true)
        }
        None => (prompt.to_string(), false),
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub count: usize,
    pub entries: Vec<HistoryRecord>,
}
