use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::settings::HistoryConfig;
use crate::error::{AppError, AppResult};
use crate::models::history::HistoryRecord;

/// Append-only analysis history persisted as a JSON array on disk.
///
/// The file is parsed once, on first use; after that the records live in
/// memory behind `records` and each append only serializes and writes. The
/// lock is held for the whole append, so concurrent appends never lose
/// records. It is never held across a network call.
pub struct HistoryStore {
    path: PathBuf,
    max_entries: usize,
    records: Mutex<Option<Vec<HistoryRecord>>>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        Self {
            path: path.into(),
            max_entries: max_entries.max(1),
            records: Mutex::new(None),
        }
    }

    /// Returns `None` when history is disabled
    pub fn from_config(config: &HistoryConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(&config.path, config.max_entries))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every record. A missing, unreadable, or corrupt file reads as empty.
    async fn read_records(&self) -> Vec<HistoryRecord> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Failed to read history file {}: {}. Starting from empty history", self.path.display(), e);
                return Vec::new();
            }
        };

        if raw.trim().is_empty() {
            return Vec::new();
        }

        match serde_json::from_str::<Vec<HistoryRecord>>(&raw) {
            Ok(records) => records,
            Err(e) => {
                warn!("History file {} is corrupt: {}. Resetting to empty history", self.path.display(), e);
                Vec::new()
            }
        }
    }

    async fn write_records(&self, records: &[HistoryRecord]) -> AppResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Persistence(format!("Failed to create {}: {}", parent.display(), e)))?;
        }

        let serialized = serde_json::to_string_pretty(records)
            .map_err(|e| AppError::Persistence(format!("Failed to serialize history: {}", e)))?;

        // Write beside the target and rename so readers never see a half-written file
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, serialized)
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to write {}: {}", tmp_path.display(), e)))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| AppError::Persistence(format!("Failed to replace {}: {}", self.path.display(), e)))?;

        Ok(())
    }

    /// Append a record, dropping the oldest entries beyond the configured cap.
    /// The in-memory copy only changes once the file write succeeds.
    pub async fn append(&self, record: HistoryRecord) -> AppResult<()> {
        let mut cached = self.records.lock().await;
        let current = match cached.take() {
            Some(records) => records,
            None => self.read_records().await,
        };

        let keep = current.len().min(self.max_entries - 1);
        let mut updated = Vec::with_capacity(keep + 1);
        updated.extend_from_slice(&current[current.len() - keep..]);
        updated.push(record);

        let written = self.write_records(&updated).await;
        *cached = Some(if written.is_ok() { updated } else { current });
        written?;

        debug!("History now holds {} records", cached.as_ref().map_or(0, Vec::len));
        Ok(())
    }

    /// Most recent records first
    pub async fn recent(&self, limit: usize) -> Vec<HistoryRecord> {
        let mut cached = self.records.lock().await;
        if cached.is_none() {
            *cached = Some(self.read_records().await);
        }
        cached
            .as_ref()
            .map(|records| records.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::analysis::AnalysisResult;
    use crate::services::severity::SeverityTier;
    use crate::utils::token_estimator::TokenizerStrategy;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn sample_result(tokens: u64) -> AnalysisResult {
        AnalysisResult {
            tokens,
            characters: 40,
            tokenizer: TokenizerStrategy::Approximate,
            carbon_model: "energy".to_string(),
            kwh: Some(tokens as f64 * 0.00017),
            carbon: 0.0808,
            roast_level: SeverityTier::classify(tokens),
            roast: "roasted".to_string(),
            rewrite: None,
            verdict: None,
            verdict_reason: None,
            token_savings: None,
            carbon_savings: None,
            efficiency_score: None,
        }
    }

    #[tokio::test]
    async fn test_append_and_read_back_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path().join("nested/history.json"), 10);

        store.append(HistoryRecord::new("first", sample_result(1))).await.unwrap();
        store.append(HistoryRecord::new("second", sample_result(2))).await.unwrap();

        let recent = store.recent(10).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].prompt, "second");
        assert_eq!(recent[1].prompt, "first");
    }

    #[tokio::test]
    async fn test_cap_drops_oldest() {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"), 3);

        for i in 0..5 {
            store.append(HistoryRecord::new(&format!("p{}", i), sample_result(i))).await.unwrap();
        }

        let prompts: Vec<String> = store.recent(10).await.into_iter().map(|r| r.prompt).collect();
        assert_eq!(prompts, vec!["p4", "p3", "p2"]);
    }

    #[tokio::test]
    async fn test_corrupt_file_resets_to_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        tokio::fs::write(&path, "{not json at all").await.unwrap();

        let store = HistoryStore::new(&path, 10);
        assert!(store.recent(10).await.is_empty());

        store.append(HistoryRecord::new("fresh", sample_result(5))).await.unwrap();
        let recent = store.recent(10).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].prompt, "fresh");
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_every_record() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(HistoryStore::new(dir.path().join("history.json"), 100));

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append(HistoryRecord::new(&format!("p{}", i), sample_result(i))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.recent(100).await.len(), 20);
    }

    #[tokio::test]
    async fn test_unwritable_path_is_persistence_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        tokio::fs::write(&blocker, "file, not a directory").await.unwrap();

        let store = HistoryStore::new(blocker.join("history.json"), 10);
        let result = store.append(HistoryRecord::new("x", sample_result(1))).await;
        assert!(matches!(result, Err(AppError::Persistence(_))));
    }

    #[tokio::test]
    async fn test_huge_prompt_is_stored_bounded() {
        use crate::models::history::MAX_STORED_PROMPT_CHARS;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");
        let store = HistoryStore::new(&path, 10);

        let huge = "word ".repeat(50_000);
        for _ in 0..5 {
            store.append(HistoryRecord::new(&huge, sample_result(65_000))).await.unwrap();
        }

        let recent = store.recent(1).await;
        assert!(recent[0].prompt_truncated);
        assert_eq!(recent[0].prompt.chars().count(), MAX_STORED_PROMPT_CHARS + 1);
        assert!(huge.starts_with(recent[0].prompt.trim_end_matches('…')));

        let on_disk = tokio::fs::metadata(&path).await.unwrap().len();
        assert!(on_disk < 5 * 4 * 1024, "history file grew to {} bytes", on_disk);

        let short = HistoryRecord::new("short prompt", sample_result(2));
        assert!(!short.prompt_truncated);
        assert_eq!(short.prompt, "short prompt");
    }

    #[tokio::test]
    async fn test_reopened_store_sees_persisted_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.json");

        let store = HistoryStore::new(&path, 10);
        store.append(HistoryRecord::new("kept", sample_result(3))).await.unwrap();
        assert_eq!(store.recent(10).await.len(), 1);

        let reopened = HistoryStore::new(&path, 10);
        let recent = reopened.recent(10).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].prompt, "kept");
    }

    #[test]
    fn test_disabled_config_yields_no_store() {
        let config = HistoryConfig {
            enabled: false,
            path: "unused.json".to_string(),
            max_entries: 10,
        };
        assert!(HistoryStore::from_config(&config).is_none());
    }
}
