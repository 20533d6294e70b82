pub mod analysis_service;
pub mod carbon_estimator;
pub mod history_store;
pub mod roast_selector;
pub mod savings;
pub mod severity;
pub mod song_service;

// Re-export commonly used types
pub use analysis_service::{AnalysisService, EstimationEngine};
pub use history_store::HistoryStore;
pub use severity::SeverityTier;
pub use song_service::SongService;
