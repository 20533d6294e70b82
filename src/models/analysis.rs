use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::services::severity::SeverityTier;
use crate::utils::token_estimator::TokenizerStrategy;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub prompt: String,
}

/// The rewrite service's judgment of the original prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptVerdict {
    Efficient,
    Wasteful,
}

/// Result of analyzing one prompt. Built once per request and never mutated.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub tokens: u64,
    pub characters: usize,
    pub tokenizer: TokenizerStrategy,
    pub carbon_model: String,
    pub kwh: Option<f64>,
    /// Grams of CO2, rounded to 4 decimal places
    pub carbon: f64,
    pub roast_level: SeverityTier,
    pub roast: String,
    pub rewrite: Option<String>,
    pub verdict: Option<PromptVerdict>,
    pub verdict_reason: Option<String>,
    pub token_savings: Option<u64>,
    pub carbon_savings: Option<f64>,
    pub efficiency_score: Option<f64>,
}
