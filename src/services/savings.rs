use serde::{Deserialize, Serialize};

use crate::services::carbon_estimator::{round_to, CarbonModel};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SavingsResult {
    pub token_savings: u64,
    pub carbon_savings: f64,
}

/// Savings from a rewrite. Carbon is computed on the token delta itself, so
/// rounding can never produce a negative saving.
pub fn compute_savings(
    original_tokens: u64,
    rewrite_tokens: Option<u64>,
    carbon_model: &dyn CarbonModel,
) -> SavingsResult {
    let Some(rewrite_tokens) = rewrite_tokens else {
        return SavingsResult::default();
    };

    let token_savings = original_tokens.saturating_sub(rewrite_tokens);
    SavingsResult {
        token_savings,
        carbon_savings: carbon_model.carbon_g(token_savings).max(0.0),
    }
}

/// Percentage of the original tokens removed by a rewrite, one decimal place
pub fn efficiency_score(original_tokens: u64, savings: &SavingsResult) -> f64 {
    if original_tokens == 0 {
        return 0.0;
    }
    round_to(savings.token_savings as f64 / original_tokens as f64 * 100.0, 1)
}
