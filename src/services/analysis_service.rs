//! Prompt analysis pipeline.
//!
//! [`EstimationEngine`] holds the pure part: validate, count tokens, estimate
//! carbon, classify, pick a roast, compute savings. [`AnalysisService`] wraps it
//! with the optional rewrite service and history store.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clients::anthropic_client::{AnthropicClient, PromptRewriter, RewriteSuggestion};
use crate::config::settings::AppSettings;
use crate::error::{AppError, AppResult};
use crate::models::analysis::AnalysisResult;
use crate::models::history::HistoryRecord;
use crate::services::carbon_estimator::{carbon_model_from_config, round_to, round_carbon, CarbonModel};
use crate::services::history_store::HistoryStore;
use crate::services::roast_selector::{RoastBank, RoastSelector};
use crate::services::savings::{compute_savings, efficiency_score, SavingsResult};
use crate::services::severity::SeverityTier;
use crate::utils::token_estimator::{TokenCounter, Tokenizer};

/// Returned in place of a rewrite when the rewrite service is unavailable
pub const REWRITE_FALLBACK: &str =
    "We couldn't generate a leaner rewrite right now. Try cutting greetings, apologies, and repeated context.";

/// Decimal places for reported energy
const ENERGY_DISPLAY_DECIMALS: i32 = 8;

/// Numbers computed for a single piece of text
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub tokens: u64,
    pub characters: usize,
    pub kwh: Option<f64>,
    pub carbon_g: f64,
    pub tier: SeverityTier,
    pub roast: String,
}

pub struct EstimationEngine {
    tokenizer: Arc<dyn Tokenizer>,
    carbon_model: Arc<dyn CarbonModel>,
    roasts: RoastSelector,
}

impl EstimationEngine {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, carbon_model: Arc<dyn CarbonModel>, roasts: RoastSelector) -> Self {
        Self {
            tokenizer,
            carbon_model,
            roasts,
        }
    }

    pub fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    pub fn carbon_model(&self) -> &dyn CarbonModel {
        self.carbon_model.as_ref()
    }

    /// Steps 1-5: validate, tokenize, estimate, classify, roast
    pub fn estimate(&self, prompt: &str) -> AppResult<Estimate> {
        if prompt.trim().is_empty() {
            return Err(AppError::EmptyPrompt);
        }

        let tokens = self.tokenizer.count_tokens(prompt);
        let kwh = self.carbon_model.energy_kwh(tokens);
        let carbon_g = self.carbon_model.carbon_g(tokens);
        let tier = SeverityTier::classify(tokens);
        let roast = self.roasts.select_roast(tokens, carbon_g, tier)?;

        Ok(Estimate {
            tokens,
            characters: prompt.chars().count(),
            kwh,
            carbon_g,
            tier,
            roast,
        })
    }

    pub fn savings_for(&self, original_tokens: u64, rewrite: &str) -> SavingsResult {
        let rewrite_tokens = self.tokenizer.count_tokens(rewrite);
        compute_savings(original_tokens, Some(rewrite_tokens), self.carbon_model.as_ref())
    }

    /// Assemble the response from an estimate and an optional rewrite outcome
    pub fn build_result(&self, estimate: Estimate, rewrite: RewriteOutcome) -> AnalysisResult {
        let mut result = AnalysisResult {
            tokens: estimate.tokens,
            characters: estimate.characters,
            tokenizer: self.tokenizer.strategy(),
            carbon_model: self.carbon_model.name().to_string(),
            kwh: estimate.kwh.map(|kwh| round_to(kwh, ENERGY_DISPLAY_DECIMALS)),
            carbon: round_carbon(estimate.carbon_g),
            roast_level: estimate.tier,
            roast: estimate.roast,
            rewrite: None,
            verdict: None,
            verdict_reason: None,
            token_savings: None,
            carbon_savings: None,
            efficiency_score: None,
        };

        match rewrite {
            RewriteOutcome::Suggested(suggestion) => {
                let savings = self.savings_for(estimate.tokens, &suggestion.rewrite);
                result.token_savings = Some(savings.token_savings);
                result.carbon_savings = Some(round_carbon(savings.carbon_savings));
                result.efficiency_score = Some(efficiency_score(estimate.tokens, &savings));
                result.rewrite = Some(suggestion.rewrite);
                result.verdict = Some(suggestion.verdict);
                result.verdict_reason = Some(suggestion.reason);
            }
            RewriteOutcome::Fallback => {
                result.rewrite = Some(REWRITE_FALLBACK.to_string());
            }
            RewriteOutcome::Disabled => {}
        }

        result
    }
}

/// What the rewrite step produced for a request
#[derive(Debug, Clone, PartialEq)]
pub enum RewriteOutcome {
    Suggested(RewriteSuggestion),
    /// The service failed; the caller gets the fixed fallback text
    Fallback,
    /// No rewrite service is configured
    Disabled,
}

pub struct AnalysisService {
    engine: EstimationEngine,
    rewriter: Option<Arc<dyn PromptRewriter>>,
    history: Option<Arc<HistoryStore>>,
}

impl AnalysisService {
    pub fn new(
        engine: EstimationEngine,
        rewriter: Option<Arc<dyn PromptRewriter>>,
        history: Option<Arc<HistoryStore>>,
    ) -> Self {
        Self {
            engine,
            rewriter,
            history,
        }
    }

    /// Wire the production pipeline from settings. Fails fast on a bad roast
    /// bank or an HTTP client that cannot be built.
    pub fn from_settings(settings: &AppSettings, history: Option<Arc<HistoryStore>>) -> AppResult<Self> {
        let tokenizer = TokenCounter::from_config(&settings.tokenizer);
        info!(
            "Tokenizer strategy: {:?} (encoding: {})",
            tokenizer.strategy(),
            tokenizer.encoding_name().unwrap_or("none")
        );

        let bank = RoastBank::builtin();
        bank.validate()?;
        let roasts = RoastSelector::with_thread_random(bank);

        let engine = EstimationEngine::new(
            Arc::new(tokenizer),
            carbon_model_from_config(&settings.carbon),
            roasts,
        );

        let rewriter = AnthropicClient::from_config(&settings.rewrite)?
            .map(|client| Arc::new(client) as Arc<dyn PromptRewriter>);
        if rewriter.is_none() {
            warn!("ANTHROPIC_API_KEY not set; prompt rewrites are disabled");
        }

        Ok(Self::new(engine, rewriter, history))
    }

    pub fn engine(&self) -> &EstimationEngine {
        &self.engine
    }

    async fn request_rewrite(&self, prompt: &str) -> RewriteOutcome {
        let Some(rewriter) = &self.rewriter else {
            return RewriteOutcome::Disabled;
        };

        match rewriter.rewrite(prompt).await {
            Ok(suggestion) => RewriteOutcome::Suggested(suggestion),
            Err(e) => {
                warn!("Rewrite service failed, using fallback: {}", e);
                RewriteOutcome::Fallback
            }
        }
    }

    async fn record_history(&self, prompt: &str, result: &AnalysisResult) {
        let Some(history) = &self.history else {
            return;
        };

        if let Err(e) = history.append(HistoryRecord::new(prompt, result.clone())).await {
            warn!("Failed to record analysis history: {}", e);
        }
    }

    /// Run the full pipeline for one prompt
    pub async fn analyze(&self, prompt: &str) -> AppResult<AnalysisResult> {
        let estimate = self.engine.estimate(prompt)?;
        debug!(
            "Prompt estimate: {} tokens, {:.4}g CO2, tier {}",
            estimate.tokens, estimate.carbon_g, estimate.tier
        );

        let rewrite = self.request_rewrite(prompt).await;
        let result = self.engine.build_result(estimate, rewrite);

        self.record_history(prompt, &result).await;
        info!(
            "Analyzed prompt: {} tokens, {}g CO2, level {}",
            result.tokens, result.carbon, result.roast_level
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::analysis::PromptVerdict;
    use crate::services::carbon_estimator::EnergyIntensityModel;
    use crate::services::roast_selector::FixedIndex;
    use crate::utils::token_estimator::TokenizerStrategy;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Approximate tokenizer that counts how often it was called
    #[derive(Default)]
    struct SpyTokenizer {
        calls: AtomicUsize,
    }

    impl Tokenizer for SpyTokenizer {
        fn count_tokens(&self, text: &str) -> u64 {
            self.calls.fetch_add(1, Ordering::SeqCst);
            TokenCounter::Approximate.count_tokens(text)
        }

        fn strategy(&self) -> TokenizerStrategy {
            TokenizerStrategy::Approximate
        }
    }

    struct StaticRewriter(AppResult<RewriteSuggestion>);

    #[async_trait]
    impl PromptRewriter for StaticRewriter {
        async fn rewrite(&self, _prompt: &str) -> AppResult<RewriteSuggestion> {
            match &self.0 {
                Ok(s) => Ok(s.clone()),
                Err(_) => Err(AppError::External("rate limited".to_string())),
            }
        }
    }

    fn engine_with(tokenizer: Arc<dyn Tokenizer>) -> EstimationEngine {
        EstimationEngine::new(
            tokenizer,
            Arc::new(EnergyIntensityModel::new(0.00017, 475.0)),
            RoastSelector::new(RoastBank::builtin(), Arc::new(FixedIndex(0))),
        )
    }

    fn engine() -> EstimationEngine {
        engine_with(Arc::new(TokenCounter::approximate()))
    }

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn test_empty_prompt_rejected_before_tokenizing() {
        let spy = Arc::new(SpyTokenizer::default());
        let engine = engine_with(spy.clone());

        assert!(matches!(engine.estimate(""), Err(AppError::EmptyPrompt)));
        assert!(matches!(engine.estimate("   \n\t"), Err(AppError::EmptyPrompt)));
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);

        engine.estimate("hello").unwrap();
        assert_eq!(spy.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ten_words_with_approximate_tokenizer() {
        let estimate = engine().estimate(&words(10)).unwrap();
        assert_eq!(estimate.tokens, 13);
        assert_eq!(estimate.tier, SeverityTier::Efficient);
        assert_eq!(estimate.roast, "Nice and concise! The planet approves 🌱");
    }

    #[test]
    fn test_result_rounding() {
        let engine = engine();
        let estimate = engine.estimate(&words(20)).unwrap();
        let result = engine.build_result(estimate, RewriteOutcome::Disabled);

        // 26 tokens * 0.00017 kWh * 475 g/kWh
        assert_eq!(result.tokens, 26);
        assert_eq!(result.carbon, 2.0995);
        assert_eq!(result.kwh, Some(0.00442));
        assert_eq!(result.tokenizer, TokenizerStrategy::Approximate);
        assert_eq!(result.rewrite, None);
        assert_eq!(result.token_savings, None);
    }

    #[tokio::test]
    async fn test_rewrite_produces_savings() {
        let suggestion = RewriteSuggestion {
            rewrite: words(20),
            verdict: PromptVerdict::Wasteful,
            reason: "Padding.".to_string(),
        };
        let service = AnalysisService::new(engine(), Some(Arc::new(StaticRewriter(Ok(suggestion)))), None);

        // 100 words -> 130 tokens, rewrite 20 words -> 26 tokens
        let result = service.analyze(&words(100)).await.unwrap();
        assert_eq!(result.tokens, 130);
        assert_eq!(result.roast_level, SeverityTier::Moderate);
        assert_eq!(result.token_savings, Some(104));
        assert_eq!(result.carbon_savings, Some(8.398));
        assert_eq!(result.efficiency_score, Some(80.0));
        assert_eq!(result.verdict, Some(PromptVerdict::Wasteful));
        assert_eq!(result.verdict_reason.as_deref(), Some("Padding."));
    }

    #[tokio::test]
    async fn test_longer_rewrite_saves_nothing() {
        let suggestion = RewriteSuggestion {
            rewrite: words(50),
            verdict: PromptVerdict::Efficient,
            reason: "Already short.".to_string(),
        };
        let service = AnalysisService::new(engine(), Some(Arc::new(StaticRewriter(Ok(suggestion)))), None);

        let result = service.analyze(&words(5)).await.unwrap();
        assert_eq!(result.token_savings, Some(0));
        assert_eq!(result.carbon_savings, Some(0.0));
        assert_eq!(result.efficiency_score, Some(0.0));
    }

    #[tokio::test]
    async fn test_rewrite_failure_degrades_to_fallback() {
        let rewriter = StaticRewriter(Err(AppError::External("rate limited".to_string())));
        let service = AnalysisService::new(engine(), Some(Arc::new(rewriter)), None);

        let result = service.analyze("Please help me write an email").await.unwrap();
        assert_eq!(result.rewrite.as_deref(), Some(REWRITE_FALLBACK));
        assert_eq!(result.token_savings, None);
        assert_eq!(result.verdict, None);
    }

    #[tokio::test]
    async fn test_history_failure_does_not_fail_request() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let history = Arc::new(HistoryStore::new(blocker.join("history.json"), 10));

        let service = AnalysisService::new(engine(), None, Some(history));
        let result = service.analyze("short prompt").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_successful_analysis_is_recorded() {
        let dir = TempDir::new().unwrap();
        let history = Arc::new(HistoryStore::new(dir.path().join("history.json"), 10));
        let service = AnalysisService::new(engine(), None, Some(history.clone()));

        let result = service.analyze("short prompt").await.unwrap();
        assert!(service.analyze("  ").await.is_err());

        let recent = history.recent(10).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].prompt, "short prompt");
        assert_eq!(recent[0].result, result);
    }
}
