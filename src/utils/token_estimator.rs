// Token counting for prompt analysis.
// Two strategies are available and the active one is fixed at construction:
// 1. Precise: BPE encoding through tiktoken-rs
// 2. Approximate: whitespace word count scaled by 1.3

use log::{debug, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tiktoken_rs::{cl100k_base, get_bpe_from_model, o200k_base, p50k_base, r50k_base, CoreBPE};

use crate::config::settings::{TokenizerConfig, TokenizerMode};

/// Tokens per whitespace-delimited word used by the approximate strategy
pub const WORDS_TO_TOKENS_RATIO: f64 = 1.3;

/// Encoding-name aliases accepted in configuration
static ENCODING_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();

    // GPT-2 / GPT-3 vocabulary
    map.insert("gpt2", "r50k_base");
    map.insert("r50k_base", "r50k_base");

    // Codex / text-davinci vocabulary
    map.insert("p50k_base", "p50k_base");

    // GPT-3.5 / GPT-4 vocabulary
    map.insert("cl100k_base", "cl100k_base");

    // GPT-4o vocabulary
    map.insert("o200k_base", "o200k_base");

    map
});

/// Which counting path produced a token count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerStrategy {
    Precise,
    Approximate,
}

/// Maps text to a token count. Implementations must be deterministic.
pub trait Tokenizer: Send + Sync {
    fn count_tokens(&self, text: &str) -> u64;
    fn strategy(&self) -> TokenizerStrategy;
}

/// Load a BPE vocabulary by encoding name, falling back to a model-name lookup
fn load_encoding(name: &str) -> Result<CoreBPE, anyhow::Error> {
    let name_lower = name.trim().to_lowercase();
    match ENCODING_ALIASES.get(name_lower.as_str()) {
        Some(&"r50k_base") => r50k_base(),
        Some(&"p50k_base") => p50k_base(),
        Some(&"cl100k_base") => cl100k_base(),
        Some(&"o200k_base") => o200k_base(),
        _ => {
            debug!("No encoding alias for '{}', trying model lookup", name);
            get_bpe_from_model(&name_lower)
        }
    }
}

/// Heuristic token count: round(word_count * 1.3)
pub fn approximate_tokens(text: &str) -> u64 {
    let word_count = text.split_whitespace().count();
    (word_count as f64 * WORDS_TO_TOKENS_RATIO).round() as u64
}

pub enum TokenCounter {
    Precise { encoding: String, bpe: CoreBPE },
    Approximate,
}

impl TokenCounter {
    /// Build a BPE-backed counter. Fails if the vocabulary cannot be loaded.
    pub fn precise(encoding: &str) -> Result<Self, anyhow::Error> {
        let bpe = load_encoding(encoding)?;
        Ok(TokenCounter::Precise {
            encoding: encoding.to_string(),
            bpe,
        })
    }

    pub fn approximate() -> Self {
        TokenCounter::Approximate
    }

    /// Build the counter requested by configuration.
    ///
    /// A precise counter whose vocabulary fails to load degrades to the
    /// approximate strategy here, once, with a warning. The chosen strategy is
    /// then reported with every result.
    pub fn from_config(config: &TokenizerConfig) -> Self {
        match config.mode {
            TokenizerMode::Approximate => TokenCounter::Approximate,
            TokenizerMode::Precise => match Self::precise(&config.encoding) {
                Ok(counter) => counter,
                Err(e) => {
                    warn!(
                        "Failed to load BPE encoding '{}': {}. Falling back to the approximate word-count heuristic",
                        config.encoding, e
                    );
                    TokenCounter::Approximate
                }
            },
        }
    }

    pub fn encoding_name(&self) -> Option<&str> {
        match self {
            TokenCounter::Precise { encoding, .. } => Some(encoding),
            TokenCounter::Approximate => None,
        }
    }
}

impl Tokenizer for TokenCounter {
    fn count_tokens(&self, text: &str) -> u64 {
        if text.is_empty() {
            return 0;
        }

        match self {
            TokenCounter::Precise { encoding, bpe } => {
                let token_count = bpe.encode_with_special_tokens(text).len() as u64;
                debug!(
                    "Counted {} tokens for {} characters using encoding '{}'",
                    token_count,
                    text.chars().count(),
                    encoding
                );
                token_count
            }
            TokenCounter::Approximate => approximate_tokens(text),
        }
    }

    fn strategy(&self) -> TokenizerStrategy {
        match self {
            TokenCounter::Precise { .. } => TokenizerStrategy::Precise,
            TokenCounter::Approximate => TokenizerStrategy::Approximate,
        }
    }
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenCounter::Precise { encoding, .. } => {
                f.debug_struct("Precise").field("encoding", encoding).finish()
            }
            TokenCounter::Approximate => f.write_str("Approximate"),
        }
    }
}
