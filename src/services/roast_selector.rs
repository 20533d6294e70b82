//! Tier-specific roast templates and the random pick between them.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::services::carbon_estimator::{round_carbon, CARBON_DISPLAY_DECIMALS};
use crate::services::severity::SeverityTier;

const TOKENS_PLACEHOLDER: &str = "{tokens}";
const CARBON_PLACEHOLDER: &str = "{carbon}";

const EFFICIENT_ROASTS: &[&str] = &[
    "Nice and concise! The planet approves 🌱",
    "Only {tokens} tokens? Greta would be proud.",
    "{carbon}g of CO₂. A houseplant exhales more drama than that.",
    "Short, sweet, and sustainable. Who hurt you into being this efficient?",
    "This prompt is so lean it runs on solar power and good vibes.",
];

const MODERATE_ROASTS: &[&str] = &[
    "{tokens} tokens. Not a crime, but the trees are keeping an eye on you.",
    "That's {carbon}g of CO₂ for a question you could have Googled.",
    "Decent, but you padded that prompt like a high schooler hitting a word count.",
    "The polar bears aren't mad, just disappointed.",
    "You're one 'please and thank you' away from a carbon offset.",
];

const WASTEFUL_ROASTS: &[&str] = &[
    "Bro, you're choking the planet with that prompt!",
    "{tokens} tokens?! That's a lot of words for a little question.",
    "Your prompt just burned {carbon}g of CO₂. Hope the answer was worth a glacier.",
    "Even trees are crying looking at this carbon footprint!",
    "You wrote a novel and called it a prompt.",
];

const EXCESSIVE_ROASTS: &[&str] = &[
    "That's enough CO₂ to power a small country!",
    "Your prompt is more toxic than a coal plant!",
    "{tokens} tokens. The datacenter fans are screaming your name.",
    "{carbon}g of CO₂ and counting. Somewhere a penguin just lost its iceberg.",
    "This isn't a prompt, it's an emissions report. {tokens} tokens of pure smog.",
];

/// Source of the random template pick. Injected so tests can pin the choice.
pub trait RandomSource: Send + Sync {
    /// Return an index in `0..len`. `len` is always at least 1.
    fn pick_index(&self, len: usize) -> usize;
}

/// Uniform pick from the thread-local generator
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn pick_index(&self, len: usize) -> usize {
        rand::rng().random_range(0..len)
    }
}

/// Always the same index, wrapped to the template count
#[derive(Debug, Clone, Copy)]
pub struct FixedIndex(pub usize);

impl RandomSource for FixedIndex {
    fn pick_index(&self, len: usize) -> usize {
        self.0 % len
    }
}

/// Reproducible sequence from a fixed seed
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn pick_index(&self, len: usize) -> usize {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.random_range(0..len)
    }
}

/// Ordered template lists, one per tier
#[derive(Debug, Clone)]
pub struct RoastBank {
    templates: HashMap<SeverityTier, Vec<String>>,
}

impl RoastBank {
    /// Build a bank, rejecting any tier that has no templates
    pub fn new(templates: HashMap<SeverityTier, Vec<String>>) -> AppResult<Self> {
        let bank = Self { templates };
        bank.validate()?;
        Ok(bank)
    }

    /// Every tier must have at least one template
    pub fn validate(&self) -> AppResult<()> {
        for tier in SeverityTier::ALL {
            if self.templates_for(tier).is_empty() {
                return Err(AppError::Configuration(format!(
                    "No roast templates configured for tier '{}'",
                    tier
                )));
            }
        }
        Ok(())
    }

    pub fn builtin() -> Self {
        let mut templates = HashMap::new();
        let tables: [(SeverityTier, &[&str]); 4] = [
            (SeverityTier::Efficient, EFFICIENT_ROASTS),
            (SeverityTier::Moderate, MODERATE_ROASTS),
            (SeverityTier::Wasteful, WASTEFUL_ROASTS),
            (SeverityTier::Excessive, EXCESSIVE_ROASTS),
        ];
        for (tier, table) in tables {
            templates.insert(tier, table.iter().map(|t| t.to_string()).collect());
        }
        Self { templates }
    }

    pub fn templates_for(&self, tier: SeverityTier) -> &[String] {
        self.templates.get(&tier).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Fill in `{tokens}` and `{carbon}`. Carbon goes through [`round_carbon`] so the
/// text quotes the same figure the response reports.
pub fn render_template(template: &str, tokens: u64, carbon_g: f64) -> String {
    template
        .replace(TOKENS_PLACEHOLDER, &tokens.to_string())
        .replace(
            CARBON_PLACEHOLDER,
            &format!("{:.*}", CARBON_DISPLAY_DECIMALS as usize, round_carbon(carbon_g)),
        )
}

pub struct RoastSelector {
    bank: RoastBank,
    random: Arc<dyn RandomSource>,
}

impl RoastSelector {
    pub fn new(bank: RoastBank, random: Arc<dyn RandomSource>) -> Self {
        Self { bank, random }
    }

    pub fn with_thread_random(bank: RoastBank) -> Self {
        Self::new(bank, Arc::new(ThreadRandom))
    }

    pub fn select_roast(&self, tokens: u64, carbon_g: f64, tier: SeverityTier) -> AppResult<String> {
        let templates = self.bank.templates_for(tier);
        if templates.is_empty() {
            return Err(AppError::Configuration(format!(
                "No roast templates configured for tier '{}'",
                tier
            )));
        }

        let index = self.random.pick_index(templates.len()).min(templates.len() - 1);
        debug!("Selected roast template {} of {} for tier {}", index, templates.len(), tier);
        Ok(render_template(&templates[index], tokens, carbon_g))
    }
}
