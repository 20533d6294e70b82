//! Energy and carbon estimation for token counts.
//!
//! Two strategies are supported because the two formulas in use are not
//! numerically equivalent:
//! - [`EnergyIntensityModel`]: tokens -> kWh -> grams CO2 (the default)
//! - [`PerThousandTokensModel`]: tokens / 1000 -> grams CO2

use std::sync::Arc;
use tracing::info;

use crate::config::settings::{CarbonConfig, CarbonModelKind};

/// Decimal places used for any externally reported carbon value
pub const CARBON_DISPLAY_DECIMALS: i32 = 4;

/// Round a carbon mass for reporting
pub fn round_carbon(grams: f64) -> f64 {
    round_to(grams, CARBON_DISPLAY_DECIMALS)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// A replaceable carbon accounting strategy
pub trait CarbonModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Energy in kWh, when the model has an energy intermediate
    fn energy_kwh(&self, tokens: u64) -> Option<f64>;

    /// Unrounded grams of CO2 for a token count
    fn carbon_g(&self, tokens: u64) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyIntensityModel {
    pub energy_per_token_kwh: f64,
    pub carbon_intensity_g_per_kwh: f64,
}

impl EnergyIntensityModel {
    pub fn new(energy_per_token_kwh: f64, carbon_intensity_g_per_kwh: f64) -> Self {
        Self {
            energy_per_token_kwh,
            carbon_intensity_g_per_kwh,
        }
    }

    pub fn tokens_to_kwh(&self, tokens: u64) -> f64 {
        tokens as f64 * self.energy_per_token_kwh
    }

    pub fn kwh_to_gco2(&self, kwh: f64) -> f64 {
        kwh * self.carbon_intensity_g_per_kwh
    }
}

impl CarbonModel for EnergyIntensityModel {
    fn name(&self) -> &'static str {
        "energy"
    }

    fn energy_kwh(&self, tokens: u64) -> Option<f64> {
        Some(self.tokens_to_kwh(tokens))
    }

    fn carbon_g(&self, tokens: u64) -> f64 {
        self.kwh_to_gco2(self.tokens_to_kwh(tokens))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerThousandTokensModel {
    pub grams_per_1k_tokens: f64,
}

impl PerThousandTokensModel {
    pub fn new(grams_per_1k_tokens: f64) -> Self {
        Self { grams_per_1k_tokens }
    }
}

impl CarbonModel for PerThousandTokensModel {
    fn name(&self) -> &'static str {
        "per_1k_tokens"
    }

    fn energy_kwh(&self, _tokens: u64) -> Option<f64> {
        None
    }

    fn carbon_g(&self, tokens: u64) -> f64 {
        (tokens as f64 / 1000.0) * self.grams_per_1k_tokens
    }
}

/// Build the configured carbon model
pub fn carbon_model_from_config(config: &CarbonConfig) -> Arc<dyn CarbonModel> {
    let model: Arc<dyn CarbonModel> = match config.model {
        CarbonModelKind::Energy => Arc::new(EnergyIntensityModel::new(
            config.energy_per_token_kwh,
            config.carbon_intensity_g_per_kwh,
        )),
        CarbonModelKind::PerThousandTokens => {
            Arc::new(PerThousandTokensModel::new(config.carbon_per_1k_tokens_g))
        }
    };
    info!("Using carbon model '{}'", model.name());
    model
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn default_energy_model() -> EnergyIntensityModel {
        EnergyIntensityModel::new(0.00017, 475.0)
    }

    #[test]
    fn test_thousand_tokens_reference_values() {
        let model = default_energy_model();
        let kwh = model.energy_kwh(1000).unwrap();
        assert!((kwh - 0.17).abs() < 1e-12);

        let carbon = model.carbon_g(1000);
        assert!((carbon - 80.75).abs() < 1e-9);
        assert_eq!(round_carbon(carbon), 80.75);
        assert_eq!(format!("{:.4}", round_carbon(carbon)), "80.7500");
    }

    #[test]
    fn test_zero_tokens_is_zero_carbon() {
        assert_eq!(default_energy_model().carbon_g(0), 0.0);
        assert_eq!(PerThousandTokensModel::new(1.25).carbon_g(0), 0.0);
    }

    #[test]
    fn test_per_thousand_model() {
        let model = PerThousandTokensModel::new(1.25);
        assert_eq!(model.energy_kwh(2000), None);
        assert!((model.carbon_g(2000) - 2.5).abs() < 1e-12);
        assert!((model.carbon_g(400) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_models_are_not_equivalent() {
        let energy = default_energy_model();
        let per_1k = PerThousandTokensModel::new(1.25);
        assert!(energy.carbon_g(1000) != per_1k.carbon_g(1000));
    }

    #[test]
    fn test_model_from_config() {
        let mut config = CarbonConfig::default();
        assert_eq!(carbon_model_from_config(&config).name(), "energy");

        config.model = CarbonModelKind::PerThousandTokens;
        let model = carbon_model_from_config(&config);
        assert_eq!(model.name(), "per_1k_tokens");
        assert!((model.carbon_g(1000) - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.123456, 4), 0.1235);
        assert_eq!(round_to(0.00004, 4), 0.0);
        assert_eq!(round_to(12.5, 0), 13.0);
    }

    proptest! {
        #[test]
        fn prop_energy_carbon_non_negative_and_monotonic(a in 0u64..10_000_000, b in 0u64..10_000_000) {
            let model = default_energy_model();
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(model.carbon_g(low) >= 0.0);
            prop_assert!(model.carbon_g(low) <= model.carbon_g(high));
        }

        #[test]
        fn prop_per_thousand_non_negative_and_monotonic(a in 0u64..10_000_000, b in 0u64..10_000_000) {
            let model = PerThousandTokensModel::new(1.25);
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(model.carbon_g(low) >= 0.0);
            prop_assert!(model.carbon_g(low) <= model.carbon_g(high));
        }
    }
}
