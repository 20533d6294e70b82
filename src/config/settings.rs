use std::env;
use std::str::FromStr;
use crate::error::AppError;
use serde::{Deserialize, Serialize};

const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_SUNO_BASE_URL: &str = "https://studio-api.prod.suno.com/api/v2/external/hackmit";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppSettings {
    pub app: AppConfig,
    pub server: ServerConfig,
    pub tokenizer: TokenizerConfig,
    pub carbon: CarbonConfig,
    pub rewrite: RewriteConfig,
    pub song: SongConfig,
    pub history: HistoryConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub environment: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerMode {
    Precise,
    Approximate,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenizerConfig {
    pub mode: TokenizerMode,
    pub encoding: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarbonModelKind {
    /// tokens -> kWh -> grams CO2
    Energy,
    /// tokens / 1000 -> grams CO2
    PerThousandTokens,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CarbonConfig {
    pub model: CarbonModelKind,
    pub energy_per_token_kwh: f64,
    pub carbon_intensity_g_per_kwh: f64,
    pub carbon_per_1k_tokens_g: f64,
}

impl Default for CarbonConfig {
    fn default() -> Self {
        Self {
            model: CarbonModelKind::Energy,
            energy_per_token_kwh: 0.00017,
            carbon_intensity_g_per_kwh: 475.0,
            carbon_per_1k_tokens_g: 1.25,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RewriteConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SongConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub poll_interval_secs: u64,
    pub max_wait_secs: u64,
    pub default_style: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub path: String,
    pub max_entries: usize,
}

/// Read an optional variable and parse it, falling back to `default` when unset.
fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Configuration(format!("{} must be a valid value, got '{}'", key, raw))),
        Err(_) => Ok(default),
    }
}

fn optional_secret(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn validated_url(key: &str, default: &str) -> Result<String, AppError> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    url::Url::parse(&raw)
        .map_err(|e| AppError::Configuration(format!("{} must be a valid URL: {}", key, e)))?;
    Ok(raw.trim_end_matches('/').to_string())
}

fn non_negative_coefficient(key: &str, default: f64) -> Result<f64, AppError> {
    let value = parse_env(key, default)?;
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::Configuration(format!(
            "{} must be a finite, non-negative number",
            key
        )));
    }
    Ok(value)
}

impl AppSettings {
    pub fn from_env() -> Result<Self, AppError> {
        // App config
        let app_name = env::var("APP_NAME").unwrap_or_else(|_| "green-roast".to_string());
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        // Server config
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse::<u16>()
            .map_err(|_| AppError::Configuration("SERVER_PORT must be a valid port number".to_string()))?;

        // CORS origins
        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Tokenizer
        let tokenizer_mode = match env::var("TOKENIZER_STRATEGY")
            .unwrap_or_else(|_| "precise".to_string())
            .to_lowercase()
            .as_str()
        {
            "precise" | "bpe" => TokenizerMode::Precise,
            "approximate" | "heuristic" => TokenizerMode::Approximate,
            other => {
                return Err(AppError::Configuration(format!(
                    "TOKENIZER_STRATEGY must be 'precise' or 'approximate', got '{}'",
                    other
                )));
            }
        };
        let tokenizer_encoding = env::var("TOKENIZER_ENCODING").unwrap_or_else(|_| "gpt2".to_string());

        // Carbon model
        let defaults = CarbonConfig::default();
        let carbon_model = match env::var("CARBON_MODEL")
            .unwrap_or_else(|_| "energy".to_string())
            .to_lowercase()
            .as_str()
        {
            "energy" => CarbonModelKind::Energy,
            "per_1k" | "per_1k_tokens" => CarbonModelKind::PerThousandTokens,
            other => {
                return Err(AppError::Configuration(format!(
                    "CARBON_MODEL must be 'energy' or 'per_1k', got '{}'",
                    other
                )));
            }
        };
        let energy_per_token_kwh =
            non_negative_coefficient("ENERGY_PER_TOKEN_KWH", defaults.energy_per_token_kwh)?;
        let carbon_intensity_g_per_kwh =
            non_negative_coefficient("CARBON_INTENSITY_G_PER_KWH", defaults.carbon_intensity_g_per_kwh)?;
        let carbon_per_1k_tokens_g =
            non_negative_coefficient("CARBON_PER_1K_TOKENS", defaults.carbon_per_1k_tokens_g)?;

        // Rewrite service
        let rewrite_api_key = optional_secret("ANTHROPIC_API_KEY");
        let rewrite_base_url = validated_url("ANTHROPIC_BASE_URL", DEFAULT_ANTHROPIC_BASE_URL)?;
        let rewrite_model = env::var("REWRITE_MODEL").unwrap_or_else(|_| "claude-3-5-haiku-latest".to_string());
        let rewrite_timeout_secs = parse_env("REWRITE_TIMEOUT_SECS", 20u64)?;

        // Song service
        let song_api_key = optional_secret("SUNO_API_KEY");
        let song_base_url = validated_url("SUNO_BASE_URL", DEFAULT_SUNO_BASE_URL)?;
        let song_poll_interval_secs = parse_env("SONG_POLL_INTERVAL_SECS", 5u64)?;
        let song_max_wait_secs = parse_env("SONG_MAX_WAIT_SECS", 180u64)?;
        if song_poll_interval_secs == 0 {
            return Err(AppError::Configuration("SONG_POLL_INTERVAL_SECS must be greater than 0".to_string()));
        }
        let song_default_style = env::var("SONG_DEFAULT_STYLE").unwrap_or_else(|_| "kendrick".to_string());

        // History
        let history_enabled = parse_env("HISTORY_ENABLED", true)?;
        let history_path = env::var("HISTORY_PATH").unwrap_or_else(|_| "data/history.json".to_string());
        let history_max_entries = parse_env("HISTORY_MAX_ENTRIES", 500usize)?;

        Ok(Self {
            app: AppConfig {
                name: app_name,
                environment,
            },
            server: ServerConfig {
                host: server_host,
                port: server_port,
                cors_origins,
            },
            tokenizer: TokenizerConfig {
                mode: tokenizer_mode,
                encoding: tokenizer_encoding,
            },
            carbon: CarbonConfig {
                model: carbon_model,
                energy_per_token_kwh,
                carbon_intensity_g_per_kwh,
                carbon_per_1k_tokens_g,
            },
            rewrite: RewriteConfig {
                api_key: rewrite_api_key,
                base_url: rewrite_base_url,
                model: rewrite_model,
                timeout_secs: rewrite_timeout_secs,
            },
            song: SongConfig {
                api_key: song_api_key,
                base_url: song_base_url,
                poll_interval_secs: song_poll_interval_secs,
                max_wait_secs: song_max_wait_secs,
                default_style: song_default_style,
            },
            history: HistoryConfig {
                enabled: history_enabled,
                path: history_path,
                max_entries: history_max_entries,
            },
        })
    }
}
