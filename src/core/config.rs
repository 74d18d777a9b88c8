use std::env;
use std::path::PathBuf;

use thiserror::Error;
use tracing::warn;

use crate::core::types::OptimizeFor;

// ---------------------------------------------------------------------------
// Env-driven configuration, resolved once at startup.
// ---------------------------------------------------------------------------

pub const ENV_VENDOR_API_KEY: &str = "VENDOR_API_KEY";
pub const ENV_VENDOR_BASE_URL: &str = "VENDOR_BASE_URL";
pub const ENV_RESOURCE_STORAGE: &str = "MCP_RESOURCE_STORAGE";
pub const ENV_RESOURCE_FILESYSTEM_ROOT: &str = "MCP_RESOURCE_FILESYSTEM_ROOT";
pub const ENV_LLM_PROVIDER: &str = "LLM_PROVIDER";
pub const ENV_LLM_API_KEY: &str = "LLM_API_KEY";
pub const ENV_LLM_MODEL: &str = "LLM_MODEL";
pub const ENV_LLM_API_BASE_URL: &str = "LLM_API_BASE_URL";
pub const ENV_OPTIMIZE_FOR: &str = "OPTIMIZE_FOR";
pub const ENV_MAP_DEFAULT_COUNTRY: &str = "MAP_DEFAULT_COUNTRY";
pub const ENV_MAP_DEFAULT_LANGUAGES: &str = "MAP_DEFAULT_LANGUAGES";
pub const ENV_MAP_MAX_RESULTS_PER_PAGE: &str = "MAP_MAX_RESULTS_PER_PAGE";

const DEFAULT_VENDOR_BASE_URL: &str = "https://api.firecrawl.dev";
const DEFAULT_MAP_PAGE_SIZE: usize = 200;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} has invalid value `{value}` (expected one of: {expected})")]
    InvalidValue {
        var: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{0} is required when MCP_RESOURCE_STORAGE=filesystem")]
    MissingFilesystemRoot(&'static str),

    #[error("{0} is required when LLM_PROVIDER is set")]
    MissingLlmKey(&'static str),

    #[error("LLM_PROVIDER=openai-compatible requires both LLM_MODEL and LLM_API_BASE_URL")]
    IncompleteOpenAiCompatible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Memory,
    Filesystem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Anthropic,
    OpenAi,
    OpenAiCompatible,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::OpenAiCompatible => "openai-compatible",
        }
    }
}

/// LLM provider wiring for the extraction stage.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: String,
    pub model: Option<String>,
    pub api_base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub vendor_api_key: Option<String>,
    pub vendor_base_url: String,
    pub storage: StorageBackend,
    pub filesystem_root: Option<PathBuf>,
    pub llm: Option<LlmConfig>,
    pub optimize_for: OptimizeFor,
    pub map_default_country: Option<String>,
    pub map_default_languages: Vec<String>,
    /// Hard cap on a single map page; validated to 1–5000.
    pub map_max_results_per_page: usize,
    pub http_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub outbound_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vendor_api_key: None,
            vendor_base_url: DEFAULT_VENDOR_BASE_URL.to_string(),
            storage: StorageBackend::Memory,
            filesystem_root: None,
            llm: None,
            optimize_for: OptimizeFor::Cost,
            map_default_country: None,
            map_default_languages: Vec::new(),
            map_max_results_per_page: DEFAULT_MAP_PAGE_SIZE,
            http_timeout_secs: 30,
            connect_timeout_secs: 10,
            outbound_limit: 32,
        }
    }
}

impl Config {
    /// Resolve configuration from the environment. Misconfiguration that
    /// makes the process unusable (bad storage backend, missing filesystem
    /// root, incomplete LLM wiring) is a hard startup error; soft knobs
    /// fall back to defaults with a warning.
    pub fn from_env() -> Result<Self, ConfigError> {
        let storage = match non_empty(ENV_RESOURCE_STORAGE).as_deref() {
            None | Some("memory") => StorageBackend::Memory,
            Some("filesystem") => StorageBackend::Filesystem,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    var: ENV_RESOURCE_STORAGE,
                    value: other.to_string(),
                    expected: "memory, filesystem",
                })
            }
        };

        let filesystem_root = non_empty(ENV_RESOURCE_FILESYSTEM_ROOT).map(PathBuf::from);
        if storage == StorageBackend::Filesystem && filesystem_root.is_none() {
            return Err(ConfigError::MissingFilesystemRoot(ENV_RESOURCE_FILESYSTEM_ROOT));
        }

        let llm = match non_empty(ENV_LLM_PROVIDER).as_deref() {
            None => None,
            Some(raw) => {
                let provider = match raw {
                    "anthropic" => LlmProvider::Anthropic,
                    "openai" => LlmProvider::OpenAi,
                    "openai-compatible" => LlmProvider::OpenAiCompatible,
                    other => {
                        return Err(ConfigError::InvalidValue {
                            var: ENV_LLM_PROVIDER,
                            value: other.to_string(),
                            expected: "anthropic, openai, openai-compatible",
                        })
                    }
                };
                let api_key = non_empty(ENV_LLM_API_KEY)
                    .ok_or(ConfigError::MissingLlmKey(ENV_LLM_API_KEY))?;
                let model = non_empty(ENV_LLM_MODEL);
                let api_base_url = non_empty(ENV_LLM_API_BASE_URL);
                if provider == LlmProvider::OpenAiCompatible
                    && (model.is_none() || api_base_url.is_none())
                {
                    return Err(ConfigError::IncompleteOpenAiCompatible);
                }
                Some(LlmConfig { provider, api_key, model, api_base_url })
            }
        };

        let optimize_for = match non_empty(ENV_OPTIMIZE_FOR).as_deref() {
            None | Some("cost") => OptimizeFor::Cost,
            Some("speed") => OptimizeFor::Speed,
            Some(other) => {
                warn!(
                    "{}={} is not recognized (expected cost or speed) — using cost",
                    ENV_OPTIMIZE_FOR, other
                );
                OptimizeFor::Cost
            }
        };

        let map_default_languages = non_empty(ENV_MAP_DEFAULT_LANGUAGES)
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            vendor_api_key: non_empty(ENV_VENDOR_API_KEY),
            vendor_base_url: non_empty(ENV_VENDOR_BASE_URL)
                .unwrap_or_else(|| DEFAULT_VENDOR_BASE_URL.to_string()),
            storage,
            filesystem_root,
            llm,
            optimize_for,
            map_default_country: non_empty(ENV_MAP_DEFAULT_COUNTRY),
            map_default_languages,
            map_max_results_per_page: resolve_map_page_size(
                non_empty(ENV_MAP_MAX_RESULTS_PER_PAGE).as_deref(),
            ),
            http_timeout_secs: parse_env("HTTP_TIMEOUT_SECS", 30),
            connect_timeout_secs: parse_env("HTTP_CONNECT_TIMEOUT_SECS", 10),
            outbound_limit: parse_env("OUTBOUND_LIMIT", 32),
        })
    }
}

/// Validate the per-page cap to 1–5000; anything else falls back to 200
/// with a single warning (the config is resolved once per process).
fn resolve_map_page_size(raw: Option<&str>) -> usize {
    match raw {
        None => DEFAULT_MAP_PAGE_SIZE,
        Some(v) => match v.parse::<usize>() {
            Ok(n) if (1..=5_000).contains(&n) => n,
            _ => {
                warn!(
                    "{}={} is out of range (1–5000) — using {}",
                    ENV_MAP_MAX_RESULTS_PER_PAGE, v, DEFAULT_MAP_PAGE_SIZE
                );
                DEFAULT_MAP_PAGE_SIZE
            }
        },
    }
}

fn non_empty(var: &str) -> Option<String> {
    env::var(var).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(var: &str, default: T) -> T {
    env::var(var).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}
