use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::commit::CommitStyle;
use crate::error::{AppError, AppResult};

const APP_DIR_NAME: &str = "commitsmith";
const CONFIG_FILE_NAME: &str = "config.json";
const ENV_PREFIX: &str = "COMMITSMITH_";

pub const DEFAULT_CONCURRENCY: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Gemini,
    Ollama,
    LmStudio,
    Custom(String),
}

impl LlmProvider {
    pub fn from_str(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "openai" => LlmProvider::OpenAi,
            "anthropic" | "claude" => LlmProvider::Anthropic,
            "gemini" | "google" => LlmProvider::Gemini,
            "ollama" => LlmProvider::Ollama,
            "lmstudio" | "lm-studio" => LlmProvider::LmStudio,
            other => LlmProvider::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Gemini => "gemini",
            LlmProvider::Ollama => "ollama",
            LlmProvider::LmStudio => "lmstudio",
            LlmProvider::Custom(name) => name,
        }
    }

    /// Self-hosted runtimes: free to call and often the only model available.
    pub fn is_local(&self) -> bool {
        matches!(self, LlmProvider::Ollama | LlmProvider::LmStudio)
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(
            self,
            LlmProvider::OpenAi | LlmProvider::Anthropic | LlmProvider::Gemini
        )
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "gpt-4o-mini",
            LlmProvider::Anthropic => "claude-3-5-haiku-20241022",
            LlmProvider::Gemini => "gemini-2.0-flash",
            LlmProvider::Ollama => "llama3",
            LlmProvider::LmStudio | LlmProvider::Custom(_) => "local-model",
        }
    }

    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            LlmProvider::OpenAi => Some("https://api.openai.com/v1"),
            LlmProvider::Anthropic => Some("https://api.anthropic.com/v1"),
            LlmProvider::Gemini => Some("https://generativelanguage.googleapis.com/v1beta"),
            LlmProvider::Ollama => Some("http://localhost:11434/v1"),
            LlmProvider::LmStudio => Some("http://localhost:1234/v1"),
            LlmProvider::Custom(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartFilterConfig {
    pub enabled: bool,
    pub min_files: usize,
    pub max_files: usize,
    pub timeout: Duration,
    pub log_decisions: bool,
}

impl Default for SmartFilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_files: 10,
            max_files: 500,
            timeout: Duration::from_secs(30),
            log_decisions: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBudgetConfig {
    /// Overrides the context window looked up from the model name.
    pub context_window: Option<usize>,
    pub safety_margin_percent: u8,
    pub reserved_overhead: usize,
}

impl Default for TokenBudgetConfig {
    fn default() -> Self {
        Self {
            context_window: None,
            safety_margin_percent: 85,
            reserved_overhead: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm_provider: LlmProvider,
    pub model: String,
    pub map_model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub commit_style: CommitStyle,
    pub smart_filter: SmartFilterConfig,
    pub token_budget: TokenBudgetConfig,
    pub retry: RetryConfig,
    pub request_timeout: Duration,
    pub concurrency: usize,
    pub workspace_root: PathBuf,
}

impl AppConfig {
    pub fn load(workspace_hint: &Path, overrides: &ConfigOverrides) -> AppResult<Self> {
        let stored = StoredConfig::load()?;
        Self::resolve(
            stored,
            |key| overrides.lookup(key).or_else(|| env::var(key).ok()),
            workspace_hint,
        )
    }

    /// Layers environment over the stored file over built-in defaults.
    pub fn resolve<F>(stored: StoredConfig, env_lookup: F, workspace_hint: &Path) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| {
            env_lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let llm_provider = lookup("PROVIDER")
            .or(stored.llm_provider)
            .map(|provider| LlmProvider::from_str(&provider))
            .unwrap_or(LlmProvider::Gemini);

        let model = lookup("MODEL")
            .or(stored.model)
            .unwrap_or_else(|| llm_provider.default_model().to_string());

        let conventional = match lookup("CONVENTIONAL") {
            Some(raw) => parse_bool("CONVENTIONAL", &raw)?,
            None => stored.conventional.unwrap_or(true),
        };

        let concurrency = match lookup("CONCURRENCY") {
            Some(raw) => raw.parse::<usize>().map_err(|err| {
                AppError::Configuration(format!("invalid {ENV_PREFIX}CONCURRENCY '{raw}': {err}"))
            })?,
            None => stored.concurrency.unwrap_or(DEFAULT_CONCURRENCY),
        };

        let filter_defaults = SmartFilterConfig::default();
        let smart_filter = SmartFilterConfig {
            enabled: stored.smart_filter_enabled.unwrap_or(filter_defaults.enabled),
            min_files: stored.smart_filter_min_files.unwrap_or(filter_defaults.min_files),
            max_files: stored.smart_filter_max_files.unwrap_or(filter_defaults.max_files),
            timeout: stored
                .smart_filter_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(filter_defaults.timeout),
            log_decisions: stored.smart_filter_log.unwrap_or(filter_defaults.log_decisions),
        };

        let budget_defaults = TokenBudgetConfig::default();
        let token_budget = TokenBudgetConfig {
            context_window: stored.context_window,
            safety_margin_percent: stored
                .safety_margin_percent
                .unwrap_or(budget_defaults.safety_margin_percent),
            reserved_overhead: stored
                .reserved_overhead
                .unwrap_or(budget_defaults.reserved_overhead),
        };

        let retry_defaults = RetryConfig::default();
        let retry = RetryConfig {
            max_attempts: stored.retry_attempts.unwrap_or(retry_defaults.max_attempts),
            base_delay: stored
                .retry_base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(retry_defaults.base_delay),
        };

        let config = Self {
            model,
            map_model: lookup("MAP_MODEL").or(stored.map_model),
            api_key: lookup("API_KEY").or(stored.api_key),
            base_url: lookup("BASE_URL").or(stored.base_url),
            commit_style: CommitStyle {
                conventional,
                language: lookup("LANGUAGE")
                    .or(stored.language)
                    .unwrap_or_else(|| CommitStyle::default().language),
            },
            smart_filter,
            token_budget,
            retry,
            request_timeout: Duration::from_secs(stored.request_timeout_secs.unwrap_or(60)),
            concurrency: concurrency.max(1),
            workspace_root: workspace_hint.to_path_buf(),
            llm_provider,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        if self.model.trim().is_empty() {
            return Err(AppError::Configuration("model name is empty".to_string()));
        }
        let margin = self.token_budget.safety_margin_percent;
        if !(1..=100).contains(&margin) {
            return Err(AppError::Configuration(format!(
                "safety margin must be between 1 and 100 percent, got {margin}"
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::Configuration(
                "retry attempts must be at least 1".to_string(),
            ));
        }
        if self.smart_filter.min_files > self.smart_filter.max_files {
            return Err(AppError::Configuration(format!(
                "smart filter min files ({}) exceeds max files ({})",
                self.smart_filter.min_files, self.smart_filter.max_files
            )));
        }
        Ok(())
    }

    pub fn base_url(&self) -> AppResult<String> {
        self.base_url
            .clone()
            .or_else(|| self.llm_provider.default_base_url().map(str::to_string))
            .ok_or_else(|| {
                AppError::Configuration(format!(
                    "no base URL configured for provider '{}'",
                    self.llm_provider.as_str()
                ))
            })
    }
}

/// Command-line values. They take precedence over the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub map_model: Option<String>,
}

impl ConfigOverrides {
    fn lookup(&self, key: &str) -> Option<String> {
        let value = match key.strip_prefix(ENV_PREFIX)? {
            "PROVIDER" => &self.provider,
            "MODEL" => &self.model,
            "MAP_MODEL" => &self.map_model,
            _ => return None,
        };
        value.clone()
    }
}

fn parse_bool(name: &str, raw: &str) -> AppResult<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AppError::Configuration(format!(
            "invalid {ENV_PREFIX}{name} '{other}', expected true or false"
        ))),
    }
}

/// On-disk configuration. Every field is optional so partially filled files
/// keep working as new settings are added.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoredConfig {
    pub llm_provider: Option<String>,
    pub model: Option<String>,
    pub map_model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub language: Option<String>,
    pub conventional: Option<bool>,
    pub concurrency: Option<usize>,
    pub smart_filter_enabled: Option<bool>,
    pub smart_filter_min_files: Option<usize>,
    pub smart_filter_max_files: Option<usize>,
    pub smart_filter_timeout_secs: Option<u64>,
    pub smart_filter_log: Option<bool>,
    pub context_window: Option<usize>,
    pub safety_margin_percent: Option<u8>,
    pub reserved_overhead: Option<usize>,
    pub retry_attempts: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

impl StoredConfig {
    pub fn load() -> AppResult<Self> {
        Self::load_from(&config_file_path()?)
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|err| {
                AppError::Configuration(format!("invalid config file {}: {err}", path.display()))
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(AppError::Io(err)),
        }
    }

    pub fn save(&self) -> AppResult<()> {
        self.save_to(&config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)
            .map_err(|err| AppError::Configuration(format!("failed to write config: {err}")))?;
        fs::write(path, data)?;
        Ok(())
    }
}

pub fn config_directory() -> AppResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| {
            AppError::Configuration("unable to determine the user config directory".to_string())
        })
}

pub fn config_file_path() -> AppResult<PathBuf> {
    Ok(config_directory()?.join(CONFIG_FILE_NAME))
}
