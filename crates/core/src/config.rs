use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub executor: ExecutorConfig,
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub history: HistoryConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// The external agent-graph executor endpoint.
#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    pub base_url: String,
    /// Bounds each streamed step and each state inspection, so a hung
    /// executor call cannot hang the turn.
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    /// Model-provider credential, read from the process environment at
    /// startup (`DINEBOT_LLM_API_KEY`, falling back to `OPENAI_API_KEY`).
    pub api_key: Option<SecretString>,
    pub model: String,
}

#[derive(Clone, Debug)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

#[derive(Clone, Debug)]
pub struct HistoryConfig {
    /// When set, only the newest N turns are formatted as agent context.
    pub max_turns: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub executor_base_url: Option<String>,
    pub executor_timeout_secs: Option<u64>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub history_max_turns: Option<usize>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig {
                base_url: "http://localhost:2024".to_string(),
                timeout_secs: 60,
            },
            llm: LlmConfig { api_key: None, model: "gpt-4o-mini".to_string() },
            retrieval: RetrievalConfig { top_k: 5 },
            history: HistoryConfig { max_turns: None },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("dinebot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(executor) = patch.executor {
            if let Some(base_url) = executor.base_url {
                self.executor.base_url = base_url;
            }
            if let Some(timeout_secs) = executor.timeout_secs {
                self.executor.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
        }

        if let Some(retrieval) = patch.retrieval {
            if let Some(top_k) = retrieval.top_k {
                self.retrieval.top_k = top_k;
            }
        }

        if let Some(history) = patch.history {
            if let Some(max_turns) = history.max_turns {
                self.history.max_turns = Some(max_turns);
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("DINEBOT_EXECUTOR_BASE_URL") {
            self.executor.base_url = value;
        }
        if let Some(value) = read_env("DINEBOT_EXECUTOR_TIMEOUT_SECS") {
            self.executor.timeout_secs = parse_u64("DINEBOT_EXECUTOR_TIMEOUT_SECS", &value)?;
        }

        let api_key = read_env("DINEBOT_LLM_API_KEY").or_else(|| read_env("OPENAI_API_KEY"));
        if let Some(value) = api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("DINEBOT_LLM_MODEL") {
            self.llm.model = value;
        }

        if let Some(value) = read_env("DINEBOT_RETRIEVAL_TOP_K") {
            self.retrieval.top_k = parse_usize("DINEBOT_RETRIEVAL_TOP_K", &value)?;
        }

        if let Some(value) = read_env("DINEBOT_HISTORY_MAX_TURNS") {
            self.history.max_turns = Some(parse_usize("DINEBOT_HISTORY_MAX_TURNS", &value)?);
        }

        if let Some(value) = read_env("DINEBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("DINEBOT_SERVER_PORT") {
            self.server.port = parse_u16("DINEBOT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("DINEBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("DINEBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("DINEBOT_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("DINEBOT_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(executor_base_url) = overrides.executor_base_url {
            self.executor.base_url = executor_base_url;
        }
        if let Some(executor_timeout_secs) = overrides.executor_timeout_secs {
            self.executor.timeout_secs = executor_timeout_secs;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(history_max_turns) = overrides.history_max_turns {
            self.history.max_turns = Some(history_max_turns);
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.executor.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("executor.base_url must not be empty".into()));
        }
        if !self.executor.base_url.starts_with("http://")
            && !self.executor.base_url.starts_with("https://")
        {
            return Err(ConfigError::Validation(format!(
                "executor.base_url must be an http(s) URL, got `{}`",
                self.executor.base_url
            )));
        }
        if self.executor.timeout_secs == 0 {
            return Err(ConfigError::Validation("executor.timeout_secs must be positive".into()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Validation("llm.model must not be empty".into()));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::Validation("retrieval.top_k must be positive".into()));
        }
        if self.history.max_turns == Some(0) {
            return Err(ConfigError::Validation(
                "history.max_turns must be positive when set".into(),
            ));
        }
        if self.server.bind_address.trim().is_empty() {
            return Err(ConfigError::Validation("server.bind_address must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    executor: Option<ExecutorPatch>,
    llm: Option<LlmPatch>,
    retrieval: Option<RetrievalPatch>,
    history: Option<HistoryPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Deserialize)]
struct ExecutorPatch {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RetrievalPatch {
    top_k: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct HistoryPatch {
    max_turns: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    let default = PathBuf::from("dinebot.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use secrecy::ExposeSecret;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    fn load_from_file(contents: &str) -> Result<AppConfig, ConfigError> {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");

        AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: ConfigOverrides::default(),
        })
    }

    #[test]
    fn defaults_validate() {
        let config = AppConfig::load(LoadOptions::default()).expect("defaults should load");
        assert_eq!(config.executor.timeout_secs, 60);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.history.max_turns, None);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn file_values_override_defaults() {
        let config = load_from_file(
            r#"
            [executor]
            base_url = "https://agents.example.com"
            timeout_secs = 10

            [llm]
            api_key = "sk-test"
            model = "gpt-4o"

            [history]
            max_turns = 40

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .expect("file config should load");

        assert_eq!(config.executor.base_url, "https://agents.example.com");
        assert_eq!(config.executor.timeout_secs, 10);
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(
            config.llm.api_key.as_ref().map(|key| key.expose_secret().to_string()),
            Some("sk-test".to_string())
        );
        assert_eq!(config.history.max_turns, Some(40));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn missing_required_file_fails() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            require_file: true,
            overrides: ConfigOverrides::default(),
        });

        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }

    #[test]
    fn programmatic_overrides_win_over_file_values() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"[executor]\nbase_url = \"http://from-file:2024\"\n")
            .expect("write config");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            require_file: true,
            overrides: ConfigOverrides {
                executor_base_url: Some("http://from-override:2024".to_string()),
                history_max_turns: Some(12),
                ..ConfigOverrides::default()
            },
        })
        .expect("overrides should load");

        assert_eq!(config.executor.base_url, "http://from-override:2024");
        assert_eq!(config.history.max_turns, Some(12));
    }

    #[test]
    fn rejects_non_http_executor_url() {
        let result = load_from_file("[executor]\nbase_url = \"ftp://nope\"\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_zero_timeout() {
        let result = load_from_file("[executor]\ntimeout_secs = 0\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_zero_history_bound() {
        let result = load_from_file("[history]\nmax_turns = 0\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_unknown_log_format() {
        let result = "verbose".parse::<LogFormat>();
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
