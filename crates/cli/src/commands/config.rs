use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use dinebot_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "executor.base_url",
        &config.executor.base_url,
        source("executor.base_url", "DINEBOT_EXECUTOR_BASE_URL"),
    ));
    lines.push(render_line(
        "executor.timeout_secs",
        &config.executor.timeout_secs.to_string(),
        source("executor.timeout_secs", "DINEBOT_EXECUTOR_TIMEOUT_SECS"),
    ));

    let llm_api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line(
        "llm.api_key",
        llm_api_key,
        source("llm.api_key", "DINEBOT_LLM_API_KEY"),
    ));
    lines.push(render_line("llm.model", &config.llm.model, source("llm.model", "DINEBOT_LLM_MODEL")));

    lines.push(render_line(
        "retrieval.top_k",
        &config.retrieval.top_k.to_string(),
        source("retrieval.top_k", "DINEBOT_RETRIEVAL_TOP_K"),
    ));

    let max_turns = config
        .history
        .max_turns
        .map(|value| value.to_string())
        .unwrap_or_else(|| "<unbounded>".to_string());
    lines.push(render_line(
        "history.max_turns",
        &max_turns,
        source("history.max_turns", "DINEBOT_HISTORY_MAX_TURNS"),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", "DINEBOT_SERVER_BIND_ADDRESS"),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", "DINEBOT_SERVER_PORT"),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", "DINEBOT_LOG_LEVEL"),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", "DINEBOT_LOG_FORMAT"),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("dinebot.toml");
    root.exists().then_some(root)
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
