use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use dinebot_agent::executor::{ExecutorError, HttpAgentExecutor};
use dinebot_agent::tools::{BookCabTool, BookTableTool, ToolRegistry};
use dinebot_agent::{AgentRuntime, RuntimeOptions};
use dinebot_core::config::{AppConfig, ConfigError, LoadOptions};

use crate::sessions::SessionRegistry;

pub struct Application {
    pub config: AppConfig,
    pub runtime: Arc<AgentRuntime<HttpAgentExecutor>>,
    pub sessions: SessionRegistry,
    pub tools: ToolRegistry,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("executor client construction failed: {0}")]
    Executor(#[source] ExecutorError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let executor = HttpAgentExecutor::new(&config.executor).map_err(BootstrapError::Executor)?;
    let runtime = Arc::new(AgentRuntime::new(
        executor,
        RuntimeOptions {
            turn_timeout: Duration::from_secs(config.executor.timeout_secs),
            history_max_turns: config.history.max_turns,
        },
    ));

    let mut tools = ToolRegistry::default();
    tools.register(BookCabTool);
    tools.register(BookTableTool);

    info!(
        event_name = "system.bootstrap.ready",
        executor_base_url = %config.executor.base_url,
        tool_count = tools.len(),
        "application bootstrap complete"
    );

    Ok(Application { config, runtime, sessions: SessionRegistry::new(), tools })
}

#[cfg(test)]
mod tests {
    use dinebot_core::config::AppConfig;

    use super::bootstrap_with_config;

    #[tokio::test]
    async fn bootstrap_builds_runtime_from_defaults() {
        let app = bootstrap_with_config(AppConfig::default()).await.expect("bootstrap");

        assert!(app.sessions.is_empty());
        assert_eq!(app.tools.names(), vec!["book_a_cab", "book_a_table"]);
        assert_eq!(app.runtime.executor().base_url(), "http://localhost:2024");
    }
}
