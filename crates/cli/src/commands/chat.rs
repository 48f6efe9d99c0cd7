//! Interactive terminal chat session.
//!
//! Mirrors the web front end's behavior: every reply is printed under the
//! assistant label, and a pending action blocks further input until the user
//! approves or denies it.

use std::io::{self, BufRead, Write};

use dinebot_agent::executor::HttpAgentExecutor;
use dinebot_agent::{AgentRuntime, RuntimeOptions};
use dinebot_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use dinebot_core::{ChatError, Decision, PendingAction, Role, Session};

use super::CommandResult;

pub fn run(base_url: Option<String>) -> CommandResult {
    let config = match AppConfig::load(LoadOptions {
        overrides: ConfigOverrides { executor_base_url: base_url, ..ConfigOverrides::default() },
        ..LoadOptions::default()
    }) {
        Ok(config) => config,
        Err(error) => return CommandResult::failure("chat", "config", error.to_string(), 2),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                2,
            )
        }
    };

    match runtime.block_on(chat_loop(&config)) {
        Ok(()) => CommandResult::success("chat", "chat session ended"),
        Err(error) => CommandResult::failure("chat", "chat", error.to_string(), 1),
    }
}

async fn chat_loop(config: &AppConfig) -> anyhow::Result<()> {
    let executor = HttpAgentExecutor::new(&config.executor)
        .map_err(|error| anyhow::anyhow!("executor client construction failed: {error}"))?;
    let runtime = AgentRuntime::new(
        executor,
        RuntimeOptions {
            turn_timeout: std::time::Duration::from_secs(config.executor.timeout_secs),
            history_max_turns: config.history.max_turns,
        },
    );

    let mut session = Session::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    if let Some(greeting) = session.last_assistant() {
        println!("{}: {greeting}", Role::Assistant.label());
    }
    println!("(type 'exit' to leave)");

    loop {
        // A pending action blocks the conversation until it is decided.
        while let Some(action) = session.approvals().pending().cloned() {
            let Some(decision) = prompt_decision(&action, &mut lines)? else {
                return Ok(());
            };
            match runtime.resolve_pending(&mut session, &action.id, decision).await {
                Ok(outcome) => print_replies(&outcome.replies),
                // The action is still pending after a failed resolution
                // (invalid decision or unreachable executor), so the next
                // iteration asks again.
                Err(error) => print_error(&error, &session),
            }
        }

        let Some(text) = prompt_line(&format!("{}: ", Role::User.label()), &mut lines)? else {
            return Ok(());
        };
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit") {
            return Ok(());
        }

        match runtime.submit_turn(&mut session, text).await {
            Ok(outcome) => print_replies(&outcome.replies),
            Err(error) => print_error(&error, &session),
        }
    }
}

fn prompt_decision(
    action: &PendingAction,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> anyhow::Result<Option<Decision>> {
    println!("Dinebot wants to run: {}", action.describe());

    loop {
        let Some(answer) = prompt_line("Approve? [y/n]: ", lines)? else {
            return Ok(None);
        };
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(Some(Decision::Approved)),
            "n" | "no" => {
                let Some(reason) = prompt_line("Reason for denying: ", lines)? else {
                    return Ok(None);
                };
                return Ok(Some(Decision::Denied { reason: reason.trim().to_string() }));
            }
            _ => println!("Please answer 'y' or 'n'."),
        }
    }
}

fn prompt_line(
    prompt: &str,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> anyhow::Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush()?;
    match lines.next() {
        Some(line) => Ok(Some(line?)),
        None => Ok(None),
    }
}

fn print_replies(replies: &[String]) {
    for reply in replies {
        println!("{}: {reply}", Role::Assistant.label());
    }
}

fn print_error(error: &ChatError, session: &Session) {
    let interface = error.clone().into_interface(session.id().to_string());
    println!("[dinebot] {}", interface.user_message());
}
