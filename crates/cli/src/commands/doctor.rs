use dinebot_core::config::{AppConfig, LoadOptions};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_llm_credentials(&config));
            checks.push(check_executor_reachability(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "llm_credentials",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
            checks.push(DoctorCheck {
                name: "executor_reachability",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_llm_credentials(config: &AppConfig) -> DoctorCheck {
    if config.llm.api_key.is_some() {
        DoctorCheck {
            name: "llm_credentials",
            status: CheckStatus::Pass,
            details: "llm.api_key is set".to_string(),
        }
    } else {
        DoctorCheck {
            name: "llm_credentials",
            status: CheckStatus::Fail,
            details: "llm.api_key is not set (set DINEBOT_LLM_API_KEY or OPENAI_API_KEY)"
                .to_string(),
        }
    }
}

fn check_executor_reachability(config: &AppConfig) -> DoctorCheck {
    let Some(authority) = executor_authority(&config.executor.base_url) else {
        return DoctorCheck {
            name: "executor_reachability",
            status: CheckStatus::Fail,
            details: format!("could not parse host from `{}`", config.executor.base_url),
        };
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "executor_reachability",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        tokio::net::TcpStream::connect(&authority)
            .await
            .map_err(|error| format!("failed to connect to `{authority}`: {error}"))
    });

    match result {
        Ok(_) => DoctorCheck {
            name: "executor_reachability",
            status: CheckStatus::Pass,
            details: format!("connected to `{authority}`"),
        },
        Err(error) => {
            DoctorCheck { name: "executor_reachability", status: CheckStatus::Fail, details: error }
        }
    }
}

/// `host:port` for a TCP probe, with the scheme's default port filled in.
fn executor_authority(base_url: &str) -> Option<String> {
    let (default_port, rest) = if let Some(rest) = base_url.strip_prefix("https://") {
        (443u16, rest)
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        (80u16, rest)
    } else {
        return None;
    };

    let host = rest.split('/').next()?.trim();
    if host.is_empty() {
        return None;
    }

    if host.contains(':') {
        Some(host.to_string())
    } else {
        Some(format!("{host}:{default_port}"))
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
