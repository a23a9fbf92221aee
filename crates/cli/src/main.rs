//! CLI entrypoint and subcommand orchestration.

mod config;
#[cfg(not(test))]
mod daemon;
#[cfg(test)]
mod test_support;

use agent::{ChatRequestHandler, HttpAiClient};
use clap::{Parser, Subcommand};
use config::{Config, TestsConfig};
use gateway::{AppState, WebServer};
use proto::{AggregateReport, AiReply, AiRequest, TestTarget};
use std::sync::Arc;
use tools::{ShellRunner, TestOrchestrator};

#[cfg(not(test))]
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Top-level command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "capassist")]
#[command(about = "Chat assistant proxy and test runner", version)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable debug logging to ~/.capassist/logs/
    #[arg(long, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the API and web client (default when no subcommand is given)
    Serve,

    /// Run a test target locally and print the combined output
    Test {
        /// rag, ai, ui or all
        #[arg(value_parser = parse_target)]
        target: TestTarget,
    },

    /// Send one message to the AI service and print the reply
    Ask {
        message: String,
    },
}

impl Commands {
    fn label(&self) -> &'static str {
        match self {
            Commands::Serve => "serve",
            Commands::Test { .. } => "test",
            Commands::Ask { .. } => "ask",
        }
    }
}

fn parse_target(raw: &str) -> Result<TestTarget, String> {
    raw.parse()
        .map_err(|_| format!("unknown target '{raw}' (expected rag, ai, ui or all)"))
}

#[cfg(not(test))]
#[tokio::main]
/// Program entrypoint.
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve);

    // WorkerGuard must outlive main() so buffered file writes are flushed on exit.
    let _file_guard = init_tracing(&cli.log_level, cli.debug);

    if cli.debug {
        tracing::info!(
            version = env!("CARGO_PKG_VERSION"),
            command = command.label(),
            log_level = %cli.log_level,
            "========== capassist session start =========="
        );
    }

    let config = Config::load(cli.config.as_deref())?;

    match command {
        Commands::Serve => cmd_serve(config).await?,
        Commands::Test { target } => {
            let report = cmd_test(&config.tests, target).await;
            println!("{}", report.combined_output);
            if !report.success {
                anyhow::bail!("test run '{target}' failed");
            }
        }
        Commands::Ask { message } => println!("{}", cmd_ask(&config, &message).await?),
    }
    Ok(())
}

/// Installs the console subscriber and, with `--debug`, a daily debug log
/// under `~/.capassist/logs/`.
#[cfg(not(test))]
fn init_tracing(
    log_level: &str,
    debug: bool,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if !debug {
        fmt()
            .with_env_filter(console_filter)
            .with_target(false)
            .init();
        return None;
    }

    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let log_dir = std::path::PathBuf::from(home)
        .join(".capassist")
        .join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let appender = tracing_appender::rolling::daily(&log_dir, "debug.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let console = fmt::layer().with_target(false).with_filter(console_filter);
    let file = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_ansi(false)
        .with_filter(EnvFilter::new(
            "debug,hyper=info,hyper_util=info,rustls=info,reqwest=info",
        ));
    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .init();
    Some(guard)
}

fn build_chat_handler(config: &Config) -> ChatRequestHandler {
    let client = HttpAiClient::with_timeout(config.ai.endpoint.clone(), config.ai.timeout());
    ChatRequestHandler::new(Arc::new(client))
}

fn build_orchestrator(tests: &TestsConfig) -> TestOrchestrator {
    TestOrchestrator::new(Arc::new(ShellRunner::new()), tests.suite_table())
        .with_matcher(tests.matcher())
        .with_step_timeout(tests.step_timeout())
}

fn build_state(config: &Config) -> AppState {
    AppState::new(
        build_chat_handler(config),
        Arc::new(build_orchestrator(&config.tests)),
    )
}

/// Runs the HTTP server until SIGINT/SIGTERM.
#[cfg(not(test))]
async fn cmd_serve(config: Config) -> proto::Result<()> {
    if config.ai.endpoint.is_empty() {
        tracing::warn!("{} is not set; chat requests will fail with 502", config::AI_ENDPOINT_ENV);
    }
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        tests_base_dir = %config.tests.base_dir,
        "Starting capassist"
    );

    let state = build_state(&config);
    let server = WebServer::new(
        config.server.host,
        config.server.port,
        config.server.cors_origins,
        config.server.static_dir,
    );
    server.run(state, daemon::wait_for_shutdown()).await?;
    Ok(())
}

async fn cmd_test(tests: &TestsConfig, target: TestTarget) -> AggregateReport {
    build_orchestrator(tests).run_tests(target).await
}

/// Sends one message through the same handler `POST /api/ai` uses and
/// returns the reply text.
async fn cmd_ask(config: &Config, message: &str) -> proto::Result<String> {
    let body = serde_json::to_vec(&AiRequest {
        message: message.to_string(),
    })
    .unwrap_or_default();
    let envelope = build_chat_handler(config).handle(&body).await?;

    Ok(AiReply::from_payload(&envelope.message)
        .map(|reply| reply.message)
        .unwrap_or_else(|| envelope.message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proto::{ChatError, Error};

    fn tests_config_in(dir: &std::path::Path, ui_command: &str) -> TestsConfig {
        let mut tests = TestsConfig {
            base_dir: dir.to_string_lossy().to_string(),
            ..TestsConfig::default()
        };
        tests.ui.command = ui_command.to_string();
        tests
    }

    #[test]
    fn no_subcommand_defaults_to_serve() {
        let cli = Cli::try_parse_from(["capassist"]).expect("parse");
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "info");
        assert!(!cli.debug);
    }

    #[test]
    fn test_subcommand_parses_known_targets() {
        let cli = Cli::try_parse_from(["capassist", "test", "all"]).expect("parse");
        assert!(matches!(
            cli.command,
            Some(Commands::Test {
                target: TestTarget::All
            })
        ));
    }

    #[test]
    fn test_subcommand_rejects_unknown_target() {
        let err = Cli::try_parse_from(["capassist", "test", "unit"]).expect_err("must fail");
        assert!(err.to_string().contains("unknown target 'unit'"));
    }

    #[test]
    fn global_flags_and_ask_parse() {
        let cli = Cli::try_parse_from([
            "capassist",
            "--config",
            "/etc/capassist.toml",
            "--debug",
            "-l",
            "debug",
            "ask",
            "olá",
        ])
        .expect("parse");
        assert_eq!(
            cli.config.as_deref(),
            Some(std::path::Path::new("/etc/capassist.toml"))
        );
        assert!(cli.debug);
        assert_eq!(cli.log_level, "debug");
        let command = cli.command.expect("command");
        assert_eq!(command.label(), "ask");
        assert!(matches!(command, Commands::Ask { message } if message == "olá"));
    }

    #[test]
    fn orchestrator_uses_configured_suite_table() {
        let tests = TestsConfig::default();
        assert_eq!(build_orchestrator(&tests).table(), &tests.suite_table());
    }

    #[test]
    fn build_state_accepts_default_config() {
        let _state = build_state(&Config::default());
    }

    #[tokio::test]
    async fn cmd_test_runs_configured_command() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let tests = tests_config_in(tmp.path(), "echo ui-suite-ran");

        let report = cmd_test(&tests, TestTarget::Ui).await;

        assert!(report.success, "{}", report.combined_output);
        assert!(report.combined_output.contains("> echo ui-suite-ran"));
        assert!(report.combined_output.contains("ui-suite-ran\n"));
        assert!(report.combined_output.ends_with("(exit code: 0)"));
    }

    #[tokio::test]
    async fn cmd_test_reports_failing_command() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let tests = tests_config_in(tmp.path(), "exit 3");

        let report = cmd_test(&tests, TestTarget::Ui).await;

        assert!(!report.success);
        assert!(report.combined_output.ends_with("(exit code: 3)"));
    }

    #[tokio::test]
    async fn cmd_ask_without_endpoint_is_external_error() {
        let err = cmd_ask(&Config::default(), "oi")
            .await
            .expect_err("must fail");
        assert!(matches!(err, Error::Chat(ChatError::External(_))));
    }

    #[tokio::test]
    async fn cmd_ask_rejects_empty_message() {
        let err = cmd_ask(&Config::default(), "").await.expect_err("must fail");
        assert!(matches!(err, Error::Chat(ChatError::Validation(_))));
    }
}
