use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use gracekill::config::{self, GracekillConfig};
use gracekill::{kill_worker, wait_for_exit, KillError, ProcessWorker};

/// Fallback shutdown message when neither the CLI nor the config file
/// provides one.
const DEFAULT_MESSAGE: &str = r#"{"kind":"shutdown"}"#;

/// Run a command as a supervised worker. On Ctrl-C, ask it to exit by
/// writing a JSON message to its stdin, wait out the grace period, then
/// SIGKILL it. Exits with the worker's exit code.
#[derive(Parser, Debug)]
#[command(name = "gracekill", version, about)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "gracekill.toml")]
    config: PathBuf,

    /// Grace period in milliseconds (overrides config)
    #[arg(long)]
    grace_ms: Option<u64>,

    /// JSON shutdown message written to the worker's stdin (overrides config)
    #[arg(long)]
    send: Option<String>,

    /// Extra logging (protocol decisions, exit classification)
    #[arg(short, long)]
    verbose: bool,

    /// Command to run and supervise
    #[arg(required = true, trailing_var_arg = true, value_name = "COMMAND")]
    command: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");
    std::process::exit(run(cli).await);
}

async fn run(cli: Cli) -> i32 {
    // Missing config file at the default path is fine; an explicit but
    // unreadable/invalid one is an error.
    let config = if cli.config.exists() {
        match config::load(&cli.config) {
            Ok(config) => config,
            Err(err) => {
                tracing::error!(error = %err, "failed to load config");
                return 1;
            }
        }
    } else {
        GracekillConfig::default()
    };

    let grace = Duration::from_millis(cli.grace_ms.unwrap_or(config.shutdown.grace_ms));
    let message_text = cli
        .send
        .or(config.shutdown.message)
        .unwrap_or_else(|| DEFAULT_MESSAGE.to_string());
    let message: serde_json::Value = match serde_json::from_str(&message_text) {
        Ok(value) => value,
        Err(err) => {
            tracing::error!(error = %err, message = %message_text, "shutdown message is not valid JSON");
            return 1;
        }
    };

    let mut command = tokio::process::Command::new(&cli.command[0]);
    command.args(&cli.command[1..]);
    let worker = match ProcessWorker::spawn(command) {
        Ok(worker) => worker,
        Err(err) => {
            tracing::error!(error = %err, command = %cli.command[0], "failed to spawn worker");
            return 1;
        }
    };

    let code = tokio::select! {
        exit = wait_for_exit(&worker) => match exit {
            Ok(code) => {
                tracing::info!(code, "worker exited on its own");
                code
            }
            Err(fault) => {
                tracing::error!(error = %fault, "worker faulted");
                1
            }
        },
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                tracing::warn!(error = %err, "signal handler failed, shutting worker down");
            } else {
                tracing::info!("shutdown signal received, killing worker gracefully");
            }
            match kill_worker(&worker, message, grace).await {
                Ok(code) => code,
                Err(KillError::NonZeroExit { code }) | Err(KillError::Forced { code }) => {
                    tracing::warn!(code, "worker did not exit cleanly");
                    code
                }
                Err(err) => {
                    tracing::error!(error = %err, "graceful kill failed");
                    1
                }
            }
        }
    };

    tracing::info!(code, "gracekill finished");
    code
}
