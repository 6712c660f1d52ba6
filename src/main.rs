//! tabclip: copy every tab URL in the current browser window to the clipboard.
//!
//! This is the entry point of the application. It parses command-line
//! arguments, loads configuration, and runs the orchestrator event loop that
//! owns the ephemeral clipboard-writer context. A trigger (a line on stdin,
//! SIGUSR1, or `--once`) starts a copy cycle; the outcome comes back as an
//! event and drives the indicator feedback.

mod app;
mod clipboard;
mod config;
mod events;
mod indicator;
mod tabs;
mod writer;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::clipboard::CopyPipeline;
use crate::config::{load_config, Config};
use crate::events::Event;
use crate::indicator::{IconState, Indicator, TermIndicator};
use crate::tabs::{DevtoolsTabs, TabSource};
use crate::writer::WriterManager;

const DEFAULT_DEVTOOLS: &str = "http://127.0.0.1:9222";
const DEFAULT_TEARDOWN_DELAY_MS: u64 = 2000;
const DEFAULT_FEEDBACK_DELAY_MS: u64 = 1000;
const CONFIG_FILE: &str = "tabclip.toml";

/// Command-line interface definition.
#[derive(Debug, Parser)]
#[command(
    name = "tabclip",
    version,
    about = "Copy all tab URLs in the current browser window to the clipboard",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    /// Path to tabclip.toml configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Ignore any tabclip.toml in the current directory.
    #[arg(long)]
    no_config: bool,
    /// DevTools endpoint of the browser to enumerate.
    #[arg(long)]
    devtools: Option<String>,
    /// Override the legacy copy command (e.g. "xclip -selection clipboard").
    #[arg(long)]
    copy_cmd: Option<String>,
    /// Grace delay before the writer context is torn down (ms).
    #[arg(long)]
    teardown_delay_ms: Option<u64>,
    /// How long the success indicator stays up (ms).
    #[arg(long)]
    feedback_delay_ms: Option<u64>,
    /// Trigger one copy cycle and exit after its outcome.
    #[arg(long)]
    once: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show help information.
    Help,
    /// Show version information.
    Version,
}

/// Resolved runtime settings (CLI flags over config file over defaults).
#[derive(Debug, Clone)]
struct Settings {
    devtools: String,
    copy_cmd: Option<Vec<String>>,
    teardown_delay: Duration,
    feedback_delay: Duration,
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(command) = &cli.command {
        match command {
            Commands::Help => {
                Cli::command().print_help()?;
                println!();
                return Ok(());
            }
            Commands::Version => {
                println!("tabclip {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = resolve_settings(&cli)?;

    let (event_tx, mut event_rx) = mpsc::channel(64);
    let pipeline = Arc::new(CopyPipeline::new(settings.copy_cmd.clone()));
    let writer = Arc::new(WriterManager::new(
        event_tx.clone(),
        pipeline,
        settings.teardown_delay,
    ));
    let tabs = Arc::new(DevtoolsTabs::new(settings.devtools.clone())?) as Arc<dyn TabSource>;
    let indicator = Arc::new(TermIndicator::new());
    let app = App::new(
        tabs,
        writer,
        Arc::clone(&indicator) as Arc<dyn Indicator>,
        event_tx.clone(),
        settings.feedback_delay,
    );

    spawn_signal_listener(event_tx.clone());
    if settings.once {
        let _ = event_tx.send(Event::Triggered).await;
    } else {
        spawn_trigger_listener(event_tx.clone());
        tracing::info!(
            "ready; press Enter or send SIGUSR1 to copy (browser at {})",
            settings.devtools
        );
        if let Err(err) = indicator.set_state(IconState::Default) {
            tracing::error!("failed to paint indicator: {err:#}");
        }
    }

    // One outcome ends a --once run; on success we wait for the feedback
    // window so the indicator is actually seen.
    let mut exit_on_revert = false;
    loop {
        let Some(event) = event_rx.recv().await else {
            break;
        };
        match event {
            Event::Triggered => app.on_triggered(),
            Event::CycleAborted { error } => {
                app.on_cycle_aborted(&error);
                if settings.once {
                    anyhow::bail!("copy cycle failed: {error}");
                }
            }
            Event::CopySucceeded => {
                app.on_copy_succeeded();
                if settings.once {
                    exit_on_revert = true;
                }
            }
            Event::CopyFailed { error } => {
                app.on_copy_failed(&error);
                if settings.once {
                    anyhow::bail!("clipboard write failed: {error}");
                }
            }
            Event::IndicatorRevert => {
                app.on_indicator_revert();
                if exit_on_revert {
                    break;
                }
            }
            Event::Shutdown => break,
        }
    }
    Ok(())
}

fn resolve_settings(cli: &Cli) -> Result<Settings> {
    let config = if cli.no_config {
        Config::default()
    } else if let Some(path) = &cli.config {
        load_config(path)?
    } else {
        let default = PathBuf::from(CONFIG_FILE);
        if default.exists() {
            load_config(&default)?
        } else {
            Config::default()
        }
    };

    let copy_cmd = match cli.copy_cmd.as_ref().or(config.copy_cmd.as_ref()) {
        Some(raw) => {
            let parts =
                shell_words::split(raw).context("failed to parse copy command override")?;
            if parts.is_empty() {
                None
            } else {
                Some(parts)
            }
        }
        None => None,
    };

    Ok(Settings {
        devtools: cli
            .devtools
            .clone()
            .or(config.devtools)
            .unwrap_or_else(|| DEFAULT_DEVTOOLS.to_string()),
        copy_cmd,
        teardown_delay: Duration::from_millis(
            cli.teardown_delay_ms
                .or(config.teardown_delay_ms)
                .unwrap_or(DEFAULT_TEARDOWN_DELAY_MS),
        ),
        feedback_delay: Duration::from_millis(
            cli.feedback_delay_ms
                .or(config.feedback_delay_ms)
                .unwrap_or(DEFAULT_FEEDBACK_DELAY_MS),
        ),
        once: cli.once,
    })
}

// Each line on stdin acts as the "toolbar click".
fn spawn_trigger_listener(tx: mpsc::Sender<Event>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let _ = tx.blocking_send(Event::Triggered);
                }
            }
        }
    });
}

fn spawn_signal_listener(tx: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(_) => return,
            };
            let mut sigusr1 = match signal(SignalKind::user_defined1()) {
                Ok(signal) => signal,
                Err(_) => return,
            };
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        let _ = tx.send(Event::Shutdown).await;
                        return;
                    }
                    _ = sigterm.recv() => {
                        let _ = tx.send(Event::Shutdown).await;
                        return;
                    }
                    _ = sigusr1.recv() => {
                        let _ = tx.send(Event::Triggered).await;
                    }
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            let _ = tx.send(Event::Shutdown).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_fall_back_to_defaults() {
        let cli = Cli::parse_from(["tabclip", "--no-config"]);
        let settings = resolve_settings(&cli).unwrap();
        assert_eq!(settings.devtools, DEFAULT_DEVTOOLS);
        assert!(settings.copy_cmd.is_none());
        assert_eq!(settings.teardown_delay, Duration::from_millis(2000));
        assert_eq!(settings.feedback_delay, Duration::from_millis(1000));
        assert!(!settings.once);
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "tabclip",
            "--no-config",
            "--devtools",
            "http://127.0.0.1:9333",
            "--teardown-delay-ms",
            "500",
            "--feedback-delay-ms",
            "250",
            "--once",
        ]);
        let settings = resolve_settings(&cli).unwrap();
        assert_eq!(settings.devtools, "http://127.0.0.1:9333");
        assert_eq!(settings.teardown_delay, Duration::from_millis(500));
        assert_eq!(settings.feedback_delay, Duration::from_millis(250));
        assert!(settings.once);
    }

    #[test]
    fn copy_cmd_is_parsed_shell_style() {
        let cli = Cli::parse_from([
            "tabclip",
            "--no-config",
            "--copy-cmd",
            "xclip -selection clipboard",
        ]);
        let settings = resolve_settings(&cli).unwrap();
        assert_eq!(
            settings.copy_cmd,
            Some(vec![
                "xclip".to_string(),
                "-selection".to_string(),
                "clipboard".to_string()
            ])
        );
    }
}
