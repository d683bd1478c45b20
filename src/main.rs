//! mc-bridge - relay a Minecraft server's chat to a chat channel.

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mc_bridge::bridge::{Bridge, BridgeError};
use mc_bridge::config::{BridgeConfig, ConfigLoader, TransportKind};
use mc_bridge::server::{ProcessSupervisor, ServerError};
use mc_bridge::transport::{ChatTransport, DiscordTransport, LogTransport};

/// Console lines buffered ahead of the server.
const CONSOLE_BUFFER: usize = 64;

#[derive(Parser)]
#[command(
    name = "mc-bridge",
    about = "Relay a Minecraft server's chat to a chat channel",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file (defaults to ./mc-bridge.toml, then the user config dir).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server and relay its chat until it exits or Ctrl-C.
    Run {
        /// Server directory.
        #[arg(long)]
        server_path: Option<PathBuf>,
        /// Heap size (e.g. 2G).
        #[arg(long)]
        memory: Option<String>,
        /// Channel to relay chat to.
        #[arg(long)]
        channel: Option<String>,
        /// Log pages instead of posting them.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the resolved configuration.
    Config,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<BridgeConfig, BridgeError> {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    Ok(loader.load()?)
}

fn build_transport(config: &BridgeConfig, dry_run: bool) -> Result<Arc<dyn ChatTransport>, BridgeError> {
    if dry_run {
        return Ok(Arc::new(LogTransport));
    }
    Ok(match config.transport.kind {
        TransportKind::Log => Arc::new(LogTransport),
        TransportKind::Discord => Arc::new(DiscordTransport::from_config(&config.transport)?),
    })
}

/// Lines typed on our stdin, read on a plain thread.
///
/// Blocking stdin reads cannot be cancelled, so the thread is left
/// detached; it exits on EOF or once the receiver is dropped.
fn spawn_console_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(CONSOLE_BUFFER);
    let spawned = std::thread::Builder::new()
        .name("console-reader".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "Console input disabled");
    }
    rx
}

/// Forward console lines to the server until input ends or it stops.
async fn forward_console(supervisor: Arc<ProcessSupervisor>, mut lines: mpsc::Receiver<String>) {
    while let Some(line) = lines.recv().await {
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        match supervisor.send_command(command).await {
            Ok(()) => {}
            Err(ServerError::NotRunning { .. }) => break,
            Err(e) => tracing::warn!(error = %e, "Failed to forward console command"),
        }
    }
}

async fn run(
    mut config: BridgeConfig,
    server_path: Option<PathBuf>,
    memory: Option<String>,
    channel: Option<String>,
    dry_run: bool,
) -> Result<(), BridgeError> {
    if let Some(path) = server_path {
        config.server.path = path;
    }
    if let Some(memory) = memory {
        config.server.memory = memory;
    }
    if let Some(channel) = channel {
        config.chat.channel_id = channel;
    }

    let transport = build_transport(&config, dry_run)?;
    let mut bridge = Bridge::new(config, transport);
    bridge.start().await?;

    let console = tokio::spawn(forward_console(
        bridge.supervisor(),
        spawn_console_reader(),
    ));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, stopping server");
        }
        state = bridge.wait_for_exit() => {
            tracing::info!(state = %state, "Server exited");
        }
    }

    console.abort();
    bridge.shutdown().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match load_config(cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Run {
            server_path,
            memory,
            channel,
            dry_run,
        } => run(config, server_path, memory, channel, dry_run).await,
        Commands::Config => match toml::to_string_pretty(&config) {
            Ok(rendered) => {
                println!("{rendered}");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to render configuration");
                return ExitCode::FAILURE;
            }
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "mc-bridge failed");
            ExitCode::FAILURE
        }
    }
}
