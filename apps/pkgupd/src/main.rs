//! pkgupd - package update daemon control tool
//!
//! Builds the control server from configuration, runs one request against it
//! while draining its events, then shuts it down.

mod cli;
mod display;
mod error;
mod events;
mod logging;
mod setup;

use crate::cli::{Cli, Commands};
use crate::display::{CommandOutput, OutputRenderer};
use crate::error::CliError;
use crate::events::EventHandler;
use crate::setup::SystemSetup;
use clap::Parser;
use pkgup_config::{fixed_paths, Config};
use pkgup_errors::Error;
use pkgup_events::EventReceiver;
use pkgup_ops::ControlServer;
use pkgup_types::Package;
use std::process;
use tokio::select;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    init_tracing(json_mode, cli.global.debug);

    if let Err(e) = run(cli).await {
        error!("Application error: {}", e);
        if !json_mode {
            eprintln!("Error: {e}");
        }
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    info!("Starting pkgupd v{}", env!("CARGO_PKG_VERSION"));

    // file (or defaults) < environment < flags
    let mut config = Config::load_or_default(&cli.global.config).await?;
    config.merge_env()?;
    apply_cli_config(&mut config, &cli.global);

    let mut setup = SystemSetup::new(config);
    setup.initialize().await?;

    let (event_sender, event_receiver) = pkgup_events::channel();
    let server = setup.control_server(event_sender)?;
    server.start().await?;

    let colors = console::Term::stdout().features().colors_supported();
    let renderer = OutputRenderer::new(cli.global.json, colors);
    let mut event_handler = EventHandler::new(colors, cli.global.json, cli.global.debug);

    let result = execute_command_with_events(
        cli.command,
        server.clone(),
        event_receiver,
        &mut event_handler,
    )
    .await;
    server.quit().await;

    renderer.render_result(&result?)?;
    info!("Command completed successfully");
    Ok(())
}

/// Execute command with concurrent event handling
async fn execute_command_with_events(
    command: Commands,
    server: ControlServer,
    mut event_receiver: EventReceiver,
    event_handler: &mut EventHandler,
) -> Result<CommandOutput, CliError> {
    let mut command_future = Box::pin(execute_command(command, server));

    loop {
        select! {
            result = &mut command_future => {
                while let Ok(event) = event_receiver.try_recv() {
                    event_handler.handle_event(event);
                }
                return result;
            }

            event = event_receiver.recv() => {
                if let Some(event) = event {
                    event_handler.handle_event(event);
                }
            }
        }
    }
}

async fn execute_command(
    command: Commands,
    server: ControlServer,
) -> Result<CommandOutput, CliError> {
    match command {
        Commands::Update {
            name,
            version,
            merkle,
            wait,
        } => {
            if wait {
                let handle =
                    server.get_update_complete(&name, version.as_deref(), merkle.as_deref())?;
                let package = handle.package().to_string();
                let merkle = handle.wait().await?;
                Ok(CommandOutput::Activated { package, merkle })
            } else {
                let package = Package::request(&name, None, None).map_err(Error::from)?;
                let merkle = server
                    .get_update(&name, version.as_deref(), merkle.as_deref())
                    .await?;
                Ok(CommandOutput::Admitted {
                    package: package.name,
                    merkle,
                })
            }
        }

        Commands::List => Ok(CommandOutput::Packages {
            packages: server.list()?,
        }),

        Commands::Sources => Ok(CommandOutput::Sources {
            sources: server.list_srcs().await,
        }),

        Commands::AddSource {
            url,
            rate_limit,
            pub_key,
        } => {
            let changed = server.add_src(&url, rate_limit, pub_key).await?;
            Ok(CommandOutput::SourceChange { url, changed })
        }

        Commands::RemoveSource { url } => {
            let changed = server.remove_src(&url).await?;
            Ok(CommandOutput::SourceChange { url, changed })
        }

        Commands::Check => Ok(CommandOutput::Check {
            updates_available: server.check().await?,
        }),

        Commands::GetBlob { merkle } => {
            server.get_blob(&merkle).await?;
            Ok(CommandOutput::Blob { merkle })
        }
    }
}

fn init_tracing(json_mode: bool, debug_enabled_flag: bool) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_enabled_flag;

    if json_mode && !debug_enabled {
        // Keep stdout clean for the JSON result
        tracing_subscriber::fmt()
            .with_writer(std::io::sink)
            .with_env_filter("off")
            .init();
    } else if debug_enabled {
        let log_dir = std::path::Path::new(fixed_paths::LOGS_DIR);
        if let Err(e) = std::fs::create_dir_all(log_dir) {
            eprintln!("Warning: Failed to create log directory: {e}");
        }

        let log_file = log_dir.join(format!(
            "pkgupd-{}.log",
            chrono::Utc::now().format("%Y%m%d-%H%M%S")
        ));

        match std::fs::File::create(&log_file) {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .json()
                    .with_writer(file)
                    .with_env_filter(
                        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(
                            |_| tracing_subscriber::EnvFilter::new("info,pkgupd=debug,pkgup_ops=debug"),
                        ),
                    )
                    .init();

                if !json_mode {
                    eprintln!("Debug logging enabled: {}", log_file.display());
                }
            }
            Err(e) => {
                if !json_mode {
                    eprintln!("Warning: Failed to create log file: {e}");
                }
                tracing_subscriber::fmt()
                    .with_writer(std::io::stderr)
                    .with_env_filter(
                        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(
                            |_| tracing_subscriber::EnvFilter::new("info"),
                        ),
                    )
                    .init();
            }
        }
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .init();
    }
}

/// Apply CLI configuration overrides (highest precedence)
fn apply_cli_config(config: &mut Config, global: &cli::GlobalArgs) {
    if let Some(root) = &global.root {
        config.general.root = Some(root.clone());
    }
}
