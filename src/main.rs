mod cli;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bridge_desktop::{EnvCredentialProvider, TerminalCredentialProvider};
use bridge_traits::CredentialProvider;
use clap::Parser;
use core_runtime::config::CoreConfig;
use core_runtime::logging::{init_logging, parse_level, LogFormat, LoggingConfig};
use core_sync::{PlaylistSelection, SyncReport, SyncStatus};
use offline_sync::{bootstrap, CoreError};
use tracing::{debug, error};

use cli::{Cli, Command, GlobalArgs};

/// Exit status for errors the operator has to fix before re-running
const EXIT_FATAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(&cli.global) {
        eprintln!("offline-sync: {:#}", e);
        return ExitCode::from(EXIT_FATAL);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let fatal = is_fatal(&e);
            error!(error = %format!("{:#}", e), fatal, "offline-sync failed");
            if fatal {
                ExitCode::from(EXIT_FATAL)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn setup_logging(args: &GlobalArgs) -> anyhow::Result<()> {
    let level = parse_level(&args.log_level)?;
    let format = if args.short_log_format {
        LogFormat::Compact
    } else {
        match &args.log_format {
            Some(format) => format.parse::<LogFormat>()?,
            None => LogFormat::default(),
        }
    };

    init_logging(
        LoggingConfig::default()
            .with_level(level)
            .with_format(format)
            .with_target(!args.short_log_format),
    )?;
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let force_resync = match &cli.command {
        Command::Sync(args) => args.force_resync,
        _ => 0.0,
    };

    let config = CoreConfig::builder()
        .data_dir(&cli.global.data_dir)
        .request_timeout(Duration::from_secs(cli.global.timeout))
        .credential_provider(credential_provider())
        .force_resync(force_resync)
        .build()
        .map_err(CoreError::from)
        .context("invalid configuration")?;
    debug!(?config, "Configuration loaded");

    let agent = bootstrap(config)
        .await
        .context("failed to open local stores")?;

    match cli.command {
        Command::Sync(args) => {
            let report = agent.sync().await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Command::Playlists(args) => {
            let selection = PlaylistSelection::parse(&args.selection).map_err(CoreError::from)?;
            agent.select_playlists(&selection).await?;
            println!("Syncing {}", selection);
        }
        Command::Status => {
            print_status(&agent.status().await?);
        }
    }

    Ok(())
}

/// Environment credentials for scheduled runs, the terminal otherwise
fn credential_provider() -> Arc<dyn CredentialProvider> {
    let env = EnvCredentialProvider::new();
    if env.is_configured() {
        debug!("Using credentials from the environment");
        Arc::new(env)
    } else {
        Arc::new(TerminalCredentialProvider::new())
    }
}

fn is_fatal(error: &anyhow::Error) -> bool {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<CoreError>())
        .map(CoreError::is_fatal)
        .unwrap_or(false)
}

fn print_report(report: &SyncReport) {
    println!("Sync finished in {} ms", report.duration_ms);
    println!("  History delivered: {}", report.history_delivered);
    println!(
        "  Tracks:            {} new, {} updated, {} unchanged",
        report.tracks_new, report.tracks_updated, report.tracks_unchanged
    );
    if report.tracks_failed > 0 {
        println!(
            "  Failed:            {} (retried next sync)",
            report.tracks_failed
        );
    }
    if report.entries_skipped > 0 {
        println!("  Malformed entries: {}", report.entries_skipped);
    }
    if report.catalog_complete {
        println!(
            "  Pruned:            {} tracks, {} playlists",
            report.tracks_pruned, report.playlists_pruned
        );
    } else {
        println!("  Pruned:            skipped, catalog was incomplete");
    }
}

fn print_status(status: &SyncStatus) {
    println!(
        "Server:          {}",
        status.server_url.as_deref().unwrap_or("not configured")
    );
    println!(
        "Session token:   {}",
        if status.has_token { "stored" } else { "none" }
    );
    println!("Playlists:       {}", status.selection);
    match &status.last_success {
        Some(at) => println!("Last sync:       {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Last sync:       never"),
    }
    println!("Local playlists: {}", status.playlists);
    println!("Local tracks:    {}", status.tracks);
    println!("Pending plays:   {}", status.pending_history);
}
