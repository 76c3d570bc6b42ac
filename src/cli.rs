use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Keep a local replica of a music server's playlists and report offline plays.
#[derive(Parser, Debug)]
#[command(name = "offline-sync", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Directory holding the replica and queue databases
    #[arg(long, global = true, env = "MUSIC_DATA_PATH", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "MUSIC_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format (pretty, json, compact)
    #[arg(long, global = true, conflicts_with = "short_log_format")]
    pub log_format: Option<String>,

    /// One line per event, for scheduled runs
    #[arg(long, global = true, env = "MUSIC_SHORT_LOG_FORMAT")]
    pub short_log_format: bool,

    /// Per-request timeout in seconds
    #[arg(long, global = true, default_value_t = 30)]
    pub timeout: u64,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one sync cycle: history, catalog, downloads, pruning
    Sync(SyncArgs),

    /// Choose which playlists are replicated
    Playlists(PlaylistsArgs),

    /// Show local state without contacting the server
    Status,
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Fraction of unchanged tracks to download again (0.0 to 1.0)
    #[arg(long, value_parser = parse_ratio, default_value_t = 0.0)]
    pub force_resync: f64,

    /// Print the cycle report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct PlaylistsArgs {
    /// `favorite` for all favorited playlists, or a comma-separated list of names
    pub selection: String,
}

fn parse_ratio(s: &str) -> Result<f64, String> {
    let ratio: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a number", s))?;
    if !(0.0..=1.0).contains(&ratio) {
        return Err(format!("{} is not between 0.0 and 1.0", ratio));
    }
    Ok(ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sync() {
        let cli = Cli::try_parse_from([
            "offline-sync",
            "--data-dir",
            "/srv/music",
            "sync",
            "--force-resync",
            "0.25",
        ])
        .unwrap();

        assert_eq!(cli.global.data_dir, PathBuf::from("/srv/music"));
        match cli.command {
            Command::Sync(args) => {
                assert_eq!(args.force_resync, 0.25);
                assert!(!args.json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_force_resync_out_of_range() {
        let result = Cli::try_parse_from(["offline-sync", "sync", "--force-resync", "1.5"]);
        assert!(result.is_err());

        let result = Cli::try_parse_from(["offline-sync", "sync", "--force-resync", "lots"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_playlists() {
        let cli = Cli::try_parse_from(["offline-sync", "playlists", "Rock,Jazz"]).unwrap();
        match cli.command {
            Command::Playlists(args) => assert_eq!(args.selection, "Rock,Jazz"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["offline-sync", "status", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.global.log_level, "debug");
        assert!(matches!(cli.command, Command::Status));
    }
}
