//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Hoard - content-addressed download cache
///
/// Fetches content once, verifies it against its digest and serves every
/// later request from the local store.
#[derive(Parser, Debug)]
#[command(name = "hoard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "HOARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache root directory (overrides config)
    #[arg(long, global = true, env = "HOARD_ROOT")]
    pub root: Option<PathBuf>,

    /// Re-hash store hits before serving them
    #[arg(long, global = true)]
    pub paranoid: bool,

    /// Seconds without a heartbeat before a temp file is reclaimed (0 disables)
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch content by digest, from the store or the given source
    Get(GetArgs),

    /// Print the store path of a cached digest
    Path(PathArgs),

    /// Re-hash store entries and report corruption
    Verify(VerifyArgs),

    /// Remove abandoned temp files
    Clean(CleanArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the get command
#[derive(Parser, Debug)]
pub struct GetArgs {
    /// Expected hex digest of the content
    pub digest: String,

    /// Where to fetch from on a miss: http(s) URL, file:// URL or local path
    pub source: String,

    /// Write the content to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Arguments for the path command
#[derive(Parser, Debug)]
pub struct PathArgs {
    /// Hex digest to look up
    pub digest: String,
}

/// Arguments for the verify command
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Digests to verify (default: every store entry)
    pub digests: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the clean command
#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Remove temp files older than N seconds (default: timeout, or one hour)
    #[arg(long, value_name = "SECS")]
    pub older_than: Option<u64>,

    /// Show what would be removed without removing anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for listing commands
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_get_with_globals() {
        let cli = Cli::try_parse_from([
            "hoard",
            "-vv",
            "--root",
            "/srv/hoard",
            "get",
            "abc",
            "https://example.com/a.tar",
            "-o",
            "a.tar",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.root, Some(PathBuf::from("/srv/hoard")));
        match cli.command {
            Commands::Get(args) => {
                assert_eq!(args.digest, "abc");
                assert_eq!(args.output, Some(PathBuf::from("a.tar")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn parse_verify_defaults() {
        let cli = Cli::try_parse_from(["hoard", "verify"]).unwrap();
        match cli.command {
            Commands::Verify(args) => {
                assert!(args.digests.is_empty());
                assert!(matches!(args.format, OutputFormat::Table));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn get_requires_source() {
        assert!(Cli::try_parse_from(["hoard", "get", "abc"]).is_err());
    }
}
