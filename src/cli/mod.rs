//! Command-line interface definitions for tarx.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueHint};

const CLI_EXAMPLES: &str = "Examples:\n  tarx extract -f data.tar -C ./root\n  zcat data.tar.gz | tarx extract -f - -C ./root\n  tarx list -f data.tar --json\n";

/// Parsed `tarx` command line.
#[derive(Debug, Parser)]
#[command(
    name = "tarx",
    version,
    about = "Streaming tar extractor",
    long_about = "Extracts or lists ustar, GNU and old-style tar streams, applying symbolic links after every other entry.",
    after_help = CLI_EXAMPLES,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands of `tarx`.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Extract entries below a destination directory.
    #[command(alias = "x")]
    Extract(ExtractArgs),
    /// List archive contents without writing anything.
    #[command(alias = "t")]
    List(ListArgs),
}

/// Quota overrides; unset values keep the policy defaults.
#[derive(Debug, Args, Clone, Default)]
pub struct LimitArgs {
    /// Stop after this many materialised entries.
    #[arg(long = "max-files")]
    pub max_files: Option<u64>,
    /// Stop once this many bytes of file data were written.
    #[arg(long = "max-total-bytes")]
    pub max_total_bytes: Option<u64>,
    /// Refuse any single file larger than this.
    #[arg(long = "max-single-file")]
    pub max_single_file: Option<u64>,
    /// Refuse entries nested deeper than this below the destination.
    #[arg(long = "max-depth")]
    pub max_depth: Option<u32>,
}

/// Arguments for the `extract` subcommand.
#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Archive to extract (`-` for standard input).
    #[arg(short = 'f', long = "file", value_hint = ValueHint::FilePath)]
    pub file: Utf8PathBuf,
    /// Destination directory (default: current directory).
    #[arg(short = 'C', long = "directory", value_hint = ValueHint::DirPath)]
    pub directory: Option<Utf8PathBuf>,
    /// Show a progress spinner and per-entry log lines.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
    /// Only report errors.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
    /// Use numeric ids from the archive instead of resolving owner names.
    #[arg(long = "numeric-owner")]
    pub numeric_owner: bool,
    /// Restore file ownership (usually requires root).
    #[arg(long = "same-owner")]
    pub same_owner: bool,
    /// Do not restore permission bits.
    #[arg(long = "no-same-permissions")]
    pub no_same_permissions: bool,
    /// Allow symbolic links pointing outside the destination.
    #[arg(long = "allow-symlink-escape")]
    pub allow_symlink_escape: bool,
    /// Quota overrides.
    #[command(flatten)]
    pub limits: LimitArgs,
}

/// Arguments for the `list` subcommand.
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Archive to inspect (`-` for standard input).
    #[arg(short = 'f', long = "file", value_hint = ValueHint::FilePath)]
    pub file: Utf8PathBuf,
    /// Print `tar tv` style lines with mode, owner, size and mtime.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
    /// Reduce output to errors only.
    #[arg(long = "quiet")]
    pub quiet: bool,
    /// Print a JSON array, including SHA-256 digests of file data.
    #[arg(long = "json")]
    pub json: bool,
    /// Use numeric ids from the archive instead of resolving owner names.
    #[arg(long = "numeric-owner")]
    pub numeric_owner: bool,
}
