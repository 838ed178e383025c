//! tarx library entry points.
//!
//! The engine lives in [`archive`]: it decodes header blocks supplied by a
//! [`backend::TarOperations`] implementation and tells that backend what to
//! materialise. [`backend`] ships a filesystem backend and a listing backend.

pub mod archive;
pub mod backend;
pub mod cli;
pub mod error;
pub mod io;
pub mod owner;
pub mod policy;

use std::fs::File;
use std::io::{BufReader, Read};
use std::time::Duration;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indicatif::ProgressBar;
use log::info;

use crate::archive::{ExtractSummary, Extractor};
use crate::backend::{FsBackend, FsOptions, ListBackend, ListFormat, ListedEntry};
use crate::cli::{Cli, Commands, ExtractArgs, ListArgs};
use crate::error::UserInputError;
use crate::owner::{NumericOwners, SystemOwners};
use crate::policy::SecurityPolicy;

/// Execute the command represented by the parsed CLI input.
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Extract(args) => handle_extract(args),
        Commands::List(args) => handle_list(args),
    }
}

fn handle_extract(args: ExtractArgs) -> Result<()> {
    let policy = SecurityPolicy::new()
        .with_max_files(args.limits.max_files)
        .with_max_total_bytes(args.limits.max_total_bytes)
        .with_max_single_file(args.limits.max_single_file)
        .with_max_depth(args.limits.max_depth)
        .with_symlinks_outside_root(args.allow_symlink_escape);
    let options = FsOptions {
        preserve_permissions: !args.no_same_permissions,
        preserve_mtime: true,
        preserve_owner: args.same_owner,
    };
    let destination = args.directory.unwrap_or_else(|| Utf8PathBuf::from("."));

    let reader = open_archive(&args.file)?;
    let mut backend = FsBackend::new(reader, &destination, policy, options)?;
    if args.verbose && !args.quiet {
        let pb = ProgressBar::new_spinner();
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message("extracting");
        backend = backend.with_progress(pb);
    }

    let result = extractor(args.numeric_owner).extract(&mut backend);
    if let Some(pb) = backend.take_progress() {
        pb.finish_with_message("extract complete");
    }
    let summary = result.with_context(|| format!("failed to extract {}", args.file))?;
    report(&summary, args.quiet);
    if args.verbose && !args.quiet {
        println!(
            "extracted {} entries ({} bytes) into {}",
            backend.entries_written(),
            backend.bytes_written(),
            backend.root()
        );
    }
    Ok(())
}

fn handle_list(args: ListArgs) -> Result<()> {
    let format = if args.quiet {
        ListFormat::Silent
    } else if args.json {
        ListFormat::Json
    } else if args.verbose {
        ListFormat::Verbose
    } else {
        ListFormat::Names
    };
    let reader = open_archive(&args.file)?;
    let stdout = std::io::stdout();
    let mut backend = ListBackend::new(reader, stdout.lock(), format);
    let summary = extractor(args.numeric_owner)
        .extract(&mut backend)
        .with_context(|| format!("failed to list {}", args.file))?;
    report(&summary, args.quiet);

    let entries: Vec<ListedEntry> = backend.into_entries();
    if format == ListFormat::Json {
        serde_json::to_writer_pretty(std::io::stdout(), &entries)
            .context("failed to render listing")?;
        println!();
    }
    Ok(())
}

fn extractor(numeric_owner: bool) -> Extractor {
    if numeric_owner {
        Extractor::new().with_owner_lookup(Box::new(NumericOwners))
    } else {
        Extractor::new().with_owner_lookup(Box::new(SystemOwners::new()))
    }
}

fn report(summary: &ExtractSummary, quiet: bool) {
    if !quiet {
        info!(
            "{} entries, {} symlinks, archive ended by {:?}",
            summary.entries, summary.symlinks, summary.end
        );
    }
}

fn open_archive(path: &Utf8Path) -> Result<Box<dyn Read>> {
    if path.as_str() == "-" {
        return Ok(Box::new(std::io::stdin().lock()));
    }
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(UserInputError::new(format!("archive does not exist: {path}")).into());
        }
        Err(err) => {
            return Err(anyhow::Error::new(err).context(format!("failed to open archive {path}")))
        }
    };
    Ok(Box::new(BufReader::new(file)))
}
