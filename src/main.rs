//! Command-line entry point for the tarx binary.

use clap::Parser;

use tarx::error::{TarError, UserInputError};
use tarx::policy::PolicyError;

fn main() {
    let cli = tarx::cli::Cli::parse();
    init_logging(&cli);

    if let Err(err) = tarx::run(cli) {
        let mut exit_code = 1;
        for cause in err.chain() {
            if cause.is::<PolicyError>() {
                exit_code = 3;
                break;
            }
            if cause.is::<UserInputError>() {
                exit_code = 2;
                break;
            }
            if let Some(tar_err) = cause.downcast_ref::<TarError>() {
                if tar_err.is_format_error() {
                    exit_code = 4;
                    break;
                }
            }
        }
        eprintln!("tarx: {err:#}");
        std::process::exit(exit_code);
    }
}

fn init_logging(cli: &tarx::cli::Cli) {
    let verbose = match &cli.command {
        tarx::cli::Commands::Extract(args) => args.verbose && !args.quiet,
        tarx::cli::Commands::List(args) => args.verbose && !args.quiet,
    };
    let default_filter = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}
