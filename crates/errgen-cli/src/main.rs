use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use errgen::{ErrgenOptions, run_main};

#[derive(Parser, Debug)]
#[command(
    name = "errgen",
    about = "errgen: wrap every Go error return with its function, arguments and cause",
    version
)]
pub struct Cli {
    /// Directory to rewrite recursively
    #[arg(short = 'd', long = "dir", value_name = "DIR", default_value = ".")]
    dir: PathBuf,

    /// Config file (defaults to errgen.toml in DIR when present)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print a diff of what would change and exit non-zero if anything would
    #[arg(long, default_value_t = false)]
    check: bool,
}

pub fn main() -> ExitCode {
    let args = Cli::parse();

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    let opts = ErrgenOptions {
        dir: args.dir,
        config: args.config,
        check: args.check,
    };

    match run_main(&opts) {
        Ok(summary) => {
            eprintln!("{}", summary.describe(opts.check));
            if opts.check && summary.has_changes() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "execution failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
