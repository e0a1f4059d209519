//! protoprune CLI
//!
//! Filters a directory of `.proto` files into an output directory according
//! to a YAML configuration.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use protoprune::{run, PipelineOptions};

#[derive(Parser)]
#[command(name = "protoprune")]
#[command(about = "Prune .proto schema trees to the declarations a consumer needs")]
#[command(version)]
struct Cli {
    /// Directory containing source .proto files
    #[arg(long)]
    input: PathBuf,

    /// Directory where filtered .proto files are written
    #[arg(long)]
    output: PathBuf,

    /// YAML filter configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print a processing summary to stderr
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code: u8 = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                // Argument errors share exit code 1 with I/O errors.
                _ => 1,
            };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };

    let level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!("protoprune={level}"))
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let opts = PipelineOptions {
        input: cli.input,
        output: cli.output,
        config: cli.config,
    };

    match run(&opts) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("protoprune: error: {err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
