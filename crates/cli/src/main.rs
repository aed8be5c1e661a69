//! uy - command-line client for UPYUN cloud storage

mod commands;
mod exit_code;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use commands::Cli;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    commands::execute(cli).await.into()
}

/// Log to stderr; `--debug` wins over `RUST_LOG`
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("uy=debug,upyun_core=debug,upyun_rest=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(debug)
        .init();
}
