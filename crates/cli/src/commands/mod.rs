//! Command definitions and dispatch

use clap::{Parser, Subcommand};
use upyun_core::{Config, ConfigManager, Error};
use upyun_rest::UpYunClient;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

pub mod completions;
pub mod get;
pub mod ls;
pub mod mkdir;
pub mod profile;
pub mod purge;
pub mod put;
pub mod rm;
pub mod stat;
pub mod usage;

/// Command-line client for UPYUN cloud storage
#[derive(Parser, Debug)]
#[command(name = "uy", version, about, long_about = None)]
pub struct Cli {
    /// Print JSON instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Profile holding the bucket and credentials
    #[arg(
        short = 'P',
        long,
        global = true,
        env = "UPYUN_PROFILE",
        default_value = "default"
    )]
    pub profile: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage bucket profiles
    #[command(subcommand)]
    Profile(profile::ProfileCommands),

    /// List a directory
    Ls(ls::LsArgs),

    /// Upload a local file
    Put(put::PutArgs),

    /// Download a file
    Get(get::GetArgs),

    /// Create a directory
    Mkdir(mkdir::MkdirArgs),

    /// Delete files or directories
    Rm(rm::RmArgs),

    /// Show the bucket's storage usage
    Usage,

    /// Show metadata of a file or directory
    Stat(stat::StatArgs),

    /// Purge URLs from the CDN cache
    Purge(purge::PurgeArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

impl Cli {
    pub fn output_config(&self) -> OutputConfig {
        OutputConfig {
            json: self.json,
            no_color: self.no_color,
            quiet: self.quiet,
        }
    }
}

/// Run the parsed command line
pub async fn execute(cli: Cli) -> ExitCode {
    let output_config = cli.output_config();
    let profile = cli.profile;

    match cli.command {
        Commands::Profile(cmd) => profile::execute(cmd, output_config).await,
        Commands::Ls(args) => ls::execute(args, &profile, output_config).await,
        Commands::Put(args) => put::execute(args, &profile, output_config).await,
        Commands::Get(args) => get::execute(args, &profile, output_config).await,
        Commands::Mkdir(args) => mkdir::execute(args, &profile, output_config).await,
        Commands::Rm(args) => rm::execute(args, &profile, output_config).await,
        Commands::Usage => usage::execute(&profile, output_config).await,
        Commands::Stat(args) => stat::execute(args, &profile, output_config).await,
        Commands::Purge(args) => purge::execute(args, &profile, output_config).await,
        Commands::Completions(args) => completions::execute(args),
    }
}

/// Load the configuration and build a client for `profile`
///
/// Errors are reported through `formatter`; the returned exit code is ready
/// to hand back to `main`.
pub(crate) fn open_client(profile: &str, formatter: &Formatter) -> Result<UpYunClient, ExitCode> {
    let config = load_config(formatter)?;

    let Some(profile) = config.profile(profile) else {
        formatter.error(&format!(
            "Profile '{profile}' not found. Create it with 'uy profile set {profile} ...'"
        ));
        return Err(ExitCode::NotFound);
    };

    UpYunClient::new(profile, &config).map_err(|e| {
        formatter.error(&format!("Failed to create client: {e}"));
        ExitCode::from_error(&e)
    })
}

fn load_config(formatter: &Formatter) -> Result<Config, ExitCode> {
    let manager =
        ConfigManager::new().map_err(|e| report(formatter, "Failed to locate config", &e))?;
    manager
        .load()
        .map_err(|e| report(formatter, "Failed to load config", &e))
}

/// Print `context: error` and classify it
pub(crate) fn report(formatter: &Formatter, context: &str, error: &Error) -> ExitCode {
    formatter.error(&format!("{context}: {error}"));
    ExitCode::from_error(error)
}

/// Remote key of `name` inside directory `dir`
pub(crate) fn join_remote(dir: &str, name: &str) -> String {
    format!(
        "{}/{}",
        dir.trim_end_matches('/'),
        name.trim_start_matches('/')
    )
}
