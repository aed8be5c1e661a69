//! Profile management commands
//!
//! A profile names one bucket together with the operator credentials and
//! the API endpoint used to reach it.

use anyhow::Context;
use clap::Subcommand;
use comfy_table::{Table, presets::UTF8_BORDERS_ONLY};
use serde::Serialize;
use upyun_core::{Endpoint, Profile, ProfileManager};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Profile subcommands
#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// Add or update a profile
    Set(SetArgs),

    /// List configured profiles
    List(ListArgs),

    /// Remove a profile
    Remove(RemoveArgs),
}

/// Arguments for the `profile set` command
#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Profile name (e.g., "default", "prod")
    pub name: String,

    /// Bucket (service) name
    pub bucket: String,

    /// Operator name
    pub operator: String,

    /// Operator password
    #[arg(env = "UPYUN_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// API endpoint: auto, telecom, cnc, ctt or a custom host[:port]
    #[arg(long, default_value = "auto")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,
}

/// Arguments for the `profile list` command
#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Show operator, endpoint and timeout
    #[arg(short, long)]
    pub long: bool,
}

/// Arguments for the `profile remove` command
#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    /// Name of the profile to remove
    pub name: String,
}

#[derive(Serialize)]
struct ProfileListOutput {
    profiles: Vec<ProfileInfo>,
}

/// Profile information for JSON output (without the password)
#[derive(Serialize)]
struct ProfileInfo {
    name: String,
    bucket: String,
    operator: String,
    endpoint: String,
    timeout_secs: u64,
}

impl From<&Profile> for ProfileInfo {
    fn from(profile: &Profile) -> Self {
        Self {
            name: profile.name.clone(),
            bucket: profile.bucket.clone(),
            operator: profile.operator.clone(),
            endpoint: profile.endpoint.to_string(),
            timeout_secs: profile.timeout_secs,
        }
    }
}

#[derive(Serialize)]
struct ProfileOperationOutput {
    success: bool,
    profile: String,
    message: String,
}

/// Execute a profile subcommand
pub async fn execute(cmd: ProfileCommands, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let manager = match ProfileManager::new() {
        Ok(m) => m,
        Err(e) => {
            formatter.error(&format!("Failed to load profiles: {e}"));
            return ExitCode::GeneralError;
        }
    };

    match cmd {
        ProfileCommands::Set(args) => execute_set(args, &manager, &formatter),
        ProfileCommands::List(args) => execute_list(args, &manager, &formatter),
        ProfileCommands::Remove(args) => execute_remove(args, &manager, &formatter),
    }
}

fn build_profile(args: SetArgs) -> anyhow::Result<Profile> {
    let endpoint: Endpoint = args
        .endpoint
        .parse()
        .with_context(|| format!("Invalid endpoint '{}'", args.endpoint))?;
    anyhow::ensure!(args.timeout > 0, "Timeout must be at least one second");

    let mut profile = Profile::new(args.name, args.bucket, args.operator, args.password);
    profile.endpoint = endpoint;
    profile.timeout_secs = args.timeout;
    profile.validate()?;
    Ok(profile)
}

fn execute_set(args: SetArgs, manager: &ProfileManager, formatter: &Formatter) -> ExitCode {
    let profile = match build_profile(args) {
        Ok(p) => p,
        Err(e) => {
            formatter.error(&format!("{e:#}"));
            return ExitCode::UsageError;
        }
    };
    let name = profile.name.clone();

    match manager.set(profile) {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&ProfileOperationOutput {
                    success: true,
                    profile: name.clone(),
                    message: format!("Profile '{name}' configured successfully"),
                });
            } else {
                let styled_name = formatter.style_name(&name);
                formatter.success(&format!("Profile '{styled_name}' configured successfully."));
            }
            ExitCode::Success
        }
        Err(e) => {
            formatter.error(&e.to_string());
            ExitCode::from_error(&e)
        }
    }
}

fn execute_list(args: ListArgs, manager: &ProfileManager, formatter: &Formatter) -> ExitCode {
    let profiles = match manager.list() {
        Ok(p) => p,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    if formatter.is_json() {
        formatter.json(&ProfileListOutput {
            profiles: profiles.iter().map(ProfileInfo::from).collect(),
        });
    } else if profiles.is_empty() {
        formatter.println("No profiles configured.");
    } else if args.long {
        let mut table = Table::new();
        table
            .load_preset(UTF8_BORDERS_ONLY)
            .set_header(vec!["Name", "Bucket", "Operator", "Endpoint", "Timeout"]);
        for profile in &profiles {
            table.add_row(vec![
                profile.name.clone(),
                profile.bucket.clone(),
                profile.operator.clone(),
                profile.endpoint.to_string(),
                format!("{}s", profile.timeout_secs),
            ]);
        }
        formatter.println(&table.to_string());
    } else {
        for profile in &profiles {
            let styled_name = formatter.style_name(&format!("{:<12}", profile.name));
            let styled_bucket = formatter.style_url(&profile.bucket);
            formatter.println(&format!("{styled_name} {styled_bucket}"));
        }
    }
    ExitCode::Success
}

fn execute_remove(args: RemoveArgs, manager: &ProfileManager, formatter: &Formatter) -> ExitCode {
    match manager.remove(&args.name) {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&ProfileOperationOutput {
                    success: true,
                    profile: args.name.clone(),
                    message: format!("Profile '{}' removed successfully", args.name),
                });
            } else {
                let styled_name = formatter.style_name(&args.name);
                formatter.success(&format!("Profile '{styled_name}' removed successfully."));
            }
            ExitCode::Success
        }
        Err(upyun_core::Error::ProfileNotFound(_)) => {
            formatter.error(&format!("Profile '{}' not found", args.name));
            ExitCode::NotFound
        }
        Err(e) => {
            formatter.error(&e.to_string());
            ExitCode::GeneralError
        }
    }
}
