//! get command - Download a file

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use super::{open_client, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, format_size};

/// Download a file
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Remote key
    pub source: String,

    /// Local destination (defaults to the remote file name)
    pub target: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct GetOutput {
    source: String,
    target: String,
    size_bytes: u64,
}

/// Execute the get command
pub async fn execute(args: GetArgs, profile: &str, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let Some(target) = local_target(&args.source, args.target.clone()) else {
        formatter.error(&format!("Cannot derive a local name from '{}'", args.source));
        return ExitCode::UsageError;
    };

    let client = match open_client(profile, &formatter) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let mut file = match tokio::fs::File::create(&target).await {
        Ok(f) => f,
        Err(e) => {
            formatter.error(&format!("Cannot create '{}': {e}", target.display()));
            return ExitCode::GeneralError;
        }
    };

    let written = match client.get(&args.source, &mut file).await {
        Ok(n) => n,
        Err(e) => {
            drop(file);
            if let Err(cleanup) = tokio::fs::remove_file(&target).await {
                tracing::debug!(error = %cleanup, "Failed to remove partial download");
            }
            return report(&formatter, &format!("Failed to download '{}'", args.source), &e);
        }
    };

    if formatter.is_json() {
        formatter.json(&GetOutput {
            source: args.source,
            target: target.display().to_string(),
            size_bytes: written,
        });
    } else {
        formatter.success(&format!(
            "Downloaded {} -> {} ({})",
            formatter.style_name(&args.source),
            target.display(),
            formatter.style_size(&format_size(written))
        ));
    }
    ExitCode::Success
}

fn local_target(source: &str, target: Option<PathBuf>) -> Option<PathBuf> {
    let name = source.trim_end_matches('/').rsplit('/').next()?;
    if name.is_empty() {
        return None;
    }
    match target {
        Some(dir) if dir.is_dir() => Some(dir.join(name)),
        Some(path) => Some(path),
        None => Some(PathBuf::from(name)),
    }
}
