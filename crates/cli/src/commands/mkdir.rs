//! mkdir command - Create a directory

use clap::Args;
use serde::Serialize;

use super::{open_client, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Create a directory
#[derive(Args, Debug)]
pub struct MkdirArgs {
    /// Directory to create
    pub path: String,
}

#[derive(Debug, Serialize)]
struct MkdirOutput {
    path: String,
    created: bool,
}

/// Execute the mkdir command
pub async fn execute(args: MkdirArgs, profile: &str, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let client = match open_client(profile, &formatter) {
        Ok(c) => c,
        Err(code) => return code,
    };

    if let Err(e) = client.mkdir(&args.path).await {
        return report(&formatter, &format!("Failed to create '{}'", args.path), &e);
    }

    if formatter.is_json() {
        formatter.json(&MkdirOutput {
            path: args.path,
            created: true,
        });
    } else {
        let styled = formatter.style_dir(&args.path);
        formatter.success(&format!("Created directory {styled}"));
    }
    ExitCode::Success
}
