//! stat command - Show metadata of a file or directory

use clap::Args;

use super::{open_client, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, format_size, format_timestamp};

/// Show metadata of a file or directory
#[derive(Args, Debug)]
pub struct StatArgs {
    /// Remote key
    pub path: String,
}

/// Execute the stat command
pub async fn execute(args: StatArgs, profile: &str, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let client = match open_client(profile, &formatter) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let entry = match client.info(&args.path).await {
        Ok(e) => e,
        Err(e) => return report(&formatter, &format!("Failed to stat '{}'", args.path), &e),
    };

    if formatter.is_json() {
        formatter.json(&entry);
        return ExitCode::Success;
    }

    let rows = [
        ("Name", entry.name.clone()),
        ("Type", entry.kind.to_string()),
        (
            "Size",
            format!("{} ({} bytes)", format_size(entry.size), entry.size),
        ),
        ("Modified", format_timestamp(entry.modified)),
    ];
    for (key, value) in rows {
        let key = formatter.style_key(&format!("{key:<9}"));
        formatter.println(&format!("{key}: {value}"));
    }
    ExitCode::Success
}
