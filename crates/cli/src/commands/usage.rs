//! usage command - Show the bucket's storage usage

use serde::Serialize;

use super::{open_client, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, format_size};

#[derive(Debug, Serialize)]
struct UsageOutput {
    bucket: String,
    usage_bytes: u64,
    usage_human: String,
}

/// Execute the usage command
pub async fn execute(profile: &str, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let client = match open_client(profile, &formatter) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let usage = match client.usage().await {
        Ok(u) => u,
        Err(e) => return report(&formatter, "Failed to get usage", &e),
    };

    if formatter.is_json() {
        formatter.json(&UsageOutput {
            bucket: client.bucket().to_string(),
            usage_bytes: usage,
            usage_human: format_size(usage),
        });
    } else {
        formatter.println(&format!(
            "{} {}",
            formatter.style_name(client.bucket()),
            formatter.style_size(&format_size(usage))
        ));
    }
    ExitCode::Success
}
