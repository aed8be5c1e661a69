//! purge command - Purge URLs from the CDN cache

use clap::Args;
use serde::Serialize;

use super::{open_client, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Purge URLs from the CDN cache
#[derive(Args, Debug)]
pub struct PurgeArgs {
    /// URLs to purge
    #[arg(required = true)]
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize)]
struct PurgeOutput {
    requested: usize,
    invalid_urls: Vec<String>,
}

/// Execute the purge command
pub async fn execute(args: PurgeArgs, profile: &str, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let client = match open_client(profile, &formatter) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let invalid = match client.purge(&args.urls).await {
        Ok(i) => i,
        Err(e) => return report(&formatter, "Purge failed", &e),
    };

    if formatter.is_json() {
        formatter.json(&PurgeOutput {
            requested: args.urls.len(),
            invalid_urls: invalid,
        });
        return ExitCode::Success;
    }

    for url in &invalid {
        formatter.warning(&format!("Not purged: {}", formatter.style_url(url)));
    }
    let purged = args.urls.len().saturating_sub(invalid.len());
    formatter.success(&format!("Purged {purged} of {} URL(s)", args.urls.len()));
    ExitCode::Success
}
