//! put command - Upload a local file
//!
//! Files at or above the configured resume threshold are sent in parts with
//! a progress bar; smaller files go out in a single request.

use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;
use upyun_rest::PutOptions;

use super::{join_remote, open_client, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, PartProgress, format_size};

/// Upload a local file
#[derive(Args, Debug)]
pub struct PutArgs {
    /// Local file to upload
    pub source: PathBuf,

    /// Remote key; a trailing '/' keeps the local file name
    pub target: String,

    /// Send MD5 digests so the server verifies the content
    #[arg(long)]
    pub checksum: bool,

    /// Content type (guessed from the key when omitted)
    #[arg(long)]
    pub content_type: Option<String>,

    /// Extra request header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    pub headers: Vec<String>,
}

#[derive(Debug, Serialize)]
struct PutOutput {
    source: String,
    target: String,
    size_bytes: u64,
    size_human: String,
}

/// Execute the put command
pub async fn execute(args: PutArgs, profile: &str, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let options = match build_options(&args) {
        Ok(o) => o,
        Err(e) => {
            formatter.error(&format!("{e:#}"));
            return ExitCode::UsageError;
        }
    };
    let Some(target) = target_key(&args.source, &args.target) else {
        formatter.error("Cannot derive a remote name from the source path");
        return ExitCode::UsageError;
    };

    let mut file = match std::fs::File::open(&args.source) {
        Ok(f) => f,
        Err(e) => {
            formatter.error(&format!("Cannot open '{}': {e}", args.source.display()));
            return ExitCode::NotFound;
        }
    };
    let size = match file.metadata() {
        Ok(m) => m.len(),
        Err(e) => {
            formatter.error(&format!("Cannot read '{}': {e}", args.source.display()));
            return ExitCode::GeneralError;
        }
    };

    let client = match open_client(profile, &formatter) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let progress = PartProgress::new(formatter.shows_progress(), &target);
    let mut on_part = |index: u64, max_index: u64| progress.part_done(index, max_index);
    let result = client
        .put_file(&target, &mut file, &options, Some(&mut on_part))
        .await;
    progress.finish();

    if let Err(e) = result {
        return report(&formatter, &format!("Failed to upload '{target}'"), &e);
    }

    if formatter.is_json() {
        formatter.json(&PutOutput {
            source: args.source.display().to_string(),
            target,
            size_bytes: size,
            size_human: format_size(size),
        });
    } else {
        formatter.success(&format!(
            "Uploaded {} -> {} ({})",
            args.source.display(),
            formatter.style_name(&target),
            formatter.style_size(&format_size(size))
        ));
    }
    ExitCode::Success
}

fn build_options(args: &PutArgs) -> anyhow::Result<PutOptions> {
    let mut options = PutOptions::default().checksum(args.checksum);
    if let Some(content_type) = &args.content_type {
        options = options.content_type(content_type);
    }
    for header in &args.headers {
        let Some((name, value)) = header.split_once(':') else {
            anyhow::bail!("Invalid header '{header}', expected 'Name: value'");
        };
        let name = name.trim();
        anyhow::ensure!(!name.is_empty(), "Invalid header '{header}', name is empty");
        options = options.header(name, value.trim());
    }
    Ok(options)
}

fn target_key(source: &Path, target: &str) -> Option<String> {
    if target.is_empty() || target.ends_with('/') {
        let name = source.file_name()?.to_string_lossy();
        Some(join_remote(target, &name))
    } else {
        Some(target.to_string())
    }
}
