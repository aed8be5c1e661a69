//! ls command - List a directory
//!
//! Entries are printed as they arrive from the background listing, so large
//! directories start showing output after the first page. Ctrl-C stops the
//! listing cleanly.

use clap::Args;
use serde::Serialize;
use upyun_core::{DirEntry, ListOrder};

use super::{open_client, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, format_size, format_timestamp};

/// List a directory
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Directory to list
    #[arg(default_value = "/")]
    pub path: String,

    /// Descend into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// List in descending name order
    #[arg(long)]
    pub desc: bool,

    /// Show sizes and modification times
    #[arg(short, long)]
    pub long: bool,
}

#[derive(Debug, Serialize)]
struct LsOutput {
    path: String,
    entries: Vec<DirEntry>,
    total_count: usize,
    total_size_bytes: u64,
}

/// Execute the ls command
pub async fn execute(args: LsArgs, profile: &str, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let client = match open_client(profile, &formatter) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let order = if args.desc {
        ListOrder::Desc
    } else {
        ListOrder::Asc
    };
    let mut listing = client.traverse(&args.path, order, args.recursive);

    let mut collected = Vec::new();
    let mut total_size = 0u64;
    loop {
        let entry = tokio::select! {
            entry = listing.next_entry() => entry,
            _ = tokio::signal::ctrl_c() => {
                listing.cancel();
                formatter.warning("Listing interrupted");
                return ExitCode::Interrupted;
            }
        };
        let Some(entry) = entry else { break };

        total_size += entry.size;
        if formatter.is_json() {
            collected.push(entry);
        } else {
            formatter.println(&format_entry(&entry, args.long, &formatter));
        }
    }

    if let Some(e) = listing.next_error().await {
        return report(&formatter, &format!("Failed to list '{}'", args.path), &e);
    }

    if formatter.is_json() {
        formatter.json(&LsOutput {
            path: args.path,
            total_count: collected.len(),
            total_size_bytes: total_size,
            entries: collected,
        });
    }
    ExitCode::Success
}

fn format_entry(entry: &DirEntry, long: bool, formatter: &Formatter) -> String {
    let name = if entry.is_dir() {
        formatter.style_dir(&format!("{}/", entry.name))
    } else {
        formatter.style_file(&entry.name)
    };

    if !long {
        return name;
    }

    let size = if entry.is_dir() {
        String::new()
    } else {
        format_size(entry.size)
    };
    let date = formatter.style_date(&format!("[{}]", format_timestamp(entry.modified)));
    let size = formatter.style_size(&format!("{size:>10}"));
    format!("{date} {size} {name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::Timestamp;

    fn plain() -> Formatter {
        Formatter::new(OutputConfig {
            no_color: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_format_entry_short() {
        let formatter = plain();
        assert_eq!(
            format_entry(&DirEntry::folder("photos"), false, &formatter),
            "photos/"
        );
        assert_eq!(
            format_entry(&DirEntry::file("a.txt", 10), false, &formatter),
            "a.txt"
        );
    }

    #[test]
    fn test_format_entry_long() {
        let mut entry = DirEntry::file("a.txt", 2048);
        entry.modified = Some(Timestamp::from_second(1_414_549_618).unwrap());
        let line = format_entry(&entry, true, &plain());
        assert_eq!(line, "[2014-10-29 02:26:58]   2.00 KiB a.txt");
    }
}
