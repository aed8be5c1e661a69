//! rm command - Delete files or directories
//!
//! Recursive removal lists the whole tree first. Children are listed before
//! their folder, so deleting in listing order only ever removes empty
//! directories. With `--async` the server removes files in the background,
//! so folders cannot be deleted in the same run and are left in place.

use clap::Args;
use serde::Serialize;
use upyun_core::{DirEntry, ListOrder};

use super::{join_remote, open_client, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Delete files or directories
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Key to delete
    pub path: String,

    /// Delete a directory and everything below it
    #[arg(short, long)]
    pub recursive: bool,

    /// Let the server delete files in the background
    #[arg(long = "async")]
    pub background: bool,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    deleted: Vec<String>,
    total_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    skipped: Vec<String>,
}

/// How a single key gets removed
#[derive(Debug, Clone, PartialEq, Eq)]
enum Removal {
    Delete(String),
    AsyncDelete(String),
    /// Folder whose files are still being removed by the server
    Skip(String),
}

/// Order and mode of every removal for `path`
///
/// `entries` is the recursive listing below `path`, empty when not recursive.
fn plan_removals(
    path: &str,
    path_is_dir: bool,
    entries: Vec<DirEntry>,
    recursive: bool,
    background: bool,
) -> Vec<Removal> {
    let removal = |key: String, is_dir: bool| match (is_dir, background) {
        (false, true) => Removal::AsyncDelete(key),
        (true, true) if recursive => Removal::Skip(key),
        _ => Removal::Delete(key),
    };

    let mut plan: Vec<Removal> = entries
        .into_iter()
        .map(|e| {
            let is_dir = e.is_dir();
            removal(join_remote(path, &e.name), is_dir)
        })
        .collect();
    plan.push(removal(path.to_string(), path_is_dir));
    plan
}

/// Execute the rm command
pub async fn execute(args: RmArgs, profile: &str, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let client = match open_client(profile, &formatter) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let mut entries = Vec::new();
    if args.recursive {
        entries = match client
            .traverse(&args.path, ListOrder::Asc, true)
            .collect()
            .await
        {
            Ok(e) => e,
            Err(e) => {
                return report(&formatter, &format!("Failed to list '{}'", args.path), &e);
            }
        };
    }

    // background deletion only applies to files
    let path_is_dir = if args.recursive {
        true
    } else if args.background {
        match client.info(&args.path).await {
            Ok(entry) => entry.is_dir(),
            Err(e) => return report(&formatter, &format!("Failed to stat '{}'", args.path), &e),
        }
    } else {
        false
    };

    let plan = plan_removals(
        &args.path,
        path_is_dir,
        entries,
        args.recursive,
        args.background,
    );

    let mut deleted = Vec::with_capacity(plan.len());
    let mut skipped = Vec::new();
    for removal in plan {
        let (key, result) = match removal {
            Removal::Delete(key) => {
                let result = client.delete(&key).await;
                (key, result)
            }
            Removal::AsyncDelete(key) => {
                let result = client.async_delete(&key).await;
                (key, result)
            }
            Removal::Skip(key) => {
                skipped.push(key);
                continue;
            }
        };
        if let Err(e) = result {
            if !deleted.is_empty() {
                formatter.warning(&format!("{} item(s) deleted before the failure", deleted.len()));
            }
            return report(&formatter, &format!("Failed to delete '{key}'"), &e);
        }
        tracing::debug!(key = %key, "Deleted");
        if !formatter.is_json() {
            formatter.success(&format!("Removed {}", formatter.style_name(&key)));
        }
        deleted.push(key);
    }

    if !skipped.is_empty() {
        formatter.warning(&format!(
            "{} folder(s) kept while the server removes their files; run rm again later",
            skipped.len()
        ));
    }

    if formatter.is_json() {
        formatter.json(&RmOutput {
            total_count: deleted.len(),
            deleted,
            skipped,
        });
    }
    ExitCode::Success
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Vec<DirEntry> {
        vec![
            DirEntry::file("a.txt", 1),
            DirEntry::file("img/1.png", 2),
            DirEntry::folder("img"),
        ]
    }

    #[test]
    fn test_recursive_plan_deletes_children_first() {
        let plan = plan_removals("/site", true, tree(), true, false);
        assert_eq!(
            plan,
            vec![
                Removal::Delete("/site/a.txt".to_string()),
                Removal::Delete("/site/img/1.png".to_string()),
                Removal::Delete("/site/img".to_string()),
                Removal::Delete("/site".to_string()),
            ]
        );
    }

    #[test]
    fn test_recursive_async_plan_skips_folders() {
        let plan = plan_removals("/site/", true, tree(), true, true);
        assert_eq!(
            plan,
            vec![
                Removal::AsyncDelete("/site/a.txt".to_string()),
                Removal::AsyncDelete("/site/img/1.png".to_string()),
                Removal::Skip("/site/img".to_string()),
                Removal::Skip("/site/".to_string()),
            ]
        );
    }

    #[test]
    fn test_async_on_single_folder_deletes_synchronously() {
        let plan = plan_removals("/empty", true, Vec::new(), false, true);
        assert_eq!(plan, vec![Removal::Delete("/empty".to_string())]);

        let plan = plan_removals("/a.txt", false, Vec::new(), false, true);
        assert_eq!(plan, vec![Removal::AsyncDelete("/a.txt".to_string())]);
    }

    #[test]
    fn test_plain_single_delete() {
        let plan = plan_removals("/a.txt", false, Vec::new(), false, false);
        assert_eq!(plan, vec![Removal::Delete("/a.txt".to_string())]);
    }
}
