//! Listing types and the page-fetch seam
//!
//! The traversal logic only needs one capability from a storage client:
//! fetching a single cursor page of a directory. Keeping that behind
//! [`PageFetcher`] lets it be exercised without a server.

use async_trait::async_trait;
use jiff::Timestamp;
use serde::Serialize;

use crate::error::Result;

/// Cursor value the server returns on the last page of a listing.
pub const END_OF_LIST_CURSOR: &str = "g2gCZAAEbmV4dGQAA2VvZg";

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

impl EntryKind {
    /// Decode the type marker used by list and HEAD responses
    pub fn from_marker(marker: &str) -> Self {
        match marker.trim() {
            "F" | "folder" => EntryKind::Folder,
            _ => EntryKind::File,
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::File => write!(f, "file"),
            EntryKind::Folder => write!(f, "folder"),
        }
    }
}

/// A file or folder in a bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    /// Name as reported by the server, or relative to the traversal root
    /// once it has passed through a traversal
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<Timestamp>,
}

impl DirEntry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            size,
            modified: None,
        }
    }

    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Folder,
            size: 0,
            modified: None,
        }
    }

    /// Build an entry from raw textual fields; unparsable numbers become 0/None
    pub fn from_fields(name: &str, marker: &str, size: &str, seconds: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: EntryKind::from_marker(marker),
            size: size.trim().parse().unwrap_or(0),
            modified: seconds
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(|s| Timestamp::from_second(s).ok()),
        }
    }

    /// Decode one `name \t type \t size \t timestamp` listing line
    pub fn from_list_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            return None;
        }

        let mut fields = line.split('\t');
        let name = fields.next()?;
        let marker = fields.next().unwrap_or("N");
        let size = fields.next().unwrap_or("0");
        let seconds = fields.next().unwrap_or("");
        Some(Self::from_fields(name, marker, size, seconds))
    }

    /// Decode a whole listing body, skipping blank lines
    pub fn parse_list(body: &str) -> Vec<Self> {
        body.lines().filter_map(Self::from_list_line).collect()
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}

/// Sort order of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListOrder {
    #[default]
    Asc,
    Desc,
}

impl ListOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListOrder::Asc => "asc",
            ListOrder::Desc => "desc",
        }
    }
}

impl std::fmt::Display for ListOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ListOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(ListOrder::Asc),
            "desc" => Ok(ListOrder::Desc),
            _ => Err(format!("Invalid list order: {s}")),
        }
    }
}

/// Where the next page of a listing starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListCursor {
    /// Resume from this token
    Next(String),
    /// No further pages
    End,
    /// The response carried no cursor header
    Missing,
}

impl ListCursor {
    /// Interpret the raw cursor header. An empty token and the end-of-list
    /// sentinel both end the listing.
    pub fn from_header(value: Option<&str>) -> Self {
        match value {
            None => ListCursor::Missing,
            Some(token) if token.is_empty() || token == END_OF_LIST_CURSOR => ListCursor::End,
            Some(token) => ListCursor::Next(token.to_string()),
        }
    }
}

/// One page of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPage {
    pub entries: Vec<DirEntry>,
    pub cursor: ListCursor,
}

/// Fetches a single page of a directory listing
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// `dir` is an absolute key ending with `/`; `cursor` is `None` for the
    /// first page.
    async fn fetch_page(
        &self,
        dir: &str,
        cursor: Option<&str>,
        order: ListOrder,
        limit: usize,
    ) -> Result<ListPage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_from_header() {
        assert_eq!(ListCursor::from_header(None), ListCursor::Missing);
        assert_eq!(ListCursor::from_header(Some("")), ListCursor::End);
        assert_eq!(
            ListCursor::from_header(Some(END_OF_LIST_CURSOR)),
            ListCursor::End
        );
        assert_eq!(
            ListCursor::from_header(Some("abc")),
            ListCursor::Next("abc".to_string())
        );
    }

    #[test]
    fn test_parse_list_line() {
        let entry = DirEntry::from_list_line("photo.jpg\tN\t2048\t1700000000").unwrap();
        assert_eq!(entry.name, "photo.jpg");
        assert_eq!(entry.kind, EntryKind::File);
        assert_eq!(entry.size, 2048);
        assert_eq!(entry.modified.unwrap().as_second(), 1_700_000_000);

        let dir = DirEntry::from_list_line("assets\tF\t0\t1700000000").unwrap();
        assert!(dir.is_dir());

        assert!(DirEntry::from_list_line("").is_none());
    }

    #[test]
    fn test_parse_list_body() {
        let body = "a.txt\tN\t1\t0\n\nb\tF\t0\t0\n";
        let entries = DirEntry::parse_list(body);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].name, "b");
        assert_eq!(entries[1].kind, EntryKind::Folder);
    }

    #[test]
    fn test_malformed_fields_default() {
        let entry = DirEntry::from_fields("x", "N", "lots", "yesterday");
        assert_eq!(entry.size, 0);
        assert!(entry.modified.is_none());
    }

    #[test]
    fn test_list_order() {
        assert_eq!("DESC".parse::<ListOrder>().unwrap(), ListOrder::Desc);
        assert_eq!(ListOrder::default().to_string(), "asc");
        assert!("up".parse::<ListOrder>().is_err());
    }
}
