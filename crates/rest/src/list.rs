//! Paged, optionally recursive directory traversal
//!
//! A background task walks the directory tree depth-first and pushes entries
//! into a bounded channel; the first failure goes to a separate error
//! channel and ends the walk. Both channels close when the walk ends, and
//! dropping the [`Listing`] stops the task at its next send.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use upyun_core::{DirEntry, Error, ListConfig, ListCursor, ListOrder, PageFetcher, Result};

/// Walks directories through a [`PageFetcher`]
pub struct ListTraverser {
    fetcher: Arc<dyn PageFetcher>,
    config: ListConfig,
}

impl ListTraverser {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            config: ListConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ListConfig) -> Self {
        self.config = config;
        self
    }

    /// Start walking `root`
    ///
    /// Entry names are reported relative to `root`. With `recursive`, the
    /// children of a folder are reported before the folder itself.
    pub fn traverse(&self, root: &str, order: ListOrder, recursive: bool) -> Listing {
        self.traverse_with_cancel(root, order, recursive, CancellationToken::new())
    }

    /// Like [`traverse`](Self::traverse), stopping when `cancel` fires
    pub fn traverse_with_cancel(
        &self,
        root: &str,
        order: ListOrder,
        recursive: bool,
        cancel: CancellationToken,
    ) -> Listing {
        let (entry_tx, entries) = mpsc::channel(self.config.entry_buffer.max(1));
        let (error_tx, errors) = mpsc::channel(self.config.error_buffer.max(1));

        let walk = Walk {
            fetcher: self.fetcher.clone(),
            root: normalize_root(root),
            order,
            recursive,
            page_size: self.config.page_size,
            lenient_cursor: self.config.lenient_cursor,
            entries: entry_tx,
            errors: error_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(walk.run());

        Listing {
            entries,
            errors,
            cancel,
            task,
        }
    }
}

/// Consumer side of a running traversal
#[derive(Debug)]
pub struct Listing {
    entries: mpsc::Receiver<DirEntry>,
    errors: mpsc::Receiver<Error>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Listing {
    /// Next entry, or `None` once the walk has ended
    pub async fn next_entry(&mut self) -> Option<DirEntry> {
        self.entries.recv().await
    }

    /// The error that ended the walk, if any. Only meaningful after
    /// [`next_entry`](Self::next_entry) has returned `None`.
    pub async fn next_error(&mut self) -> Option<Error> {
        self.errors.recv().await
    }

    /// Ask the walk to stop; both streams close shortly after
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drain every entry, failing with the walk's error if there was one
    pub async fn collect(mut self) -> Result<Vec<DirEntry>> {
        let mut out = Vec::new();
        while let Some(entry) = self.entries.recv().await {
            out.push(entry);
        }
        match self.errors.recv().await {
            Some(e) => Err(e),
            None => Ok(out),
        }
    }

    /// Split into the raw channels, leaving the task running detached
    pub fn into_parts(
        self,
    ) -> (
        mpsc::Receiver<DirEntry>,
        mpsc::Receiver<Error>,
        CancellationToken,
    ) {
        (self.entries, self.errors, self.cancel)
    }

    /// Wait for the background task to finish
    pub async fn join(self) {
        let Listing {
            entries,
            errors,
            task,
            ..
        } = self;
        drop(entries);
        drop(errors);
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Listing task did not finish cleanly");
        }
    }
}

/// One directory being walked
struct Frame {
    /// Absolute directory key ending with `/`
    dir: String,
    cursor: Option<String>,
    has_more: bool,
    pending: VecDeque<DirEntry>,
    /// Folder entry to report once the directory is exhausted
    folder: Option<DirEntry>,
}

impl Frame {
    fn new(dir: String, folder: Option<DirEntry>) -> Self {
        Self {
            dir,
            cursor: None,
            has_more: true,
            pending: VecDeque::new(),
            folder,
        }
    }
}

struct Walk {
    fetcher: Arc<dyn PageFetcher>,
    root: String,
    order: ListOrder,
    recursive: bool,
    page_size: usize,
    lenient_cursor: bool,
    entries: mpsc::Sender<DirEntry>,
    errors: mpsc::Sender<Error>,
    cancel: CancellationToken,
}

impl Walk {
    async fn run(self) {
        if let Err(e) = self.walk().await {
            if matches!(e, Error::Cancelled) {
                tracing::debug!(root = %self.root, "Listing cancelled");
                return;
            }
            tracing::warn!(root = %self.root, error = %e, "Listing failed");
            let _ = self.send(&self.errors, e).await;
        }
    }

    async fn walk(&self) -> Result<()> {
        let mut stack = vec![Frame::new(self.root.clone(), None)];

        while let Some(frame) = stack.last_mut() {
            if let Some(mut entry) = frame.pending.pop_front() {
                let absolute = join_key(&frame.dir, &entry.name);
                entry.name = relative_name(&self.root, &absolute);

                if self.recursive && entry.is_dir() {
                    stack.push(Frame::new(format!("{absolute}/"), Some(entry)));
                } else {
                    self.send(&self.entries, entry).await?;
                }
                continue;
            }

            if frame.has_more {
                if self.cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                let page = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                    page = self.fetcher.fetch_page(
                        &frame.dir,
                        frame.cursor.as_deref(),
                        self.order,
                        self.page_size,
                    ) => page?,
                };

                match page.cursor {
                    ListCursor::Next(token) => {
                        frame.pending.extend(page.entries);
                        frame.cursor = Some(token);
                    }
                    ListCursor::End => {
                        frame.pending.extend(page.entries);
                        frame.has_more = false;
                    }
                    // the page is discarded along with the rest of the directory
                    ListCursor::Missing if self.lenient_cursor => {
                        tracing::debug!(
                            dir = %frame.dir,
                            dropped = page.entries.len(),
                            "No cursor header, ending directory"
                        );
                        frame.has_more = false;
                    }
                    ListCursor::Missing => {
                        return Err(Error::AmbiguousCursor(frame.dir.clone()));
                    }
                }
                continue;
            }

            if let Some(folder) = stack.pop().and_then(|done| done.folder) {
                self.send(&self.entries, folder).await?;
            }
        }

        Ok(())
    }

    /// Send unless cancelled; a closed channel means nobody is listening
    async fn send<T>(&self, tx: &mpsc::Sender<T>, item: T) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            sent = tx.send(item) => sent.map_err(|_| Error::Cancelled),
        }
    }
}

/// Root key with a leading and a trailing `/`
fn normalize_root(root: &str) -> String {
    let trimmed = root.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

fn join_key(dir: &str, name: &str) -> String {
    format!(
        "{}/{}",
        dir.trim_end_matches('/'),
        name.trim_start_matches('/')
    )
}

fn relative_name(root: &str, absolute: &str) -> String {
    let relative = absolute.strip_prefix(root).unwrap_or(absolute);
    relative.strip_prefix('/').unwrap_or(relative).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use upyun_core::{END_OF_LIST_CURSOR, ListPage};

    enum Reply {
        Page(Vec<DirEntry>, Option<&'static str>),
        Fail(u16),
    }

    /// Serves canned pages keyed by `(dir, cursor)` and logs every request
    #[derive(Default)]
    struct FakeFetcher {
        pages: Mutex<HashMap<(String, String), Reply>>,
        calls: Mutex<Vec<(String, Option<String>, usize)>>,
    }

    impl FakeFetcher {
        fn page(self, dir: &str, cursor: &str, entries: Vec<DirEntry>, next: Option<&'static str>) -> Self {
            self.pages
                .lock()
                .unwrap()
                .insert((dir.to_string(), cursor.to_string()), Reply::Page(entries, next));
            self
        }

        fn fail(self, dir: &str, status: u16) -> Self {
            self.pages
                .lock()
                .unwrap()
                .insert((dir.to_string(), String::new()), Reply::Fail(status));
            self
        }

        fn calls(&self) -> Vec<(String, Option<String>, usize)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch_page(
            &self,
            dir: &str,
            cursor: Option<&str>,
            _order: ListOrder,
            limit: usize,
        ) -> Result<ListPage> {
            self.calls
                .lock()
                .unwrap()
                .push((dir.to_string(), cursor.map(str::to_string), limit));
            let key = (dir.to_string(), cursor.unwrap_or_default().to_string());
            match self.pages.lock().unwrap().get(&key) {
                Some(Reply::Page(entries, next)) => Ok(ListPage {
                    entries: entries.clone(),
                    cursor: ListCursor::from_header(*next),
                }),
                Some(Reply::Fail(status)) => Err(Error::Status {
                    status: *status,
                    message: "listing failed".to_string(),
                }),
                None => panic!("unexpected page request: {key:?}"),
            }
        }
    }

    fn files(prefix: &str, n: usize) -> Vec<DirEntry> {
        (0..n)
            .map(|i| DirEntry::file(format!("{prefix}{i:03}"), i as u64))
            .collect()
    }

    fn names(entries: &[DirEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    fn traverser(fetcher: Arc<FakeFetcher>) -> ListTraverser {
        ListTraverser::new(fetcher)
    }

    #[test]
    fn test_name_rewriting() {
        assert_eq!(normalize_root("a/b"), "/a/b/");
        assert_eq!(normalize_root("/"), "/");
        assert_eq!(normalize_root(""), "/");
        assert_eq!(join_key("/a/", "b"), "/a/b");
        assert_eq!(relative_name("/a/", "/a/b/c"), "b/c");
        assert_eq!(relative_name("/", "/b"), "b");
    }

    #[tokio::test]
    async fn test_two_pages_non_recursive() {
        let fetcher = Arc::new(
            FakeFetcher::default()
                .page("/dir/", "", files("a", 50), Some("cursor-1"))
                .page("/dir/", "cursor-1", files("b", 10), Some(END_OF_LIST_CURSOR)),
        );

        let entries = traverser(fetcher.clone())
            .traverse("/dir", ListOrder::Asc, false)
            .collect()
            .await
            .unwrap();

        assert_eq!(entries.len(), 60);
        assert_eq!(entries[0].name, "a000");
        assert_eq!(entries[59].name, "b009");
        let calls = fetcher.calls();
        assert_eq!(
            calls,
            vec![
                ("/dir/".to_string(), None, 50),
                ("/dir/".to_string(), Some("cursor-1".to_string()), 50),
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_cursor_ends_listing() {
        let fetcher = Arc::new(FakeFetcher::default().page("/", "", files("f", 3), Some("")));

        let entries = traverser(fetcher.clone())
            .traverse("/", ListOrder::Asc, false)
            .collect()
            .await
            .unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_recursive_depth_first_children_before_folder() {
        let fetcher = Arc::new(
            FakeFetcher::default()
                .page(
                    "/r/",
                    "",
                    vec![
                        DirEntry::file("a.txt", 1),
                        DirEntry::folder("sub"),
                        DirEntry::file("z.txt", 1),
                    ],
                    Some(END_OF_LIST_CURSOR),
                )
                .page(
                    "/r/sub/",
                    "",
                    vec![DirEntry::file("b.txt", 2), DirEntry::folder("deeper")],
                    Some(END_OF_LIST_CURSOR),
                )
                .page(
                    "/r/sub/deeper/",
                    "",
                    vec![DirEntry::file("c.txt", 3)],
                    Some(END_OF_LIST_CURSOR),
                ),
        );

        let entries = traverser(fetcher)
            .traverse("r", ListOrder::Asc, true)
            .collect()
            .await
            .unwrap();

        assert_eq!(
            names(&entries),
            vec![
                "a.txt",
                "sub/b.txt",
                "sub/deeper/c.txt",
                "sub/deeper",
                "sub",
                "z.txt"
            ]
        );
        assert!(entries[4].is_dir());
    }

    #[tokio::test]
    async fn test_non_recursive_reports_folders_in_place() {
        let fetcher = Arc::new(FakeFetcher::default().page(
            "/r/",
            "",
            vec![DirEntry::folder("sub"), DirEntry::file("a.txt", 1)],
            Some(END_OF_LIST_CURSOR),
        ));

        let entries = traverser(fetcher.clone())
            .traverse("/r/", ListOrder::Asc, false)
            .collect()
            .await
            .unwrap();

        assert_eq!(names(&entries), vec!["sub", "a.txt"]);
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_error_in_subdirectory_stops_walk() {
        let fetcher = Arc::new(
            FakeFetcher::default()
                .page(
                    "/r/",
                    "",
                    vec![
                        DirEntry::file("a.txt", 1),
                        DirEntry::folder("broken"),
                        DirEntry::file("z.txt", 1),
                    ],
                    Some(END_OF_LIST_CURSOR),
                )
                .fail("/r/broken/", 403),
        );

        let mut listing = traverser(fetcher).traverse("/r", ListOrder::Asc, true);
        let mut seen = Vec::new();
        while let Some(entry) = listing.next_entry().await {
            seen.push(entry.name);
        }
        assert_eq!(seen, vec!["a.txt"]);

        let err = listing.next_error().await.unwrap();
        assert_eq!(err.status(), Some(403));
        assert!(listing.next_error().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_cursor_is_an_error_by_default() {
        let fetcher = Arc::new(FakeFetcher::default().page("/d/", "", files("f", 2), None));

        let err = traverser(fetcher)
            .traverse("/d", ListOrder::Asc, false)
            .collect()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::AmbiguousCursor(dir) if dir == "/d/"));
    }

    #[tokio::test]
    async fn test_missing_cursor_lenient_ends_listing() {
        let fetcher = Arc::new(FakeFetcher::default().page("/d/", "", files("f", 2), None));
        let config = ListConfig {
            lenient_cursor: true,
            ..ListConfig::default()
        };

        let entries = traverser(fetcher.clone())
            .with_config(config)
            .traverse("/d", ListOrder::Asc, false)
            .collect()
            .await
            .unwrap();

        assert!(entries.is_empty());
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_cursor_lenient_drops_only_that_directory() {
        let fetcher = Arc::new(
            FakeFetcher::default()
                .page(
                    "/r/",
                    "",
                    vec![DirEntry::folder("sub"), DirEntry::file("z", 1)],
                    Some(END_OF_LIST_CURSOR),
                )
                .page("/r/sub/", "", vec![DirEntry::file("inner", 1)], None),
        );
        let config = ListConfig {
            lenient_cursor: true,
            ..ListConfig::default()
        };

        let entries = traverser(fetcher)
            .with_config(config)
            .traverse("/r", ListOrder::Asc, true)
            .collect()
            .await
            .unwrap();

        assert_eq!(names(&entries), vec!["sub", "z"]);
    }

    /// Never runs out of pages
    struct EndlessFetcher;

    #[async_trait]
    impl PageFetcher for EndlessFetcher {
        async fn fetch_page(
            &self,
            _dir: &str,
            cursor: Option<&str>,
            _order: ListOrder,
            limit: usize,
        ) -> Result<ListPage> {
            let n: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
            Ok(ListPage {
                entries: files(&format!("p{n}-"), limit),
                cursor: ListCursor::Next((n + 1).to_string()),
            })
        }
    }

    #[tokio::test]
    async fn test_cancel_closes_streams() {
        let config = ListConfig {
            entry_buffer: 4,
            ..ListConfig::default()
        };
        let mut listing = ListTraverser::new(Arc::new(EndlessFetcher))
            .with_config(config)
            .traverse("/", ListOrder::Asc, true);

        for _ in 0..10 {
            assert!(listing.next_entry().await.is_some());
        }
        listing.cancel();

        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            let mut count = 0;
            while listing.next_entry().await.is_some() {
                count += 1;
            }
            count
        })
        .await
        .expect("entry stream did not close after cancel");
        assert!(drained <= 4);
        assert!(listing.next_error().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_consumer_stops_task() {
        let config = ListConfig {
            entry_buffer: 1,
            ..ListConfig::default()
        };
        let mut listing = ListTraverser::new(Arc::new(EndlessFetcher))
            .with_config(config)
            .traverse("/", ListOrder::Asc, false);
        assert!(listing.next_entry().await.is_some());

        tokio::time::timeout(Duration::from_secs(5), listing.join())
            .await
            .expect("task kept running without a consumer");
    }
}
