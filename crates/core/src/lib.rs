//! upyun-core: Core library for the UPYUN REST client
//!
//! This crate provides the pieces that do not depend on an HTTP stack:
//! - Configuration and profile management
//! - The shared error type
//! - Retry policy for transient network failures
//! - Fragment windows over seekable resources
//! - Listing types and the `PageFetcher` trait

pub mod config;
pub mod error;
pub mod fragment;
pub mod retry;
pub mod traits;

pub use config::{
    CONFIG_DIR_ENV, Config, ConfigManager, Endpoint, ListConfig, Profile, ProfileManager,
    RetryConfig, UploadConfig,
};
pub use error::{Error, Result};
pub use fragment::{FragmentWindow, md5_hex, md5_hex_from_start};
pub use retry::{RetryBuilder, RetryPolicy, is_retryable_error};
pub use traits::{
    DirEntry, END_OF_LIST_CURSOR, EntryKind, ListCursor, ListOrder, ListPage, PageFetcher,
};
