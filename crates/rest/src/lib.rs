//! upyun-rest: UPYUN REST API adapter
//!
//! This crate implements the wire side of the client: request signing, the
//! HTTP transport seam, resumable multipart uploads, paged recursive listing
//! and CDN purge.

pub mod auth;
pub mod client;
pub mod list;
pub mod purge;
pub mod request;
pub mod transport;
pub mod upload;

pub use auth::{AUTH_SCHEME, Credentials, Signer};
pub use client::{PutOptions, UpYunClient};
pub use list::{ListTraverser, Listing};
pub use purge::{PURGE_URL, parse_purge_response};
pub use request::RequestSpec;
pub use transport::{
    HttpRequest, HttpResponse, ReqwestTransport, ResponseBody, StreamingResponse, Transport,
};
pub use upload::{ProgressFn, ResumableUploader, Stage, max_part_index, part_count};
