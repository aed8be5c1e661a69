//! HTTP transport seam
//!
//! The client never talks to `reqwest` directly; it hands fully signed
//! requests to a [`Transport`]. Failures to get any response at all are
//! reported as [`Error::Network`] so the retry layer can tell them apart
//! from server answers.

use std::error::Error as _;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use upyun_core::{Error, Result};

/// A signed request ready to be put on the wire
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A fully buffered response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = value.parse() {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Turn a non-2xx answer into [`Error::Status`]
    ///
    /// The body becomes the message; an empty body falls back to the bare
    /// status code.
    pub fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            return Ok(self);
        }

        let body = self.text();
        let message = if body.trim().is_empty() {
            self.status.as_u16().to_string()
        } else {
            body
        };
        Err(Error::Status {
            status: self.status.as_u16(),
            message,
        })
    }
}

/// Source of a response body, read one chunk at a time
#[async_trait]
pub trait ResponseBody: Send {
    /// Next chunk of the body, `None` once it is exhausted
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;
}

/// Body that is already in memory, handed out as one chunk
struct BufferedBody(Option<Bytes>);

#[async_trait]
impl ResponseBody for BufferedBody {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        Ok(self.0.take().filter(|b| !b.is_empty()))
    }
}

/// A response whose body has not been read yet
pub struct StreamingResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Box<dyn ResponseBody>,
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl StreamingResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Box<dyn ResponseBody>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Read the rest of the body into memory
    pub async fn buffer(mut self) -> Result<HttpResponse> {
        let mut body = Vec::new();
        while let Some(chunk) = self.body.next_chunk().await? {
            body.extend_from_slice(&chunk);
        }
        Ok(HttpResponse {
            status: self.status,
            headers: self.headers,
            body: body.into(),
        })
    }

    /// Like [`HttpResponse::error_for_status`]; only an error body is read
    pub async fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            return Ok(self);
        }
        match self.buffer().await?.error_for_status() {
            Err(e) => Err(e),
            Ok(_) => Err(Error::General("Unexpected success status".to_string())),
        }
    }
}

impl From<HttpResponse> for StreamingResponse {
    fn from(response: HttpResponse) -> Self {
        Self::new(
            response.status,
            response.headers,
            Box::new(BufferedBody(Some(response.body))),
        )
    }
}

/// Sends one HTTP request
///
/// `send` buffers the whole response. `send_streaming` leaves the body to
/// the caller and is used for downloads; implementations that have nothing
/// better can rely on the buffered default.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;

    async fn send_streaming(&self, request: HttpRequest) -> Result<StreamingResponse> {
        Ok(self.send(request).await?.into())
    }
}

/// [`Transport`] backed by a `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::General(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl ReqwestTransport {
    async fn dispatch(&self, request: HttpRequest) -> Result<reqwest::Response> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        builder.send().await.map_err(map_reqwest_error)
    }
}

/// Body read straight off the connection
struct ReqwestBody(reqwest::Response);

#[async_trait]
impl ResponseBody for ReqwestBody {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        self.0.chunk().await.map_err(map_reqwest_error)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.dispatch(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn send_streaming(&self, request: HttpRequest) -> Result<StreamingResponse> {
        let response = self.dispatch(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        Ok(StreamingResponse::new(
            status,
            headers,
            Box::new(ReqwestBody(response)),
        ))
    }
}

/// Classify a `reqwest` failure. Anything but a malformed request is a
/// transport problem.
fn map_reqwest_error(error: reqwest::Error) -> Error {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    if error.is_builder() {
        Error::General(message)
    } else {
        Error::Network(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_for_status_uses_body() {
        let response = HttpResponse::new(StatusCode::UNAUTHORIZED).with_body("sign error");
        match response.error_for_status() {
            Err(Error::Status { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "sign error");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_error_for_status_empty_body() {
        let response = HttpResponse::new(StatusCode::NOT_FOUND);
        let err = response.error_for_status().unwrap_err();
        assert_eq!(err.to_string(), "404");
    }

    #[test]
    fn test_any_2xx_is_success() {
        assert!(HttpResponse::new(StatusCode::CREATED)
            .error_for_status()
            .is_ok());
        assert!(HttpResponse::new(StatusCode::NO_CONTENT)
            .error_for_status()
            .is_ok());
    }

    #[tokio::test]
    async fn test_buffered_body_is_one_chunk() {
        let mut response = StreamingResponse::from(HttpResponse::ok().with_body("abc"));
        assert_eq!(response.body.next_chunk().await.unwrap().as_deref(), Some(&b"abc"[..]));
        assert!(response.body.next_chunk().await.unwrap().is_none());

        let mut empty = StreamingResponse::from(HttpResponse::ok());
        assert!(empty.body.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_streaming_error_for_status_reads_body() {
        let response = StreamingResponse::from(
            HttpResponse::new(StatusCode::FORBIDDEN).with_body("bucket not exist"),
        );
        let err = response.error_for_status().await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.to_string(), "bucket not exist");
    }

    #[test]
    fn test_response_header_lookup() {
        let response = HttpResponse::ok().with_header("x-upyun-multi-uuid", "abc");
        assert_eq!(response.header("X-Upyun-Multi-Uuid"), Some("abc"));
    }
}
