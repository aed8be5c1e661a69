//! UPYUN REST client
//!
//! Wraps a [`Transport`] and signs every request with the profile's
//! credentials. Single-shot operations live here; resumable uploads and
//! recursive listings are in [`crate::upload`] and [`crate::list`].

use std::collections::BTreeMap;
use std::io::{Read, Seek};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{AUTHORIZATION, DATE, HOST};
use http::{HeaderMap, HeaderName, HeaderValue};
use jiff::Timestamp;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use upyun_core::{
    Config, DirEntry, Endpoint, Error, ListConfig, ListCursor, ListOrder, ListPage, PageFetcher,
    Profile, Result, RetryPolicy, UploadConfig, md5_hex,
};

use crate::auth::{Credentials, Signer};
use crate::list::{ListTraverser, Listing};
use crate::request::{
    CONTENT_LENGTH, CONTENT_MD5, CONTENT_TYPE, RequestSpec, X_LIST_ITER, X_LIST_LIMIT,
    X_LIST_ORDER, X_UPYUN_ASYNC, X_UPYUN_FILE_DATE, X_UPYUN_FILE_SIZE, X_UPYUN_FILE_TYPE,
    X_UPYUN_LIST_ITER, escape_path, http_date,
};
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use crate::upload::{ProgressFn, ResumableUploader};

/// Host header sent when talking to a non-official endpoint
const DEFAULT_API_HOST: &str = "v0.api.upyun.com";

/// Options for uploads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Send MD5 digests so the server can verify the payload
    pub checksum: bool,
    /// Content type of the object; resumable uploads guess it from the key
    /// when unset
    pub content_type: Option<String>,
    /// Extra request headers
    pub headers: BTreeMap<String, String>,
}

impl PutOptions {
    pub fn checksum(mut self, enabled: bool) -> Self {
        self.checksum = enabled;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// `content_type`, or else a `Content-Type` entry of `headers`
    pub fn resolved_content_type(&self) -> Option<&str> {
        self.content_type.as_deref().or_else(|| {
            self.headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(CONTENT_TYPE))
                .map(|(_, value)| value.as_str())
        })
    }
}

/// Client for one bucket
///
/// Clone is cheap; the transport is shared.
#[derive(Clone)]
pub struct UpYunClient {
    signer: Signer,
    endpoint: Endpoint,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    upload: UploadConfig,
    list: ListConfig,
}

impl std::fmt::Debug for UpYunClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpYunClient")
            .field("signer", &self.signer)
            .field("endpoint", &self.endpoint)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl UpYunClient {
    /// Create a client from a profile and the tuning sections of a config
    pub fn new(profile: &Profile, config: &Config) -> Result<Self> {
        profile.validate()?;
        let transport = ReqwestTransport::new(Duration::from_secs(profile.timeout_secs))?;

        Ok(
            Self::with_transport(Credentials::from(profile), Arc::new(transport))
                .with_endpoint(profile.endpoint.clone())
                .with_retry(RetryPolicy::from(&config.retry))
                .with_upload_config(config.upload.clone())
                .with_list_config(config.list.clone()),
        )
    }

    /// Create a client over an arbitrary transport with default tuning
    pub fn with_transport(credentials: Credentials, transport: Arc<dyn Transport>) -> Self {
        Self {
            signer: Signer::new(credentials),
            endpoint: Endpoint::Auto,
            transport,
            retry: RetryPolicy::default(),
            upload: UploadConfig::default(),
            list: ListConfig::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_upload_config(mut self, upload: UploadConfig) -> Self {
        self.upload = upload;
        self
    }

    pub fn with_list_config(mut self, list: ListConfig) -> Self {
        self.list = list;
        self
    }

    pub fn set_endpoint(&mut self, endpoint: Endpoint) {
        self.endpoint = endpoint;
    }

    pub fn bucket(&self) -> &str {
        &self.signer.credentials().bucket
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn upload_config(&self) -> &UploadConfig {
        &self.upload
    }

    pub fn list_config(&self) -> &ListConfig {
        &self.list
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Turn a request description into a dated, signed HTTP request
    pub fn prepare(&self, spec: &RequestSpec) -> Result<HttpRequest> {
        let path = escape_path(&format!("/{}{}", self.bucket(), spec.key()));
        let mut url = format!("http://{}{}", self.endpoint.host(), path);
        if let Some(query) = spec.query() {
            url.push('?');
            url.push_str(&escape_path(query));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in spec.headers() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::General(format!("Invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::General(format!("Invalid value for header '{name}': {e}")))?;
            headers.insert(name, value);
        }

        let date = http_date(Timestamp::now());
        let authorization = self.signer.sign_request(
            spec.method().as_str(),
            &path,
            &date,
            &spec.declared_length(),
        );
        headers.insert(DATE, header_value(&date)?);
        headers.insert(AUTHORIZATION, header_value(&authorization)?);
        if !self.endpoint.is_official() {
            headers.insert(HOST, HeaderValue::from_static(DEFAULT_API_HOST));
        }

        let body = if spec.sends_body() {
            spec.body().cloned()
        } else {
            None
        };

        Ok(HttpRequest {
            method: spec.method().clone(),
            url,
            headers,
            body,
        })
    }

    /// Sign and send one request; non-2xx answers become [`Error::Status`]
    pub async fn execute(&self, spec: RequestSpec) -> Result<HttpResponse> {
        let request = self.prepare(&spec)?;
        let response = self.transport.send(request).await?;
        tracing::debug!(
            method = %spec.method(),
            key = spec.key(),
            status = response.status.as_u16(),
            "REST request completed"
        );
        response.error_for_status()
    }

    /// Bytes used by the bucket
    pub async fn usage(&self) -> Result<u64> {
        let response = self
            .execute(RequestSpec::get("/").with_query("usage"))
            .await?;
        let text = response.text();
        text.trim()
            .parse()
            .map_err(|e| Error::Decode(format!("Invalid usage value '{}': {e}", text.trim())))
    }

    /// Create a directory
    pub async fn mkdir(&self, key: &str) -> Result<()> {
        self.execute(
            RequestSpec::post(key)
                .with_header("mkdir", "true")
                .with_header("folder", "true"),
        )
        .await?;
        Ok(())
    }

    /// Upload a payload in a single request and return the response headers
    pub async fn put(
        &self,
        key: &str,
        body: impl Into<Bytes>,
        options: &PutOptions,
    ) -> Result<HeaderMap> {
        let body = body.into();
        let mut spec = RequestSpec::put(key).with_headers(&options.headers);

        if spec.header(CONTENT_LENGTH).is_none() {
            spec = spec.with_header(CONTENT_LENGTH, body.len().to_string());
        }
        if options.checksum && spec.header(CONTENT_MD5).is_none() {
            spec = spec.with_header(CONTENT_MD5, md5_hex(&body));
        }
        if let Some(content_type) = &options.content_type {
            spec = spec.with_header(CONTENT_TYPE, content_type.as_str());
        }

        let response = self.execute(spec.with_body(body)).await?;
        Ok(response.headers)
    }

    /// Upload a seekable resource, in parts when it is large enough
    ///
    /// See [`ResumableUploader`] for the part protocol. `progress` is called
    /// with `(part_index, max_part_index)` after every part.
    pub async fn put_file<R>(
        &self,
        key: &str,
        reader: &mut R,
        options: &PutOptions,
        progress: Option<&mut ProgressFn<'_>>,
    ) -> Result<HeaderMap>
    where
        R: Read + Seek + Send,
    {
        ResumableUploader::new(self)
            .upload(key, reader, options, progress)
            .await
    }

    /// Download an object into `writer`, returning the number of bytes written
    ///
    /// The body is copied chunk by chunk as it arrives.
    pub async fn get<W>(&self, key: &str, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let request = self.prepare(&RequestSpec::get(key))?;
        let mut response = self
            .transport
            .send_streaming(request)
            .await?
            .error_for_status()
            .await?;

        let mut written = 0u64;
        while let Some(chunk) = response.body.next_chunk().await? {
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        writer.flush().await?;
        tracing::debug!(key, bytes = written, "Download completed");
        Ok(written)
    }

    /// Delete a file or an empty directory
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.execute(RequestSpec::delete(key)).await?;
        Ok(())
    }

    /// Ask the server to delete a file in the background
    pub async fn async_delete(&self, key: &str) -> Result<()> {
        self.execute(RequestSpec::delete(key).with_header(X_UPYUN_ASYNC, "true"))
            .await?;
        Ok(())
    }

    /// List a small directory in one request
    pub async fn list(&self, key: &str) -> Result<Vec<DirEntry>> {
        let response = self.execute(RequestSpec::get(key)).await?;
        Ok(DirEntry::parse_list(&response.text()))
    }

    /// Fetch a single cursor page of a directory
    pub async fn list_page(
        &self,
        key: &str,
        cursor: Option<&str>,
        order: ListOrder,
        limit: usize,
    ) -> Result<ListPage> {
        let mut spec = RequestSpec::get(key)
            .with_header(X_LIST_LIMIT, limit.to_string())
            .with_header(X_LIST_ORDER, order.as_str());
        if let Some(cursor) = cursor.filter(|c| !c.is_empty()) {
            spec = spec.with_header(X_LIST_ITER, cursor);
        }

        let response = self.execute(spec).await?;
        Ok(ListPage {
            entries: DirEntry::parse_list(&response.text()),
            cursor: ListCursor::from_header(response.header(X_UPYUN_LIST_ITER)),
        })
    }

    /// Walk a directory in the background, optionally recursing
    pub fn traverse(&self, key: &str, order: ListOrder, recursive: bool) -> Listing {
        ListTraverser::new(Arc::new(self.clone()))
            .with_config(self.list.clone())
            .traverse(key, order, recursive)
    }

    /// Metadata of a single file or directory
    pub async fn info(&self, key: &str) -> Result<DirEntry> {
        let response = self.execute(RequestSpec::head(key)).await?;
        Ok(DirEntry::from_fields(
            key.trim_start_matches('/'),
            response.header(X_UPYUN_FILE_TYPE).unwrap_or("file"),
            response.header(X_UPYUN_FILE_SIZE).unwrap_or("0"),
            response.header(X_UPYUN_FILE_DATE).unwrap_or(""),
        ))
    }
}

#[async_trait]
impl PageFetcher for UpYunClient {
    async fn fetch_page(
        &self,
        dir: &str,
        cursor: Option<&str>,
        order: ListOrder,
        limit: usize,
    ) -> Result<ListPage> {
        self.list_page(dir, cursor, order, limit).await
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| Error::General(format!("Invalid header value: {e}")))
}
