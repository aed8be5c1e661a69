//! Resumable (multipart) uploads
//!
//! Large resources are sent as a sequence of fixed-size parts. Part 0 opens
//! the session and the server hands back a session token that every later
//! part must carry; the last part closes the session. Each part is re-read
//! from its own [`FragmentWindow`] on every attempt, so retries resend the
//! same bytes.
//!
//! A session that fails midway is left to expire on the server.

use std::io::{Read, Seek, SeekFrom};

use bytes::Bytes;
use http::HeaderMap;
use upyun_core::{Error, FragmentWindow, Result, md5_hex_from_start};

use crate::client::{PutOptions, UpYunClient};
use crate::request::{
    CONTENT_LENGTH, CONTENT_MD5, RequestSpec, X_UPYUN_MULTI_LENGTH, X_UPYUN_MULTI_MD5,
    X_UPYUN_MULTI_STAGE, X_UPYUN_MULTI_TYPE, X_UPYUN_MULTI_UUID, X_UPYUN_PART_ID,
};
use crate::transport::HttpResponse;

/// Progress callback, called with `(part_index, max_part_index)` after each
/// part is accepted
pub type ProgressFn<'a> = dyn FnMut(u64, u64) + Send + 'a;

/// Stage of a part within a resumable session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Part 0: open the session and send the first bytes
    Initiate,
    /// Any middle part
    Upload,
    /// The last part: send the remaining bytes and close the session
    Complete,
}

impl Stage {
    pub fn for_part(index: u64, max_part_index: u64) -> Self {
        if index == 0 {
            Stage::Initiate
        } else if index == max_part_index {
            Stage::Complete
        } else {
            Stage::Upload
        }
    }

    /// Value of the `X-Upyun-Multi-Stage` header
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Initiate => "initiate,upload",
            Stage::Upload => "upload",
            Stage::Complete => "upload,complete",
        }
    }
}

/// Number of parts needed for `size` bytes
pub fn part_count(size: u64, part_size: u64) -> u64 {
    size.div_ceil(part_size)
}

/// Index of the last part; `part_count - 1` for non-empty resources
pub fn max_part_index(size: u64, part_size: u64) -> u64 {
    part_count(size, part_size).saturating_sub(1)
}

/// State of one resumable upload
#[derive(Debug)]
struct UploadSession {
    total_size: u64,
    part_size: u64,
    max_part_index: u64,
    /// Assigned by the server in response to part 0
    token: Option<String>,
}

impl UploadSession {
    fn new(total_size: u64, part_size: u64) -> Self {
        Self {
            total_size,
            part_size,
            max_part_index: max_part_index(total_size, part_size),
            token: None,
        }
    }

    fn stage(&self, index: u64) -> Stage {
        Stage::for_part(index, self.max_part_index)
    }

    fn part_offset(&self, index: u64) -> u64 {
        index * self.part_size
    }

    /// Bytes in part `index`; only the last part may be short
    fn part_len(&self, index: u64) -> u64 {
        self.part_size
            .min(self.total_size.saturating_sub(self.part_offset(index)))
    }
}

/// Sends a seekable resource, switching to parts above the resume threshold
pub struct ResumableUploader<'c> {
    client: &'c UpYunClient,
}

impl<'c> ResumableUploader<'c> {
    pub fn new(client: &'c UpYunClient) -> Self {
        Self { client }
    }

    /// Upload `reader` to `key`
    ///
    /// Resources below the resume threshold go out as one plain PUT. Larger
    /// ones are split into parts. Only network failures are retried, per
    /// part; any other failure aborts the whole upload.
    pub async fn upload<R>(
        &self,
        key: &str,
        reader: &mut R,
        options: &PutOptions,
        mut progress: Option<&mut ProgressFn<'_>>,
    ) -> Result<HeaderMap>
    where
        R: Read + Seek + Send,
    {
        let config = self.client.upload_config();
        let size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        // A resource that fits in one part never opens a session
        if size < config.resume_threshold || size <= config.part_size {
            tracing::debug!(key, size, "Uploading in a single request");
            let mut body = Vec::with_capacity(size as usize);
            reader.read_to_end(&mut body)?;
            let headers = self.client.put(key, body, options).await?;
            if let Some(progress) = progress.as_deref_mut() {
                progress(0, 0);
            }
            return Ok(headers);
        }

        let mut session = UploadSession::new(size, config.part_size);
        let content_type = match options.resolved_content_type() {
            Some(content_type) => content_type.to_string(),
            None => mime_guess::from_path(key)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        };
        tracing::debug!(
            key,
            size,
            parts = session.max_part_index + 1,
            "Starting resumable upload"
        );

        let base = RequestSpec::put(key).with_headers(&options.headers);
        let mut last_headers = HeaderMap::new();

        for index in 0..=session.max_part_index {
            let stage = session.stage(index);
            let mut spec = base
                .clone()
                .with_header(X_UPYUN_PART_ID, index.to_string())
                .with_header(X_UPYUN_MULTI_STAGE, stage.as_str());

            match stage {
                Stage::Initiate => {
                    spec = spec
                        .with_header(X_UPYUN_MULTI_TYPE, content_type.as_str())
                        .with_header(X_UPYUN_MULTI_LENGTH, size.to_string());
                }
                Stage::Complete if options.checksum => {
                    spec = spec.with_header(X_UPYUN_MULTI_MD5, md5_hex_from_start(reader)?);
                }
                _ => {}
            }
            if let Some(token) = &session.token {
                spec = spec.with_header(X_UPYUN_MULTI_UUID, token.as_str());
            }

            let part_len = session.part_len(index);
            spec = spec.with_header(CONTENT_LENGTH, part_len.to_string());

            let response = {
                let mut window =
                    FragmentWindow::new(&mut *reader, session.part_offset(index), part_len)?;
                if options.checksum {
                    spec = spec.with_header(CONTENT_MD5, window.md5_hex()?);
                }
                self.send_part(&spec, &mut window).await?
            };

            if let Some(progress) = progress.as_deref_mut() {
                progress(index, session.max_part_index);
            }

            if index == 0 {
                match response.header(X_UPYUN_MULTI_UUID) {
                    Some(uuid) if !uuid.is_empty() => session.token = Some(uuid.to_string()),
                    _ => {
                        return Err(Error::Session(format!(
                            "No session token in response to the first part of '{key}'"
                        )));
                    }
                }
            }
            last_headers = response.headers;
        }

        tracing::debug!(key, size, "Resumable upload complete");
        Ok(last_headers)
    }

    /// Send one part, rewinding and re-reading the window before each attempt
    async fn send_part<R>(
        &self,
        spec: &RequestSpec,
        window: &mut FragmentWindow<'_, R>,
    ) -> Result<HttpResponse>
    where
        R: Read + Seek,
    {
        let transport = self.client.transport();

        self.client
            .retry_policy()
            .attempt(|attempt| {
                let request = window
                    .rewind()
                    .and_then(|_| window.read_remaining())
                    .map_err(Error::from)
                    .and_then(|body| {
                        self.client
                            .prepare(&spec.clone().with_body(Bytes::from(body)))
                    });

                async move {
                    if attempt > 0 {
                        tracing::debug!(
                            attempt,
                            part = spec.header(X_UPYUN_PART_ID),
                            "Resending part"
                        );
                    }
                    transport.send(request?).await?.error_for_status()
                }
            })
            .await
    }
}
