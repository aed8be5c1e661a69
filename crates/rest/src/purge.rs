//! CDN cache purge
//!
//! Purging goes to a separate host and uses its own signature over the
//! newline-joined URL list.

use http::header::{AUTHORIZATION, CONTENT_TYPE, DATE};
use http::{HeaderMap, HeaderValue, Method};
use jiff::Timestamp;
use serde::Deserialize;
use upyun_core::{Error, Result};

use crate::client::UpYunClient;
use crate::request::http_date;
use crate::transport::HttpRequest;

/// Purge service address
pub const PURGE_URL: &str = "http://purge.upyun.com/purge/";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=utf-8";

#[derive(Debug, Deserialize)]
struct PurgeResponse {
    #[serde(default)]
    invalid_domain_of_url: Vec<String>,
}

/// URLs the service refused to purge
///
/// A body that is not the expected JSON yields no URLs.
pub fn parse_purge_response(body: &[u8]) -> Vec<String> {
    match serde_json::from_slice::<PurgeResponse>(body) {
        Ok(response) => response.invalid_domain_of_url,
        Err(e) => {
            tracing::debug!(error = %e, "Unrecognized purge response");
            Vec::new()
        }
    }
}

impl UpYunClient {
    /// Purge `urls` from the CDN cache, returning the ones that were rejected
    pub async fn purge<S: AsRef<str>>(&self, urls: &[S]) -> Result<Vec<String>> {
        let joined = urls
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join("\n");
        let date = http_date(Timestamp::now());
        let authorization = self.signer().sign_purge(&joined, &date);

        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("purge", &joined)
            .finish();

        let mut headers = HeaderMap::new();
        headers.insert(DATE, parse_value(&date)?);
        headers.insert(AUTHORIZATION, parse_value(&authorization)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));

        let request = HttpRequest {
            method: Method::POST,
            url: PURGE_URL.to_string(),
            headers,
            body: Some(body.into()),
        };

        let response = self.transport().send(request).await?.error_for_status()?;
        let invalid = parse_purge_response(&response.body);
        tracing::debug!(
            requested = urls.len(),
            rejected = invalid.len(),
            "Purge completed"
        );
        Ok(invalid)
    }
}

fn parse_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| Error::General(format!("Invalid header value: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credentials;
    use crate::transport::{HttpResponse, MockTransport};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_parse_purge_response() {
        let body = br#"{"invalid_domain_of_url":["http://b.com/x.jpg"]}"#;
        assert_eq!(parse_purge_response(body), vec!["http://b.com/x.jpg"]);
        assert!(parse_purge_response(br#"{}"#).is_empty());
        assert!(parse_purge_response(b"not json").is_empty());
        assert!(parse_purge_response(br#"{"invalid_domain_of_url":{}}"#).is_empty());
    }

    #[tokio::test]
    async fn test_purge_request() {
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        let mut mock = MockTransport::new();
        mock.expect_send().times(1).returning(move |req| {
            *seen_clone.lock().unwrap() = Some(req);
            Ok(HttpResponse::ok().with_body(r#"{"invalid_domain_of_url":["http://a.com/2.jpg"]}"#))
        });
        let client = UpYunClient::with_transport(
            Credentials::new("demo-bucket", "operator", "password"),
            Arc::new(mock),
        );

        let invalid = client
            .purge(&["http://a.com/1.jpg", "http://a.com/2.jpg"])
            .await
            .unwrap();
        assert_eq!(invalid, vec!["http://a.com/2.jpg"]);

        let req = seen.lock().unwrap().take().unwrap();
        assert_eq!(req.url, PURGE_URL);
        assert_eq!(req.header("content-type"), Some(FORM_CONTENT_TYPE));
        let date = req.header("date").unwrap();
        let expected = client
            .signer()
            .sign_purge("http://a.com/1.jpg\nhttp://a.com/2.jpg", date);
        assert_eq!(req.header("authorization"), Some(expected.as_str()));
        assert_eq!(
            req.body.as_deref(),
            Some(&b"purge=http%3A%2F%2Fa.com%2F1.jpg%0Ahttp%3A%2F%2Fa.com%2F2.jpg"[..])
        );
    }
}
