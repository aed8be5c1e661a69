//! Request signing
//!
//! Every REST call carries `Authorization: UpYun <operator>:<signature>`,
//! where the signature is an MD5 over `&`-joined request attributes and the
//! MD5 of the operator password. Purge requests use the same construction
//! with the bucket folded into both the digest and the header.

use upyun_core::{Profile, md5_hex};

/// Scheme prefix of the Authorization header
pub const AUTH_SCHEME: &str = "UpYun";

const SIGN_DELIMITER: &str = "&";

/// Account identity used to sign requests
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub bucket: String,
    pub operator: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        bucket: impl Into<String>,
        operator: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            operator: operator.into(),
            password: password.into(),
        }
    }
}

impl From<&Profile> for Credentials {
    fn from(profile: &Profile) -> Self {
        Self::new(&profile.bucket, &profile.operator, &profile.password)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("bucket", &self.bucket)
            .field("operator", &self.operator)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Produces Authorization header values for one set of credentials
#[derive(Debug, Clone)]
pub struct Signer {
    credentials: Credentials,
    /// MD5 of the password, computed once
    password_md5: String,
}

impl Signer {
    pub fn new(credentials: Credentials) -> Self {
        let password_md5 = md5_hex(&credentials.password);
        Self {
            credentials,
            password_md5,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Authorization for a REST request
    ///
    /// `path` is the escaped `/<bucket>/<key>` path without query;
    /// `content_length` is the declared body length, `"0"` when absent.
    pub fn sign_request(&self, method: &str, path: &str, date: &str, content_length: &str) -> String {
        let signature = md5_hex(
            [method, path, date, content_length, self.password_md5.as_str()].join(SIGN_DELIMITER),
        );
        format!("{AUTH_SCHEME} {}:{signature}", self.credentials.operator)
    }

    /// Authorization for a purge request over newline-joined `urls`
    pub fn sign_purge(&self, urls: &str, date: &str) -> String {
        let signature = md5_hex(
            [
                urls,
                self.credentials.bucket.as_str(),
                date,
                self.password_md5.as_str(),
            ]
            .join(SIGN_DELIMITER),
        );
        format!(
            "{AUTH_SCHEME} {}:{}:{signature}",
            self.credentials.bucket, self.credentials.operator
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATE: &str = "Wed, 29 Oct 2014 02:26:58 GMT";

    fn signer() -> Signer {
        Signer::new(Credentials::new("demo-bucket", "operator", "password"))
    }

    #[test]
    fn test_sign_request() {
        let auth = signer().sign_request("PUT", "/demo-bucket/a.txt", DATE, "100");
        assert_eq!(auth, "UpYun operator:3f0ac6b88b9e9f4235c4186a8da114f1");

        let auth = signer().sign_request("GET", "/demo-bucket/", DATE, "0");
        assert_eq!(auth, "UpYun operator:c5ebbcb24debc686b57a5efe1b108b39");
    }

    #[test]
    fn test_sign_purge() {
        let auth = signer().sign_purge("http://a.com/1.jpg\nhttp://a.com/2.jpg", DATE);
        assert_eq!(
            auth,
            "UpYun demo-bucket:operator:1574ced916e1cd39ca68cc49d247f896"
        );
    }

    #[test]
    fn test_signature_depends_on_every_field() {
        let s = signer();
        let base = s.sign_request("PUT", "/demo-bucket/a.txt", DATE, "100");
        assert_ne!(base, s.sign_request("POST", "/demo-bucket/a.txt", DATE, "100"));
        assert_ne!(base, s.sign_request("PUT", "/demo-bucket/b.txt", DATE, "100"));
        assert_ne!(base, s.sign_request("PUT", "/demo-bucket/a.txt", DATE, "101"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let debug = format!("{:?}", signer());
        assert!(!debug.contains("\"password\""));
        assert!(debug.contains("<redacted>"));
    }
}
