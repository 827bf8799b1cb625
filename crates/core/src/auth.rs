//! Digest authentication (RFC 2617 without `qop`).
//!
//! ```text
//! HA1      = MD5(username ":" realm ":" password)
//! HA2      = MD5(method ":" uri)
//! response = MD5(HA1 ":" nonce ":" HA2)
//! ```
//!
//! All three digests are lowercase hex. `uri` is the request-URI of the
//! request being authenticated, exactly as it appears on the start line.

use std::fmt;

use md5::{Digest, Md5};

/// Username and password used to answer a Digest challenge.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Realm and nonce from a `WWW-Authenticate: Digest ...` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
}

fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Compute the Digest `response` value.
pub fn digest_response(
    username: &str,
    password: &str,
    realm: &str,
    method: &str,
    uri: &str,
    nonce: &str,
) -> String {
    let ha1 = md5_hex(&format!("{username}:{realm}:{password}"));
    let ha2 = md5_hex(&format!("{method}:{uri}"));
    md5_hex(&format!("{ha1}:{nonce}:{ha2}"))
}

/// Build the `Authorization` header value for one request.
///
/// ```
/// use rtsp_client::auth::{Credentials, DigestChallenge, authorization_header};
///
/// let header = authorization_header(
///     &Credentials::new("admin", "secret"),
///     &DigestChallenge { realm: "demo".into(), nonce: "abc123".into() },
///     "DESCRIBE",
///     "rtsp://127.0.0.1/movie.Mjpeg",
/// );
/// assert!(header.starts_with("Digest username=\"admin\", realm=\"demo\""));
/// ```
pub fn authorization_header(
    credentials: &Credentials,
    challenge: &DigestChallenge,
    method: &str,
    uri: &str,
) -> String {
    let response = digest_response(
        &credentials.username,
        &credentials.password,
        &challenge.realm,
        method,
        uri,
        &challenge.nonce,
    );
    format!(
        "Digest username=\"{}\", realm=\"{}\", algorithm=\"MD5\", nonce=\"{}\", uri=\"{uri}\", response=\"{response}\"",
        credentials.username, challenge.realm, challenge.nonce
    )
}
