//! RTSP control-plane codec.
//!
//! The server speaks a deliberately small subset of RTSP (RFC 2326). Every
//! message is CRLF-terminated text ending with a blank line:
//!
//! ```text
//! DESCRIBE rtsp://127.0.0.1/movie.Mjpeg RTSP/1.0\r\n
//! CSeq: 0\r\n
//! User-Agent: RTSP Client\r\n
//! \r\n
//! ```
//!
//! ```text
//! RTSP/1.0 401 Unauthorized\r\n
//! CSeq: 0\r\n
//! WWW-Authenticate: Digest realm="demo", nonce="abc123"\r\n
//! \r\n
//! ```
//!
//! Headers appear in a fixed order on both sides, so responses are matched
//! against whole fixed grammars rather than parsed into a header map.
//!
//! | Method | Purpose | Extra header |
//! |--------|---------|--------------|
//! | DESCRIBE | Open the session, triggers the auth challenge | |
//! | SETUP | Announce the client RTP port | `Transport` |
//! | PLAY | Start media delivery | `Session` |
//! | PAUSE | Suspend media delivery | `Session` |
//! | TEARDOWN | Destroy the session | `Session` |

pub mod request;
pub mod response;

pub use request::{RequestType, RtspRequest};
pub use response::RtspResponse;

/// Protocol version written on every start line.
pub const RTSP_VERSION: &str = "RTSP/1.0";

/// Scheme prefix of every request-URI.
pub const URI_SCHEME: &str = "rtsp://";

/// Lines that end in `\n`, with the `\n` and an optional `\r` removed.
///
/// A trailing fragment without a newline is not yielded: a grammar line
/// only counts once its terminator has arrived.
pub(crate) fn terminated_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive('\n')
        .filter_map(|line| line.strip_suffix('\n'))
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminated_lines_drops_partial_tail() {
        let lines: Vec<&str> = terminated_lines("a\r\nb\n\r\nc").collect();
        assert_eq!(lines, vec!["a", "b", ""]);
    }
}
