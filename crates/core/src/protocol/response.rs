use crate::error::{Result, RtspError};
use crate::protocol::{RTSP_VERSION, terminated_lines};

/// A decoded server response.
///
/// The server speaks a handful of fixed shapes, all starting with
///
/// ```text
/// RTSP/1.0 <code> <reason>\r\n
/// CSeq: <n>\r\n
/// ```
///
/// followed by either a `WWW-Authenticate` challenge (401), a `Session`
/// line with or without `;timeout=<secs>` (200), or nothing else (200).
/// Any other status becomes [`Failure`](Self::Failure).
///
/// The CSeq is exposed as-is; matching it against the request is left to
/// the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtspResponse {
    /// 401 with a Digest (or other) challenge.
    Unauthorized {
        cseq: u32,
        auth_method: String,
        realm: String,
        nonce: String,
    },
    /// 200 with `Session: <id>;timeout=<secs>`, as sent for SETUP.
    SetupOk {
        cseq: u32,
        session_id: String,
        timeout_secs: u64,
    },
    /// 200 with `Session: <id>`.
    Ok { cseq: u32, session_id: String },
    /// 200 without a session line.
    OkNoSession { cseq: u32 },
    /// Any other status code, e.g. `454 Session Not Found`.
    Failure {
        cseq: u32,
        status_code: u16,
        reason: String,
    },
}

impl RtspResponse {
    pub fn cseq(&self) -> u32 {
        match self {
            Self::Unauthorized { cseq, .. }
            | Self::SetupOk { cseq, .. }
            | Self::Ok { cseq, .. }
            | Self::OkNoSession { cseq }
            | Self::Failure { cseq, .. } => *cseq,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::SetupOk { session_id, .. } | Self::Ok { session_id, .. } => Some(session_id),
            _ => None,
        }
    }

    /// Whether this is one of the 200 OK shapes.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::SetupOk { .. } | Self::Ok { .. } | Self::OkNoSession { .. }
        )
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized { .. } => 401,
            Self::Failure { status_code, .. } => *status_code,
            _ => 200,
        }
    }

    /// Short `<code> <reason>` description for errors and logs.
    pub fn status_line(&self) -> String {
        match self {
            Self::Unauthorized { .. } => "401 Unauthorized".to_string(),
            Self::Failure {
                status_code,
                reason,
                ..
            } => format!("{status_code} {reason}"),
            _ => "200 OK".to_string(),
        }
    }

    /// Decode a response.
    ///
    /// Grammars are tried most specific first, because a bare `200 OK`
    /// is a textual prefix of the session-carrying forms. Only the prefix
    /// has to match; trailing headers and bodies are ignored.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(raw)
            .map_err(|_| RtspError::UnparsableResponse("response is not UTF-8".to_string()))?;
        let mut lines = terminated_lines(text);

        let (status_code, reason) = lines
            .next()
            .and_then(status_line)
            .ok_or_else(|| unparsable(text))?;
        let cseq = lines
            .next()
            .and_then(|line| line.strip_prefix("CSeq: "))
            .ok_or_else(|| unparsable(text))?;
        let cseq: u32 = cseq.parse().map_err(|_| {
            RtspError::UnparsableResponse(format!("invalid CSeq {cseq:?}"))
        })?;
        let next = lines.next();

        match (status_code, reason) {
            (401, "Unauthorized") => {
                let (auth_method, realm, nonce) = next
                    .and_then(|line| line.strip_prefix("WWW-Authenticate: "))
                    .and_then(challenge)
                    .ok_or_else(|| unparsable(text))?;
                Ok(Self::Unauthorized {
                    cseq,
                    auth_method,
                    realm,
                    nonce,
                })
            }
            (200, "OK") => match next.and_then(|line| line.strip_prefix("Session: ")) {
                Some(session) => {
                    let (id, params) = session.split_once(';').unwrap_or((session, ""));
                    let session_id = session_token(id, text)?;
                    let timeout = params
                        .split(';')
                        .find_map(|param| param.trim().strip_prefix("timeout="));
                    match timeout {
                        Some(timeout) => {
                            let timeout_secs = timeout.parse().map_err(|_| {
                                RtspError::UnparsableResponse(format!(
                                    "invalid session timeout {timeout:?}"
                                ))
                            })?;
                            Ok(Self::SetupOk {
                                cseq,
                                session_id,
                                timeout_secs,
                            })
                        }
                        None => Ok(Self::Ok { cseq, session_id }),
                    }
                }
                None => Ok(Self::OkNoSession { cseq }),
            },
            (401, _) | (200, _) => Err(unparsable(text)),
            (status_code, reason) => Ok(Self::Failure {
                cseq,
                status_code,
                reason: reason.to_string(),
            }),
        }
    }

    /// Serialize to the wire format, as the streaming server would send it.
    pub fn encode(&self) -> Vec<u8> {
        let mut response = format!(
            "{RTSP_VERSION} {}\r\nCSeq: {}\r\n",
            self.status_line(),
            self.cseq()
        );
        match self {
            Self::Unauthorized {
                auth_method,
                realm,
                nonce,
                ..
            } => response.push_str(&format!(
                "WWW-Authenticate: {auth_method} realm=\"{realm}\", nonce=\"{nonce}\"\r\n"
            )),
            Self::SetupOk {
                session_id,
                timeout_secs,
                ..
            } => response.push_str(&format!("Session: {session_id};timeout={timeout_secs}\r\n")),
            Self::Ok { session_id, .. } => {
                response.push_str(&format!("Session: {session_id}\r\n"))
            }
            Self::OkNoSession { .. } | Self::Failure { .. } => {}
        }
        response.push_str("\r\n");
        response.into_bytes()
    }
}

/// `RTSP/<major>.<minor> <code> <reason>` -> `(code, reason)`.
fn status_line(line: &str) -> Option<(u16, &str)> {
    let (version, rest) = line.split_once(' ')?;
    let (major, minor) = version.strip_prefix("RTSP/")?.split_once('.')?;
    if !is_digits(major) || !is_digits(minor) {
        return None;
    }
    let (code, reason) = rest.split_once(' ')?;
    if code.len() != 3 || !is_digits(code) || reason.is_empty() {
        return None;
    }
    Some((code.parse().ok()?, reason))
}

/// `<method> realm="<realm>", nonce="<nonce>"` -> `(method, realm, nonce)`.
fn challenge(value: &str) -> Option<(String, String, String)> {
    let (method, params) = value.split_once(' ')?;
    if method.is_empty() || method.contains(char::is_whitespace) {
        return None;
    }
    let (realm, rest) = params.strip_prefix("realm=\"")?.split_once('"')?;
    let (nonce, _) = rest.strip_prefix(", nonce=\"")?.split_once('"')?;
    if realm.is_empty() || nonce.is_empty() {
        return None;
    }
    Some((method.to_string(), realm.to_string(), nonce.to_string()))
}

fn session_token(id: &str, text: &str) -> Result<String> {
    if id.is_empty() || id.contains(char::is_whitespace) {
        return Err(unparsable(text));
    }
    Ok(id.to_string())
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn unparsable(text: &str) -> RtspError {
    RtspError::UnparsableResponse(format!("failed to parse RTSP response: {text:?}"))
}
