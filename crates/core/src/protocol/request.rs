use std::fmt;
use std::str::FromStr;

use crate::error::{Result, RtspError};
use crate::protocol::{RTSP_VERSION, URI_SCHEME, terminated_lines};

/// RTSP methods understood by the client and the matching server grammar.
///
/// There is no "invalid" or "response" method: a request that isn't one of
/// these five can't be built, and fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    Describe,
    Setup,
    Play,
    Pause,
    Teardown,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Describe => "DESCRIBE",
            Self::Setup => "SETUP",
            Self::Play => "PLAY",
            Self::Pause => "PAUSE",
            Self::Teardown => "TEARDOWN",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = RtspError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "DESCRIBE" => Ok(Self::Describe),
            "SETUP" => Ok(Self::Setup),
            "PLAY" => Ok(Self::Play),
            "PAUSE" => Ok(Self::Pause),
            "TEARDOWN" => Ok(Self::Teardown),
            other => Err(RtspError::InvalidRequest(format!(
                "unknown request type {other:?}"
            ))),
        }
    }
}

/// An RTSP request in the simplified control grammar.
///
/// ```text
/// SETUP rtsp://host/movie.Mjpeg RTSP/1.0\r\n
/// CSeq: 2\r\n
/// User-Agent: RTSP Client\r\n
/// Authorization: Digest username="admin", ...\r\n
/// Transport: RTP/AVP/UDP;unicast;client_port=5000-5000\r\n
/// \r\n
/// ```
///
/// Built with a builder chain and turned into bytes with
/// [`encode`](Self::encode). Optional fields stay `None` until set, so the
/// encoder can reject a request that is missing what its method needs.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct RtspRequest {
    pub request_type: RequestType,
    /// Request sequence number (`CSeq`).
    pub cseq: Option<u32>,
    /// Target resource, without the `rtsp://` scheme.
    pub resource: String,
    /// RTP destination port (SETUP only).
    pub client_port: Option<u16>,
    /// Server-assigned session id; required for everything but DESCRIBE.
    pub session_id: Option<String>,
    /// Ready-made `Authorization` header value.
    pub authorization: Option<String>,
    pub user_agent: Option<String>,
    /// `Range` header, only populated when parsing.
    pub range: Option<String>,
}

impl RtspRequest {
    pub fn new(request_type: RequestType, resource: &str) -> Self {
        Self {
            request_type,
            cseq: None,
            resource: resource.to_string(),
            client_port: None,
            session_id: None,
            authorization: None,
            user_agent: None,
            range: None,
        }
    }

    pub fn with_cseq(mut self, cseq: u32) -> Self {
        self.cseq = Some(cseq);
        self
    }

    pub fn with_client_port(mut self, port: u16) -> Self {
        self.client_port = Some(port);
        self
    }

    pub fn with_session_id(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    pub fn with_authorization(mut self, authorization: String) -> Self {
        self.authorization = Some(authorization);
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_string());
        self
    }

    /// The request-URI as written on the start line (`rtsp://<resource>`).
    ///
    /// This is also the `uri` that Digest authentication hashes.
    pub fn uri(&self) -> String {
        format!("{URI_SCHEME}{}", self.resource)
    }

    /// Serialize to the wire format.
    ///
    /// Header order is fixed: start line, `CSeq`, `User-Agent`,
    /// `Authorization`, then `Transport` for SETUP or `Session` for every
    /// other method except DESCRIBE.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let cseq = self
            .cseq
            .ok_or_else(|| malformed(self, "missing sequence number"))?;

        if self.session_id.is_none() && self.request_type != RequestType::Describe {
            return Err(malformed(self, "missing session id"));
        }

        let mut request = format!(
            "{} {} {RTSP_VERSION}\r\nCSeq: {cseq}\r\n",
            self.request_type,
            self.uri()
        );

        if let Some(user_agent) = &self.user_agent {
            request.push_str(&format!("User-Agent: {user_agent}\r\n"));
        }

        if let Some(authorization) = &self.authorization {
            request.push_str(&format!("Authorization: {authorization}\r\n"));
        }

        match self.request_type {
            RequestType::Describe => {}
            RequestType::Setup => {
                let port = self
                    .client_port
                    .ok_or_else(|| malformed(self, "missing RTP destination port"))?;
                request.push_str(&format!(
                    "Transport: RTP/AVP/UDP;unicast;client_port={port}-{port}\r\n"
                ));
            }
            _ => {
                // Checked above for every method except DESCRIBE.
                let session_id = self.session_id.as_deref().unwrap_or_default();
                request.push_str(&format!("Session: {session_id}\r\n"));
            }
        }

        request.push_str("\r\n");
        Ok(request.into_bytes())
    }

    /// Parse a request as a server would receive it.
    ///
    /// The start line and `CSeq` must come first. After that, headers are
    /// matched case-insensitively; `Range`, `Transport`, `Session`,
    /// `User-Agent` and `Authorization` are kept, anything else is skipped.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(raw)
            .map_err(|_| RtspError::InvalidRequest("request is not UTF-8".to_string()))?;
        let mut lines = terminated_lines(text);

        let start_line = lines
            .next()
            .ok_or_else(|| RtspError::InvalidRequest("empty request".to_string()))?;
        let parts: Vec<&str> = start_line.split(' ').collect();
        let [method, uri, version] = parts.as_slice() else {
            return Err(RtspError::InvalidRequest(format!(
                "invalid start line {start_line:?}"
            )));
        };

        let request_type: RequestType = method.parse()?;
        let resource = uri
            .strip_prefix(URI_SCHEME)
            .filter(|path| !path.is_empty())
            .ok_or_else(|| RtspError::InvalidRequest(format!("invalid request URI {uri:?}")))?;
        if !version.starts_with("RTSP/") {
            return Err(RtspError::InvalidRequest(format!(
                "invalid protocol version {version:?}"
            )));
        }

        let cseq = lines
            .next()
            .and_then(|line| line.strip_prefix("CSeq: "))
            .ok_or_else(|| RtspError::InvalidRequest("missing CSeq".to_string()))?;
        let cseq: u32 = cseq
            .parse()
            .map_err(|_| RtspError::InvalidRequest(format!("invalid CSeq {cseq:?}")))?;

        let mut request = RtspRequest::new(request_type, resource).with_cseq(cseq);

        for line in lines {
            if line.is_empty() {
                break;
            }
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match name.trim().to_ascii_lowercase().as_str() {
                "range" => request.range = Some(value.to_string()),
                "transport" => request.client_port = client_port(value)?,
                "session" => request.session_id = Some(value.to_string()),
                "user-agent" => request.user_agent = Some(value.to_string()),
                "authorization" => request.authorization = Some(value.to_string()),
                _ => {}
            }
        }

        if request.request_type == RequestType::Setup && request.client_port.is_none() {
            return Err(RtspError::InvalidRequest(
                "SETUP without client_port".to_string(),
            ));
        }

        Ok(request)
    }
}

/// Pull the RTP port out of `...;client_port=<rtp>[-<rtcp>];...`.
fn client_port(transport: &str) -> Result<Option<u16>> {
    let Some(ports) = transport
        .split(';')
        .find_map(|part| part.trim().strip_prefix("client_port="))
    else {
        return Ok(None);
    };
    let rtp = ports.split('-').next().unwrap_or(ports);
    rtp.parse()
        .map(Some)
        .map_err(|_| RtspError::InvalidRequest(format!("invalid client_port {ports:?}")))
}

fn malformed(request: &RtspRequest, reason: &str) -> RtspError {
    RtspError::MalformedRequest(format!("{} request: {reason}", request.request_type))
}
