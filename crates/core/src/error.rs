//! Error types for the RTSP client library.

use crate::session::SessionState;

/// Errors that can occur while driving an RTSP session.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Transport**: [`Connection`](Self::Connection),
///   [`RtpSocket`](Self::RtpSocket): socket/network failures.
/// - **Codec**: [`MalformedRequest`](Self::MalformedRequest),
///   [`InvalidRequest`](Self::InvalidRequest),
///   [`UnparsableResponse`](Self::UnparsableResponse).
/// - **Authentication**: [`AuthenticationRequired`](Self::AuthenticationRequired),
///   [`AuthenticationFailed`](Self::AuthenticationFailed).
/// - **Session**: the `*Rejected` variants, [`InvalidState`](Self::InvalidState),
///   [`SequenceMismatch`](Self::SequenceMismatch).
///
/// Data-path failures never show up here; see [`FramingError`].
#[derive(Debug, thiserror::Error)]
pub enum RtspError {
    /// Control connection failed to open, send, or receive.
    #[error("control connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The RTP datagram socket could not be bound or configured.
    #[error("RTP socket error: {0}")]
    RtpSocket(#[source] std::io::Error),

    /// A request value violates the encoder contract (programming error).
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Request text does not follow the request grammar.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The server sent bytes that match none of the known response grammars.
    #[error("unparsable response: {0}")]
    UnparsableResponse(String),

    /// The server challenged DESCRIBE but no credentials are configured.
    #[error("server requires authentication but no credentials are configured")]
    AuthenticationRequired,

    /// The authenticated retry was not accepted.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// DESCRIBE was refused without an authentication challenge.
    #[error("DESCRIBE rejected: {status_code} {reason}")]
    DescribeRejected { status_code: u16, reason: String },

    #[error("SETUP rejected: {0}")]
    SetupRejected(String),

    #[error("PLAY rejected: {0}")]
    PlayRejected(String),

    #[error("PAUSE rejected: {0}")]
    PauseRejected(String),

    /// The operation is not allowed from the current session state.
    /// Nothing was sent.
    #[error("{operation} not allowed in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// Response CSeq differs from the request's (only with `strict_cseq`).
    #[error("CSeq mismatch: sent {expected}, received {received}")]
    SequenceMismatch { expected: u32, received: u32 },
}

impl RtspError {
    /// Whether retrying the same operation may succeed.
    ///
    /// Transport failures are transient; codec, authentication and state
    /// errors will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::RtpSocket(_))
    }
}

/// A malformed unit on the data path.
///
/// Reported through logging and [`ReceiverStats`](crate::receiver::ReceiverStats);
/// the partial unit is discarded and assembly resumes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    /// The end marker arrived before a full length header.
    #[error("unit ended before the {0}-byte length header was complete")]
    TruncatedHeader(usize),

    /// The length header is not a decimal number.
    #[error("invalid length header {0:?}")]
    InvalidLengthHeader(Vec<u8>),

    /// The end marker position disagrees with the declared length.
    #[error("declared payload length {declared} but unit carried {actual} bytes")]
    LengthMismatch { declared: usize, actual: usize },

    /// A unit of the declared length does not end with the end marker.
    #[error("unit of declared length {0} does not end with the end marker")]
    MissingEndMarker(usize),
}

/// Convenience alias for `Result<T, RtspError>`.
pub type Result<T> = std::result::Result<T, RtspError>;
