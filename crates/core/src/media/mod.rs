//! Data-plane media units.
//!
//! Datagrams on the RTP port carry MJPEG records ([`mjpeg`]) that
//! [`rtp::UnitAssembler`] stitches back together. Each complete payload is
//! handed to the caller as a [`Frame`]; decoding the JPEG is left to the
//! caller.

pub mod mjpeg;
pub mod rtp;

/// One complete media unit, as returned by
/// [`RtspClient::pull_next_frame`](crate::RtspClient::pull_next_frame).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Encoded payload (a whole JPEG image), without the length prefix.
    pub payload: Vec<u8>,
    /// Client-local display index, assigned when the frame is pulled.
    /// Starts at 0 and increases by one per frame.
    pub index: u64,
}
