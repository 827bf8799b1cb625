//! Network transport for the RTSP client.
//!
//! The protocol splits across two sockets:
//!
//! - **TCP** ([`tcp`]): the control connection carrying RTSP
//!   request/response text, owned by [`RtspClient`](crate::RtspClient).
//!
//! - **UDP** ([`udp`]): the data path carrying media datagrams, owned by the
//!   [`RtpReceiver`](crate::receiver::RtpReceiver) thread.

pub mod tcp;
pub mod udp;

pub use tcp::ControlConnection;
pub use udp::UdpTransport;
