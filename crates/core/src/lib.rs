//! Client for a simplified RTSP/RTP streaming protocol.
//!
//! [`RtspClient`] negotiates a session over TCP (DESCRIBE with Digest
//! authentication, SETUP, PLAY, PAUSE, TEARDOWN) while a background
//! [`receiver`] thread reassembles MJPEG frames from UDP datagrams. Frames
//! are drained with [`RtspClient::pull_next_frame`].

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod media;
pub mod protocol;
pub mod receiver;
pub mod session;
pub mod transport;

pub use auth::Credentials;
pub use client::RtspClient;
pub use config::ClientConfig;
pub use error::{FramingError, Result, RtspError};
pub use media::Frame;
pub use protocol::{RequestType, RtspRequest, RtspResponse};
pub use session::SessionState;
