use std::time::Duration;

use crate::auth::Credentials;

/// User agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = "RTSP Client";

/// Everything an [`RtspClient`](crate::RtspClient) needs, fixed at
/// construction.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Media path on the server, e.g. `movie.Mjpeg`.
    pub host_file_path: String,
    /// Server host name or address.
    pub remote_host: String,
    /// Server RTSP (TCP) port.
    pub remote_port: u16,
    /// Local UDP port for RTP. 0 picks an ephemeral port, which is then
    /// announced in SETUP.
    pub rtp_port: u16,
    /// Local address the RTP socket binds to.
    pub rtp_bind_host: String,
    /// Answer Digest challenges with these; `None` fails a challenged
    /// DESCRIBE with [`AuthenticationRequired`](crate::RtspError::AuthenticationRequired).
    pub credentials: Option<Credentials>,
    /// `User-Agent` header; `None` omits it.
    pub user_agent: Option<String>,
    /// Socket read timeout on the control connection. Reads are retried
    /// until `response_timeout`.
    pub control_poll_interval: Duration,
    /// How long to wait for a complete response (also the connect and
    /// write timeout).
    pub response_timeout: Duration,
    /// How long the RTP loop blocks before re-checking its mode.
    pub rtp_poll_interval: Duration,
    /// Datagram receive buffer size.
    pub recv_buffer_size: usize,
    /// Reject responses whose CSeq differs from the request's instead of
    /// only logging them.
    pub strict_cseq: bool,
}

impl ClientConfig {
    pub fn new(host_file_path: &str, remote_host: &str, remote_port: u16, rtp_port: u16) -> Self {
        Self {
            host_file_path: host_file_path.to_string(),
            remote_host: remote_host.to_string(),
            remote_port,
            rtp_port,
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    /// The resource every request targets: `<host>/<path>`.
    pub fn resource(&self) -> String {
        format!(
            "{}/{}",
            self.remote_host,
            self.host_file_path.trim_start_matches('/')
        )
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host_file_path: String::new(),
            remote_host: "127.0.0.1".to_string(),
            remote_port: 554,
            rtp_port: 0,
            rtp_bind_host: "0.0.0.0".to_string(),
            credentials: None,
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            control_poll_interval: Duration::from_millis(100),
            response_timeout: Duration::from_secs(10),
            rtp_poll_interval: Duration::from_millis(20),
            recv_buffer_size: 65_536,
            strict_cseq: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_joins_host_and_path() {
        let config = ClientConfig::new("/movie.Mjpeg", "10.0.0.2", 8554, 25000);
        assert_eq!(config.resource(), "10.0.0.2/movie.Mjpeg");
        assert_eq!(config.user_agent.as_deref(), Some(DEFAULT_USER_AGENT));
        assert!(config.credentials.is_none());
    }
}
