use std::sync::Arc;

use crate::config::ClientConfig;
use crate::error::{Result, RtspError};
use crate::media::Frame;
use crate::protocol::{RequestType, RtspResponse};
use crate::receiver::{ReceiverMode, ReceiverOptions, ReceiverStats, RtpReceiver};
use crate::session::{DescribeStep, ReceiverAction, Session, SessionState, Transition};
use crate::transport::ControlConnection;

/// RTSP client: drives one session over a control connection and receives
/// its media on a background thread.
///
/// Operations are synchronous and strictly sequential; each sends one
/// request (DESCRIBE may send two) and blocks until the response arrives
/// or [`ClientConfig::response_timeout`] passes.
///
/// ```no_run
/// use rtsp_client::{ClientConfig, RtspClient};
///
/// let config = ClientConfig::new("movie.Mjpeg", "127.0.0.1", 8554, 25000)
///     .with_credentials("admin", "secret");
/// let mut client = RtspClient::new(config);
/// client.connect()?;
/// client.describe_and_authenticate()?;
/// client.setup()?;
/// client.play()?;
/// while let Some(frame) = client.pull_next_frame() {
///     println!("frame {} ({} bytes)", frame.index, frame.payload.len());
/// }
/// client.teardown()?;
/// # Ok::<(), rtsp_client::RtspError>(())
/// ```
pub struct RtspClient {
    config: ClientConfig,
    session: Session,
    connection: Option<ControlConnection>,
    receiver: Option<RtpReceiver>,
    stats: Arc<ReceiverStats>,
    next_frame_index: u64,
}

impl RtspClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            session: Session::new(),
            connection: None,
            receiver: None,
            stats: Arc::new(ReceiverStats::default()),
            next_frame_index: 0,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_id(&self) -> &str {
        self.session.session_id()
    }

    /// Data-path counters, accumulated over every receiver this client ran.
    pub fn receiver_stats(&self) -> &ReceiverStats {
        &self.stats
    }

    /// Mode of the RTP receiver, if one is running.
    pub fn receiver_mode(&self) -> Option<ReceiverMode> {
        self.receiver.as_ref().map(RtpReceiver::mode)
    }

    /// Local UDP port the receiver is bound to, once SETUP has started it.
    pub fn rtp_port(&self) -> Option<u16> {
        self.receiver.as_ref().map(|r| r.local_addr().port())
    }

    /// Open the control connection. A no-op when already connected.
    pub fn connect(&mut self) -> Result<()> {
        if self.connection.is_some() {
            tracing::debug!("already connected");
            return Ok(());
        }
        tracing::info!(
            host = %self.config.remote_host,
            port = self.config.remote_port,
            "connecting"
        );
        let connection = ControlConnection::connect(
            &self.config.remote_host,
            self.config.remote_port,
            self.config.control_poll_interval,
            self.config.response_timeout,
        )?;
        self.connection = Some(connection);
        self.session.connected();
        Ok(())
    }

    /// Send DESCRIBE, answering a Digest challenge once if the server
    /// sends one. The authenticated retry uses a fresh CSeq.
    pub fn describe_and_authenticate(&mut self) -> Result<RtspResponse> {
        self.session.require(
            "describe",
            &[SessionState::Connected, SessionState::Described],
        )?;
        self.session.abandon_challenge();

        let has_credentials = self.config.credentials.is_some();
        let response = self.exchange(RequestType::Describe)?;
        match self.session.describe(&response, has_credentials)? {
            DescribeStep::Described => Ok(response),
            DescribeStep::Retry => {
                tracing::info!("server requested authentication, retrying DESCRIBE");
                let response = self.exchange(RequestType::Describe)?;
                match self.session.describe(&response, has_credentials)? {
                    DescribeStep::Described => Ok(response),
                    DescribeStep::Retry => Err(RtspError::AuthenticationFailed(
                        "server challenged the authenticated retry".to_string(),
                    )),
                }
            }
        }
    }

    /// Start the RTP receiver (idle) and send SETUP announcing its port.
    ///
    /// On rejection the receiver is released again.
    pub fn setup(&mut self) -> Result<RtspResponse> {
        self.session.require("setup", &[SessionState::Described])?;

        if self.receiver.is_none() {
            let options = ReceiverOptions {
                poll_interval: self.config.rtp_poll_interval,
                recv_buffer_size: self.config.recv_buffer_size,
            };
            self.receiver = Some(RtpReceiver::start(
                &self.config.rtp_bind_host,
                self.config.rtp_port,
                options,
                self.stats.clone(),
            )?);
        }

        let result = self
            .exchange(RequestType::Setup)
            .and_then(|response| self.session.setup(&response).map(|t| (response, t)));
        match result {
            Ok((response, transition)) => {
                tracing::info!(session_id = %self.session.session_id(), "session set up");
                self.apply(transition);
                Ok(response)
            }
            Err(e) => {
                self.receiver = None;
                Err(e)
            }
        }
    }

    /// Send PLAY; on success the receiver starts assembling frames.
    pub fn play(&mut self) -> Result<RtspResponse> {
        self.session
            .require("play", &[SessionState::Ready, SessionState::Paused])?;
        let response = self.exchange(RequestType::Play)?;
        let transition = self.session.play(&response)?;
        tracing::info!(session_id = %self.session.session_id(), "playing");
        self.apply(transition);
        Ok(response)
    }

    /// Send PAUSE; on success the receiver goes idle.
    pub fn pause(&mut self) -> Result<RtspResponse> {
        self.session.require("pause", &[SessionState::Playing])?;
        let response = self.exchange(RequestType::Pause)?;
        let transition = self.session.pause(&response)?;
        tracing::info!(session_id = %self.session.session_id(), "paused");
        self.apply(transition);
        Ok(response)
    }

    /// Send TEARDOWN, then release the receiver, close the connection and
    /// reset to `Disconnected`.
    ///
    /// The local reset happens even if the exchange fails; the error is
    /// still returned.
    pub fn teardown(&mut self) -> Result<RtspResponse> {
        if !self.session.state().is_connected() {
            return Err(RtspError::InvalidState {
                operation: "teardown",
                state: self.session.state(),
            });
        }
        if let Some(receiver) = &self.receiver {
            receiver.set_active(false);
        }
        let result = self.exchange(RequestType::Teardown);
        if let Err(e) = &result {
            tracing::warn!(error = %e, "TEARDOWN failed, closing anyway");
        }
        self.close();
        result
    }

    /// Drop the connection and the receiver without sending TEARDOWN.
    pub fn close(&mut self) {
        self.receiver = None;
        if let Some(connection) = self.connection.take() {
            connection.shutdown();
        }
        if self.session.state().is_connected() {
            self.session.reset();
        }
    }

    /// Pop the oldest assembled frame, numbering it with the next display
    /// index. Never blocks.
    pub fn pull_next_frame(&mut self) -> Option<Frame> {
        let payload = self.receiver.as_ref()?.try_recv_frame()?;
        let index = self.next_frame_index;
        self.next_frame_index += 1;
        Some(Frame { payload, index })
    }

    /// One request/response round trip on the control connection.
    fn exchange(&mut self, request_type: RequestType) -> Result<RtspResponse> {
        let resource = self.config.resource();
        let connection = self.connection.as_mut().ok_or(RtspError::InvalidState {
            operation: "send",
            state: self.session.state(),
        })?;

        let mut request = self.session.build_request(
            request_type,
            &resource,
            self.config.user_agent.as_deref(),
            self.config.credentials.as_ref(),
        );
        if request_type == RequestType::Setup
            && let Some(receiver) = &self.receiver
        {
            request = request.with_client_port(receiver.local_addr().port());
        }

        let bytes = request.encode()?;
        tracing::debug!(
            method = %request_type,
            cseq = request.cseq,
            authorized = request.authorization.is_some(),
            "sending request"
        );
        connection.send(&bytes)?;

        let raw = connection.read_response()?;
        let response = RtspResponse::parse(&raw)?;
        tracing::debug!(
            method = %request_type,
            cseq = response.cseq(),
            status = response.status_code(),
            "response"
        );
        self.session
            .check_sequence(&response, self.config.strict_cseq)?;
        Ok(response)
    }

    fn apply(&mut self, transition: Transition) {
        let Some(receiver) = &self.receiver else {
            return;
        };
        match transition.receiver {
            ReceiverAction::Unchanged => {}
            ReceiverAction::Activate => receiver.set_active(true),
            ReceiverAction::Deactivate => receiver.set_active(false),
        }
    }
}

impl Drop for RtspClient {
    fn drop(&mut self) {
        self.close();
    }
}
