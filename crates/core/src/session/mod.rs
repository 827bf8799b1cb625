//! Client-side RTSP session state machine.
//!
//! A [`Session`] holds everything the control exchange mutates: the
//! connection state, the CSeq counter, the server-assigned session id and
//! the Digest challenge. It does no I/O. The client builds each request
//! through it and feeds the decoded response back in; every transition
//! returns the next state plus what the RTP receiver should do.
//!
//! ## Lifecycle
//!
//! ```text
//! connect       Disconnected -> Connected
//! DESCRIBE      Connected    -> Described   (401 -> retry with Authorization)
//! SETUP         Described    -> Ready
//! PLAY          Ready/Paused -> Playing     (receiver Active)
//! PAUSE         Playing      -> Paused      (receiver Idle)
//! TEARDOWN      any          -> Disconnected
//! ```

use crate::auth::{self, Credentials, DigestChallenge};
use crate::error::{Result, RtspError};
use crate::protocol::{RequestType, RtspRequest, RtspResponse};

/// Where the session stands in the RTSP handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No control connection.
    Disconnected,
    /// Control connection open, nothing sent yet.
    Connected,
    /// DESCRIBE accepted (after authentication, if challenged).
    Described,
    /// SETUP accepted; a session id is assigned.
    Ready,
    /// PLAY accepted; media is flowing.
    Playing,
    /// PAUSE accepted; can resume via PLAY.
    Paused,
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        *self != Self::Disconnected
    }
}

/// Authentication progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuthState {
    /// No challenge seen.
    #[default]
    None,
    /// Challenged; the retry with credentials is outstanding.
    Challenged(DigestChallenge),
    /// The server accepted our credentials for this challenge.
    Authenticated(DigestChallenge),
}

impl AuthState {
    fn challenge(&self) -> Option<&DigestChallenge> {
        match self {
            Self::None => None,
            Self::Challenged(challenge) | Self::Authenticated(challenge) => Some(challenge),
        }
    }
}

/// What the RTP receiver should do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverAction {
    Unchanged,
    /// Start assembling frames.
    Activate,
    /// Stop assembling frames; the socket stays open.
    Deactivate,
}

/// Result of applying a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub state: SessionState,
    pub receiver: ReceiverAction,
}

/// Outcome of one DESCRIBE exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescribeStep {
    /// Challenged: send DESCRIBE again, now with credentials.
    Retry,
    /// DESCRIBE accepted.
    Described,
}

/// RTSP session state, owned by [`RtspClient`](crate::RtspClient).
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    next_cseq: u32,
    last_cseq: Option<u32>,
    session_id: String,
    auth: AuthState,
    receiving: bool,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Disconnected,
            next_cseq: 0,
            last_cseq: None,
            session_id: String::new(),
            auth: AuthState::None,
            receiving: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Session id assigned by SETUP; empty before that.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    /// True between an accepted PLAY and the next PAUSE or teardown.
    pub fn is_receiving(&self) -> bool {
        self.receiving
    }

    /// The CSeq the next request will carry.
    pub fn next_cseq(&self) -> u32 {
        self.next_cseq
    }

    /// The CSeq of the most recent request, if any was built.
    pub fn last_cseq(&self) -> Option<u32> {
        self.last_cseq
    }

    /// Fail with [`RtspError::InvalidState`] unless in one of `allowed`.
    pub fn require(&self, operation: &'static str, allowed: &[SessionState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(RtspError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    pub fn connected(&mut self) {
        self.set_state(SessionState::Connected);
    }

    /// Forget a challenge whose authenticated retry never got a usable
    /// answer, so the next DESCRIBE starts the handshake over. An accepted
    /// challenge is kept.
    pub fn abandon_challenge(&mut self) {
        if let AuthState::Challenged(challenge) = &self.auth {
            tracing::debug!(realm = %challenge.realm, "dropping unanswered challenge");
            self.auth = AuthState::None;
        }
    }

    /// Build the next request, consuming one sequence number.
    ///
    /// Non-DESCRIBE requests carry the session id. Once a challenge has been
    /// seen, every request carries a Digest credential computed for its own
    /// method and URI.
    pub fn build_request(
        &mut self,
        request_type: RequestType,
        resource: &str,
        user_agent: Option<&str>,
        credentials: Option<&Credentials>,
    ) -> RtspRequest {
        let cseq = self.next_cseq;
        self.next_cseq = self.next_cseq.wrapping_add(1);
        self.last_cseq = Some(cseq);

        let mut request = RtspRequest::new(request_type, resource).with_cseq(cseq);
        if request_type != RequestType::Describe {
            request = request.with_session_id(&self.session_id);
        }
        if let Some(user_agent) = user_agent {
            request = request.with_user_agent(user_agent);
        }
        if let (Some(challenge), Some(credentials)) = (self.auth.challenge(), credentials) {
            let header = auth::authorization_header(
                credentials,
                challenge,
                request_type.as_str(),
                &request.uri(),
            );
            request = request.with_authorization(header);
        }
        request
    }

    /// Compare a response's CSeq with the last request's.
    ///
    /// A mismatch is logged; with `strict` it is also an error.
    pub fn check_sequence(&self, response: &RtspResponse, strict: bool) -> Result<()> {
        let Some(expected) = self.last_cseq else {
            return Ok(());
        };
        let received = response.cseq();
        if received == expected {
            return Ok(());
        }
        tracing::warn!(expected, received, "response CSeq does not match request");
        if strict {
            return Err(RtspError::SequenceMismatch { expected, received });
        }
        Ok(())
    }

    /// Apply a DESCRIBE response.
    pub fn describe(
        &mut self,
        response: &RtspResponse,
        has_credentials: bool,
    ) -> Result<DescribeStep> {
        match response {
            RtspResponse::Unauthorized {
                auth_method,
                realm,
                nonce,
                ..
            } => {
                if matches!(self.auth, AuthState::Challenged(_)) {
                    self.auth = AuthState::None;
                    return Err(RtspError::AuthenticationFailed(
                        "server rejected the credentials".to_string(),
                    ));
                }
                if !has_credentials {
                    return Err(RtspError::AuthenticationRequired);
                }
                if !auth_method.eq_ignore_ascii_case("Digest") {
                    self.auth = AuthState::None;
                    return Err(RtspError::AuthenticationFailed(format!(
                        "unsupported authentication scheme {auth_method:?}"
                    )));
                }
                tracing::debug!(realm = %realm, "DESCRIBE challenged");
                self.auth = AuthState::Challenged(DigestChallenge {
                    realm: realm.clone(),
                    nonce: nonce.clone(),
                });
                Ok(DescribeStep::Retry)
            }
            response if response.is_success() => {
                if let AuthState::Challenged(challenge) = &self.auth {
                    tracing::debug!(realm = %challenge.realm, "authenticated");
                    self.auth = AuthState::Authenticated(challenge.clone());
                }
                self.set_state(SessionState::Described);
                Ok(DescribeStep::Described)
            }
            response => {
                if matches!(self.auth, AuthState::Challenged(_)) {
                    self.auth = AuthState::None;
                    return Err(RtspError::AuthenticationFailed(format!(
                        "authenticated DESCRIBE answered {}",
                        response.status_line()
                    )));
                }
                Err(RtspError::DescribeRejected {
                    status_code: response.status_code(),
                    reason: response.status_line(),
                })
            }
        }
    }

    /// Apply a SETUP response; success stores the session id.
    pub fn setup(&mut self, response: &RtspResponse) -> Result<Transition> {
        if !response.is_success() {
            return Err(RtspError::SetupRejected(response.status_line()));
        }
        let session_id = response.session_id().ok_or_else(|| {
            RtspError::SetupRejected("response carried no session id".to_string())
        })?;
        self.session_id = session_id.to_string();
        if let RtspResponse::SetupOk { timeout_secs, .. } = response {
            tracing::debug!(session_id, timeout_secs, "session assigned");
        }
        Ok(self.transition(SessionState::Ready, ReceiverAction::Unchanged))
    }

    pub fn play(&mut self, response: &RtspResponse) -> Result<Transition> {
        if !response.is_success() {
            return Err(RtspError::PlayRejected(response.status_line()));
        }
        self.receiving = true;
        Ok(self.transition(SessionState::Playing, ReceiverAction::Activate))
    }

    pub fn pause(&mut self, response: &RtspResponse) -> Result<Transition> {
        if !response.is_success() {
            return Err(RtspError::PauseRejected(response.status_line()));
        }
        self.receiving = false;
        Ok(self.transition(SessionState::Paused, ReceiverAction::Deactivate))
    }

    /// Back to `Disconnected` after teardown or close.
    ///
    /// The session id and authentication are dropped; the CSeq counter
    /// keeps counting so a number is never reused.
    pub fn reset(&mut self) {
        self.session_id.clear();
        self.auth = AuthState::None;
        self.receiving = false;
        self.set_state(SessionState::Disconnected);
    }

    fn transition(&mut self, state: SessionState, receiver: ReceiverAction) -> Transition {
        self.set_state(state);
        Transition { state, receiver }
    }

    fn set_state(&mut self, state: SessionState) {
        tracing::debug!(old_state = ?self.state, new_state = ?state, "state transition");
        self.state = state;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
