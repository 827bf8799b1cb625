//! Integration tests: drive `RtspClient` against a scripted RTSP server on
//! loopback, covering the authentication handshake, session id echoing,
//! sequence numbering and frame delivery over UDP.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, UdpSocket};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rtsp_client::auth::digest_response;
use rtsp_client::media::rtp::RawPacket;
use rtsp_client::receiver::ReceiverMode;
use rtsp_client::{ClientConfig, Frame, RtspClient, RtspError, RtspResponse, SessionState};

/// Accept one control connection and answer each request with whatever
/// `respond` returns for it. An empty answer closes the connection.
/// Returns every request received.
fn spawn_server<F>(mut respond: F) -> (u16, JoinHandle<Vec<String>>)
where
    F: FnMut(usize, &str) -> Vec<u8> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind control listener");
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept client");
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut writer = stream;
        let mut requests = Vec::new();

        loop {
            let mut request = String::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    return requests;
                }
                request.push_str(&line);
                if line == "\r\n" {
                    break;
                }
            }

            let answer = respond(requests.len(), &request);
            requests.push(request);
            if answer.is_empty() {
                return requests;
            }
            if writer.write_all(&answer).is_err() {
                return requests;
            }
        }
    });

    (port, handle)
}

fn config(port: u16) -> ClientConfig {
    let mut config = ClientConfig::new("movie.Mjpeg", "127.0.0.1", port, 0);
    config.rtp_bind_host = "127.0.0.1".to_string();
    config.control_poll_interval = Duration::from_millis(20);
    config.response_timeout = Duration::from_secs(2);
    config.rtp_poll_interval = Duration::from_millis(10);
    config
}

fn ok(cseq: u32) -> Vec<u8> {
    RtspResponse::OkNoSession { cseq }.encode()
}

fn challenge(cseq: u32) -> Vec<u8> {
    RtspResponse::Unauthorized {
        cseq,
        auth_method: "Digest".to_string(),
        realm: "demo".to_string(),
        nonce: "abc123".to_string(),
    }
    .encode()
}

fn cseq_of(request: &str) -> u32 {
    request
        .lines()
        .find_map(|line| line.strip_prefix("CSeq: "))
        .and_then(|value| value.trim().parse().ok())
        .expect("request has CSeq")
}

fn client_port_of(request: &str) -> u16 {
    request
        .split("client_port=")
        .nth(1)
        .and_then(|rest| rest.split('-').next())
        .and_then(|port| port.parse().ok())
        .expect("SETUP carries client_port")
}

/// Answer SETUP with session 4231 and everything else with 200 OK.
fn session_server(_request_index: usize, request: &str) -> Vec<u8> {
    let cseq = cseq_of(request);
    if request.starts_with("SETUP") {
        RtspResponse::SetupOk {
            cseq,
            session_id: "4231".to_string(),
            timeout_secs: 65,
        }
        .encode()
    } else if request.starts_with("PLAY") || request.starts_with("PAUSE") {
        RtspResponse::Ok {
            cseq,
            session_id: "4231".to_string(),
        }
        .encode()
    } else {
        ok(cseq)
    }
}

fn jpeg(body: &[u8]) -> Vec<u8> {
    let mut payload = vec![0xFF, 0xD8];
    payload.extend_from_slice(body);
    payload.extend_from_slice(&[0xFF, 0xD9]);
    payload
}

fn pull_frames(client: &mut RtspClient, count: usize) -> Vec<Frame> {
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut frames = Vec::new();
    while frames.len() < count && Instant::now() < deadline {
        match client.pull_next_frame() {
            Some(frame) => frames.push(frame),
            None => thread::sleep(Duration::from_millis(5)),
        }
    }
    frames
}

#[test]
fn digest_challenge_is_answered_with_fresh_cseq() {
    let (port, server) = spawn_server(|index, request| match index {
        0 => challenge(cseq_of(request)),
        _ => ok(cseq_of(request)),
    });

    let mut client = RtspClient::new(config(port).with_credentials("admin", "secret"));
    client.connect().unwrap();
    let response = client.describe_and_authenticate().unwrap();
    assert_eq!(response, RtspResponse::OkNoSession { cseq: 1 });
    assert_eq!(client.state(), SessionState::Described);

    client.close();
    let requests = server.join().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(cseq_of(&requests[0]), 0);
    assert_eq!(cseq_of(&requests[1]), 1);
    assert!(!requests[0].contains("Authorization:"));

    let uri = "rtsp://127.0.0.1/movie.Mjpeg";
    let expected = digest_response("admin", "secret", "demo", "DESCRIBE", uri, "abc123");
    assert!(requests[1].starts_with(&format!("DESCRIBE {uri} RTSP/1.0\r\n")));
    assert!(requests[1].contains("Authorization: Digest username=\"admin\""));
    assert!(requests[1].contains(&format!("response=\"{expected}\"")));
}

#[test]
fn challenge_without_credentials_fails() {
    let (port, server) = spawn_server(|_, request| challenge(cseq_of(request)));

    let mut client = RtspClient::new(config(port));
    client.connect().unwrap();
    let err = client.describe_and_authenticate().unwrap_err();
    assert!(matches!(err, RtspError::AuthenticationRequired));
    assert_eq!(client.state(), SessionState::Connected);

    client.close();
    assert_eq!(server.join().unwrap().len(), 1);
}

#[test]
fn rejected_credentials_fail_after_one_retry() {
    let (port, server) = spawn_server(|_, request| challenge(cseq_of(request)));

    let mut client = RtspClient::new(config(port).with_credentials("admin", "wrong"));
    client.connect().unwrap();
    let err = client.describe_and_authenticate().unwrap_err();
    assert!(matches!(err, RtspError::AuthenticationFailed(_)));
    assert!(!err.is_retryable());
    assert_eq!(client.session().next_cseq(), 2);

    client.close();
    assert_eq!(server.join().unwrap().len(), 2);
}

#[test]
fn session_id_is_echoed_after_setup() {
    let (port, server) = spawn_server(session_server);

    let mut client = RtspClient::new(config(port));
    client.connect().unwrap();
    client.describe_and_authenticate().unwrap();

    let setup = client.setup().unwrap();
    assert_eq!(
        setup,
        RtspResponse::SetupOk {
            cseq: 1,
            session_id: "4231".to_string(),
            timeout_secs: 65,
        }
    );
    assert_eq!(client.session_id(), "4231");
    assert_eq!(client.receiver_mode(), Some(ReceiverMode::Idle));
    let rtp_port = client.rtp_port().unwrap();

    client.play().unwrap();
    assert_eq!(client.state(), SessionState::Playing);
    assert_eq!(client.receiver_mode(), Some(ReceiverMode::Active));

    client.pause().unwrap();
    assert_eq!(client.state(), SessionState::Paused);
    assert_eq!(client.receiver_mode(), Some(ReceiverMode::Idle));

    client.teardown().unwrap();
    assert_eq!(client.state(), SessionState::Disconnected);
    assert_eq!(client.receiver_mode(), None);
    assert_eq!(client.session_id(), "");

    let requests = server.join().unwrap();
    let methods: Vec<&str> = requests
        .iter()
        .map(|r| r.split(' ').next().unwrap())
        .collect();
    assert_eq!(methods, ["DESCRIBE", "SETUP", "PLAY", "PAUSE", "TEARDOWN"]);

    for (expected, request) in requests.iter().enumerate() {
        assert_eq!(cseq_of(request), expected as u32);
    }
    assert!(!requests[0].contains("Session:"));
    assert_eq!(client_port_of(&requests[1]), rtp_port);
    for request in &requests[2..] {
        assert!(request.contains("Session: 4231\r\n"), "{request}");
    }
}

#[test]
fn frames_arrive_in_order_with_display_indices() {
    let first = jpeg(b"frame zero");
    let second = jpeg(b"frame one");
    let mut stream = RawPacket::encode(&first).unwrap();
    stream.extend_from_slice(&RawPacket::encode(&second).unwrap());

    let mut client_port = 0;
    let (port, server) = spawn_server(move |index, request| {
        if request.starts_with("SETUP") {
            client_port = client_port_of(request);
        }
        if request.starts_with("PLAY") {
            let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
            for chunk in stream.chunks(7) {
                socket.send_to(chunk, ("127.0.0.1", client_port)).unwrap();
            }
        }
        session_server(index, request)
    });

    let mut client = RtspClient::new(config(port));
    client.connect().unwrap();
    client.describe_and_authenticate().unwrap();
    client.setup().unwrap();
    assert!(client.pull_next_frame().is_none());
    client.play().unwrap();

    let frames = pull_frames(&mut client, 2);
    assert_eq!(
        frames,
        vec![
            Frame {
                payload: first,
                index: 0
            },
            Frame {
                payload: second,
                index: 1
            },
        ]
    );
    assert_eq!(client.receiver_stats().frames(), 2);
    assert_eq!(client.receiver_stats().framing_errors(), 0);

    client.teardown().unwrap();
    server.join().unwrap();
}

#[test]
fn play_then_pause_without_data_leaves_queue_empty() {
    let (port, server) = spawn_server(session_server);

    let mut client = RtspClient::new(config(port));
    client.connect().unwrap();
    client.describe_and_authenticate().unwrap();
    client.setup().unwrap();
    client.play().unwrap();
    client.pause().unwrap();

    assert!(client.pull_next_frame().is_none());
    assert_eq!(client.receiver_mode(), Some(ReceiverMode::Idle));
    assert!(!client.session().is_receiving());

    client.close();
    server.join().unwrap();
}

#[test]
fn rejected_setup_releases_receiver() {
    let (port, server) = spawn_server(|index, request| match index {
        0 => ok(cseq_of(request)),
        _ => RtspResponse::Failure {
            cseq: cseq_of(request),
            status_code: 454,
            reason: "Session Not Found".to_string(),
        }
        .encode(),
    });

    let mut client = RtspClient::new(config(port));
    client.connect().unwrap();
    client.describe_and_authenticate().unwrap();
    let err = client.setup().unwrap_err();
    assert!(matches!(err, RtspError::SetupRejected(_)));
    assert_eq!(client.state(), SessionState::Described);
    assert_eq!(client.rtp_port(), None);

    client.close();
    server.join().unwrap();
}

#[test]
fn out_of_order_operations_send_nothing() {
    let (port, server) = spawn_server(session_server);

    let mut client = RtspClient::new(config(port));
    assert!(matches!(
        client.describe_and_authenticate(),
        Err(RtspError::InvalidState { .. })
    ));

    client.connect().unwrap();
    client.connect().unwrap();
    assert!(matches!(
        client.play(),
        Err(RtspError::InvalidState {
            operation: "play",
            state: SessionState::Connected
        })
    ));
    assert!(matches!(client.pause(), Err(RtspError::InvalidState { .. })));
    assert_eq!(client.session().next_cseq(), 0);

    client.close();
    assert!(server.join().unwrap().is_empty());
}

#[test]
fn strict_cseq_rejects_stale_response() {
    let (port, server) = spawn_server(|_, _| ok(41));

    let mut cfg = config(port);
    cfg.strict_cseq = true;
    let mut client = RtspClient::new(cfg);
    client.connect().unwrap();
    let err = client.describe_and_authenticate().unwrap_err();
    assert!(matches!(
        err,
        RtspError::SequenceMismatch {
            expected: 0,
            received: 41
        }
    ));

    client.close();
    server.join().unwrap();
}

#[test]
fn lenient_cseq_passes_mismatch_through() {
    let (port, server) = spawn_server(|_, _| ok(41));

    let mut client = RtspClient::new(config(port));
    client.connect().unwrap();
    let response = client.describe_and_authenticate().unwrap();
    assert_eq!(response.cseq(), 41);

    client.close();
    server.join().unwrap();
}

#[test]
fn teardown_resets_even_when_server_hangs_up() {
    let (port, server) = spawn_server(|index, request| match index {
        0 => ok(cseq_of(request)),
        _ => Vec::new(),
    });

    let mut client = RtspClient::new(config(port));
    client.connect().unwrap();
    client.describe_and_authenticate().unwrap();

    let err = client.teardown().unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(client.state(), SessionState::Disconnected);
    assert_eq!(client.session().next_cseq(), 2);

    server.join().unwrap();
}

#[test]
fn unparsable_response_leaves_state_unchanged() {
    let (port, server) = spawn_server(|_, _| b"HTTP/1.1 200 OK\r\n\r\n".to_vec());

    let mut client = RtspClient::new(config(port));
    client.connect().unwrap();
    let err = client.describe_and_authenticate().unwrap_err();
    assert!(matches!(err, RtspError::UnparsableResponse(_)));
    assert_eq!(client.state(), SessionState::Connected);

    client.close();
    server.join().unwrap();
}

#[test]
fn interrupted_handshake_starts_over_on_next_describe() {
    let (port, server) = spawn_server(|index, request| {
        let cseq = cseq_of(request);
        match index {
            0 => challenge(cseq),
            1 => b"GARBAGE\r\n\r\n".to_vec(),
            2 => RtspResponse::Unauthorized {
                cseq,
                auth_method: "Digest".to_string(),
                realm: "demo".to_string(),
                nonce: "fresh".to_string(),
            }
            .encode(),
            _ => ok(cseq),
        }
    });

    let mut client = RtspClient::new(config(port).with_credentials("admin", "secret"));
    client.connect().unwrap();
    let err = client.describe_and_authenticate().unwrap_err();
    assert!(matches!(err, RtspError::UnparsableResponse(_)));
    assert_eq!(client.state(), SessionState::Connected);

    let response = client.describe_and_authenticate().unwrap();
    assert_eq!(response, RtspResponse::OkNoSession { cseq: 3 });
    assert_eq!(client.state(), SessionState::Described);

    client.close();
    let requests = server.join().unwrap();
    assert_eq!(requests.len(), 4);
    assert!(!requests[2].contains("Authorization:"));
    let uri = "rtsp://127.0.0.1/movie.Mjpeg";
    let expected = digest_response("admin", "secret", "demo", "DESCRIBE", uri, "fresh");
    assert!(requests[3].contains(&format!("response=\"{expected}\"")));
}
