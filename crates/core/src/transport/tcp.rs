use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::protocol::RtspResponse;

/// Upper bound on a response head, to stop a misbehaving server from
/// growing the buffer without limit.
const MAX_RESPONSE_HEAD: usize = 64 * 1024;

/// Upper bound on an announced `Content-Length`.
const MAX_RESPONSE_BODY: usize = 1024 * 1024;

/// The RTSP control connection.
///
/// Reads use a short socket timeout (`poll_interval`) and are retried
/// until a whole response has arrived or `response_timeout` passes, so a
/// blocked caller still wakes up regularly. Bytes received before a
/// timeout are kept for the next attempt.
pub struct ControlConnection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    peer_addr: SocketAddr,
    response_timeout: Duration,
}

impl ControlConnection {
    /// Connect and apply the timeout policy.
    pub fn connect(
        host: &str,
        port: u16,
        poll_interval: Duration,
        response_timeout: Duration,
    ) -> Result<Self> {
        let mut last_error = None;
        let mut stream = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, response_timeout) {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => last_error = Some(e),
            }
        }
        let stream = match (stream, last_error) {
            (Some(stream), _) => stream,
            (None, Some(e)) => return Err(e.into()),
            (None, None) => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{host}:{port} did not resolve to any address"),
                )
                .into());
            }
        };

        stream.set_read_timeout(Some(poll_interval))?;
        stream.set_write_timeout(Some(response_timeout))?;
        stream.set_nodelay(true)?;

        let peer_addr = stream.peer_addr()?;
        let reader = BufReader::new(stream.try_clone()?);

        tracing::info!(%peer_addr, "control connection established");

        Ok(Self {
            reader,
            writer: stream,
            peer_addr,
            response_timeout,
        })
    }

    pub fn send(&mut self, request: &[u8]) -> Result<()> {
        self.writer.write_all(request)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Read one response: the head up to the blank line, plus a body if a
    /// `Content-Length` header announces one.
    ///
    /// Some servers never send the blank line. If the server goes quiet for
    /// a poll interval and the lines buffered so far already decode as a
    /// response, that is taken as the end of the head.
    pub fn read_response(&mut self) -> Result<Vec<u8>> {
        let deadline = Instant::now() + self.response_timeout;
        let mut response = Vec::new();
        let mut line_start = 0;

        loop {
            match self.reader.read_until(b'\n', &mut response) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "control connection closed by server",
                    )
                    .into());
                }
                Ok(_) if response.ends_with(b"\n") => {
                    let line = &response[line_start..];
                    if line == b"\r\n" || line == b"\n" {
                        // Skip stray blank lines between messages.
                        if line_start == 0 {
                            response.clear();
                            continue;
                        }
                        break;
                    }
                    line_start = response.len();
                }
                Ok(_) => {}
                Err(e) if is_timeout(&e) => {
                    if line_start > 0
                        && line_start == response.len()
                        && RtspResponse::parse(&response).is_ok()
                    {
                        tracing::debug!(
                            peer = %self.peer_addr,
                            "response head ended without blank line"
                        );
                        break;
                    }
                }
                Err(e) => return Err(e.into()),
            }

            if response.len() > MAX_RESPONSE_HEAD {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "response head exceeds size limit",
                )
                .into());
            }
            if Instant::now() >= deadline {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "timed out waiting for response",
                )
                .into());
            }
        }

        if let Some(length) = content_length(&response) {
            if length > MAX_RESPONSE_BODY {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("announced body of {length} bytes exceeds size limit"),
                )
                .into());
            }
            let mut body = vec![0u8; length];
            let mut filled = 0;
            while filled < length {
                match self.reader.read(&mut body[filled..]) {
                    Ok(0) => {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "control connection closed mid-body",
                        )
                        .into());
                    }
                    Ok(n) => filled += n,
                    Err(e) if is_timeout(&e) => {
                        if Instant::now() >= deadline {
                            return Err(io::Error::new(
                                io::ErrorKind::TimedOut,
                                "timed out waiting for response body",
                            )
                            .into());
                        }
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            response.extend_from_slice(&body);
        }

        tracing::trace!(peer = %self.peer_addr, bytes = response.len(), "response received");
        Ok(response)
    }

    /// Close both directions. Errors are ignored; the peer may be gone.
    pub fn shutdown(self) {
        let _ = self.writer.shutdown(Shutdown::Both);
        tracing::info!(peer_addr = %self.peer_addr, "control connection closed");
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

fn content_length(head: &[u8]) -> Option<usize> {
    String::from_utf8_lossy(head)
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .filter(|&length| length > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RtspError;
    use std::net::TcpListener;
    use std::thread;

    fn pair() -> (ControlConnection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = thread::spawn(move || listener.accept().unwrap().0);
        let conn = ControlConnection::connect(
            "127.0.0.1",
            port,
            Duration::from_millis(20),
            Duration::from_secs(2),
        )
        .unwrap();
        (conn, accept.join().unwrap())
    }

    #[test]
    fn reads_response_split_across_writes() {
        let (mut conn, mut server) = pair();
        let writer = thread::spawn(move || {
            server.write_all(b"RTSP/1.0 200 OK\r\nCS").unwrap();
            thread::sleep(Duration::from_millis(60));
            server.write_all(b"eq: 1\r\n\r\n").unwrap();
            server
        });
        let response = conn.read_response().unwrap();
        assert_eq!(response, b"RTSP/1.0 200 OK\r\nCSeq: 1\r\n\r\n");
        writer.join().unwrap();
    }

    #[test]
    fn reads_body_by_content_length() {
        let (mut conn, mut server) = pair();
        server
            .write_all(b"RTSP/1.0 200 OK\r\nCSeq: 1\r\nContent-Length: 5\r\n\r\nv=0\r\n")
            .unwrap();
        let response = conn.read_response().unwrap();
        assert!(response.ends_with(b"\r\n\r\nv=0\r\n"));
    }

    #[test]
    fn oversized_content_length_is_rejected() {
        let (mut conn, mut server) = pair();
        server
            .write_all(
                b"RTSP/1.0 200 OK\r\nCSeq: 0\r\nContent-Length: 18446744073709551615\r\n\r\n",
            )
            .unwrap();
        let err = conn.read_response().unwrap_err();
        assert!(matches!(
            err,
            RtspError::Connection(ref e) if e.kind() == io::ErrorKind::InvalidData
        ));
    }

    #[test]
    fn head_without_blank_line_completes_after_quiet_period() {
        let (mut conn, mut server) = pair();
        server
            .write_all(b"RTSP/1.0 200 OK\r\nCSeq: 0\r\nSession: 123\r\n")
            .unwrap();
        let started = Instant::now();
        let response = conn.read_response().unwrap();
        assert_eq!(response, b"RTSP/1.0 200 OK\r\nCSeq: 0\r\nSession: 123\r\n");
        assert!(started.elapsed() < Duration::from_secs(1));
        drop(server);
    }

    #[test]
    fn undecodable_head_without_blank_line_still_times_out() {
        let (mut conn, mut server) = pair();
        server.write_all(b"RTSP/1.0 200 OK\r\n").unwrap();
        let err = conn.read_response().unwrap_err();
        assert!(err.is_retryable());
        drop(server);
    }

    #[test]
    fn closed_connection_is_an_error() {
        let (mut conn, server) = pair();
        drop(server);
        assert!(conn.read_response().is_err());
    }

    #[test]
    fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let _accept = thread::spawn(move || listener.accept().unwrap());
        let mut conn = ControlConnection::connect(
            "127.0.0.1",
            port,
            Duration::from_millis(10),
            Duration::from_millis(100),
        )
        .unwrap();
        let err = conn.read_response().unwrap_err();
        assert!(err.is_retryable());
    }
}
