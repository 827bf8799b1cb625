//! Background RTP receive loop.
//!
//! The receiver owns the UDP socket and a thread that runs independently of
//! the control connection. It is either [`Idle`](ReceiverMode::Idle) (waiting
//! on a condition variable, with a bounded timeout) or
//! [`Active`](ReceiverMode::Active) (receiving datagrams and assembling
//! units). Complete payloads go into an mpsc channel in arrival order.
//! Malformed units are logged, counted in [`ReceiverStats`] and dropped;
//! nothing on the data path stops the loop except [`RtpReceiver::stop`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, RtspError};
use crate::media::rtp::UnitAssembler;
use crate::transport::UdpTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverMode {
    Idle,
    Active,
    Stopped,
}

/// Data-path counters, shared with the receive thread.
#[derive(Debug, Default)]
pub struct ReceiverStats {
    datagrams: AtomicU64,
    bytes: AtomicU64,
    frames: AtomicU64,
    framing_errors: AtomicU64,
}

impl ReceiverStats {
    pub fn datagrams(&self) -> u64 {
        self.datagrams.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Units assembled and queued.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Units discarded because of a [`FramingError`](crate::error::FramingError).
    pub fn framing_errors(&self) -> u64 {
        self.framing_errors.load(Ordering::Relaxed)
    }
}

struct Shared {
    mode: Mutex<ReceiverMode>,
    changed: Condvar,
}

/// Tuning for the receive thread.
#[derive(Debug, Clone, Copy)]
pub struct ReceiverOptions {
    /// Bound on how long the loop blocks before re-checking its mode.
    pub poll_interval: Duration,
    /// Size of the datagram receive buffer.
    pub recv_buffer_size: usize,
}

/// Handle to the receive thread and its frame queue.
///
/// Dropping the handle stops the thread and closes the socket.
pub struct RtpReceiver {
    shared: Arc<Shared>,
    frames: mpsc::Receiver<Vec<u8>>,
    local_addr: SocketAddr,
    handle: Option<JoinHandle<()>>,
}

impl RtpReceiver {
    /// Bind `host:port` and start the thread in [`ReceiverMode::Idle`].
    pub fn start(
        host: &str,
        port: u16,
        options: ReceiverOptions,
        stats: Arc<ReceiverStats>,
    ) -> Result<Self> {
        let socket = UdpTransport::bind(host, port, options.poll_interval)?;
        let local_addr = socket.local_addr()?;

        let shared = Arc::new(Shared {
            mode: Mutex::new(ReceiverMode::Idle),
            changed: Condvar::new(),
        });
        let (tx, frames) = mpsc::channel();

        let thread_shared = shared.clone();
        let handle = thread::Builder::new()
            .name("rtp-receiver".to_string())
            .spawn(move || receive_loop(socket, thread_shared, tx, stats, options))
            .map_err(RtspError::RtpSocket)?;

        tracing::info!(%local_addr, "RTP receiver listening");

        Ok(Self {
            shared,
            frames,
            local_addr,
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn mode(&self) -> ReceiverMode {
        *self.shared.mode.lock()
    }

    /// Switch between `Active` and `Idle`. No effect once stopped.
    pub fn set_active(&self, active: bool) {
        let mut mode = self.shared.mode.lock();
        if *mode == ReceiverMode::Stopped {
            return;
        }
        let next = if active {
            ReceiverMode::Active
        } else {
            ReceiverMode::Idle
        };
        if *mode != next {
            tracing::debug!(old_mode = ?*mode, new_mode = ?next, "receiver mode change");
            *mode = next;
            self.shared.changed.notify_all();
        }
    }

    /// Next assembled payload, if one is queued. Never blocks.
    pub fn try_recv_frame(&self) -> Option<Vec<u8>> {
        self.frames.try_recv().ok()
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop(&mut self) {
        {
            let mut mode = self.shared.mode.lock();
            *mode = ReceiverMode::Stopped;
            self.shared.changed.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("RTP receiver thread panicked");
            }
            tracing::info!(local_addr = %self.local_addr, "RTP receiver stopped");
        }
    }
}

impl Drop for RtpReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn receive_loop(
    socket: UdpTransport,
    shared: Arc<Shared>,
    tx: mpsc::Sender<Vec<u8>>,
    stats: Arc<ReceiverStats>,
    options: ReceiverOptions,
) {
    let mut buf = vec![0u8; options.recv_buffer_size];
    let mut assembler = UnitAssembler::new();

    loop {
        {
            let mut mode = shared.mode.lock();
            if *mode != ReceiverMode::Active && assembler.pending() > 0 {
                tracing::debug!(
                    pending = assembler.pending(),
                    "receiver paused, dropping partial unit"
                );
                assembler.reset();
            }
            while *mode == ReceiverMode::Idle {
                shared.changed.wait_for(&mut mode, options.poll_interval);
            }
            if *mode == ReceiverMode::Stopped {
                break;
            }
        }

        let n = match socket.recv(&mut buf) {
            Ok(Some(n)) => n,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "RTP receive failed");
                thread::sleep(options.poll_interval);
                continue;
            }
        };

        stats.datagrams.fetch_add(1, Ordering::Relaxed);
        stats.bytes.fetch_add(n as u64, Ordering::Relaxed);
        tracing::trace!(bytes = n, pending = assembler.pending(), "datagram received");

        for unit in assembler.push(&buf[..n]) {
            match unit {
                Ok(payload) => {
                    stats.frames.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(bytes = payload.len(), "frame assembled");
                    if tx.send(payload).is_err() {
                        tracing::debug!("frame queue closed, receive loop exiting");
                        return;
                    }
                }
                Err(e) => {
                    stats.framing_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(error = %e, "discarding malformed unit");
                }
            }
        }
    }

    tracing::debug!("receive loop exited");
}
