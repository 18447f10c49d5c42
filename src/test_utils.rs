//! Test utilities: an in-memory transport standing in for a device
//!
//! [`MockTransport`] implements [`Transport`] over channels. The paired
//! [`MockDevice`] handle plays the device side: it injects bytes or read
//! errors for the session reader and inspects every frame the session wrote.

#![cfg(any(test, feature = "benchmark"))]

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};

use crate::protocol::{decode_many, encode};
use crate::transport::Transport;
use crate::types::{DeviceId, Packet, PacketId};

enum ReadEvent {
    Data(Vec<u8>),
    Error(io::ErrorKind),
}

struct ReadSide {
    events: mpsc::UnboundedReceiver<ReadEvent>,
    leftover: Vec<u8>,
}

#[derive(Default)]
struct WriteLog {
    frames: Mutex<Vec<Vec<u8>>>,
    fail_writes: AtomicBool,
    written: Notify,
}

/// In-memory transport driven by a [`MockDevice`].
///
/// Reads wait for injected data and never report end of stream; an injected
/// chunk larger than the read buffer is served across several reads.
pub struct MockTransport {
    reads: tokio::sync::Mutex<ReadSide>,
    log: Arc<WriteLog>,
}

/// Device side of a [`MockTransport`].
#[derive(Clone)]
pub struct MockDevice {
    events: mpsc::UnboundedSender<ReadEvent>,
    log: Arc<WriteLog>,
}

impl MockTransport {
    pub fn new() -> (Self, MockDevice) {
        let (tx, rx) = mpsc::unbounded_channel();
        let log = Arc::new(WriteLog::default());
        let transport = Self {
            reads: tokio::sync::Mutex::new(ReadSide { events: rx, leftover: Vec::new() }),
            log: Arc::clone(&log),
        };
        (transport, MockDevice { events: tx, log })
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut side = self.reads.lock().await;

        if side.leftover.is_empty() {
            match side.events.recv().await {
                Some(ReadEvent::Data(bytes)) => side.leftover = bytes,
                Some(ReadEvent::Error(kind)) => return Err(io::Error::new(kind, "injected read error")),
                None => std::future::pending::<()>().await,
            }
        }

        let n = side.leftover.len().min(buf.len());
        buf[..n].copy_from_slice(&side.leftover[..n]);
        side.leftover.drain(..n);
        Ok(n)
    }

    async fn write(&self, bytes: &[u8]) -> io::Result<usize> {
        if self.log.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "injected write failure"));
        }

        self.log.frames.lock().unwrap_or_else(PoisonError::into_inner).push(bytes.to_vec());
        self.log.written.notify_waiters();
        Ok(bytes.len())
    }
}

impl MockDevice {
    /// Make `bytes` available to the next transport read.
    pub fn inject(&self, bytes: impl Into<Vec<u8>>) {
        let _ = self.events.send(ReadEvent::Data(bytes.into()));
    }

    /// Inject the encoded frame for `packet`.
    pub fn inject_packet(&self, packet: &Packet) {
        self.inject(encode(packet));
    }

    /// Inject a model-number report, which the session treats as a heartbeat.
    pub fn inject_heartbeat(&self) {
        let packet = Packet::new(PacketId::MODEL_NUMBER, DeviceId::ALL, vec![0x4C])
            .unwrap_or_else(|e| panic!("heartbeat packet is valid: {e}"));
        self.inject_packet(&packet);
    }

    /// Make the next transport read fail.
    pub fn inject_read_error(&self, kind: io::ErrorKind) {
        let _ = self.events.send(ReadEvent::Error(kind));
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.log.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Raw frames written so far, one entry per write.
    pub fn written_frames(&self) -> Vec<Vec<u8>> {
        self.log.frames.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Every packet written so far, decoded.
    pub fn written_packets(&self) -> Vec<Packet> {
        self.written_frames().iter().flat_map(|frame| decode_many(frame)).collect()
    }

    /// Written packets with the given id.
    pub fn written_with_id(&self, packet_id: PacketId) -> Vec<Packet> {
        self.written_packets().into_iter().filter(|p| p.packet_id() == packet_id).collect()
    }

    /// Wait until at least `count` writes happened, or `timeout` passes.
    pub async fn wait_for_writes(&self, count: usize, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.log.written.notified();
                if self.written_frames().len() >= count {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}
