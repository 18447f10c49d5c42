//! Device session: background reader, heartbeat liveness and packet sending.
//!
//! A [`Session`] owns two tasks for its lifetime:
//!
//! - the reader, which resynchronizes on the frame delimiter, decodes complete
//!   frames and hands each non-empty batch to a [`PacketSink`]
//! - the heartbeat monitor, which re-evaluates the [`ConnectionState`] every
//!   `timeout / 2`
//!
//! On start the session asks the device to report its model number once per
//! second; those reports are the heartbeat.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::protocol;
use crate::transport::Transport;
use crate::types::{DeviceId, Packet, PacketId};
use crate::{ReachError, Result};

mod monitor;
mod reader;
#[cfg(test)]
mod tests;

pub use monitor::{ConnectionState, LinkMonitor};

/// Receiver of decoded packet batches.
///
/// Implemented for any `Fn(Vec<Packet>)` closure. Delivery may await; while it
/// does, the reader does not consume more input.
#[async_trait::async_trait]
pub trait PacketSink: Send + Sync + 'static {
    async fn deliver(&self, packets: Vec<Packet>);
}

#[async_trait::async_trait]
impl<F> PacketSink for F
where
    F: Fn(Vec<Packet>) + Send + Sync + 'static,
{
    async fn deliver(&self, packets: Vec<Packet>) {
        self(packets)
    }
}

/// Session tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Heartbeat age after which the device is considered disconnected
    pub session_timeout: Duration,
    /// Size of the rolling read buffer; frames longer than this are discarded
    pub max_read_bytes: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { session_timeout: Duration::from_secs(3), max_read_bytes: 1024 }
    }
}

/// Cloneable handle that encodes and writes packets.
#[derive(Clone)]
pub struct PacketWriter {
    transport: Arc<dyn Transport>,
}

impl PacketWriter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Encode `packet` and write it in one transport write.
    pub async fn send(&self, packet: &Packet) -> Result<()> {
        let frame = protocol::encode(packet);
        let written = self
            .transport
            .write(&frame)
            .await
            .map_err(|e| ReachError::transport_error("write", e))?;

        if written != frame.len() {
            return Err(ReachError::transport_error(
                "write",
                std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    format!("short write: {} of {} bytes", written, frame.len()),
                ),
            ));
        }

        Ok(())
    }
}

/// Live session with a device.
pub struct Session {
    writer: PacketWriter,
    monitor: Arc<LinkMonitor>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Start the reader and heartbeat monitor, then enable the device heartbeat.
    ///
    /// Fails if the heartbeat setup packets cannot be written; the background
    /// tasks are shut down before the error is returned.
    pub async fn start<S: PacketSink>(
        transport: Arc<dyn Transport>,
        sink: S,
        options: SessionOptions,
    ) -> Result<Self> {
        let monitor = Arc::new(LinkMonitor::new(options.session_timeout));
        let cancel = CancellationToken::new();

        let reader = tokio::spawn(reader::read_loop(
            Arc::clone(&transport),
            sink,
            Arc::clone(&monitor),
            options.max_read_bytes,
            cancel.clone(),
        ));
        let heartbeat = tokio::spawn(monitor::watch_liveness(Arc::clone(&monitor), cancel.clone()));

        let session = Self {
            writer: PacketWriter::new(transport),
            monitor,
            cancel,
            tasks: vec![reader, heartbeat],
        };

        let setup = async {
            session.disable_heartbeat().await?;
            // 1 Hz is the slowest rate the device supports
            session.enable_heartbeat(1).await
        }
        .await;

        if let Err(e) = setup {
            warn!("Failed to enable device heartbeat: {}", e);
            session.shutdown().await;
            return Err(e);
        }

        info!(timeout = ?options.session_timeout, "Session started");
        Ok(session)
    }

    /// Send a packet immediately.
    pub async fn send(&self, packet: &Packet) -> Result<()> {
        self.writer.send(packet).await
    }

    /// Handle for sending from other tasks.
    pub fn writer(&self) -> PacketWriter {
        self.writer.clone()
    }

    /// Ask the device to report its model number at `frequency` Hz.
    pub async fn enable_heartbeat(&self, frequency: u8) -> Result<()> {
        let select = Packet::new(PacketId::HEARTBEAT_SET, DeviceId::ALL, vec![reader::HEARTBEAT_PACKET.value()])?;
        self.send(&select).await?;
        self.set_heartbeat_rate(frequency).await
    }

    /// Stop any periodic report the device is currently sending.
    pub async fn disable_heartbeat(&self) -> Result<()> {
        self.set_heartbeat_rate(0).await
    }

    async fn set_heartbeat_rate(&self, frequency: u8) -> Result<()> {
        let rate = Packet::new(PacketId::HEARTBEAT_FREQUENCY, DeviceId::ALL, vec![frequency])?;
        self.send(&rate).await
    }

    /// Whether the session is running and the device heartbeat is current.
    pub fn connected(&self) -> bool {
        !self.cancel.is_cancelled() && self.monitor.state().is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.monitor.state()
    }

    /// Receiver observing connection state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.monitor.subscribe()
    }

    /// Wait until the device is connected, failing after `timeout`.
    pub async fn wait_for_connection(&self, timeout: Duration) -> Result<()> {
        let mut rx = self.monitor.subscribe();
        match tokio::time::timeout(timeout, rx.wait_for(|state| state.is_connected())).await {
            Ok(Ok(_)) => Ok(()),
            // The sender lives in the monitor, which outlives this call
            Ok(Err(_)) | Err(_) => Err(ReachError::Timeout { duration: timeout }),
        }
    }

    /// Stop the reader and heartbeat monitor and wait for both to exit.
    pub async fn shutdown(mut self) {
        self.stop().await;
    }

    /// In-place form of [`shutdown`](Self::shutdown); calling it again is a no-op.
    pub(crate) async fn stop(&mut self) {
        self.cancel.cancel();
        let tasks = std::mem::take(&mut self.tasks);
        if tasks.is_empty() {
            return;
        }
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Session task ended abnormally: {}", e);
            }
        }
        info!("Session shut down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        debug!("Dropping session");
        // Cancel tasks on drop for clean shutdown
        self.cancel.cancel();
    }
}
