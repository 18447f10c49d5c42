//! Driver: packet dispatch, handlers and periodic requests on top of a session
//!
//! The session reader pushes every decoded packet into a bounded queue. A pool
//! of worker tasks pops packets and calls the handler registered for the packet
//! id. When the queue is full the reader waits for a free slot, so packets are
//! never dropped and the transport is simply read more slowly.
//!
//! ```rust,no_run
//! use reach::{DeviceId, Driver, DriverConfig, PacketId, UdpTransport};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> reach::Result<()> {
//! let transport = UdpTransport::connect("192.168.2.3:6789").await?;
//! let driver = Driver::start(transport, DriverConfig::default()).await?;
//!
//! driver.register_callback(PacketId::POSITION, |packet| {
//!     if let Ok(position) = packet.value::<f32>() {
//!         println!("{}: {}", packet.device_id(), position);
//!     }
//! });
//! driver.request_at_rate(&[PacketId::POSITION], DeviceId::ALL, Duration::from_millis(100))?;
//! # driver.shutdown().await;
//! # Ok(())
//! # }
//! ```

use futures::{Stream, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::DriverConfig;
use crate::session::{ConnectionState, PacketSink, PacketWriter, Session};
use crate::stream::ThrottleExt;
use crate::transport::Transport;
use crate::types::{DeviceId, Packet, PacketId, UpdateRate};
use crate::{ReachError, Result};

mod periodic;
mod registry;

pub use periodic::PeriodicTask;
pub use registry::{Handler, HandlerRegistry};

/// Buffered packets per subscriber before it starts skipping
const SUBSCRIBER_CAPACITY: usize = 256;

/// Identifies a periodic request for later cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request#{}", self.0)
    }
}

/// Dispatch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DriverStats {
    /// Packets taken off the queue by a worker
    pub dispatched: u64,
    /// Dispatched packets with no registered handler
    pub unhandled: u64,
}

struct PendingRequest {
    packet_ids: Vec<PacketId>,
    device_id: DeviceId,
    task: PeriodicTask,
}

struct Shared {
    registry: HandlerRegistry,
    events: broadcast::Sender<Packet>,
    dispatched: AtomicU64,
    unhandled: AtomicU64,
}

impl Shared {
    fn dispatch(&self, packet: Packet) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);

        match self.registry.get(packet.packet_id()) {
            Some(handler) => {
                if std::panic::catch_unwind(AssertUnwindSafe(|| handler(&packet))).is_err() {
                    error!(packet_id = %packet.packet_id(), "Packet handler panicked");
                }
            }
            None => {
                self.unhandled.fetch_add(1, Ordering::Relaxed);
                trace!(packet_id = %packet.packet_id(), device_id = %packet.device_id(), "No handler for packet");
            }
        }

        if self.events.receiver_count() > 0 {
            let _ = self.events.send(packet);
        }
    }
}

/// Session sink that feeds the dispatch queue
struct QueueSink {
    queue: mpsc::Sender<Packet>,
}

#[async_trait::async_trait]
impl PacketSink for QueueSink {
    async fn deliver(&self, packets: Vec<Packet>) {
        for packet in packets {
            // Waits while the queue is full
            if self.queue.send(packet).await.is_err() {
                debug!("Dispatch queue closed, dropping batch");
                return;
            }
        }
    }
}

/// Client for one device link.
///
/// Handlers run on the worker pool. With more than one worker, handlers for
/// different packets (including packets with the same id) may run at the same
/// time; any state a handler captures must be synchronized by the caller.
pub struct Driver {
    session: Session,
    writer: PacketWriter,
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    requests: Mutex<HashMap<RequestId, PendingRequest>>,
    next_request: AtomicU64,
    cancel: CancellationToken,
}

impl Driver {
    /// Start a session on `transport` and the dispatch workers.
    pub async fn start<T: Transport>(transport: T, config: DriverConfig) -> Result<Self> {
        Self::start_shared(Arc::new(transport), config).await
    }

    /// Like [`start`](Self::start) for a transport that is already shared.
    pub async fn start_shared(transport: Arc<dyn Transport>, config: DriverConfig) -> Result<Self> {
        config.validate()?;

        let (queue_tx, queue_rx) = mpsc::channel(config.queue_size);
        let queue_rx = Arc::new(tokio::sync::Mutex::new(queue_rx));
        let (events, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        let shared = Arc::new(Shared {
            registry: HandlerRegistry::new(),
            events,
            dispatched: AtomicU64::new(0),
            unhandled: AtomicU64::new(0),
        });
        let cancel = CancellationToken::new();

        let workers = (0..config.workers)
            .map(|worker| {
                tokio::spawn(dispatch_worker(
                    worker,
                    Arc::clone(&queue_rx),
                    Arc::clone(&shared),
                    cancel.clone(),
                ))
            })
            .collect();

        let session =
            match Session::start(transport, QueueSink { queue: queue_tx }, config.session_options()).await {
                Ok(session) => session,
                Err(e) => {
                    cancel.cancel();
                    return Err(e);
                }
            };

        info!(workers = config.workers, queue_size = config.queue_size, "Driver started");

        Ok(Self {
            writer: session.writer(),
            session,
            shared,
            workers,
            requests: Mutex::new(HashMap::new()),
            next_request: AtomicU64::new(1),
            cancel,
        })
    }

    /// Install the handler for `packet_id`, returning whether one was replaced.
    pub fn register_callback<F>(&self, packet_id: PacketId, handler: F) -> bool
    where
        F: Fn(&Packet) + Send + Sync + 'static,
    {
        let replaced = self.shared.registry.register(packet_id, Arc::new(handler));
        debug!(%packet_id, replaced, "Registered packet handler");
        replaced
    }

    /// Remove the handler for `packet_id`, returning whether one existed.
    pub fn unregister_callback(&self, packet_id: PacketId) -> bool {
        self.shared.registry.unregister(packet_id)
    }

    /// Number of packet ids with an installed handler.
    pub fn handler_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Encode and write `packet` immediately.
    pub async fn send(&self, packet: &Packet) -> Result<()> {
        self.writer.send(packet).await
    }

    /// Build a packet from its parts and send it.
    pub async fn send_packet(&self, packet_id: PacketId, device_id: DeviceId, payload: Vec<u8>) -> Result<()> {
        let packet = Packet::new(packet_id, device_id, payload)?;
        self.send(&packet).await
    }

    /// Ask `device_id` to report each of `packet_ids` once.
    pub async fn request(&self, packet_ids: &[PacketId], device_id: DeviceId) -> Result<()> {
        let packet = request_packet(packet_ids, device_id)?;
        self.send(&packet).await
    }

    /// Repeat [`request`](Self::request) every `period`, starting now.
    ///
    /// Failed sends are logged and retried on the next tick. The request runs
    /// until [`cancel_request`](Self::cancel_request) or shutdown.
    pub fn request_at_rate(
        &self,
        packet_ids: &[PacketId],
        device_id: DeviceId,
        period: Duration,
    ) -> Result<RequestId> {
        if period.is_zero() {
            return Err(ReachError::config_error("request period must be positive"));
        }
        let packet = request_packet(packet_ids, device_id)?;

        let id = RequestId(self.next_request.fetch_add(1, Ordering::Relaxed));
        let writer = self.writer.clone();
        let task = PeriodicTask::spawn(period, self.cancel.child_token(), move || {
            let writer = writer.clone();
            let packet = packet.clone();
            async move {
                if let Err(e) = writer.send(&packet).await {
                    warn!(request = %id, "Periodic request failed: {}", e);
                }
            }
        });

        info!(request = %id, ?packet_ids, %device_id, ?period, "Periodic request started");
        self.lock_requests()
            .insert(id, PendingRequest { packet_ids: packet_ids.to_vec(), device_id, task });
        Ok(id)
    }

    /// Stop a periodic request, returning whether it was active.
    pub fn cancel_request(&self, id: RequestId) -> bool {
        let Some(request) = self.lock_requests().remove(&id) else {
            return false;
        };
        request.task.cancel();
        debug!(request = %id, packet_ids = ?request.packet_ids, device_id = %request.device_id, "Periodic request cancelled");
        true
    }

    /// Number of periodic requests currently running.
    pub fn active_requests(&self) -> usize {
        self.lock_requests().values().filter(|request| !request.task.is_finished()).count()
    }

    /// Stream of dispatched packets with `packet_id`.
    ///
    /// `UpdateRate::Max(hz)` keeps only the latest packet per `1 / hz` interval.
    /// A subscriber that falls more than a few hundred packets behind skips
    /// the oldest ones. The stream ends when the driver shuts down.
    pub fn subscribe(
        &self,
        packet_id: PacketId,
        rate: UpdateRate,
    ) -> impl Stream<Item = Packet> + Send + Unpin + 'static {
        let packets = BroadcastStream::new(self.shared.events.subscribe()).filter_map(move |item| async move {
            match item {
                Ok(packet) if packet.packet_id() == packet_id => Some(packet),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(%packet_id, skipped, "Subscriber lagging, packets skipped");
                    None
                }
            }
        });

        match rate.throttle_interval() {
            None => packets.boxed(),
            Some(interval) => packets.throttle(interval).boxed(),
        }
    }

    /// Whether the device heartbeat is current.
    pub fn connected(&self) -> bool {
        self.session.connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session.connection_state()
    }

    /// Wait for the first heartbeat, failing after `timeout`.
    pub async fn wait_for_connection(&self, timeout: Duration) -> Result<()> {
        self.session.wait_for_connection(timeout).await
    }

    pub fn stats(&self) -> DriverStats {
        DriverStats {
            dispatched: self.shared.dispatched.load(Ordering::Relaxed),
            unhandled: self.shared.unhandled.load(Ordering::Relaxed),
        }
    }

    /// Stop periodic requests, then the session, then let the workers drain
    /// the queue and wait for them.
    pub async fn shutdown(mut self) {
        info!("Driver shutting down");

        let requests: Vec<_> = self.lock_requests().drain().map(|(_, request)| request).collect();
        for request in requests {
            request.task.stop().await;
        }

        // Dropping the reader's sink closes the queue
        self.session.stop().await;

        for worker in std::mem::take(&mut self.workers) {
            if let Err(e) = worker.await {
                warn!("Dispatch worker ended abnormally: {}", e);
            }
        }

        let stats = self.stats();
        info!(dispatched = stats.dispatched, unhandled = stats.unhandled, "Driver shut down");
    }

    fn lock_requests(&self) -> std::sync::MutexGuard<'_, HashMap<RequestId, PendingRequest>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        debug!("Dropping driver");
        // Periodic tasks hold child tokens
        self.cancel.cancel();
    }
}

fn request_packet(packet_ids: &[PacketId], device_id: DeviceId) -> Result<Packet> {
    let payload = packet_ids.iter().map(|id| id.value()).collect();
    Packet::new(PacketId::REQUEST, device_id, payload)
}

/// Pop packets until the queue closes or the driver is cancelled.
///
/// Packets already queued when cancellation arrives are still dispatched.
async fn dispatch_worker(
    worker: usize,
    queue: Arc<tokio::sync::Mutex<mpsc::Receiver<Packet>>>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    debug!(worker, "Dispatch worker started");
    let mut handled = 0u64;

    loop {
        let next = tokio::select! {
            biased;
            packet = async { queue.lock().await.recv().await } => packet,
            _ = cancel.cancelled() => None,
        };

        let Some(packet) = next else { break };
        shared.dispatch(packet);
        handled += 1;
    }

    // Cancellation can win while another worker holds the queue
    loop {
        let next = queue.lock().await.try_recv();
        let Ok(packet) = next else { break };
        shared.dispatch(packet);
        handled += 1;
    }

    debug!(worker, handled, "Dispatch worker stopped");
}
