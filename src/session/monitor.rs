//! Heartbeat liveness state machine

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Link state as derived from heartbeat arrivals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

#[derive(Debug)]
struct LinkStatus {
    state: ConnectionState,
    last_heartbeat: Option<Instant>,
}

/// Tracks when the last heartbeat arrived and derives the connection state.
///
/// The link starts Disconnected with no heartbeat seen. [`evaluate`](Self::evaluate)
/// moves it to Connected while the last heartbeat is at most `timeout` old and
/// back to Disconnected otherwise. State and timestamp live under one lock so
/// readers never observe a half-applied update; transitions are additionally
/// published on a watch channel.
#[derive(Debug)]
pub struct LinkMonitor {
    timeout: Duration,
    status: Mutex<LinkStatus>,
    state_tx: watch::Sender<ConnectionState>,
}

impl LinkMonitor {
    pub fn new(timeout: Duration) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            timeout,
            status: Mutex::new(LinkStatus { state: ConnectionState::Disconnected, last_heartbeat: None }),
            state_tx,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Record a heartbeat observed at `at`.
    pub fn record_heartbeat(&self, at: Instant) {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        // Batches can be processed out of arrival order; keep the newest stamp
        if status.last_heartbeat.is_none_or(|last| at > last) {
            status.last_heartbeat = Some(at);
        }
    }

    /// Re-derive the state at `now`, returning the new state on a transition.
    pub fn evaluate(&self, now: Instant) -> Option<ConnectionState> {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);

        let alive = status
            .last_heartbeat
            .is_some_and(|last| now.saturating_duration_since(last) <= self.timeout);
        let next = if alive { ConnectionState::Connected } else { ConnectionState::Disconnected };

        if next == status.state {
            return None;
        }

        status.state = next;
        self.state_tx.send_replace(next);
        Some(next)
    }

    pub fn state(&self) -> ConnectionState {
        self.status.lock().unwrap_or_else(PoisonError::into_inner).state
    }

    pub fn last_heartbeat(&self) -> Option<Instant> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner).last_heartbeat
    }

    /// Receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }
}

/// Re-evaluate the link every `timeout / 2` until cancelled, logging transitions.
pub(crate) async fn watch_liveness(monitor: Arc<LinkMonitor>, cancel: CancellationToken) {
    let period = (monitor.timeout() / 2).max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(?period, "Heartbeat monitor started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match monitor.evaluate(Instant::now()) {
            Some(ConnectionState::Connected) => info!("Device connection established"),
            Some(ConnectionState::Disconnected) => warn!(
                timeout = ?monitor.timeout(),
                "Device timeout: no heartbeat received within the session timeout"
            ),
            None => {}
        }
    }

    debug!("Heartbeat monitor stopped");
}
