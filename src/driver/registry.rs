//! Per-packet-id handler table

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::types::{Packet, PacketId};

/// Shared packet handler
pub type Handler = Arc<dyn Fn(&Packet) + Send + Sync>;

/// At most one handler per packet id.
///
/// Reads take a shared lock and clone the handler out, so a handler runs
/// without any lock held and may itself register or unregister handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<PacketId, Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handler` for `packet_id`, returning whether one was replaced.
    pub fn register(&self, packet_id: PacketId, handler: Handler) -> bool {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(packet_id, handler)
            .is_some()
    }

    /// Remove the handler for `packet_id`, returning whether one existed.
    pub fn unregister(&self, packet_id: PacketId) -> bool {
        self.handlers.write().unwrap_or_else(PoisonError::into_inner).remove(&packet_id).is_some()
    }

    pub fn get(&self, packet_id: PacketId) -> Option<Handler> {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).get(&packet_id).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
