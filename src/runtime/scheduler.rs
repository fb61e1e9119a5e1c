//! Render scheduling
//!
//! A render request is a flag, not a message: scheduling an instance that is
//! already pending does nothing, so any number of synchronous mutations
//! between two flushes collapse into one render that reads the latest state.

use crate::dom::NodeId;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct RenderQueue {
    order: Vec<NodeId>,
    pending: HashSet<NodeId>,
}

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `host` as needing a render; returns false when already pending
    pub fn schedule(&mut self, host: NodeId) -> bool {
        if !self.pending.insert(host) {
            return false;
        }
        self.order.push(host);
        true
    }

    pub fn is_pending(&self, host: NodeId) -> bool {
        self.pending.contains(&host)
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Drain pending hosts in scheduling order, clearing their flags
    ///
    /// Flags are cleared before any render runs, so a render that schedules
    /// its own instance again is queued for the next pass.
    pub fn take(&mut self) -> Vec<NodeId> {
        self.pending.clear();
        std::mem::take(&mut self.order)
    }

    /// Forget a host that has been unmounted
    pub fn cancel(&mut self, host: NodeId) {
        if self.pending.remove(&host) {
            self.order.retain(|h| *h != host);
        }
    }
}
