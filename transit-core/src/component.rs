//! Per-component location and in-flight bookkeeping.

use std::sync::Arc;

use transit_sync::Signal;

use crate::ids::DeviceId;

/// Where a component sits, and (while in flight) where it is headed.
///
/// `current_slot` is `None` for a freshly-admitted Add whose destination
/// slot has not yet been assigned — the sentinel "not yet resident" state
/// called out in the design notes, encoded as an `Option` rather than a
/// magic index.
#[derive(Debug)]
pub struct ComponentRecord {
    pub current_device: Option<DeviceId>,
    pub current_slot: Option<usize>,
    pub pending_dest_device: Option<DeviceId>,
    pub pending_dest_slot: Option<usize>,
    pub in_operation: bool,
    pub prepared: Arc<Signal>,
    /// Set only when this component was released as part of a cycle: the
    /// `prepared` primitive of the participant rotating into its own
    /// source slot, which it must observe before running `perform`. `None`
    /// means the ordinary slot-handoff discipline applies instead.
    pub predecessor_prepared: Option<Arc<Signal>>,
}

impl ComponentRecord {
    /// A component already resident on a device at construction time.
    pub fn resident(device: DeviceId, slot: usize) -> Self {
        Self {
            current_device: Some(device),
            current_slot: Some(slot),
            pending_dest_device: None,
            pending_dest_slot: None,
            in_operation: false,
            prepared: Arc::new(Signal::new(false)),
            predecessor_prepared: None,
        }
    }

    /// A component admitted via a fresh Add: it has a destination device
    /// but no slot yet, and is immediately in flight.
    pub fn pending_add(destination: DeviceId) -> Self {
        Self {
            current_device: Some(destination),
            current_slot: None,
            pending_dest_device: None,
            pending_dest_slot: None,
            in_operation: true,
            prepared: Arc::new(Signal::new(false)),
            predecessor_prepared: None,
        }
    }

    /// Rearm `prepared` for the transfer this component is about to take
    /// part in.
    pub fn rearm(&mut self) {
        self.prepared.rearm(false);
        self.predecessor_prepared = None;
    }
}
