//! Per-device occupancy bookkeeping.

use std::sync::Arc;

use transit_sync::Signal;

use crate::queue::WaitQueue;

/// Tracks slot occupancy and per-slot hand-off primitives for one device.
///
/// `free_slot_count` and `slot_reserved` reflect the *tentative* view: a
/// slot counts as free the instant a departing transfer is scheduled, not
/// when its `perform` actually completes. Physical exclusion between a
/// vacating and an arriving occupant of the same slot is enforced
/// separately, by `slot_handoff` (see [`Self::handoff_release`] and
/// [`Self::handoff_acquire`]).
#[derive(Debug)]
pub struct DeviceState {
    total_slots: usize,
    free_slot_count: usize,
    slot_reserved: Vec<bool>,
    slot_handoff: Vec<Arc<Signal>>,
    wait_queue: WaitQueue,
}

impl DeviceState {
    /// Construct a device with every slot free.
    pub fn new(total_slots: usize) -> Self {
        Self {
            total_slots,
            free_slot_count: total_slots,
            slot_reserved: vec![false; total_slots],
            slot_handoff: (0..total_slots).map(|_| Arc::new(Signal::new(true))).collect(),
            wait_queue: WaitQueue::new(),
        }
    }

    pub fn total_slots(&self) -> usize {
        self.total_slots
    }

    pub fn free_slot_count(&self) -> usize {
        self.free_slot_count
    }

    pub fn wait_queue(&self) -> &WaitQueue {
        &self.wait_queue
    }

    pub fn wait_queue_mut(&mut self) -> &mut WaitQueue {
        &mut self.wait_queue
    }

    /// Reserve a slot during construction, without naming which one, for a
    /// pre-existing component. Fails if the device has no free slots left.
    pub fn initial_reserve(&mut self) -> Option<usize> {
        self.try_reserve()
    }

    /// Return the first free slot index and mark it reserved, or `None` if
    /// the device is full.
    pub fn try_reserve(&mut self) -> Option<usize> {
        let index = self.slot_reserved.iter().position(|reserved| !reserved)?;
        self.slot_reserved[index] = true;
        self.free_slot_count -= 1;
        Some(index)
    }

    /// Mark slot `p` tentatively free.
    pub fn mark_free(&mut self, p: usize) {
        debug_assert!(self.slot_reserved[p], "slot {p} was already free");
        self.slot_reserved[p] = false;
        self.free_slot_count += 1;
    }

    /// Mark slot `p` reserved.
    pub fn mark_reserved(&mut self, p: usize) {
        debug_assert!(!self.slot_reserved[p], "slot {p} was already reserved");
        self.slot_reserved[p] = true;
        self.free_slot_count -= 1;
    }

    /// The hand-off primitive guarding physical occupancy of slot `p`.
    pub fn slot_handoff(&self, p: usize) -> Arc<Signal> {
        Arc::clone(&self.slot_handoff[p])
    }
}
