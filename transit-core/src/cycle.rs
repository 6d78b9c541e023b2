//! Depth-first search over the wait-graph for rotation cycles.

use std::collections::{HashMap, HashSet};

use crate::device::DeviceState;
use crate::ids::{ComponentId, DeviceId};

/// One link in a detected cycle: the component whose queued transfer closes
/// (or extends) the loop, and the device it is queued on.
#[derive(Debug, Clone)]
pub struct CycleLink {
    pub component: ComponentId,
    pub destination: DeviceId,
}

/// Search the wait-graph for a cycle closing back to `destination`, starting
/// the walk at `source` (the requesting transfer's own source device).
///
/// Vertices are devices; an edge leaves device `D` for every transfer queued
/// in `WaitQueue(D)`, landing on that transfer's own source device. The walk
/// begins at `source` because the requesting transfer T* implicitly
/// contributes the first edge, `destination -> source`, without itself
/// being queued anywhere. A cycle closes the moment some queued transfer's
/// source equals `destination`.
///
/// Ties within one device's queue are broken in FIFO order, and the first
/// feasible branch is taken; per the design notes, no canonicalization is
/// attempted when more than one cycle exists.
pub fn find_cycle(
    devices: &HashMap<DeviceId, DeviceState>,
    destination: &DeviceId,
    source: &DeviceId,
) -> Option<Vec<CycleLink>> {
    let mut visited = HashSet::new();
    let mut path = Vec::new();
    if walk(devices, destination, source, &mut visited, &mut path) {
        Some(path)
    } else {
        None
    }
}

fn walk(
    devices: &HashMap<DeviceId, DeviceState>,
    destination: &DeviceId,
    at: &DeviceId,
    visited: &mut HashSet<DeviceId>,
    path: &mut Vec<CycleLink>,
) -> bool {
    if !visited.insert(at.clone()) {
        return false;
    }

    let Some(device) = devices.get(at) else {
        return false;
    };

    for queued in device.wait_queue().iter() {
        // Adds have no source device and so contribute no outgoing edge;
        // they can never be a non-initiating participant in a cycle.
        let Some(next) = &queued.source else {
            continue;
        };

        path.push(CycleLink { component: queued.component.clone(), destination: at.clone() });

        if next == destination {
            return true;
        }

        if walk(devices, destination, next, visited, path) {
            return true;
        }

        path.pop();
    }

    false
}
