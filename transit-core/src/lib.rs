//! Admission controller, slot allocator, and cycle detector for concurrent
//! component transfers across capacity-bounded devices.
//!
//! [`Coordinator`] is the sole public entry point. It serializes admission
//! decisions behind one global lock and hands each admitted transfer off to
//! its caller's thread to run the opaque `prepare`/`perform` callbacks,
//! synchronizing consecutive occupants of the same device slot through the
//! primitives in [`transit_sync`].

pub mod component;
pub mod coordinator;
pub mod cycle;
pub mod device;
pub mod error;
pub mod ids;
pub mod queue;
pub mod transfer;

pub use coordinator::Coordinator;
pub use error::{ConstructionError, TransferError};
pub use ids::{ComponentId, DeviceId};
pub use transfer::{Transfer, TransferKind};
