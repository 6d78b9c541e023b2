//! The externally-supplied transfer contract and its classification.

use crate::error::TransferError;
use crate::ids::{ComponentId, DeviceId};

/// A requested component operation, supplied by the caller of
/// [`crate::Coordinator::execute`].
///
/// The core calls `prepare` then `perform` exactly once, on the submitting
/// thread, for every transfer that is admitted. Neither hook is invoked if
/// validation fails. What the hooks actually do (the I/O that moves or
/// instantiates the underlying component) is entirely opaque to the
/// coordinator.
pub trait Transfer {
    /// The component this transfer concerns.
    fn component_id(&self) -> ComponentId;

    /// The device the component currently occupies, or `None` for an Add.
    fn source_device(&self) -> Option<DeviceId>;

    /// The device the component should occupy afterwards, or `None` for a
    /// Remove.
    fn destination_device(&self) -> Option<DeviceId>;

    /// Runs once the coordinator has assigned (or is about to assign) a
    /// destination slot. Signals logical vacancy of the source slot, if
    /// any, once it returns.
    fn prepare(&mut self);

    /// Runs once the destination slot is physically available. Signals
    /// completion of the transfer once it returns.
    fn perform(&mut self);
}

/// The three shapes a transfer request can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Add,
    Move,
    Remove,
}

impl TransferKind {
    /// Classify a request by which endpoints are present, per validation
    /// precedence (a): both absent is the only condition this step checks.
    pub fn classify(
        source: &Option<DeviceId>,
        destination: &Option<DeviceId>,
    ) -> Result<Self, TransferError> {
        match (source, destination) {
            (None, None) => Err(TransferError::IllegalTransferType),
            (None, Some(_)) => Ok(Self::Add),
            (Some(_), Some(_)) => Ok(Self::Move),
            (Some(_), None) => Ok(Self::Remove),
        }
    }
}
