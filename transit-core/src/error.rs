//! Error tags returned by the coordinator.
//!
//! These are a flat, enumerated tag set rather than a layered category/code
//! system: validation failures here are structural and not meant to carry
//! a source chain, so a plain enum with `Display`/`Error` impls is enough.

use std::fmt;

use crate::ids::{ComponentId, DeviceId};

/// A failure returned from [`crate::Coordinator::execute`] before any state
/// change has been made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Both the source and destination device were absent.
    IllegalTransferType,
    /// A named device is not part of this coordinator.
    DeviceDoesNotExist(DeviceId),
    /// An Add named a component that already exists.
    ComponentAlreadyExists { component: ComponentId, device: DeviceId },
    /// A Move or Remove named a component that does not exist on the given
    /// source device.
    ComponentDoesNotExist { component: ComponentId, device: DeviceId },
    /// A Move named a destination equal to the component's current device.
    ComponentDoesNotNeedTransfer { component: ComponentId, device: DeviceId },
    /// The component already has an in-flight transfer.
    ComponentIsBeingOperatedOn(ComponentId),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IllegalTransferType => {
                write!(f, "transfer request named neither a source nor a destination device")
            }
            Self::DeviceDoesNotExist(device) => write!(f, "device '{device}' does not exist"),
            Self::ComponentAlreadyExists { component, device } => {
                write!(f, "component '{component}' already exists on device '{device}'")
            }
            Self::ComponentDoesNotExist { component, device } => {
                write!(f, "component '{component}' does not exist on device '{device}'")
            }
            Self::ComponentDoesNotNeedTransfer { component, device } => {
                write!(f, "component '{component}' is already on device '{device}'")
            }
            Self::ComponentIsBeingOperatedOn(component) => {
                write!(f, "component '{component}' already has a transfer in flight")
            }
        }
    }
}

impl std::error::Error for TransferError {}

/// A failure returned from [`crate::Coordinator::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    /// No devices were named.
    NoDevices,
    /// A device was given zero or negative capacity.
    NonPositiveCapacity(DeviceId),
    /// An initial component placement named an unknown device.
    UnknownInitialDevice { component: ComponentId, device: DeviceId },
    /// A device's initial placements exceeded its declared capacity.
    DeviceOverProvisioned(DeviceId),
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDevices => write!(f, "at least one device must be configured"),
            Self::NonPositiveCapacity(device) => {
                write!(f, "device '{device}' was given a non-positive slot count")
            }
            Self::UnknownInitialDevice { component, device } => {
                write!(f, "initial component '{component}' names unknown device '{device}'")
            }
            Self::DeviceOverProvisioned(device) => {
                write!(f, "device '{device}' was given more initial components than it has slots")
            }
        }
    }
}

impl std::error::Error for ConstructionError {}
