//! Per-device state and the `Tracker` collaborator contract.

pub mod record;
pub mod tracker;

pub use record::{DeviceRecord, Protocol};
pub use tracker::{Tracker, TrackerCapabilities, TrackerStatus};
