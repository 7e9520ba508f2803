//! The `Tracker` collaborator contract: a pose/state sink owned by the host
//! application, one per `(device, sensorId)` pair.

use nalgebra::{UnitQuaternion, Vector3};

/// Tracker lifecycle/error state, decoded by the codec from a raw status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerStatus {
    Ok,
    Disconnected,
    Error,
}

impl Default for TrackerStatus {
    fn default() -> Self {
        TrackerStatus::Disconnected
    }
}

/// Static capabilities reported once at provisioning time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerCapabilities {
    pub rotation: bool,
    pub acceleration: bool,
    pub filtering: bool,
    pub needs_reset: bool,
    pub needs_mounting: bool,
    pub user_editable: bool,
    pub imu_type: u8,
}

/// A logical sensor handle exposed to the host application.
///
/// Implemented by the host; the core only ever calls setters and
/// `data_tick`. Mutation visible to outside readers must appear in the
/// order the dispatcher issues it (see the crate's concurrency notes).
pub trait Tracker: Send {
    fn set_rotation(&mut self, rotation: UnitQuaternion<f64>);
    fn set_acceleration(&mut self, acceleration: Vector3<f64>);
    fn set_battery(&mut self, voltage: f32, level_percent: f32);
    fn set_signal_strength(&mut self, rssi: i16);
    fn set_temperature(&mut self, celsius: f32);
    fn set_ping_ms(&mut self, ping_ms: u64);
    fn set_status(&mut self, status: TrackerStatus);
    fn status(&self) -> TrackerStatus;

    /// Beat signaling a fresh pose sample was applied; called once per
    /// orientation/ping update, not per acceleration sample.
    fn data_tick(&mut self);
}
