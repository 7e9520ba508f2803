//! The `Host`/`ResetHandler` collaborator contracts (§6, §9 design note).
//!
//! The original binds to a process-wide host object; this core takes the
//! host as an explicit dependency so tests can supply a deterministic
//! double instead of a real `DeviceManager`.

use crate::device::tracker::{Tracker, TrackerCapabilities, TrackerStatus};

/// Host-originated reset requests dispatched from a `UserAction` packet.
pub enum ResetType {
    Full,
    Yaw,
    Mounting,
}

/// Host-side handler for reset/calibration requests.
pub trait ResetHandler {
    fn send_started(&mut self, reset_type: ResetType);
    fn reset_trackers_full(&mut self, source: &str);
    fn reset_trackers_yaw(&mut self, source: &str);
    fn reset_trackers_mounting(&mut self, source: &str);
}

/// The enclosing application the core reports newly discovered devices and
/// trackers to.
pub trait Host {
    /// Registers a newly adopted or created device with the host, keyed by
    /// hardware id. Called once per handshake dispatch.
    fn add_device(&mut self, hardware_id: &str);

    /// Allocates a fresh, globally unique local tracker id.
    fn next_local_tracker_id(&mut self) -> u64;

    /// Constructs a new `Tracker` for the host to own; called once per
    /// `(device, sensorId)` pair the first time it's provisioned.
    fn create_tracker(
        &mut self,
        local_id: u64,
        name: &str,
        description: &str,
        capabilities: TrackerCapabilities,
        initial_status: TrackerStatus,
    ) -> Box<dyn Tracker>;

    /// Invoked once per newly provisioned tracker, after it has been
    /// inserted into the owning device's tracker map.
    fn add_tracker(&mut self, hardware_id: &str, sensor_id: u8);

    fn reset_handler(&mut self) -> &mut dyn ResetHandler;

    /// Forwards one already-prefixed line of device-originated console/serial
    /// text (`"[" + device.name + "] " + text`) to the application's console.
    fn console_line(&mut self, line: &str);
}
