//! Creates `Tracker` objects on demand for `(device, sensorId)` pairs and
//! forwards them to the host.

use sha2::{Digest, Sha256};

use crate::device::record::DeviceRecord;
use crate::device::tracker::{Tracker, TrackerCapabilities, TrackerStatus};
use crate::host::Host;

/// Decodes a raw status byte from the wire into a [`TrackerStatus`].
///
/// This is nominally part of the codec's status decoder (§4.3); the mapping
/// itself is simple enough that the core owns it rather than routing every
/// status byte through the external collaborator.
pub fn decode_status(raw_status: u8) -> Option<TrackerStatus> {
    match raw_status {
        0 => Some(TrackerStatus::Disconnected),
        1 => Some(TrackerStatus::Ok),
        2 => Some(TrackerStatus::Error),
        _ => None,
    }
}

/// Provisions sensors on demand; see §4.3.
pub struct SensorProvisioner;

impl SensorProvisioner {
    /// Creates a tracker for `sensor_id` on `device` if one doesn't already
    /// exist, or updates the existing tracker's status if it does.
    pub fn provision(
        device: &mut DeviceRecord,
        host: &mut dyn Host,
        sensor_id: u8,
        sensor_type: u8,
        raw_status: u8,
    ) {
        if device.has_tracker(sensor_id) {
            if let Some(status) = decode_status(raw_status) {
                if let Some(tracker) = device.tracker_mut(sensor_id) {
                    tracker.set_status(status);
                }
            }
            return;
        }

        let local_id = host.next_local_tracker_id();
        let name = format!("{}/{}", device.name(), sensor_id);
        let description = tracker_description(device.hardware_id());
        let capabilities = TrackerCapabilities {
            rotation: true,
            acceleration: true,
            filtering: true,
            needs_reset: true,
            needs_mounting: true,
            user_editable: true,
            imu_type: sensor_type,
        };
        let initial_status = decode_status(raw_status).unwrap_or(TrackerStatus::Disconnected);

        let tracker = host.create_tracker(local_id, &name, &description, capabilities, initial_status);
        device.insert_tracker(sensor_id, tracker);
        host.add_tracker(device.hardware_id(), sensor_id);
    }
}

/// A stable 5-character description derived from 5 bytes of
/// `SHA-256(hardware_id)`, each mapped onto a lowercase letter.
fn tracker_description(hardware_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(hardware_id.as_bytes());
    let digest = hasher.finalize();
    digest[3..8]
        .iter()
        .map(|b| (b'a' + (b % 26)) as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_is_five_characters() {
        let description = tracker_description("AA:BB:CC:DD:EE:FF");
        assert_eq!(description.len(), 5);
    }

    #[test]
    fn description_is_deterministic() {
        let a = tracker_description("AA:BB:CC:DD:EE:FF");
        let b = tracker_description("AA:BB:CC:DD:EE:FF");
        assert_eq!(a, b);
    }

    #[test]
    fn description_differs_across_hardware_ids() {
        let a = tracker_description("AA:BB:CC:DD:EE:FF");
        let b = tracker_description("11:22:33:44:55:66");
        assert_ne!(a, b);
    }

    #[test]
    fn decode_status_maps_known_values() {
        assert_eq!(decode_status(0), Some(TrackerStatus::Disconnected));
        assert_eq!(decode_status(1), Some(TrackerStatus::Ok));
        assert_eq!(decode_status(2), Some(TrackerStatus::Error));
        assert_eq!(decode_status(9), None);
    }
}
