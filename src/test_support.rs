//! Deterministic test doubles for [`crate::host::Host`], [`crate::device::Tracker`],
//! and [`crate::protocol::ProtocolCodec`], used by this crate's own unit tests
//! and available to downstream integrators writing their own.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use nalgebra::{UnitQuaternion, Vector3};

use crate::device::record::DeviceRecord;
use crate::device::tracker::{Tracker, TrackerCapabilities, TrackerStatus};
use crate::error::CodecError;
use crate::host::{Host, ResetHandler, ResetType};
use crate::protocol::codec::ProtocolCodec;
use crate::protocol::packet::Packet;

/// Snapshot of everything a [`MockTracker`] has been told.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerSnapshot {
    pub rotation: Option<UnitQuaternion<f64>>,
    pub acceleration: Option<Vector3<f64>>,
    pub battery: Option<(f32, f32)>,
    pub rssi: Option<i16>,
    pub temperature: Option<f32>,
    pub ping_ms: Option<u64>,
    pub status: TrackerStatus,
    pub ticks: u32,
}

/// A `Tracker` backed by a shared snapshot, so tests can inspect it after
/// handing ownership to a [`MockHost`].
#[derive(Clone)]
pub struct MockTracker {
    pub local_id: u64,
    pub name: String,
    pub description: String,
    pub capabilities: TrackerCapabilities,
    state: Arc<Mutex<TrackerSnapshot>>,
}

impl MockTracker {
    pub fn new(local_id: u64, name: &str, description: &str, capabilities: TrackerCapabilities) -> Self {
        Self {
            local_id,
            name: name.to_string(),
            description: description.to_string(),
            capabilities,
            state: Arc::new(Mutex::new(TrackerSnapshot::default())),
        }
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        self.state.lock().unwrap().clone()
    }
}

impl Tracker for MockTracker {
    fn set_rotation(&mut self, rotation: UnitQuaternion<f64>) {
        self.state.lock().unwrap().rotation = Some(rotation);
    }

    fn set_acceleration(&mut self, acceleration: Vector3<f64>) {
        self.state.lock().unwrap().acceleration = Some(acceleration);
    }

    fn set_battery(&mut self, voltage: f32, level_percent: f32) {
        self.state.lock().unwrap().battery = Some((voltage, level_percent));
    }

    fn set_signal_strength(&mut self, rssi: i16) {
        self.state.lock().unwrap().rssi = Some(rssi);
    }

    fn set_temperature(&mut self, celsius: f32) {
        self.state.lock().unwrap().temperature = Some(celsius);
    }

    fn set_ping_ms(&mut self, ping_ms: u64) {
        self.state.lock().unwrap().ping_ms = Some(ping_ms);
    }

    fn set_status(&mut self, status: TrackerStatus) {
        self.state.lock().unwrap().status = status;
    }

    fn status(&self) -> TrackerStatus {
        self.state.lock().unwrap().status
    }

    fn data_tick(&mut self) {
        self.state.lock().unwrap().ticks += 1;
    }
}

/// Records of everything a [`MockHost`] has been told, for post-hoc assertions.
#[derive(Debug, Default)]
pub struct MockHostLog {
    pub added_devices: Vec<String>,
    pub added_trackers: Vec<(String, u8)>,
    pub console_lines: Vec<String>,
    pub resets: Vec<(ResetTypeLog, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetTypeLog {
    Started(ResetKind),
    Full,
    Yaw,
    Mounting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    Full,
    Yaw,
    Mounting,
}

/// A `Host` that hands out [`MockTracker`]s and records every call it receives.
#[derive(Default)]
pub struct MockHost {
    next_id: u64,
    pub log: MockHostLog,
    pub created: HashMap<u64, MockTracker>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResetHandler for MockHost {
    fn send_started(&mut self, reset_type: ResetType) {
        let kind = match reset_type {
            ResetType::Full => ResetKind::Full,
            ResetType::Yaw => ResetKind::Yaw,
            ResetType::Mounting => ResetKind::Mounting,
        };
        self.log
            .resets
            .push((ResetTypeLog::Started(kind), String::new()));
    }

    fn reset_trackers_full(&mut self, source: &str) {
        self.log.resets.push((ResetTypeLog::Full, source.to_string()));
    }

    fn reset_trackers_yaw(&mut self, source: &str) {
        self.log.resets.push((ResetTypeLog::Yaw, source.to_string()));
    }

    fn reset_trackers_mounting(&mut self, source: &str) {
        self.log
            .resets
            .push((ResetTypeLog::Mounting, source.to_string()));
    }
}

impl Host for MockHost {
    fn add_device(&mut self, hardware_id: &str) {
        self.log.added_devices.push(hardware_id.to_string());
    }

    fn next_local_tracker_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn create_tracker(
        &mut self,
        local_id: u64,
        name: &str,
        description: &str,
        capabilities: TrackerCapabilities,
        initial_status: TrackerStatus,
    ) -> Box<dyn Tracker> {
        let mut tracker = MockTracker::new(local_id, name, description, capabilities);
        tracker.set_status(initial_status);
        self.created.insert(local_id, tracker.clone());
        Box::new(tracker)
    }

    fn add_tracker(&mut self, hardware_id: &str, sensor_id: u8) {
        self.log.added_trackers.push((hardware_id.to_string(), sensor_id));
    }

    fn reset_handler(&mut self) -> &mut dyn ResetHandler {
        self
    }

    fn console_line(&mut self, line: &str) {
        self.log.console_lines.push(line.to_string());
    }
}

/// A `ProtocolCodec` that parses nothing and writes fixed, tiny
/// acknowledgements; enough to exercise the dispatcher and event loop
/// without a real wire format.
#[derive(Default)]
pub struct MockCodec {
    pub parse_queue: Vec<Packet>,
}

impl ProtocolCodec for MockCodec {
    fn parse(
        &mut self,
        buffer: &[u8],
        _device: Option<&DeviceRecord>,
    ) -> std::result::Result<Vec<Packet>, CodecError> {
        if buffer.is_empty() {
            return Ok(Vec::new());
        }
        Ok(std::mem::take(&mut self.parse_queue))
    }

    fn write(
        &mut self,
        buffer: &mut [u8],
        _device: Option<&DeviceRecord>,
        _packet: &Packet,
    ) -> std::result::Result<usize, CodecError> {
        if buffer.is_empty() {
            return Err(CodecError::BufferTooSmall { needed: 1, available: 0 });
        }
        buffer[0] = 0xAC;
        Ok(1)
    }

    fn write_handshake_response(
        &mut self,
        buffer: &mut [u8],
        _device: &DeviceRecord,
    ) -> std::result::Result<usize, CodecError> {
        if buffer.is_empty() {
            return Err(CodecError::BufferTooSmall { needed: 1, available: 0 });
        }
        buffer[0] = 0x03;
        Ok(1)
    }

    fn write_sensor_info_response(
        &mut self,
        buffer: &mut [u8],
        _device: &DeviceRecord,
        sensor_id: u8,
    ) -> std::result::Result<usize, CodecError> {
        if buffer.len() < 2 {
            return Err(CodecError::BufferTooSmall { needed: 2, available: buffer.len() });
        }
        buffer[0] = 0x0F;
        buffer[1] = sensor_id;
        Ok(2)
    }
}
