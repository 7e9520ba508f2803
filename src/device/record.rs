//! Per-device mutable state.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use crate::device::tracker::{Tracker, TrackerStatus};
use crate::protocol::packet::HandshakePacket;

/// Wire dialect a device speaks, derived from the handshake firmware string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    SlimeVrRaw,
    OwoLegacy,
}

/// One connected device and everything the core tracks about it.
pub struct DeviceRecord {
    /// Session-restoration key: the handshake MAC if reported, else the peer IP.
    /// Immutable for the life of the record.
    hardware_id: String,
    address: SocketAddr,
    descriptive_name: String,
    name: String,
    protocol: Protocol,
    firmware_build: i32,
    firmware_features: u32,
    board_type: i32,
    mcu_type: i32,
    mac: Option<[u8; 6]>,

    last_packet_time: Option<Instant>,
    last_packet_number: u32,
    last_ping_packet_id: i32,
    last_ping_packet_time: Option<Instant>,
    timed_out: bool,
    last_serial_update: Option<Instant>,
    serial_buffer: String,

    trackers: HashMap<u8, Box<dyn Tracker>>,
}

impl DeviceRecord {
    /// Builds a fresh record from a handshake, as applied both on creation
    /// and on adoption (§4.2): address/name/protocol/firmware fields are
    /// (re)derived from the handshake, `firmware_features` is cleared, and
    /// `last_packet_number` resets to 0.
    pub(crate) fn from_handshake(handshake: &HandshakePacket, peer: SocketAddr) -> Self {
        let ip = peer.ip();
        let descriptive_name = descriptive_name_for(ip);
        let protocol = if handshake.firmware.is_empty() {
            Protocol::OwoLegacy
        } else {
            Protocol::SlimeVrRaw
        };
        let name = match handshake.mac {
            Some(mac) => format!("udp://{}", format_mac(mac)),
            None => descriptive_name.clone(),
        };
        let hardware_id = match handshake.mac {
            Some(mac) => format_mac(mac),
            None => ip.to_string(),
        };

        Self {
            hardware_id,
            address: peer,
            descriptive_name,
            name,
            protocol,
            firmware_build: handshake.firmware_build,
            firmware_features: 0,
            board_type: handshake.board_type,
            mcu_type: handshake.mcu_type,
            mac: handshake.mac,
            last_packet_time: Some(Instant::now()),
            last_packet_number: 0,
            last_ping_packet_id: 0,
            last_ping_packet_time: None,
            timed_out: false,
            last_serial_update: None,
            serial_buffer: String::new(),
            trackers: HashMap::new(),
        }
    }

    /// Re-applies the handshake update to an existing record on adoption
    /// (§4.2): address/name/protocol/firmware fields move to the new
    /// session, `firmware_features` and `last_packet_number` reset.
    /// `hardware_id`, `board_type`, and `mcu_type` are set at creation only
    /// per §3 and are not touched here.
    pub(crate) fn reapply_handshake(&mut self, handshake: &HandshakePacket, peer: SocketAddr) {
        let ip = peer.ip();
        self.address = peer;
        self.descriptive_name = descriptive_name_for(ip);
        self.protocol = if handshake.firmware.is_empty() {
            Protocol::OwoLegacy
        } else {
            Protocol::SlimeVrRaw
        };
        self.name = match handshake.mac {
            Some(mac) => format!("udp://{}", format_mac(mac)),
            None => self.descriptive_name.clone(),
        };
        self.firmware_build = handshake.firmware_build;
        self.firmware_features = 0;
        self.last_packet_number = 0;
        self.last_packet_time = Some(Instant::now());
    }

    pub fn hardware_id(&self) -> &str {
        &self.hardware_id
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn ip(&self) -> IpAddr {
        self.address.ip()
    }

    pub fn descriptive_name(&self) -> &str {
        &self.descriptive_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn firmware_build(&self) -> i32 {
        self.firmware_build
    }

    pub fn firmware_features(&self) -> u32 {
        self.firmware_features
    }

    pub fn set_firmware_features(&mut self, flags: u32) {
        self.firmware_features = flags;
    }

    pub fn board_type(&self) -> i32 {
        self.board_type
    }

    pub fn mcu_type(&self) -> i32 {
        self.mcu_type
    }

    pub fn mac(&self) -> Option<[u8; 6]> {
        self.mac
    }

    pub fn last_packet_number(&self) -> u32 {
        self.last_packet_number
    }

    /// Marks that a packet was just received; refreshes liveness and, per
    /// the `timed_out → alive` transition in §4.6, clears the timed-out
    /// latch and recovers any trackers that were forced to DISCONNECTED.
    /// The caller has already had the packet validated by the codec.
    pub fn mark_packet_received(&mut self) {
        self.last_packet_time = Some(Instant::now());
        if self.timed_out {
            self.timed_out = false;
            self.recover_disconnected_trackers();
        }
    }

    pub fn is_silent_for(&self, threshold: std::time::Duration) -> bool {
        match self.last_packet_time {
            Some(t) => t.elapsed() > threshold,
            None => true,
        }
    }

    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub fn set_timed_out(&mut self, value: bool) {
        self.timed_out = value;
    }

    pub fn last_ping_packet_id(&self) -> i32 {
        self.last_ping_packet_id
    }

    pub fn last_ping_packet_time(&self) -> Option<Instant> {
        self.last_ping_packet_time
    }

    pub fn start_ping(&mut self, ping_id: i32) {
        self.last_ping_packet_id = ping_id;
        self.last_ping_packet_time = Some(Instant::now());
    }

    pub fn due_for_ping(&self, interval: std::time::Duration) -> bool {
        match self.last_ping_packet_time {
            Some(t) => t.elapsed() > interval,
            None => true,
        }
    }

    pub fn append_serial(&mut self, text: &str) {
        self.serial_buffer.push_str(text);
        self.last_serial_update = Some(Instant::now());
    }

    pub fn serial_buffer(&self) -> &str {
        &self.serial_buffer
    }

    pub fn take_serial_buffer_if_due(&mut self, flush_interval: std::time::Duration) -> Option<String> {
        if self.serial_buffer.is_empty() {
            return None;
        }
        let due = match self.last_serial_update {
            Some(t) => t.elapsed() > flush_interval,
            None => true,
        };
        if !due {
            return None;
        }
        Some(std::mem::take(&mut self.serial_buffer))
    }

    pub fn trackers(&self) -> &HashMap<u8, Box<dyn Tracker>> {
        &self.trackers
    }

    pub fn trackers_mut(&mut self) -> &mut HashMap<u8, Box<dyn Tracker>> {
        &mut self.trackers
    }

    pub fn has_tracker(&self, sensor_id: u8) -> bool {
        self.trackers.contains_key(&sensor_id)
    }

    pub fn insert_tracker(&mut self, sensor_id: u8, tracker: Box<dyn Tracker>) {
        self.trackers.insert(sensor_id, tracker);
    }

    pub fn tracker_mut(&mut self, sensor_id: u8) -> Option<&mut Box<dyn Tracker>> {
        self.trackers.get_mut(&sensor_id)
    }

    pub fn for_each_tracker_mut(&mut self, mut f: impl FnMut(&mut Box<dyn Tracker>)) {
        for tracker in self.trackers.values_mut() {
            f(tracker);
        }
    }

    /// Sets every tracker to DISCONNECTED; used at the keepalive sweep when
    /// the device has gone silent. Returns whether any tracker existed.
    pub fn disconnect_all_trackers(&mut self) {
        for tracker in self.trackers.values_mut() {
            tracker.set_status(TrackerStatus::Disconnected);
        }
    }

    /// Promotes DISCONNECTED trackers back to OK; does not touch ERROR.
    pub fn recover_disconnected_trackers(&mut self) {
        for tracker in self.trackers.values_mut() {
            if tracker.status() == TrackerStatus::Disconnected {
                tracker.set_status(TrackerStatus::Ok);
            }
        }
    }
}

/// `"udp:/" + ip` — the single slash is intentional, for historical
/// persisted-config compatibility downstream. Do not normalize to `udp://`.
fn descriptive_name_for(ip: IpAddr) -> String {
    format!("udp:/{}", ip)
}

fn format_mac(mac: [u8; 6]) -> String {
    mac.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptive_name_uses_single_slash() {
        let ip: IpAddr = "192.168.1.5".parse().unwrap();
        assert_eq!(descriptive_name_for(ip), "udp:/192.168.1.5");
    }

    #[test]
    fn hardware_id_falls_back_to_ip_without_mac() {
        let handshake = HandshakePacket {
            mac: None,
            firmware: "1.0.0".to_string(),
            firmware_build: 9,
            board_type: 1,
            mcu_type: 1,
            imu_type: 2,
        };
        let peer: SocketAddr = "10.0.0.5:4567".parse().unwrap();
        let record = DeviceRecord::from_handshake(&handshake, peer);
        assert_eq!(record.hardware_id(), "10.0.0.5");
        assert_eq!(record.name(), "udp:/10.0.0.5");
    }

    #[test]
    fn hardware_id_uses_mac_when_present() {
        let handshake = HandshakePacket {
            mac: Some([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]),
            firmware: String::new(),
            firmware_build: 7,
            board_type: 1,
            mcu_type: 1,
            imu_type: 2,
        };
        let peer: SocketAddr = "10.0.0.5:4567".parse().unwrap();
        let record = DeviceRecord::from_handshake(&handshake, peer);
        assert_eq!(record.hardware_id(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(record.name(), "udp://AA:BB:CC:DD:EE:FF");
        assert_eq!(record.protocol(), Protocol::OwoLegacy);
    }

    #[test]
    fn reapply_handshake_resets_packet_number_and_features() {
        let handshake = HandshakePacket {
            mac: Some([1, 2, 3, 4, 5, 6]),
            firmware: "2.0.0".to_string(),
            firmware_build: 12,
            board_type: 1,
            mcu_type: 1,
            imu_type: 0,
        };
        let peer1: SocketAddr = "10.0.0.6:4567".parse().unwrap();
        let mut record = DeviceRecord::from_handshake(&handshake, peer1);
        record.set_firmware_features(0xFF);
        record.last_packet_number = 42;

        let peer2: SocketAddr = "10.0.0.7:4567".parse().unwrap();
        record.reapply_handshake(&handshake, peer2);

        assert_eq!(record.address(), peer2);
        assert_eq!(record.firmware_features(), 0);
        assert_eq!(record.last_packet_number(), 0);
        assert_eq!(record.hardware_id(), "01:02:03:04:05:06");
    }

    #[test]
    fn mark_packet_received_clears_timed_out_latch() {
        let handshake = HandshakePacket {
            mac: Some([1, 2, 3, 4, 5, 6]),
            firmware: String::new(),
            firmware_build: 7,
            board_type: 1,
            mcu_type: 1,
            imu_type: 2,
        };
        let peer: SocketAddr = "10.0.0.6:4567".parse().unwrap();
        let mut record = DeviceRecord::from_handshake(&handshake, peer);
        record.set_timed_out(true);

        record.mark_packet_received();

        assert!(!record.timed_out());
    }
}
