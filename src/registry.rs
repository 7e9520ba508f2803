//! Owns the set of active devices, indexed by socket address and by
//! hardware identity, with session adoption across address changes.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use crate::device::record::DeviceRecord;
use crate::protocol::packet::HandshakePacket;

/// The connection manager. A `Vec` holds records in insertion order (their
/// index is the stable `connection_index` used in logs); two `HashMap`s
/// index the same records by address and by hardware identity.
#[derive(Default)]
pub struct ConnectionRegistry {
    records: Vec<DeviceRecord>,
    by_address: HashMap<SocketAddr, usize>,
    by_hardware_id: HashMap<String, usize>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup_by_address(&self, addr: SocketAddr) -> Option<&DeviceRecord> {
        self.by_address.get(&addr).map(|&i| &self.records[i])
    }

    pub fn lookup_by_address_mut(&mut self, addr: SocketAddr) -> Option<&mut DeviceRecord> {
        match self.by_address.get(&addr) {
            Some(&i) => Some(&mut self.records[i]),
            None => None,
        }
    }

    pub fn lookup_by_hardware_id(&self, hardware_id: &str) -> Option<&DeviceRecord> {
        self.by_hardware_id.get(hardware_id).map(|&i| &self.records[i])
    }

    pub fn index_by_address(&self, addr: SocketAddr) -> Option<usize> {
        self.by_address.get(&addr).copied()
    }

    /// Finds the device by hardware identity (MAC, or the peer IP if no MAC
    /// was reported) and either adopts it into a new session or creates a
    /// fresh record (§4.1).
    ///
    /// Returns the index of the affected record and whether it was adopted
    /// (as opposed to newly created).
    pub fn find_or_adopt(&mut self, handshake: &HandshakePacket, peer: SocketAddr) -> (usize, bool) {
        let key = hardware_key(handshake, peer);

        if let Some(&index) = self.by_hardware_id.get(&key) {
            let old_addr = self.records[index].address();
            self.by_address.remove(&old_addr);
            self.records[index].reapply_handshake(handshake, peer);
            self.by_address.insert(peer, index);
            return (index, true);
        }

        let record = DeviceRecord::from_handshake(handshake, peer);
        let index = self.records.len();
        self.by_hardware_id.insert(record.hardware_id().to_string(), index);
        self.by_address.insert(peer, index);
        self.records.push(record);
        (index, false)
    }

    pub fn record(&self, index: usize) -> &DeviceRecord {
        &self.records[index]
    }

    pub fn record_mut(&mut self, index: usize) -> &mut DeviceRecord {
        &mut self.records[index]
    }

    pub fn connection_index(&self, hardware_id: &str) -> Option<usize> {
        self.by_hardware_id.get(hardware_id).copied()
    }

    pub fn has_any_sensors(&self) -> bool {
        self.records.iter().any(|r| !r.trackers().is_empty())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn for_each(&self, mut f: impl FnMut(&DeviceRecord)) {
        for record in &self.records {
            f(record);
        }
    }

    pub fn for_each_mut(&mut self, mut f: impl FnMut(usize, &mut DeviceRecord)) {
        for (index, record) in self.records.iter_mut().enumerate() {
            f(index, record);
        }
    }
}

/// A summary row for external enumeration (e.g. a UI listing connected
/// devices) that doesn't require exposing `&DeviceRecord` or its
/// non-`Clone` trackers across thread boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSummary {
    pub connection_index: usize,
    pub hardware_id: String,
    pub address: SocketAddr,
    pub name: String,
    pub timed_out: bool,
    pub sensor_ids: Vec<u8>,
}

/// A cloneable, thread-safe handle onto a [`ConnectionRegistry`].
///
/// The event loop is the sole writer and holds the lock only for the
/// duration of one registry operation, never across a socket send or the
/// blocking receive; other threads (e.g. a UI) use [`SharedRegistry::summary`]
/// for read-only enumeration (§5).
#[derive(Clone, Default)]
pub struct SharedRegistry(Arc<Mutex<ConnectionRegistry>>);

impl SharedRegistry {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(ConnectionRegistry::new())))
    }

    /// Runs `f` with exclusive access to the registry. Used by the event
    /// loop for every mutation; callers must not perform blocking I/O
    /// inside `f`.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut ConnectionRegistry) -> R) -> R {
        let mut guard = self.0.lock().expect("registry mutex poisoned");
        f(&mut guard)
    }

    /// Runs `f` with shared read access to the registry.
    pub fn with<R>(&self, f: impl FnOnce(&ConnectionRegistry) -> R) -> R {
        let guard = self.0.lock().expect("registry mutex poisoned");
        f(&guard)
    }

    /// A point-in-time, allocation-owned snapshot safe to hand to an
    /// external reader thread (e.g. a UI enumerating connected devices).
    pub fn summary(&self) -> Vec<DeviceSummary> {
        self.with(|registry| {
            registry
                .records
                .iter()
                .enumerate()
                .map(|(index, record)| DeviceSummary {
                    connection_index: index,
                    hardware_id: record.hardware_id().to_string(),
                    address: record.address(),
                    name: record.name().to_string(),
                    timed_out: record.timed_out(),
                    sensor_ids: record.trackers().keys().copied().collect(),
                })
                .collect()
        })
    }
}

fn hardware_key(handshake: &HandshakePacket, peer: SocketAddr) -> String {
    match handshake.mac {
        Some(mac) => mac
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(":"),
        None => peer.ip().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handshake(mac: Option<[u8; 6]>) -> HandshakePacket {
        HandshakePacket {
            mac,
            firmware: String::new(),
            firmware_build: 7,
            board_type: 1,
            mcu_type: 1,
            imu_type: 2,
        }
    }

    #[test]
    fn find_or_adopt_creates_new_record_for_unknown_mac() {
        let mut registry = ConnectionRegistry::new();
        let peer: SocketAddr = "10.0.0.5:4567".parse().unwrap();
        let (index, adopted) = registry.find_or_adopt(&handshake(Some([1, 2, 3, 4, 5, 6])), peer);
        assert!(!adopted);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.record(index).address(), peer);
        assert!(registry.lookup_by_address(peer).is_some());
        assert!(registry.lookup_by_hardware_id("01:02:03:04:05:06").is_some());
    }

    #[test]
    fn find_or_adopt_migrates_session_on_reconnect() {
        let mut registry = ConnectionRegistry::new();
        let peer1: SocketAddr = "10.0.0.5:4567".parse().unwrap();
        let peer2: SocketAddr = "10.0.0.6:4567".parse().unwrap();
        let mac = Some([1, 2, 3, 4, 5, 6]);

        let (index1, _) = registry.find_or_adopt(&handshake(mac), peer1);
        let (index2, adopted) = registry.find_or_adopt(&handshake(mac), peer2);

        assert!(adopted);
        assert_eq!(index1, index2);
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup_by_address(peer1).is_none());
        assert_eq!(registry.lookup_by_address(peer2).unwrap().address(), peer2);
    }

    #[test]
    fn connection_index_preserved_across_migration() {
        let mut registry = ConnectionRegistry::new();
        let mac_a = Some([1, 2, 3, 4, 5, 6]);
        let mac_b = Some([6, 5, 4, 3, 2, 1]);
        let peer_a: SocketAddr = "10.0.0.1:4567".parse().unwrap();
        let peer_b: SocketAddr = "10.0.0.2:4567".parse().unwrap();
        registry.find_or_adopt(&handshake(mac_a), peer_a);
        registry.find_or_adopt(&handshake(mac_b), peer_b);

        let peer_a2: SocketAddr = "10.0.0.3:4567".parse().unwrap();
        registry.find_or_adopt(&handshake(mac_a), peer_a2);

        assert_eq!(registry.connection_index("01:02:03:04:05:06"), Some(0));
        assert_eq!(registry.connection_index("06:05:04:03:02:01"), Some(1));
    }

    #[test]
    fn no_two_records_share_an_address() {
        let mut registry = ConnectionRegistry::new();
        let peer: SocketAddr = "10.0.0.5:4567".parse().unwrap();
        registry.find_or_adopt(&handshake(Some([1, 2, 3, 4, 5, 6])), peer);
        registry.find_or_adopt(&handshake(Some([9, 9, 9, 9, 9, 9])), peer);

        // Second handshake from the same address is a distinct hardware id,
        // so it creates a second record that now owns `peer`'s slot.
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.lookup_by_address(peer).unwrap().hardware_id(),
            "09:09:09:09:09:09"
        );
    }

    #[test]
    fn hardware_id_falls_back_to_ip_without_mac() {
        let mut registry = ConnectionRegistry::new();
        let peer: SocketAddr = "10.0.0.9:4567".parse().unwrap();
        registry.find_or_adopt(&handshake(None), peer);
        assert!(registry.lookup_by_hardware_id("10.0.0.9").is_some());
    }

    #[test]
    fn has_any_sensors_is_false_until_a_tracker_is_inserted() {
        use crate::device::tracker::TrackerCapabilities;
        use crate::test_support::MockTracker;

        let mut registry = ConnectionRegistry::new();
        let peer: SocketAddr = "10.0.0.5:4567".parse().unwrap();
        let (index, _) = registry.find_or_adopt(&handshake(Some([1, 2, 3, 4, 5, 6])), peer);
        assert!(!registry.has_any_sensors());

        let capabilities = TrackerCapabilities {
            rotation: true,
            acceleration: true,
            filtering: true,
            needs_reset: true,
            needs_mounting: true,
            user_editable: true,
            imu_type: 0,
        };
        registry
            .record_mut(index)
            .insert_tracker(0, Box::new(MockTracker::new(0, "t", "desc", capabilities)));
        assert!(registry.has_any_sensors());
    }
}
