//! Maps each parsed packet variant to its effect on the registry, sensors,
//! and outbound writes (§4.5).

use std::net::SocketAddr;

use crate::axes::{apply_axes_offset, remap_acceleration};
use crate::device::record::Protocol;
use crate::host::{Host, ResetHandler, ResetType};
use crate::protocol::codec::ProtocolCodec;
use crate::protocol::packet::{Packet, ResetAction, RotationDataType};
use crate::registry::ConnectionRegistry;
use crate::sensors::SensorProvisioner;

/// Firmware build below which a device never sends `SensorInfo`, so sensor
/// 0 must be auto-provisioned straight off the handshake.
const LEGACY_SENSOR_INFO_BUILD: i32 = 9;

pub struct PacketDispatcher;

impl PacketDispatcher {
    /// Dispatches one parsed packet from `peer`. `send_buf` is the shared,
    /// already-reset outbound scratch buffer used only to encode; any
    /// acknowledgement this produces is handed back as owned bytes rather
    /// than sent here, so the caller can release the registry lock before
    /// touching the socket (§5).
    pub fn dispatch(
        packet: Packet,
        peer: SocketAddr,
        registry: &mut ConnectionRegistry,
        host: &mut dyn Host,
        codec: &mut dyn ProtocolCodec,
        send_buf: &mut [u8],
    ) -> Option<(SocketAddr, Vec<u8>)> {
        if let Packet::Handshake(handshake) = &packet {
            let (index, adopted) = registry.find_or_adopt(handshake, peer);
            registry.record_mut(index).mark_packet_received();

            if handshake.mac.is_none() {
                tracing::warn!(
                    %peer,
                    "handshake without MAC; session restoration will key on IP"
                );
            }

            let hardware_id = registry.record(index).hardware_id().to_string();
            host.add_device(&hardware_id);

            let legacy_firmware = {
                let device = registry.record(index);
                device.protocol() == Protocol::OwoLegacy
                    || device.firmware_build() < LEGACY_SENSOR_INFO_BUILD
            };
            if legacy_firmware {
                let device = registry.record_mut(index);
                SensorProvisioner::provision(device, host, 0, handshake.imu_type, 1);
            }

            let device = registry.record(index);
            let pending = match codec.write_handshake_response(send_buf, device) {
                Ok(n) => Some((device.address(), send_buf[..n].to_vec())),
                Err(err) => {
                    tracing::warn!(%peer, error = %err, "failed to encode handshake response");
                    None
                }
            };

            tracing::info!(
                connection_index = index,
                adopted,
                board_type = device.board_type(),
                mcu_type = device.mcu_type(),
                firmware_build = device.firmware_build(),
                mac = ?device.mac(),
                name = device.name(),
                "handshake"
            );
            return pending;
        }

        let Some(index) = registry.index_by_address(peer) else {
            // Discovery echoes and stray packets from unknown peers are
            // dropped silently; logging them would be noisy.
            return None;
        };
        let device = registry.record_mut(index);
        let was_timed_out = device.timed_out();
        device.mark_packet_received();
        if was_timed_out {
            tracing::info!(connection_index = index, "device recovered");
        }

        let mut pending = None;

        match packet {
            Packet::Handshake(_) => unreachable!("handled above"),
            Packet::Heartbeat => {}
            Packet::LegacyRotation { sensor_id, rotation } => {
                let device = registry.record_mut(index);
                let transformed = apply_axes_offset(rotation);
                if let Some(tracker) = device.tracker_mut(sensor_id) {
                    tracker.set_rotation(transformed);
                    tracker.data_tick();
                }
            }
            Packet::RotationData {
                sensor_id,
                data_type,
                rotation,
            } => match data_type {
                RotationDataType::Normal => {
                    let device = registry.record_mut(index);
                    let transformed = apply_axes_offset(rotation);
                    if let Some(tracker) = device.tracker_mut(sensor_id) {
                        tracker.set_rotation(transformed);
                        tracker.data_tick();
                    }
                }
                RotationDataType::Correction => {
                    // Reserved; deliberately a no-op.
                }
                RotationDataType::Unknown(_) => {}
            },
            Packet::MagnetometerAccuracy { .. } => {}
            Packet::Acceleration { sensor_id, raw } => {
                let device = registry.record_mut(index);
                let remapped = remap_acceleration(raw);
                if let Some(tracker) = device.tracker_mut(sensor_id) {
                    tracker.set_acceleration(remapped);
                }
            }
            Packet::PingPong(pong) => {
                let device = registry.record_mut(index);
                if pong.ping_id == device.last_ping_packet_id() {
                    if let Some(sent_at) = device.last_ping_packet_time() {
                        let rtt_ms = sent_at.elapsed().as_millis() as u64;
                        let ping_ms = rtt_ms / 2;
                        device.for_each_tracker_mut(|tracker| {
                            tracker.set_ping_ms(ping_ms);
                            tracker.data_tick();
                        });
                    }
                } else {
                    tracing::debug!(
                        expected = device.last_ping_packet_id(),
                        got = pong.ping_id,
                        "mismatched ping id; dropping"
                    );
                }
            }
            Packet::Serial { payload } => {
                let device = registry.record(index);
                let line = format!("[{}] {}", device.name(), payload);
                host.console_line(&line);
            }
            Packet::BatteryLevel(battery) => {
                let device = registry.record_mut(index);
                let percent = battery.level * 100.0;
                device.for_each_tracker_mut(|tracker| {
                    tracker.set_battery(battery.voltage, percent);
                });
            }
            Packet::Tap { sensor_id, tap_count } => {
                tracing::info!(connection_index = index, sensor_id, tap_count, "tap");
            }
            Packet::Error(err) => {
                tracing::error!(
                    connection_index = index,
                    sensor_id = err.sensor_id,
                    error_code = err.error_code,
                    "device reported error"
                );
                let device = registry.record_mut(index);
                if let Some(tracker) = device.tracker_mut(err.sensor_id) {
                    tracker.set_status(crate::device::tracker::TrackerStatus::Error);
                }
            }
            Packet::SensorInfo {
                sensor_id,
                sensor_type,
                raw_status,
            } => {
                let device = registry.record_mut(index);
                SensorProvisioner::provision(device, host, sensor_id, sensor_type, raw_status);
                let device = registry.record(index);
                match codec.write_sensor_info_response(send_buf, device, sensor_id) {
                    Ok(n) => pending = Some((device.address(), send_buf[..n].to_vec())),
                    Err(err) => {
                        tracing::warn!(%peer, error = %err, "failed to encode sensor-info response")
                    }
                }
            }
            Packet::SignalStrength(signal) => {
                let device = registry.record_mut(index);
                device.for_each_tracker_mut(|tracker| tracker.set_signal_strength(signal.rssi));
            }
            Packet::Temperature(temp) => {
                let device = registry.record_mut(index);
                if let Some(tracker) = device.tracker_mut(temp.sensor_id) {
                    tracker.set_temperature(temp.temperature_celsius);
                }
            }
            Packet::UserAction(action) => {
                if let Some(reset) = action.action {
                    tracing::info!(connection_index = index, ?reset, "user action");
                    let handler = host.reset_handler();
                    match reset {
                        ResetAction::Full => {
                            handler.send_started(ResetType::Full);
                            handler.reset_trackers_full("TrackerServer");
                        }
                        ResetAction::Yaw => {
                            handler.send_started(ResetType::Yaw);
                            handler.reset_trackers_yaw("TrackerServer");
                        }
                        ResetAction::Mounting => {
                            handler.send_started(ResetType::Mounting);
                            handler.reset_trackers_mounting("TrackerServer");
                        }
                    }
                }
            }
            Packet::FeatureFlags { flags } => {
                let device = registry.record(index);
                match codec.write(send_buf, Some(device), &Packet::FeatureFlags { flags }) {
                    Ok(n) => pending = Some((device.address(), send_buf[..n].to_vec())),
                    Err(err) => {
                        tracing::warn!(%peer, error = %err, "failed to encode feature-flags reply")
                    }
                }
                registry.record_mut(index).set_firmware_features(flags);
            }
            Packet::ProtocolChange => {}
        }

        pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::HandshakePacket;
    use crate::test_support::{MockCodec, MockHost};
    use nalgebra::UnitQuaternion;
    use std::time::Duration;

    fn legacy_handshake(mac: [u8; 6]) -> HandshakePacket {
        HandshakePacket {
            mac: Some(mac),
            firmware: String::new(),
            firmware_build: 7,
            board_type: 1,
            mcu_type: 1,
            imu_type: 2,
        }
    }

    #[test]
    fn handshake_provisions_legacy_sensor_and_acks() {
        let mut registry = ConnectionRegistry::new();
        let mut host = MockHost::new();
        let mut codec = MockCodec::default();
        let mut buf = [0u8; 64];
        let peer: SocketAddr = "10.0.0.5:4567".parse().unwrap();

        let pending = PacketDispatcher::dispatch(
            Packet::Handshake(legacy_handshake([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF])),
            peer,
            &mut registry,
            &mut host,
            &mut codec,
            &mut buf,
        );

        let device = registry.lookup_by_address(peer).unwrap();
        assert_eq!(device.hardware_id(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(device.protocol(), Protocol::OwoLegacy);
        assert!(device.trackers().contains_key(&0));
        assert_eq!(host.log.added_devices, vec!["AA:BB:CC:DD:EE:FF".to_string()]);
        assert_eq!(host.log.added_trackers, vec![("AA:BB:CC:DD:EE:FF".to_string(), 0)]);
        assert_eq!(pending.unwrap().0, peer);
    }

    #[test]
    fn handshake_with_recent_firmware_build_does_not_auto_provision() {
        let mut registry = ConnectionRegistry::new();
        let mut host = MockHost::new();
        let mut codec = MockCodec::default();
        let mut buf = [0u8; 64];
        let peer: SocketAddr = "10.0.0.5:4567".parse().unwrap();
        let handshake = HandshakePacket {
            mac: Some([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]),
            firmware: "1.2.3".to_string(),
            firmware_build: LEGACY_SENSOR_INFO_BUILD,
            board_type: 1,
            mcu_type: 1,
            imu_type: 2,
        };

        PacketDispatcher::dispatch(
            Packet::Handshake(handshake),
            peer,
            &mut registry,
            &mut host,
            &mut codec,
            &mut buf,
        );

        let device = registry.lookup_by_address(peer).unwrap();
        assert_eq!(device.protocol(), Protocol::SlimeVrRaw);
        assert!(!device.trackers().contains_key(&0));
        assert!(host.log.added_trackers.is_empty());
    }

    #[test]
    fn session_migration_preserves_connection_index() {
        let mut registry = ConnectionRegistry::new();
        let mut host = MockHost::new();
        let mut codec = MockCodec::default();
        let mut buf = [0u8; 64];
        let mac = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];
        let peer1: SocketAddr = "10.0.0.5:4567".parse().unwrap();
        let peer2: SocketAddr = "10.0.0.6:4567".parse().unwrap();

        PacketDispatcher::dispatch(
            Packet::Handshake(legacy_handshake(mac)),
            peer1,
            &mut registry,
            &mut host,
            &mut codec,
            &mut buf,
        );
        let index_before = registry.connection_index("AA:BB:CC:DD:EE:FF").unwrap();

        PacketDispatcher::dispatch(
            Packet::Handshake(legacy_handshake(mac)),
            peer2,
            &mut registry,
            &mut host,
            &mut codec,
            &mut buf,
        );

        assert_eq!(registry.connection_index("AA:BB:CC:DD:EE:FF"), Some(index_before));
        assert!(registry.lookup_by_address(peer1).is_none());
        assert_eq!(registry.lookup_by_address(peer2).unwrap().address(), peer2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn rotation_data_applies_axes_offset_and_ticks_once() {
        let mut registry = ConnectionRegistry::new();
        let mut host = MockHost::new();
        let mut codec = MockCodec::default();
        let mut buf = [0u8; 64];
        let peer: SocketAddr = "10.0.0.5:4567".parse().unwrap();

        PacketDispatcher::dispatch(
            Packet::Handshake(legacy_handshake([1, 2, 3, 4, 5, 6])),
            peer,
            &mut registry,
            &mut host,
            &mut codec,
            &mut buf,
        );
        let local_id = *host.created.keys().next().unwrap();

        PacketDispatcher::dispatch(
            Packet::RotationData {
                sensor_id: 0,
                data_type: RotationDataType::Normal,
                rotation: UnitQuaternion::identity(),
            },
            peer,
            &mut registry,
            &mut host,
            &mut codec,
            &mut buf,
        );

        let snapshot = host.created.get(&local_id).unwrap().snapshot();
        assert_eq!(snapshot.ticks, 1);
        assert!(snapshot
            .rotation
            .unwrap()
            .angle_to(&crate::axes::axes_offset())
            < 1e-9);
    }

    #[test]
    fn ping_pong_with_matching_id_halves_rtt() {
        let mut registry = ConnectionRegistry::new();
        let mut host = MockHost::new();
        let mut codec = MockCodec::default();
        let mut buf = [0u8; 64];
        let peer: SocketAddr = "10.0.0.5:4567".parse().unwrap();

        PacketDispatcher::dispatch(
            Packet::Handshake(legacy_handshake([1, 2, 3, 4, 5, 6])),
            peer,
            &mut registry,
            &mut host,
            &mut codec,
            &mut buf,
        );
        let local_id = *host.created.keys().next().unwrap();

        registry.record_mut(0).start_ping(42);
        std::thread::sleep(Duration::from_millis(20));

        PacketDispatcher::dispatch(
            Packet::PingPong(crate::protocol::packet::PingPongPacket { ping_id: 42 }),
            peer,
            &mut registry,
            &mut host,
            &mut codec,
            &mut buf,
        );

        let snapshot = host.created.get(&local_id).unwrap().snapshot();
        assert!(snapshot.ping_ms.is_some());
    }

    #[test]
    fn ping_pong_with_mismatched_id_leaves_ping_unset() {
        let mut registry = ConnectionRegistry::new();
        let mut host = MockHost::new();
        let mut codec = MockCodec::default();
        let mut buf = [0u8; 64];
        let peer: SocketAddr = "10.0.0.5:4567".parse().unwrap();

        PacketDispatcher::dispatch(
            Packet::Handshake(legacy_handshake([1, 2, 3, 4, 5, 6])),
            peer,
            &mut registry,
            &mut host,
            &mut codec,
            &mut buf,
        );
        let local_id = *host.created.keys().next().unwrap();
        registry.record_mut(0).start_ping(42);

        PacketDispatcher::dispatch(
            Packet::PingPong(crate::protocol::packet::PingPongPacket { ping_id: 99 }),
            peer,
            &mut registry,
            &mut host,
            &mut codec,
            &mut buf,
        );

        let snapshot = host.created.get(&local_id).unwrap().snapshot();
        assert!(snapshot.ping_ms.is_none());
    }

    #[test]
    fn unknown_peer_packet_is_dropped_silently() {
        let mut registry = ConnectionRegistry::new();
        let mut host = MockHost::new();
        let mut codec = MockCodec::default();
        let mut buf = [0u8; 64];
        let peer: SocketAddr = "10.0.0.9:4567".parse().unwrap();

        let pending = PacketDispatcher::dispatch(
            Packet::Heartbeat,
            peer,
            &mut registry,
            &mut host,
            &mut codec,
            &mut buf,
        );

        assert!(registry.is_empty());
        assert!(pending.is_none());
    }
}
