//! Typed packet variants produced by [`super::codec::ProtocolCodec::parse`].
//!
//! Modeled as one tagged enum rather than a class hierarchy, matching the
//! kind-byte-first wire layout in the spec: dispatch is exhaustive `match`,
//! not virtual calls.

use nalgebra::{UnitQuaternion, Vector3};

/// A single logical packet parsed out of one datagram.
///
/// Kind numbers in comments are the wire values from the protocol design;
/// `Heartbeat(0)`/`Heartbeat(1)` collapse legacy in/out heartbeats into one
/// variant since neither carries a payload the dispatcher inspects.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// kind 0 or 1
    Heartbeat,
    /// kind 3
    Handshake(HandshakePacket),
    /// pre-handshake owoTrack rotation (no kind byte of its own on the wire;
    /// distinguished by the codec from context)
    LegacyRotation { sensor_id: u8, rotation: UnitQuaternion<f64> },
    /// kind 4
    Acceleration { sensor_id: u8, raw: Vector3<f64> },
    /// kind 10
    PingPong(PingPongPacket),
    /// kind 11
    Serial { payload: String },
    /// kind 12
    BatteryLevel(BatteryLevelPacket),
    /// kind 13
    Tap { sensor_id: u8, tap_count: u8 },
    /// kind 14
    Error(ErrorPacket),
    /// kind 15
    SensorInfo { sensor_id: u8, sensor_type: u8, raw_status: u8 },
    /// kind 17
    RotationData {
        sensor_id: u8,
        data_type: RotationDataType,
        rotation: UnitQuaternion<f64>,
    },
    /// kind 18
    MagnetometerAccuracy { sensor_id: u8 },
    /// kind 19
    SignalStrength(SignalStrengthPacket),
    /// kind 20
    Temperature(TemperaturePacket),
    /// kind 21
    UserAction(UserActionPacket),
    /// kind 22
    FeatureFlags { flags: u32 },
    /// kind 200, reserved
    ProtocolChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationDataType {
    Normal,
    /// Wired up but deliberately a no-op; do not guess an application.
    Correction,
    Unknown(u8),
}

impl From<u8> for RotationDataType {
    fn from(value: u8) -> Self {
        match value {
            1 => RotationDataType::Normal,
            2 => RotationDataType::Correction,
            other => RotationDataType::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandshakePacket {
    pub mac: Option<[u8; 6]>,
    pub firmware: String,
    pub firmware_build: i32,
    pub board_type: i32,
    pub mcu_type: i32,
    pub imu_type: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingPongPacket {
    pub ping_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryLevelPacket {
    pub voltage: f32,
    pub level: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorPacket {
    pub sensor_id: u8,
    pub error_code: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalStrengthPacket {
    pub rssi: i16,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperaturePacket {
    pub sensor_id: u8,
    pub temperature_celsius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetAction {
    Full,
    Yaw,
    Mounting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserActionPacket {
    pub action: Option<ResetAction>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_data_type_decodes_known_values() {
        assert_eq!(RotationDataType::from(1), RotationDataType::Normal);
        assert_eq!(RotationDataType::from(2), RotationDataType::Correction);
        assert_eq!(RotationDataType::from(9), RotationDataType::Unknown(9));
    }
}
