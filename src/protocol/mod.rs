//! Wire-protocol types and the external `ProtocolCodec` collaborator contract.
//!
//! The byte-level encoding of each packet kind is owned by an external
//! codec (see [`codec::ProtocolCodec`]); this module only defines the typed
//! packet variants it produces and consumes, plus the handful of literal
//! wire formats the core itself emits unconditionally.

pub mod codec;
pub mod packet;

pub use codec::{ProtocolCodec, HEARTBEAT_PAYLOAD_LEN, PING_PAYLOAD_LEN};
pub use packet::{
    BatteryLevelPacket, ErrorPacket, HandshakePacket, Packet, PingPongPacket, ResetAction,
    RotationDataType, SignalStrengthPacket, TemperaturePacket, UserActionPacket,
};
