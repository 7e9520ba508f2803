//! The `ProtocolCodec` collaborator contract.
//!
//! Byte-level encoding of each packet kind is an external concern (see the
//! crate root docs); this trait is the seam a concrete codec plugs into.
//! The two wire formats below are the exception: the core emits them
//! unconditionally, independent of any device or codec state, so they are
//! implemented here rather than delegated.

use crate::device::DeviceRecord;
use crate::error::CodecError;
use crate::protocol::packet::Packet;

/// Parses datagrams into [`Packet`]s and serializes packets back to bytes.
///
/// Implementations are tolerant of unknown kinds: `parse` yields an empty
/// sequence rather than erroring when it doesn't recognize a kind byte, so
/// that discovery echoes and future protocol versions don't spam the log.
pub trait ProtocolCodec {
    /// Parses zero or more packets out of one datagram payload.
    ///
    /// `device` is the already-known record for the sender, if any; codecs
    /// use it for stateful decoding (e.g. duplicate-sequence suppression).
    fn parse(
        &mut self,
        buffer: &[u8],
        device: Option<&DeviceRecord>,
    ) -> std::result::Result<Vec<Packet>, CodecError>;

    /// Serializes `packet` into `buffer`, returning the number of bytes written.
    fn write(
        &mut self,
        buffer: &mut [u8],
        device: Option<&DeviceRecord>,
        packet: &Packet,
    ) -> std::result::Result<usize, CodecError>;

    /// Serializes the handshake acknowledgement for `device`.
    fn write_handshake_response(
        &mut self,
        buffer: &mut [u8],
        device: &DeviceRecord,
    ) -> std::result::Result<usize, CodecError>;

    /// Serializes the sensor-info acknowledgement for `device`.
    fn write_sensor_info_response(
        &mut self,
        buffer: &mut [u8],
        device: &DeviceRecord,
        sensor_id: u8,
    ) -> std::result::Result<usize, CodecError>;
}

/// Wire kind byte for the raw ping-pong datagram.
pub const PING_KIND: i32 = 10;
/// `int32 kind | int64 sequence | int32 ping_id`
pub const PING_PAYLOAD_LEN: usize = 4 + 8 + 4;
/// `int32 kind`
pub const HEARTBEAT_PAYLOAD_LEN: usize = 4;

/// Writes the raw ping datagram the server emits unconditionally at the
/// keepalive cadence: big-endian `int32(10) | int64(0) | int32(ping_id)`.
pub fn write_raw_ping(buffer: &mut [u8], ping_id: i32) -> std::result::Result<usize, CodecError> {
    if buffer.len() < PING_PAYLOAD_LEN {
        return Err(CodecError::BufferTooSmall {
            needed: PING_PAYLOAD_LEN,
            available: buffer.len(),
        });
    }
    buffer[0..4].copy_from_slice(&PING_KIND.to_be_bytes());
    buffer[4..12].copy_from_slice(&0i64.to_be_bytes());
    buffer[12..16].copy_from_slice(&ping_id.to_be_bytes());
    Ok(PING_PAYLOAD_LEN)
}

/// Writes the heartbeat datagram used for both discovery (`kind=0`) and
/// keepalive (`kind=1`): big-endian `int32(kind)`.
pub fn write_heartbeat(buffer: &mut [u8], kind: i32) -> std::result::Result<usize, CodecError> {
    if buffer.len() < HEARTBEAT_PAYLOAD_LEN {
        return Err(CodecError::BufferTooSmall {
            needed: HEARTBEAT_PAYLOAD_LEN,
            available: buffer.len(),
        });
    }
    buffer[0..4].copy_from_slice(&kind.to_be_bytes());
    Ok(HEARTBEAT_PAYLOAD_LEN)
}
