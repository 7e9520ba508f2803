//! Error types for the tracker server core.

use thiserror::Error;

/// Core error type for the connection/event-loop layer.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by an external `ProtocolCodec` implementation while
/// parsing an inbound datagram or serializing an outbound packet.
///
/// `parse` only ever receives the datagram bytes and the sender's
/// already-known `DeviceRecord` (if any) — never the raw peer address — so
/// these variants carry no `SocketAddr`. Callers that want the peer in their
/// logs attach it separately (see `dispatch_received`'s `%peer` field).
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("datagram too short: {len} bytes")]
    TooShort { len: usize },

    #[error("unknown packet kind {kind}")]
    UnknownKind { kind: i32 },

    #[error("malformed payload for kind {kind}: {reason}")]
    Malformed { kind: i32, reason: String },

    #[error("send buffer too small: needed {needed}, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
}

/// Configuration errors for `ServerConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid UDP port: {0}")]
    InvalidPort(u16),

    #[error("thread name must not be empty")]
    EmptyThreadName,
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
