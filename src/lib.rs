//! Connection and session core for a UDP owoTrack/SlimeVR-lineage tracker
//! server.
//!
//! This crate owns device discovery, session/connection bookkeeping, sensor
//! provisioning, and the single-threaded event loop that drives them. Byte-
//! level wire encoding is deliberately out of scope: callers supply a
//! [`protocol::ProtocolCodec`] implementation, and receive pose/status
//! updates through a [`device::Tracker`] they own, reported via the
//! [`host::Host`] collaborator. The two exceptions are the raw ping and
//! heartbeat datagrams ([`protocol::codec::write_raw_ping`],
//! [`protocol::codec::write_heartbeat`]), which this crate emits itself
//! since their format never varies with the external codec.

pub mod axes;
pub mod config;
pub mod device;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod event_loop;
pub mod host;
pub mod protocol;
pub mod registry;
pub mod sensors;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::ServerConfig;
pub use error::{CodecError, ConfigError, CoreError, Result};
pub use event_loop::EventLoop;
pub use host::{Host, ResetHandler, ResetType};
pub use registry::{ConnectionRegistry, DeviceSummary, SharedRegistry};
