//! Error types for the dsmidi library.

use thiserror::Error;

/// The main error type for dsmidi operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Serial port error.
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// OSC encoding/decoding error.
    #[error("OSC error: {0}")]
    Osc(#[from] OscError),

    /// No transport backend could be connected.
    #[error("no transport available")]
    NoTransport,

    /// Operation requires a connected backend.
    #[error("not connected")]
    NotConnected,

    /// The wireless radio reported it cannot associate with the access point.
    #[error("association failed")]
    AssociationFailed,

    /// Operation timed out.
    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// No serial adapter is physically attached.
    ///
    /// This is the "capability absent" case: the selector treats it as a
    /// silent fallback trigger, not a hard fault.
    #[error("serial adapter not present")]
    AdapterNotPresent,

    /// Serial adapter firmware or bus error.
    #[error("adapter error: {message}")]
    Adapter { message: String },

    /// USB device-role initialization failed.
    #[error("USB device init failed")]
    UsbInitFailed,
}

/// OSC-specific errors.
#[derive(Debug, Error)]
pub enum OscError {
    /// The address pattern is not a valid OSC address.
    #[error("bad OSC address: {reason}")]
    BadAddress { reason: &'static str },

    /// Adding the argument would exceed the maximum packet size.
    #[error("OSC packet full: {needed} bytes exceeds maximum {max}")]
    PacketFull { needed: usize, max: usize },

    /// Incoming packet ended before the announced data.
    #[error("truncated OSC packet: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },

    /// Unsupported or invalid type tag in an incoming packet.
    #[error("bad OSC type tag: {0:?}")]
    BadTypeTag(char),

    /// Packet structure is otherwise invalid.
    #[error("malformed OSC packet: {reason}")]
    Malformed { reason: &'static str },
}

/// Result type alias for dsmidi operations.
pub type Result<T> = std::result::Result<T, Error>;
