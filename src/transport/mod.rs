//! Transport backends carrying the 3-byte MIDI payload.
//!
//! Each physical channel (wireless, serial adapter, USB) implements
//! [`MidiTransport`]. The hardware itself sits behind per-backend
//! capability traits ([`wireless::Radio`], [`serial::AdapterLink`],
//! [`usb::UsbMidiDevice`]) so the protocol adapters stay testable without
//! a console attached.

pub mod serial;
pub mod usb;
pub mod wireless;

#[cfg(test)]
pub(crate) mod mock;

use std::fmt;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::protocol::MidiMessage;

/// Identifies one of the physical transports.
///
/// The selector holds `Option<InterfaceId>`; `None` means disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceId {
    /// Cartridge-attached serial adapter.
    SerialAdapter,
    /// USB device link.
    Usb,
    /// Wireless UDP broadcast link.
    Wireless,
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SerialAdapter => write!(f, "serial adapter"),
            Self::Usb => write!(f, "USB"),
            Self::Wireless => write!(f, "wireless"),
        }
    }
}

/// Trait implemented by every transport backend.
pub trait MidiTransport: Send {
    /// Which interface this backend drives.
    fn id(&self) -> InterfaceId;

    /// Brings the transport up. On failure the backend must tear down any
    /// partial session state before returning, so the selector can fall
    /// through to the next backend.
    fn connect(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Tears the session down. No-op when not connected.
    fn disconnect(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Sends one MIDI message.
    fn send(&mut self, message: MidiMessage) -> BoxFuture<'_, Result<()>>;

    /// Non-blocking receive. Transient receive faults are indistinguishable
    /// from "nothing arrived": both yield `None`.
    fn try_receive(&mut self) -> Option<MidiMessage>;

    /// Returns true while a session is established.
    fn is_connected(&self) -> bool;

    /// Fixed-rate (50 ms) timer hook for backends with periodic duties.
    fn tick(&mut self) {}

    /// Cooperative servicing hook; returns whether work was performed.
    /// Safe to call every iteration regardless of connection state.
    fn task(&mut self) -> bool {
        false
    }
}

pub use serial::{AdapterLink, HostSerialLink, SerialAdapterTransport};
pub use usb::{UsbMidiDevice, UsbTransport};
pub use wireless::{Radio, WirelessTransport};
