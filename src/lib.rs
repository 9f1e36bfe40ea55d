//! # dsmidi
//!
//! A MIDI transport library for handheld consoles.
//!
//! Application code sends and receives 3-byte MIDI messages without
//! caring whether the physical transport is a wireless UDP broadcast
//! link, a cartridge-attached serial adapter, or a USB device link. The
//! client tries the backends in a fixed priority order (serial adapter,
//! USB, wireless) and routes all traffic to the first one that connects.
//!
//! ## Features
//!
//! - One 3-byte message API over three incompatible wire protocols
//! - Automatic fallback across transports on connect
//! - Wireless keepalive beacons driven by the caller's 50 ms timer
//! - OSC packets as an alternative payload over the wireless sockets
//! - Hardware behind capability traits, so everything tests without a
//!   console attached
//!
//! ## Quick Start
//!
//! ```no_run
//! use dsmidi::{DsMidi, WirelessConfig};
//! # use dsmidi::transport::wireless::{AssociationStatus, IpInfo, Radio};
//! # struct ConsoleRadio;
//! # impl Radio for ConsoleRadio {
//! #     fn power_up(&mut self) -> dsmidi::Result<()> { Ok(()) }
//! #     fn power_down(&mut self) {}
//! #     fn service_timer(&mut self, _: u32) {}
//! #     fn association_status(&mut self) -> AssociationStatus { AssociationStatus::Associated }
//! #     fn disassociate(&mut self) {}
//! #     fn ip_info(&self) -> dsmidi::Result<IpInfo> { unimplemented!() }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), dsmidi::Error> {
//!     let mut client = DsMidi::builder()
//!         .wireless(ConsoleRadio, WirelessConfig::default())
//!         .build();
//!
//!     let interface = client.connect().await?;
//!     println!("connected via {interface}");
//!
//!     // Middle C, full velocity, channel 1.
//!     client.write(0x90, 60, 127).await?;
//!
//!     // The main loop services cooperative backends and the 50 ms timer
//!     // callback drives the wireless keepalive.
//!     client.task();
//!     client.timer_tick();
//!
//!     if let Some(message) = client.read() {
//!         println!("received {message:?}");
//!     }
//!
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`protocol`] - Payload formats (the 3-byte MIDI message, USB-MIDI
//!   event packets, OSC encoding/decoding)
//! - [`transport`] - The [`transport::MidiTransport`] trait and the
//!   wireless, serial-adapter and USB backends with their capability
//!   traits
//! - [`client`] - The high-level [`DsMidi`] selector
//! - [`error`] - Error types

pub mod client;
pub mod error;
pub mod protocol;
pub mod transport;

// Re-exports for convenience
pub use client::{DsMidi, DsMidiBuilder};
pub use error::{Error, OscError, Result};
pub use protocol::{MidiMessage, OscArg, OscPacket, OscWriter};
pub use transport::serial::{
    AdapterLink, AdapterModes, AdapterStatus, HostSerialLink, MIDI_BAUD_RATE, SerialAdapterConfig,
};
pub use transport::usb::{UsbMidiDevice, UsbRole};
pub use transport::wireless::{
    AssociationStatus, IpInfo, KEEPALIVE_TICKS, Radio, TICK_MS, WirelessConfig,
};
pub use transport::{InterfaceId, MidiTransport};
