//! Wire-format definitions shared by the transports.
//!
//! This module contains the payload-level types:
//! - The 3-byte MIDI message and its USB-MIDI event packet form
//! - OSC packet encoding/decoding for the wireless payload path

pub mod midi;
pub mod osc;

pub use midi::{MIDI_MESSAGE_LEN, MidiMessage, USB_MIDI_PACKET_LEN};
pub use osc::{MAX_PACKET_SIZE as OSC_MAX_PACKET_SIZE, OscArg, OscPacket, OscWriter};
