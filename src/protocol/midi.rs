//! The 3-byte MIDI message shared by every transport.
//!
//! All three backends carry the same payload unit: a status byte followed
//! by two data bytes. The wireless path sends it as a raw 3-byte UDP
//! datagram, the serial adapter writes it to the UART as-is, and the USB
//! path wraps it in the standard 4-byte USB-MIDI event packet:
//!
//! ```text
//! ┌───────────────────┬──────────┬──────────┬──────────┐
//! │ cable/code-index  │  status  │  data1   │  data2   │
//! │      1 byte       │  1 byte  │  1 byte  │  1 byte  │
//! └───────────────────┴──────────┴──────────┴──────────┘
//! ```

/// Length of a raw MIDI message on the wire.
pub const MIDI_MESSAGE_LEN: usize = 3;

/// Length of a USB-MIDI event packet.
pub const USB_MIDI_PACKET_LEN: usize = 4;

/// A MIDI message as carried by every transport: status byte plus two
/// data bytes. Plain value type, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiMessage {
    /// Status byte (message type in the high nibble, channel in the low).
    pub status: u8,
    /// First data byte.
    pub data1: u8,
    /// Second data byte.
    pub data2: u8,
}

impl MidiMessage {
    /// Creates a message from its three raw bytes.
    #[must_use]
    pub const fn new(status: u8, data1: u8, data2: u8) -> Self {
        Self {
            status,
            data1,
            data2,
        }
    }

    /// The all-zero message used as a wireless keepalive beacon.
    #[must_use]
    pub const fn keepalive() -> Self {
        Self::new(0, 0, 0)
    }

    /// Note On for `note` on `channel` (0-15) at `velocity`.
    #[must_use]
    pub const fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F)
    }

    /// Note Off for `note` on `channel` (0-15).
    #[must_use]
    pub const fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F)
    }

    /// Control Change on `channel` (0-15).
    #[must_use]
    pub const fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Self::new(0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F)
    }

    /// Serializes to the raw 3-byte wire form.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; MIDI_MESSAGE_LEN] {
        [self.status, self.data1, self.data2]
    }

    /// Parses the raw 3-byte wire form.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; MIDI_MESSAGE_LEN]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2])
    }

    /// Wraps the message in a USB-MIDI event packet on cable 0.
    ///
    /// For channel voice messages the code index number equals the high
    /// nibble of the status byte.
    #[must_use]
    pub const fn to_usb_packet(self) -> [u8; USB_MIDI_PACKET_LEN] {
        [self.status >> 4, self.status, self.data1, self.data2]
    }

    /// Extracts the message from a USB-MIDI event packet.
    ///
    /// Byte 0 (the cable/code-index byte) is discarded.
    #[must_use]
    pub const fn from_usb_packet(packet: [u8; USB_MIDI_PACKET_LEN]) -> Self {
        Self::new(packet[1], packet[2], packet[3])
    }
}
