//! Main [`DsMidi`] client implementation.
//!
//! [`DsMidi`] is the interface selector: it owns one backend per physical
//! transport, tries them in a fixed priority order on connect, and routes
//! all traffic to whichever one is active. It also carries the OSC
//! payload surface, which rides the wireless backend's socket pair.

use crate::error::{Error, OscError, Result};
use crate::protocol::{MidiMessage, OSC_MAX_PACKET_SIZE, OscArg, OscPacket, OscWriter};
use crate::transport::serial::{AdapterLink, SerialAdapterConfig, SerialAdapterTransport};
use crate::transport::usb::{UsbMidiDevice, UsbTransport};
use crate::transport::wireless::{Radio, WirelessConfig, WirelessTransport};
use crate::transport::{InterfaceId, MidiTransport};

/// Backend priority order: prefer the wired low-latency link, then USB,
/// then wireless.
const PRIORITY: [InterfaceId; 3] = [
    InterfaceId::SerialAdapter,
    InterfaceId::Usb,
    InterfaceId::Wireless,
];

/// Client for sending and receiving 3-byte MIDI messages over whichever
/// transport is available.
///
/// Backends are registered through [`DsMidiBuilder`]; a transport is
/// available exactly when its capability provider was supplied.
pub struct DsMidi {
    serial: Option<SerialAdapterTransport>,
    usb: Option<UsbTransport>,
    wireless: Option<WirelessTransport>,
    active: Option<InterfaceId>,

    // OSC buffers: one message under construction, one most recently
    // decoded. Each is overwritten wholesale by osc_new / osc_read.
    osc_out: Option<OscWriter>,
    osc_in: Option<OscPacket>,
}

/// Registry of capability providers, resolved once into a [`DsMidi`].
#[derive(Default)]
pub struct DsMidiBuilder {
    serial: Option<SerialAdapterTransport>,
    usb: Option<UsbTransport>,
    wireless: Option<WirelessTransport>,
}

impl DsMidiBuilder {
    /// Registers the serial-adapter backend.
    #[must_use]
    pub fn serial_adapter(
        mut self,
        link: impl AdapterLink + 'static,
        config: SerialAdapterConfig,
    ) -> Self {
        self.serial = Some(SerialAdapterTransport::new(link, config));
        self
    }

    /// Registers the USB backend.
    #[must_use]
    pub fn usb(mut self, device: impl UsbMidiDevice + 'static) -> Self {
        self.usb = Some(UsbTransport::new(device));
        self
    }

    /// Registers the wireless backend.
    #[must_use]
    pub fn wireless(mut self, radio: impl Radio + 'static, config: WirelessConfig) -> Self {
        self.wireless = Some(WirelessTransport::new(radio, config));
        self
    }

    /// Builds the client (not yet connected).
    #[must_use]
    pub fn build(self) -> DsMidi {
        DsMidi {
            serial: self.serial,
            usb: self.usb,
            wireless: self.wireless,
            active: None,
            osc_out: None,
            osc_in: None,
        }
    }
}

impl DsMidi {
    /// Starts building a client.
    #[must_use]
    pub fn builder() -> DsMidiBuilder {
        DsMidiBuilder::default()
    }

    fn backend_mut(&mut self, id: InterfaceId) -> Option<&mut dyn MidiTransport> {
        match id {
            InterfaceId::SerialAdapter => self
                .serial
                .as_mut()
                .map(|t| t as &mut dyn MidiTransport),
            InterfaceId::Usb => self.usb.as_mut().map(|t| t as &mut dyn MidiTransport),
            InterfaceId::Wireless => self
                .wireless
                .as_mut()
                .map(|t| t as &mut dyn MidiTransport),
        }
    }

    fn active_backend_mut(&mut self) -> Option<&mut dyn MidiTransport> {
        let id = self.active?;
        self.backend_mut(id)
    }

    /// Connects the first available backend, in priority order: serial
    /// adapter, USB, wireless.
    ///
    /// Already connected is a no-op returning the active interface. A
    /// backend that fails to connect leaves no partial state behind, so
    /// the whole call is safe to retry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoTransport`] if every registered backend failed;
    /// the client stays disconnected.
    pub async fn connect(&mut self) -> Result<InterfaceId> {
        if let Some(active) = self.active {
            return Ok(active);
        }

        for id in PRIORITY {
            let Some(backend) = self.backend_mut(id) else {
                continue;
            };
            match backend.connect().await {
                Ok(()) => {
                    tracing::info!("connected via {id}");
                    self.active = Some(id);
                    return Ok(id);
                }
                Err(e) => {
                    tracing::debug!("{id} unavailable, falling back: {e}");
                }
            }
        }

        Err(Error::NoTransport)
    }

    /// Disconnects the active backend. Idempotent: calling this while
    /// already disconnected is a no-op.
    pub async fn disconnect(&mut self) -> Result<()> {
        let Some(id) = self.active.take() else {
            return Ok(());
        };
        if let Some(backend) = self.backend_mut(id) {
            backend.disconnect().await?;
        }
        tracing::info!("disconnected from {id}");
        Ok(())
    }

    /// The currently active interface, or `None` when disconnected.
    #[must_use]
    pub const fn active_interface(&self) -> Option<InterfaceId> {
        self.active
    }

    /// Sends a MIDI message over the active interface.
    ///
    /// Fire-and-forget: when disconnected the message is silently dropped
    /// rather than reported as an error.
    pub async fn write(&mut self, status: u8, data1: u8, data2: u8) -> Result<()> {
        self.write_message(MidiMessage::new(status, data1, data2))
            .await
    }

    /// [`DsMidi::write`] taking a [`MidiMessage`].
    pub async fn write_message(&mut self, message: MidiMessage) -> Result<()> {
        match self.active_backend_mut() {
            Some(backend) => backend.send(message).await,
            None => Ok(()),
        }
    }

    /// Non-blocking receive from the active interface.
    ///
    /// Returns `None` when disconnected, when nothing arrived, or on the
    /// serial adapter (whose receive path is unimplemented by design).
    pub fn read(&mut self) -> Option<MidiMessage> {
        self.active_backend_mut()?.try_receive()
    }

    /// Services backends that need cooperative polling (USB). Safe to
    /// call unconditionally every iteration; returns whether any backend
    /// performed work.
    pub fn task(&mut self) -> bool {
        let mut worked = false;
        for id in PRIORITY {
            if let Some(backend) = self.backend_mut(id) {
                worked |= backend.task();
            }
        }
        worked
    }

    /// The caller's fixed 50 ms timer callback. Drives the wireless
    /// network stack's timer service and the keepalive schedule.
    pub fn timer_tick(&mut self) {
        if let Some(wireless) = self.wireless.as_mut() {
            wireless.tick();
        }
    }

    // ==================== OSC payload path ====================

    fn osc_writer_mut(&mut self) -> Result<&mut OscWriter> {
        self.osc_out.as_mut().ok_or(Error::Osc(OscError::Malformed {
            reason: "no message under construction",
        }))
    }

    fn connected_wireless(&self) -> Result<&WirelessTransport> {
        self.wireless
            .as_ref()
            .filter(|w| w.is_connected())
            .ok_or(Error::NotConnected)
    }

    /// Starts a fresh outgoing OSC message for the given address pattern,
    /// discarding any message previously under construction.
    pub fn osc_new(&mut self, address: &str) -> Result<()> {
        self.osc_out = Some(OscWriter::new(address)?);
        Ok(())
    }

    /// Appends an integer argument to the outgoing OSC message.
    pub fn osc_add_int(&mut self, value: i32) -> Result<()> {
        Ok(self.osc_writer_mut()?.add_int(value)?)
    }

    /// Appends a float argument to the outgoing OSC message.
    pub fn osc_add_float(&mut self, value: f32) -> Result<()> {
        Ok(self.osc_writer_mut()?.add_float(value)?)
    }

    /// Appends a string argument to the outgoing OSC message.
    pub fn osc_add_str(&mut self, value: &str) -> Result<()> {
        Ok(self.osc_writer_mut()?.add_str(value)?)
    }

    /// Sends the finished OSC message as one datagram to the same
    /// broadcast destination the raw MIDI path uses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] (with nothing transmitted) unless
    /// the wireless backend is connected; OSC is a parallel payload path
    /// over its sockets, not a separate interface.
    pub async fn osc_send(&mut self) -> Result<()> {
        let packet = self.osc_writer_mut()?.encode();
        let wireless = self.connected_wireless()?;
        wireless.send_datagram(&packet).await
    }

    /// Non-blocking receive and decode of one OSC packet.
    ///
    /// Returns `Ok(true)` when a packet was decoded (replacing the
    /// previous one), `Ok(false)` when nothing arrived or the wireless
    /// backend is down, and an error for arriving-but-malformed packets.
    pub fn osc_read(&mut self) -> Result<bool> {
        let Ok(wireless) = self.connected_wireless() else {
            return Ok(false);
        };
        let mut buf = [0u8; OSC_MAX_PACKET_SIZE];
        let Some(len) = wireless.try_recv_datagram(&mut buf) else {
            return Ok(false);
        };
        self.osc_in = Some(OscPacket::decode(&buf[..len])?);
        Ok(true)
    }

    /// Address pattern of the most recently decoded OSC packet.
    #[must_use]
    pub fn osc_address(&self) -> Option<&str> {
        self.osc_in.as_ref().map(OscPacket::address)
    }

    /// Next argument of the most recently decoded OSC packet, advancing
    /// the cursor. Not restartable without decoding another packet.
    pub fn osc_next_arg(&mut self) -> Option<OscArg> {
        self.osc_in.as_mut()?.next_arg()
    }
}
