//! USB transport: MIDI over the USB device role.
//!
//! The USB stack sits behind the [`UsbMidiDevice`] capability trait. The
//! stack does not run on interrupts: [`MidiTransport::task`] must be
//! invoked every caller iteration and is this backend's only source of
//! forward progress.

use futures::future::BoxFuture;

use crate::error::{Error, Result};
use crate::protocol::{MidiMessage, USB_MIDI_PACKET_LEN};
use crate::transport::{InterfaceId, MidiTransport};

/// USB operating role. This library always initializes the device role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsbRole {
    /// USB device (the console is the peripheral).
    Device,
}

/// Capability provider for the USB MIDI device stack.
pub trait UsbMidiDevice: Send {
    /// Initializes the stack in the given role; false means the stack
    /// could not be brought up.
    fn init(&mut self, role: UsbRole) -> bool;

    /// Deinitializes the stack.
    fn deinit(&mut self);

    /// Queues a 3-byte MIDI message on the streaming endpoint (the stack
    /// packetizes it).
    fn stream_write(&mut self, midi: &[u8; 3]);

    /// Whether a received event packet is waiting.
    fn packet_available(&self) -> bool;

    /// Reads one 4-byte USB-MIDI event packet, if available.
    fn read_packet(&mut self) -> Option<[u8; USB_MIDI_PACKET_LEN]>;

    /// Advances the stack's internal processing.
    fn task(&mut self);
}

/// USB transport backend.
pub struct UsbTransport {
    device: Box<dyn UsbMidiDevice>,
    enabled: bool,
}

impl UsbTransport {
    /// Creates a USB transport over the given device stack.
    #[must_use]
    pub fn new(device: impl UsbMidiDevice + 'static) -> Self {
        Self {
            device: Box::new(device),
            enabled: false,
        }
    }
}

impl MidiTransport for UsbTransport {
    fn id(&self) -> InterfaceId {
        InterfaceId::Usb
    }

    fn connect(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.enabled {
                return Ok(());
            }
            if !self.device.init(UsbRole::Device) {
                return Err(Error::UsbInitFailed);
            }
            tracing::info!("USB device role initialized");
            self.enabled = true;
            Ok(())
        })
    }

    fn disconnect(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.enabled {
                tracing::info!("USB device role deinitialized");
                self.device.deinit();
                self.enabled = false;
            }
            Ok(())
        })
    }

    fn send(&mut self, message: MidiMessage) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if !self.enabled {
                return Err(Error::NotConnected);
            }
            self.device.stream_write(&message.to_bytes());
            Ok(())
        })
    }

    fn try_receive(&mut self) -> Option<MidiMessage> {
        if !self.enabled || !self.device.packet_available() {
            return None;
        }
        self.device.read_packet().map(MidiMessage::from_usb_packet)
    }

    fn is_connected(&self) -> bool {
        self.enabled
    }

    fn task(&mut self) -> bool {
        if !self.enabled {
            return false;
        }
        self.device.task();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{LoopbackUsbDevice, MockUsbDevice};

    #[tokio::test]
    async fn test_connect_initializes_device_role() {
        let device = MockUsbDevice::working();
        let state = device.state.clone();

        let mut transport = UsbTransport::new(device);
        transport.connect().await.unwrap();

        assert_eq!(state.lock().unwrap().inited, Some(UsbRole::Device));
        assert!(transport.is_connected());
    }

    #[tokio::test]
    async fn test_failed_init_reports_error() {
        let mut transport = UsbTransport::new(MockUsbDevice::broken());
        let err = transport.connect().await.unwrap_err();
        assert!(matches!(err, Error::UsbInitFailed));
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_send_streams_three_bytes() {
        let device = MockUsbDevice::working();
        let state = device.state.clone();

        let mut transport = UsbTransport::new(device);
        transport.connect().await.unwrap();
        transport.send(MidiMessage::new(0xB0, 7, 100)).await.unwrap();

        assert_eq!(state.lock().unwrap().written, vec![[0xB0, 7, 100]]);
    }

    #[tokio::test]
    async fn test_receive_discards_cable_byte() {
        let device = MockUsbDevice::working();
        device.state.lock().unwrap().inbox.push_back([0x09, 0x90, 60, 127]);

        let mut transport = UsbTransport::new(device);
        transport.connect().await.unwrap();

        assert_eq!(
            transport.try_receive(),
            Some(MidiMessage::new(0x90, 60, 127))
        );
        assert_eq!(transport.try_receive(), None);
    }

    #[tokio::test]
    async fn test_send_then_receive_round_trips() {
        let mut transport = UsbTransport::new(LoopbackUsbDevice::default());
        transport.connect().await.unwrap();

        let msg = MidiMessage::note_off(3, 72, 0);
        transport.send(msg).await.unwrap();
        assert_eq!(transport.try_receive(), Some(msg));
        assert_eq!(transport.try_receive(), None);
    }

    #[tokio::test]
    async fn test_task_only_pumps_when_connected() {
        let device = MockUsbDevice::working();
        let state = device.state.clone();
        let mut transport = UsbTransport::new(device);

        assert!(!transport.task());
        transport.connect().await.unwrap();
        assert!(transport.task());
        assert!(transport.task());
        assert_eq!(state.lock().unwrap().tasks, 2);
    }

    #[tokio::test]
    async fn test_disconnect_deinitializes_once() {
        let device = MockUsbDevice::working();
        let state = device.state.clone();

        let mut transport = UsbTransport::new(device);
        transport.connect().await.unwrap();
        transport.disconnect().await.unwrap();
        transport.disconnect().await.unwrap();

        assert_eq!(state.lock().unwrap().deinits, 1);
        assert!(!transport.is_connected());
    }
}
