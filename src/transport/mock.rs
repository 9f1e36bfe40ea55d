//! Mock capability providers for deterministic backend tests.
//!
//! Each mock records the calls the backend makes so tests can assert on
//! the bring-up sequence without hardware attached.

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::protocol::{MidiMessage, USB_MIDI_PACKET_LEN};
use crate::transport::serial::{AdapterLink, AdapterModes, AdapterStatus, ReceiveHandler};
use crate::transport::usb::{UsbMidiDevice, UsbRole};
use crate::transport::wireless::{AssociationStatus, IpInfo, Radio};

use futures::future::BoxFuture;

/// Picks a free UDP port on localhost by binding an ephemeral socket and
/// releasing it.
pub(crate) fn free_udp_port() -> u16 {
    let socket = std::net::UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind ephemeral port");
    socket.local_addr().expect("local addr").port()
}

/// A scripted [`Radio`] that always reports one association status.
pub(crate) struct MockRadio {
    status: AssociationStatus,
    ip: IpInfo,
    /// Total elapsed milliseconds passed to `service_timer`.
    pub serviced_ms: Arc<AtomicU32>,
    pub power_ups: Arc<AtomicU32>,
    pub power_downs: Arc<AtomicU32>,
    pub disassociations: Arc<AtomicU32>,
}

impl MockRadio {
    /// A radio already associated with the given addressing.
    pub(crate) fn associated(address: Ipv4Addr, subnet_mask: Ipv4Addr) -> Self {
        Self::with_ip(
            AssociationStatus::Associated,
            IpInfo {
                address,
                subnet_mask,
            },
        )
    }

    /// A radio stuck in the given status.
    pub(crate) fn with_status(status: AssociationStatus) -> Self {
        Self::with_ip(
            status,
            IpInfo {
                address: Ipv4Addr::LOCALHOST,
                subnet_mask: Ipv4Addr::BROADCAST,
            },
        )
    }

    fn with_ip(status: AssociationStatus, ip: IpInfo) -> Self {
        Self {
            status,
            ip,
            serviced_ms: Arc::new(AtomicU32::new(0)),
            power_ups: Arc::new(AtomicU32::new(0)),
            power_downs: Arc::new(AtomicU32::new(0)),
            disassociations: Arc::new(AtomicU32::new(0)),
        }
    }
}

impl Radio for MockRadio {
    fn power_up(&mut self) -> Result<()> {
        self.power_ups.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn power_down(&mut self) {
        self.power_downs.fetch_add(1, Ordering::Relaxed);
    }

    fn service_timer(&mut self, elapsed_ms: u32) {
        self.serviced_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
    }

    fn association_status(&mut self) -> AssociationStatus {
        self.status
    }

    fn disassociate(&mut self) {
        self.disassociations.fetch_add(1, Ordering::Relaxed);
    }

    fn ip_info(&self) -> Result<IpInfo> {
        Ok(self.ip)
    }
}

/// Recorded state of a [`MockAdapterLink`].
#[derive(Default)]
pub(crate) struct MockAdapterState {
    pub present: bool,
    pub firmware_matches: bool,
    pub boot_status: Option<AdapterStatus>,
    pub probes: u32,
    pub uploads: Vec<Vec<u8>>,
    pub boots: u32,
    pub baud: Option<u32>,
    pub modes: Option<AdapterModes>,
    pub sent: Vec<Vec<u8>>,
    pub handler_installed: bool,
}

/// A scripted [`AdapterLink`] recording the bring-up sequence.
pub(crate) struct MockAdapterLink {
    pub state: Arc<Mutex<MockAdapterState>>,
}

impl MockAdapterLink {
    /// An attached adapter whose firmware already matches and boots fine.
    pub(crate) fn present() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockAdapterState {
                present: true,
                firmware_matches: true,
                boot_status: Some(AdapterStatus::FirmwareRunning),
                ..MockAdapterState::default()
            })),
        }
    }

    /// No adapter in the cartridge slot.
    pub(crate) fn absent() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockAdapterState::default())),
        }
    }
}

impl AdapterLink for MockAdapterLink {
    fn probe(&mut self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.probes += 1;
            Ok(state.present)
        })
    }

    fn matches_firmware<'a>(&'a mut self, _image: &'a [u8]) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move { Ok(self.state.lock().unwrap().firmware_matches) })
    }

    fn upload_firmware<'a>(&'a mut self, image: &'a [u8]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.uploads.push(image.to_vec());
            // An uploaded image matches from now on.
            state.firmware_matches = true;
            Ok(())
        })
    }

    fn boot(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.state.lock().unwrap().boots += 1;
            Ok(())
        })
    }

    fn status(&mut self) -> BoxFuture<'_, Result<AdapterStatus>> {
        Box::pin(async move {
            Ok(self
                .state
                .lock()
                .unwrap()
                .boot_status
                .unwrap_or(AdapterStatus::Bootloader))
        })
    }

    fn set_modes(&mut self, modes: AdapterModes) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.state.lock().unwrap().modes = Some(modes);
            Ok(())
        })
    }

    fn uart_set_baud(&mut self, baud: u32) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.state.lock().unwrap().baud = Some(baud);
            Ok(())
        })
    }

    fn uart_send<'a>(&'a mut self, bytes: &'a [u8]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.state.lock().unwrap().sent.push(bytes.to_vec());
            Ok(())
        })
    }

    fn set_receive_handler(&mut self, _handler: ReceiveHandler) {
        self.state.lock().unwrap().handler_installed = true;
    }
}

/// Recorded state of a [`MockUsbDevice`].
#[derive(Default)]
pub(crate) struct MockUsbState {
    pub init_ok: bool,
    pub inited: Option<UsbRole>,
    pub deinits: u32,
    pub written: Vec<[u8; 3]>,
    pub inbox: VecDeque<[u8; USB_MIDI_PACKET_LEN]>,
    pub tasks: u32,
}

/// A scripted [`UsbMidiDevice`] with an in-memory packet inbox.
pub(crate) struct MockUsbDevice {
    pub state: Arc<Mutex<MockUsbState>>,
}

impl MockUsbDevice {
    /// A stack that initializes successfully.
    pub(crate) fn working() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockUsbState {
                init_ok: true,
                ..MockUsbState::default()
            })),
        }
    }

    /// A stack whose initialization fails.
    pub(crate) fn broken() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockUsbState::default())),
        }
    }
}

/// A [`UsbMidiDevice`] that loops every written message straight back
/// into its own inbox as a USB-MIDI event packet.
#[derive(Default)]
pub(crate) struct LoopbackUsbDevice {
    inbox: VecDeque<[u8; USB_MIDI_PACKET_LEN]>,
}

impl UsbMidiDevice for LoopbackUsbDevice {
    fn init(&mut self, _role: UsbRole) -> bool {
        true
    }

    fn deinit(&mut self) {
        self.inbox.clear();
    }

    fn stream_write(&mut self, midi: &[u8; 3]) {
        self.inbox
            .push_back(MidiMessage::from_bytes(*midi).to_usb_packet());
    }

    fn packet_available(&self) -> bool {
        !self.inbox.is_empty()
    }

    fn read_packet(&mut self) -> Option<[u8; USB_MIDI_PACKET_LEN]> {
        self.inbox.pop_front()
    }

    fn task(&mut self) {}
}

impl UsbMidiDevice for MockUsbDevice {
    fn init(&mut self, role: UsbRole) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.init_ok {
            state.inited = Some(role);
        }
        state.init_ok
    }

    fn deinit(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.inited = None;
        state.deinits += 1;
    }

    fn stream_write(&mut self, midi: &[u8; 3]) {
        self.state.lock().unwrap().written.push(*midi);
    }

    fn packet_available(&self) -> bool {
        !self.state.lock().unwrap().inbox.is_empty()
    }

    fn read_packet(&mut self) -> Option<[u8; USB_MIDI_PACKET_LEN]> {
        self.state.lock().unwrap().inbox.pop_front()
    }

    fn task(&mut self) {
        self.state.lock().unwrap().tasks += 1;
    }
}
