//! Wireless transport: raw MIDI over UDP broadcast.
//!
//! The radio hardware and its network stack sit behind the [`Radio`]
//! capability trait; this module owns the session sockets, the broadcast
//! destination and the keepalive schedule. Messages are 3 raw bytes per
//! datagram, broadcast to a fixed well-known port. OSC packets ride the
//! same socket pair through [`WirelessTransport::send_datagram`] and
//! [`WirelessTransport::try_recv_datagram`].

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::net::UdpSocket;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::protocol::{MIDI_MESSAGE_LEN, MidiMessage};
use crate::transport::{InterfaceId, MidiTransport};

/// Remote destination port the receiving host listens on.
pub const DEFAULT_DEST_PORT: u16 = 9000;

/// Local port incoming messages arrive on.
pub const DEFAULT_LISTEN_PORT: u16 = 9001;

/// Local source port outgoing messages are sent from.
pub const DEFAULT_SOURCE_PORT: u16 = 9002;

/// Period of the caller's timer callback, in milliseconds.
pub const TICK_MS: u32 = 50;

/// Ticks between keepalive beacons (3 seconds at 50 ms per tick).
pub const KEEPALIVE_TICKS: u8 = 60;

/// Access-point association state reported by the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationStatus {
    /// Not associated and not trying.
    Disconnected,
    /// Scanning for the configured access point.
    Searching,
    /// Authentication in progress.
    Authenticating,
    /// Association in progress.
    Associating,
    /// Waiting for a DHCP lease.
    AcquiringDhcp,
    /// Associated and addressable.
    Associated,
    /// The radio gave up; the configured access point is unreachable.
    CannotConnect,
}

/// Addressing assigned to the radio once associated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpInfo {
    /// Local IP address.
    pub address: Ipv4Addr,
    /// Subnet mask.
    pub subnet_mask: Ipv4Addr,
}

impl IpInfo {
    /// The subnet broadcast address: `address | !subnet_mask`.
    #[must_use]
    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.address) | !u32::from(self.subnet_mask))
    }
}

/// Capability provider for the wireless hardware and its network stack.
///
/// Association targets the access point configured in console firmware
/// settings; that configuration is outside this library.
pub trait Radio: Send {
    /// Powers the radio up and initializes the network stack.
    fn power_up(&mut self) -> Result<()>;

    /// Powers the radio down.
    fn power_down(&mut self);

    /// Drives the network stack's periodic timer service. Called once per
    /// timer tick with the elapsed time.
    fn service_timer(&mut self, elapsed_ms: u32);

    /// Current association state.
    fn association_status(&mut self) -> AssociationStatus;

    /// Drops the access-point association.
    fn disassociate(&mut self);

    /// Addressing info; only meaningful once associated.
    fn ip_info(&self) -> Result<IpInfo>;
}

/// Configuration for the wireless transport.
#[derive(Debug, Clone)]
pub struct WirelessConfig {
    /// Local address both sockets bind to.
    pub bind_addr: Ipv4Addr,
    /// Local source port for outgoing traffic.
    pub source_port: u16,
    /// Local port for incoming traffic.
    pub listen_port: u16,
    /// Remote destination port on the broadcast address.
    pub dest_port: u16,
    /// How long `connect` waits for association before giving up.
    pub assoc_timeout: Duration,
    /// Interval between association status polls.
    pub assoc_poll_interval: Duration,
}

impl Default for WirelessConfig {
    fn default() -> Self {
        Self {
            bind_addr: Ipv4Addr::UNSPECIFIED,
            source_port: DEFAULT_SOURCE_PORT,
            listen_port: DEFAULT_LISTEN_PORT,
            dest_port: DEFAULT_DEST_PORT,
            assoc_timeout: Duration::from_secs(10),
            assoc_poll_interval: Duration::from_millis(50),
        }
    }
}

impl WirelessConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the local bind address.
    #[must_use]
    pub const fn bind_addr(mut self, addr: Ipv4Addr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Sets the local source, local listen and remote destination ports.
    #[must_use]
    pub const fn ports(mut self, source: u16, listen: u16, dest: u16) -> Self {
        self.source_port = source;
        self.listen_port = listen;
        self.dest_port = dest;
        self
    }

    /// Sets the association timeout.
    #[must_use]
    pub const fn assoc_timeout(mut self, timeout: Duration) -> Self {
        self.assoc_timeout = timeout;
        self
    }

    /// Sets the association poll interval.
    #[must_use]
    pub const fn assoc_poll_interval(mut self, interval: Duration) -> Self {
        self.assoc_poll_interval = interval;
        self
    }
}

/// Socket state held only between a successful connect and disconnect.
struct Session {
    outgoing: UdpSocket,
    incoming: UdpSocket,
    destination: SocketAddrV4,
}

/// Wireless transport backend.
pub struct WirelessTransport {
    radio: Box<dyn Radio>,
    config: WirelessConfig,
    session: Option<Session>,
    // The keepalive counter is the one value touched from the timer
    // context while the main context reads connection state.
    keepalive: AtomicU8,
}

impl WirelessTransport {
    /// Creates a wireless transport over the given radio.
    #[must_use]
    pub fn new(radio: impl Radio + 'static, config: WirelessConfig) -> Self {
        Self {
            radio: Box::new(radio),
            config,
            session: None,
            keepalive: AtomicU8::new(0),
        }
    }

    /// The broadcast destination of the current session, if connected.
    #[must_use]
    pub fn destination(&self) -> Option<SocketAddrV4> {
        self.session.as_ref().map(|s| s.destination)
    }

    /// Waits for the radio to associate, polling at the configured
    /// interval until the configured deadline.
    async fn wait_for_association(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.config.assoc_timeout;
        loop {
            match self.radio.association_status() {
                AssociationStatus::Associated => return Ok(()),
                AssociationStatus::CannotConnect => return Err(Error::AssociationFailed),
                status => {
                    if Instant::now() >= deadline {
                        tracing::debug!("association timed out in state {status:?}");
                        return Err(Error::Timeout {
                            timeout_ms: self.config.assoc_timeout.as_millis() as u64,
                        });
                    }
                    tokio::time::sleep(self.config.assoc_poll_interval).await;
                }
            }
        }
    }

    /// Binds the socket pair and computes the broadcast destination.
    async fn open_session(&mut self) -> Result<Session> {
        let outgoing =
            UdpSocket::bind(SocketAddr::from((self.config.bind_addr, self.config.source_port)))
                .await?;
        outgoing.set_broadcast(true)?;
        let incoming =
            UdpSocket::bind(SocketAddr::from((self.config.bind_addr, self.config.listen_port)))
                .await?;

        let ip = self.radio.ip_info()?;
        let destination = SocketAddrV4::new(ip.broadcast(), self.config.dest_port);
        tracing::info!("wireless session open, destination {destination}");

        Ok(Session {
            outgoing,
            incoming,
            destination,
        })
    }

    /// Sends an arbitrary datagram over the session's outgoing socket to
    /// the broadcast destination. Used by the OSC payload path.
    pub async fn send_datagram(&self, data: &[u8]) -> Result<()> {
        let session = self.session.as_ref().ok_or(Error::NotConnected)?;
        session.outgoing.send_to(data, session.destination).await?;
        Ok(())
    }

    /// Non-blocking receive of an arbitrary datagram from the session's
    /// incoming socket. Transient faults and "nothing pending" both yield
    /// `None`.
    pub fn try_recv_datagram(&self, buf: &mut [u8]) -> Option<usize> {
        let session = self.session.as_ref()?;
        match session.incoming.try_recv_from(buf) {
            Ok((len, _)) => Some(len),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::WouldBlock {
                    tracing::trace!("wireless receive fault treated as no-data: {e}");
                }
                None
            }
        }
    }
}

impl MidiTransport for WirelessTransport {
    fn id(&self) -> InterfaceId {
        InterfaceId::Wireless
    }

    fn connect(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.session.is_some() {
                return Ok(());
            }

            self.radio.power_up()?;

            if let Err(e) = self.wait_for_association().await {
                self.radio.power_down();
                return Err(e);
            }

            match self.open_session().await {
                Ok(session) => {
                    self.session = Some(session);
                    self.keepalive.store(0, Ordering::Relaxed);
                    Ok(())
                }
                Err(e) => {
                    // No residual state on failure.
                    self.radio.disassociate();
                    self.radio.power_down();
                    Err(e)
                }
            }
        })
    }

    fn disconnect(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.session.take().is_some() {
                tracing::info!("wireless session closed");
                self.radio.disassociate();
                self.radio.power_down();
            }
            Ok(())
        })
    }

    fn send(&mut self, message: MidiMessage) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let session = self.session.as_ref().ok_or(Error::NotConnected)?;
            tracing::trace!("wireless send {message:?}");
            session
                .outgoing
                .send_to(&message.to_bytes(), session.destination)
                .await?;
            Ok(())
        })
    }

    fn try_receive(&mut self) -> Option<MidiMessage> {
        let mut buf = [0u8; MIDI_MESSAGE_LEN];
        let len = self.try_recv_datagram(&mut buf)?;
        if len != MIDI_MESSAGE_LEN {
            tracing::trace!("dropping {len}-byte datagram on the MIDI path");
            return None;
        }
        Some(MidiMessage::from_bytes(buf))
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn tick(&mut self) {
        // The network stack's own timer service runs on every tick, even
        // while disconnected; the keepalive only while a session exists.
        self.radio.service_timer(TICK_MS);

        let Some(session) = self.session.as_ref() else {
            return;
        };

        let count = self.keepalive.fetch_add(1, Ordering::Relaxed) + 1;
        if count >= KEEPALIVE_TICKS {
            self.keepalive.store(0, Ordering::Relaxed);
            // Keeps the association and any NAT mapping alive. Must not
            // block the timer context, so a failed send is only traced.
            let beacon = MidiMessage::keepalive().to_bytes();
            if let Err(e) = session.outgoing.try_send_to(&beacon, session.destination.into()) {
                tracing::trace!("keepalive send failed: {e}");
            }
        }
    }
}
