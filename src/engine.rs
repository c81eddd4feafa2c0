//! Request state machine and administrative surface.
//!
//! [`Engine`] turns one inbound datagram into at most one outbound packet:
//!
//! 1. Parse. Malformed datagrams are logged and dropped.
//! 2. Match a range and seed the reply from it.
//! 3. Run the policy hook, which may decide the outcome.
//! 4. Otherwise dispatch on the message type: DISCOVER gets an OFFER,
//!    REQUEST and INFORM get an ACK, everything else gets nothing.
//!
//! The engine never opens sockets. Callers hand it datagrams through
//! [`Engine::process`] or [`Engine::handle_datagram`], the latter sending
//! the reply through a [`Transport`].

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dict::{self, DictEntry};
use crate::error::{Error, Result};
use crate::hook::{Decision, PolicyHook};
use crate::lease::{self, Lease, Leases};
use crate::options::{self, MessageType};
use crate::packet::DhcpPacket;
use crate::range::{Range, Ranges};
use crate::request::{CLIENT_PORT, Request};

/// Debug level above which datagram sizes are logged.
const DEBUG_LOG_SIZES: u32 = 2;

/// Debug level above which full packets are rendered into the log.
const DEBUG_LOG_PACKETS: u32 = 3;

/// Datagram I/O used to answer requests.
pub trait Transport: Send + Sync {
    /// Waits for one datagram, returning its length and source.
    fn recv(&self, buffer: &mut [u8]) -> impl Future<Output = Result<(usize, SocketAddr)>> + Send;

    /// Sends one datagram, returning the number of bytes written.
    fn send(
        &self,
        data: &[u8],
        destination: SocketAddrV4,
    ) -> impl Future<Output = Result<usize>> + Send;
}

/// A composed outbound packet and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub bytes: Vec<u8>,
    pub destination: SocketAddrV4,
    pub message_type: MessageType,
}

/// The DHCP protocol engine.
pub struct Engine {
    server_ip: Ipv4Addr,
    client_port: u16,
    ranges: Ranges,
    leases: Leases,
    debug: AtomicU32,
    hook: Option<Arc<dyn PolicyHook>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("server_ip", &self.server_ip)
            .field("client_port", &self.client_port)
            .field("debug", &self.debug)
            .field("hook", &self.hook.is_some())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine answering as `server_ip`.
    pub fn new(server_ip: Ipv4Addr) -> Self {
        Self {
            server_ip,
            client_port: CLIENT_PORT,
            ranges: Ranges::new(),
            leases: Leases::new(),
            debug: AtomicU32::new(0),
            hook: None,
        }
    }

    /// Port replies to clients are sent to (68 unless overridden).
    pub fn with_client_port(mut self, port: u16) -> Self {
        self.client_port = port;
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn PolicyHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Builds an engine from a configuration, loading its ranges and
    /// preloaded leases.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let engine = Self::new(config.server_ip).with_client_port(config.client_port);
        engine.set_debug_level(config.debug);

        for range in config.build_ranges()? {
            engine.add_range(range).await;
        }
        for lease in &config.leases {
            engine
                .add_lease(&lease.mac, lease.ip, lease.lease_time, lease.expires)
                .await?;
        }

        Ok(engine)
    }

    pub fn server_ip(&self) -> Ipv4Addr {
        self.server_ip
    }

    pub fn ranges(&self) -> &Ranges {
        &self.ranges
    }

    pub fn leases(&self) -> &Leases {
        &self.leases
    }

    pub fn debug_level(&self) -> u32 {
        self.debug.load(Ordering::Relaxed)
    }

    pub fn set_debug_level(&self, level: u32) {
        self.debug.store(level, Ordering::Relaxed);
    }

    pub async fn add_range(&self, range: Range) -> Arc<Range> {
        let range = self.ranges.add(range).await;
        info!("Range {} - {} added", range.start, range.end);
        range
    }

    /// Removes ranges spanning exactly `start..=end`; returns how many.
    pub async fn remove_range(&self, start: Ipv4Addr, end: Ipv4Addr) -> usize {
        self.ranges.remove(start, end).await
    }

    /// One line per range, most recently added first.
    pub async fn list_ranges(&self) -> Vec<String> {
        self.ranges
            .list()
            .await
            .iter()
            .map(|range| range.to_string())
            .collect()
    }

    pub async fn add_lease(
        &self,
        mac: &str,
        ip: Ipv4Addr,
        lease_time: u32,
        expires: u32,
    ) -> Result<Lease> {
        self.leases.add(mac, ip, lease_time, expires).await
    }

    pub async fn remove_lease(&self, mac: &str) -> Option<Lease> {
        self.leases.remove(mac).await
    }

    pub async fn list_leases(&self) -> Vec<Lease> {
        self.leases.list().await
    }

    /// Looks up an option by name, returning its code and type name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownName`] when no entry matches.
    pub fn dict_get(&self, name: &str) -> Result<(u8, &'static str)> {
        dict::lookup_by_name(name)
            .map(|entry: &'static DictEntry| (entry.code, entry.kind.name()))
            .ok_or_else(|| Error::UnknownName(name.to_string()))
    }

    /// Processes one datagram and returns the reply to send, if any.
    pub async fn process(&self, data: &[u8], peer: SocketAddr) -> Option<Reply> {
        let debug_level = self.debug_level();
        if debug_level > DEBUG_LOG_SIZES {
            debug!("Received {} bytes from {}", data.len(), peer);
        }

        let packet = match DhcpPacket::parse(data) {
            Ok(packet) => packet,
            Err(err) => {
                warn!("Discarding datagram from {}: {}", peer, err);
                return None;
            }
        };

        let SocketAddr::V4(peer) = peer else {
            warn!("Discarding datagram from non-IPv4 peer {}", peer);
            return None;
        };

        let mut request = Request::new(packet, peer);
        if debug_level > DEBUG_LOG_PACKETS {
            debug!("Request: {}", request.render_inbound());
        }

        if let Some(range) = self.ranges.find(&request.packet, &request.options).await {
            debug!(
                "{} matched range {} - {}",
                request.mac(),
                range.start,
                range.end
            );
            request.apply_range(range);
        }

        let decision = self.hook.as_ref().and_then(|hook| {
            hook.evaluate(&mut request).or_else(|| {
                request
                    .reply
                    .message_type
                    .and_then(Decision::from_message_type)
            })
        });

        let message_type = match decision {
            Some(Decision::Offer) => self.compose(&mut request, MessageType::Offer).await,
            Some(Decision::Ack) => self.compose(&mut request, MessageType::Ack).await,
            Some(Decision::Nak) => {
                request.compose_nak(self.server_ip);
                MessageType::Nak
            }
            Some(Decision::Drop) => {
                debug!("Hook dropped xid {:#010x}", request.packet.xid);
                return None;
            }
            None => self.classify(&mut request).await?,
        };

        let reply = Reply {
            bytes: request.outbound_bytes(),
            destination: request.destination(self.client_port),
            message_type,
        };

        info!(
            "{} {} to {} via {}",
            message_type,
            request.outbound.yiaddr,
            request.mac(),
            reply.destination
        );
        if debug_level > DEBUG_LOG_PACKETS {
            debug!("Reply: {}", request.render_outbound());
        }

        Some(reply)
    }

    /// Default handling by message type. Returns the type composed, or
    /// `None` when nothing is sent.
    async fn classify(&self, request: &mut Request) -> Option<MessageType> {
        let mac = request.mac();
        let Some(message_type) = request.message_type() else {
            debug!(
                "Ignoring {} message from {}",
                options::message_type_name(request.packet.message_type_code()),
                mac
            );
            return None;
        };

        info!("{} from {} ({})", message_type, mac, request.peer);

        match message_type {
            MessageType::Discover => {
                if request.reply.yiaddr.is_unspecified()
                    && let Some(ip) = self.select_address(request).await
                {
                    request.reply.yiaddr = ip;
                }
                Some(self.compose(request, MessageType::Offer).await)
            }
            MessageType::Request | MessageType::Inform => {
                let inbound = &request.packet;
                if !inbound.yiaddr.is_unspecified() {
                    request.reply.yiaddr = inbound.yiaddr;
                }
                if !inbound.siaddr.is_unspecified() {
                    request.reply.siaddr = inbound.siaddr;
                }
                if request.reply.yiaddr.is_unspecified()
                    && let Some(range) = &request.reply.range
                    && let Some(requested) = request.packet.requested_ip()
                    && range.contains(requested)
                {
                    request.reply.yiaddr = requested;
                }
                Some(self.compose(request, MessageType::Ack).await)
            }
            MessageType::Release | MessageType::Decline => None,
            MessageType::Offer | MessageType::Ack | MessageType::Nak => {
                debug!("Ignoring {} from {}", message_type, mac);
                None
            }
        }
    }

    /// Address to offer from the matched range: the client's current lease
    /// if it lies in the range, otherwise the first address nobody else
    /// holds.
    async fn select_address(&self, request: &Request) -> Option<Ipv4Addr> {
        let range = request.reply.range.as_ref()?;
        let mac = request.mac();

        if let Some(lease) = self.leases.find_by_mac(&mac).await
            && range.contains(lease.ip)
        {
            return Some(lease.ip);
        }

        let gateway = range.gateway;
        let candidates = range.addresses().filter(move |ip| *ip != gateway);
        if let Some(ip) = self.leases.first_available(candidates, &mac).await {
            return Some(ip);
        }

        warn!(
            "Range {} - {} exhausted, no address for {}",
            range.start, range.end, mac
        );
        None
    }

    /// Composes an OFFER or ACK, recording the lease for an ACK.
    async fn compose(&self, request: &mut Request, message_type: MessageType) -> MessageType {
        request.compose_reply(message_type, self.server_ip);

        let yiaddr = request.reply.yiaddr;
        let lease_time = request.reply.lease_time;
        if message_type == MessageType::Ack && !yiaddr.is_unspecified() && lease_time > 0 {
            let expires = lease::epoch_now().saturating_add(lease_time);
            match self
                .leases
                .add(&request.mac(), yiaddr, lease_time, expires)
                .await
            {
                Ok(lease) => info!(
                    "Leased {} to {} until {}",
                    lease.ip,
                    lease.mac,
                    lease
                        .expires_at()
                        .map_or_else(|| lease.expires.to_string(), |at| at.to_rfc3339())
                ),
                Err(err) => warn!("Failed to record lease for {}: {}", request.mac(), err),
            }
        }

        message_type
    }

    /// Processes one datagram and sends the reply, if any.
    ///
    /// Returns the number of bytes sent.
    pub async fn handle_datagram<T: Transport>(
        &self,
        transport: &T,
        data: &[u8],
        peer: SocketAddr,
    ) -> Result<Option<usize>> {
        let Some(reply) = self.process(data, peer).await else {
            return Ok(None);
        };

        let size = transport.send(&reply.bytes, reply.destination).await?;
        if self.debug_level() > DEBUG_LOG_SIZES {
            debug!("Sent {} bytes to {}", size, reply.destination);
        }
        Ok(Some(size))
    }
}
