//! Per-datagram request state and reply composition.
//!
//! A [`Request`] lives for one inbound datagram. It holds the decoded
//! packet, the outbound packet being composed, and a [`ReplyScratch`] that
//! range matching and the policy hook fill in before the reply is built.
//!
//! # Reply layout
//!
//! Options are written in a fixed order: message type, vendor class,
//! server identifier, then router, subnet mask, broadcast address and the
//! lease/renewal/rebinding times when set, then the matched range's reply
//! options, then the relay agent option echoed back, then the end marker.
//!
//! # References
//!
//! - RFC 2131 §4.1: Constructing and sending DHCP messages
//! - RFC 2131 §4.3: DHCP server behavior
//! - RFC 3046 §2.2: Server echoes the relay agent option

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use tracing::warn;

use crate::codec::{self, OptionWriter};
use crate::dict::{self, AGENT_OPTIONS};
use crate::error::{Error, Result};
use crate::options::{self, DhcpOption, MessageType, OptionCode};
use crate::packet::{BOOTREPLY, BOOTREQUEST, DhcpPacket};
use crate::range::Range;

/// Port DHCP servers and relay agents listen on.
pub const SERVER_PORT: u16 = 67;

/// Port DHCP clients listen on.
pub const CLIENT_PORT: u16 = 68;

/// Vendor class identifier stamped on every reply.
pub const VENDOR_CLASS: &str = "dhcprange";

/// Renewal and rebinding times are the lease time minus this margin.
const RENEWAL_MARGIN_SECONDS: u32 = 15;

/// Renewal and rebinding times used when the margin would leave nothing.
const MIN_RENEWAL_SECONDS: u32 = 5;

/// Renewal (T1) and rebinding (T2) time for a lease.
///
/// `lease_time - 15`, or 5 seconds when that is not positive.
pub fn renewal_time(lease_time: u32) -> u32 {
    match lease_time.saturating_sub(RENEWAL_MARGIN_SECONDS) {
        0 => MIN_RENEWAL_SECONDS,
        seconds => seconds,
    }
}

/// Values gathered for the reply before it is composed.
///
/// Unspecified addresses and a zero lease time mean "not set".
#[derive(Debug, Clone)]
pub struct ReplyScratch {
    pub message_type: Option<MessageType>,
    pub yiaddr: Ipv4Addr,
    pub siaddr: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub broadcast: Ipv4Addr,
    pub lease_time: u32,
    pub range: Option<Arc<Range>>,
}

impl Default for ReplyScratch {
    fn default() -> Self {
        Self {
            message_type: None,
            yiaddr: Ipv4Addr::UNSPECIFIED,
            siaddr: Ipv4Addr::UNSPECIFIED,
            netmask: Ipv4Addr::UNSPECIFIED,
            gateway: Ipv4Addr::UNSPECIFIED,
            broadcast: Ipv4Addr::UNSPECIFIED,
            lease_time: 0,
            range: None,
        }
    }
}

/// One inbound datagram being answered.
#[derive(Debug, Clone)]
pub struct Request {
    /// The decoded inbound packet.
    pub packet: DhcpPacket,
    /// Options decoded from the inbound packet, in wire order.
    pub options: Vec<DhcpOption>,
    /// Where the datagram came from.
    pub peer: SocketAddrV4,
    pub reply: ReplyScratch,
    /// The packet being composed.
    pub outbound: DhcpPacket,
}

fn parse_ip(name: &str, value: &str) -> Result<Ipv4Addr> {
    value.trim().parse().map_err(|_| Error::InvalidOptionValue {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn keep_going(result: Result<()>, xid: u32) {
    if let Err(err) = result {
        warn!("Dropping reply option for xid {:#010x}: {}", xid, err);
    }
}

impl Request {
    /// Wraps a parsed packet, decoding its options.
    ///
    /// Options past a truncation are dropped (and logged); the rest stay
    /// usable.
    pub fn new(packet: DhcpPacket, peer: SocketAddrV4) -> Self {
        let options = codec::parse_options_lossy(&packet);
        Self {
            packet,
            options,
            peer,
            reply: ReplyScratch::default(),
            outbound: DhcpPacket::new(BOOTREPLY),
        }
    }

    pub fn message_type(&self) -> Option<MessageType> {
        self.packet.message_type()
    }

    /// Client hardware address as 12 hex digits.
    pub fn mac(&self) -> String {
        self.packet.mac_string()
    }

    /// Seeds the reply from a matched range.
    pub fn apply_range(&mut self, range: Arc<Range>) {
        self.reply.gateway = range.gateway;
        self.reply.netmask = range.netmask;
        if let Some(lease_time) = range.lease_time {
            self.reply.lease_time = lease_time;
        }
        self.reply.range = Some(range);
    }

    /// Reads a request field by name.
    ///
    /// Knows `type`, `xid`, `ipaddr` (the peer), `macaddr`, the four header
    /// addresses, and any option name (`agent.circuit-id` for sub-options).
    /// Returns `None` when the field is unknown or the option is absent.
    pub fn get(&self, name: &str) -> Option<String> {
        let packet = &self.packet;
        let value = match name {
            "type" => options::message_type_name(packet.message_type_code()),
            "xid" => packet.xid.to_string(),
            "ipaddr" => self.peer.ip().to_string(),
            "macaddr" => packet.format_mac(),
            "yiaddr" => packet.yiaddr.to_string(),
            "siaddr" => packet.siaddr.to_string(),
            "giaddr" => packet.giaddr.to_string(),
            "ciaddr" => packet.ciaddr.to_string(),
            _ => {
                let entry = dict::lookup_by_name(name)?;
                let data = match entry.parent {
                    Some(parent) => codec::find_option(packet, parent, Some(entry.code)),
                    None => codec::find_option(packet, entry.code, None),
                }?;
                options::value_text(entry, data)
            }
        };
        Some(value)
    }

    /// Sets a reply or request field by name.
    ///
    /// Reply fields: `type`, `yiaddr`, `siaddr`, `gateway`, `netmask` (or
    /// `network`), `broadcast`, `lease_time`. Request fields: `ciaddr`,
    /// `giaddr`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownName`] for any other field and
    /// [`Error::InvalidOptionValue`] when the value does not parse.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            "type" => {
                let message_type =
                    value
                        .parse::<MessageType>()
                        .map_err(|_| Error::InvalidOptionValue {
                            name: name.to_string(),
                            value: value.to_string(),
                        })?;
                self.reply.message_type = Some(message_type);
            }
            "yiaddr" => self.reply.yiaddr = parse_ip(name, value)?,
            "siaddr" => self.reply.siaddr = parse_ip(name, value)?,
            "gateway" => self.reply.gateway = parse_ip(name, value)?,
            "netmask" | "network" => self.reply.netmask = parse_ip(name, value)?,
            "broadcast" => self.reply.broadcast = parse_ip(name, value)?,
            "lease_time" => {
                self.reply.lease_time =
                    value
                        .trim()
                        .parse()
                        .map_err(|_| Error::InvalidOptionValue {
                            name: name.to_string(),
                            value: value.to_string(),
                        })?;
            }
            "ciaddr" => self.packet.ciaddr = parse_ip(name, value)?,
            "giaddr" => self.packet.giaddr = parse_ip(name, value)?,
            _ => return Err(Error::UnknownName(name.to_string())),
        }
        Ok(())
    }

    /// Resets the outbound packet and copies the header fields every
    /// outbound message shares with the request.
    fn begin_outbound(&mut self, message_type: MessageType) {
        let op = if message_type.is_client_message() {
            BOOTREQUEST
        } else {
            BOOTREPLY
        };
        let inbound = &self.packet;
        let mut outbound = DhcpPacket::new(op);
        outbound.xid = inbound.xid;
        outbound.hops = inbound.hops;
        outbound.flags = inbound.flags;
        outbound.ciaddr = inbound.ciaddr;
        outbound.giaddr = inbound.giaddr;
        outbound.chaddr[..6].copy_from_slice(&inbound.chaddr[..6]);
        self.outbound = outbound;
    }

    /// Composes a full reply of `message_type` into [`outbound`](Self::outbound).
    ///
    /// An option that does not fit is logged and skipped; composition
    /// always finishes with the end marker.
    pub fn compose_reply(&mut self, message_type: MessageType, server_ip: Ipv4Addr) {
        self.begin_outbound(message_type);
        self.outbound.yiaddr = self.reply.yiaddr;
        self.outbound.siaddr = self.reply.siaddr;

        let Self {
            packet,
            reply,
            outbound,
            ..
        } = self;
        let xid = packet.xid;
        let mut writer = OptionWriter::new(&mut outbound.options);

        keep_going(
            writer.append_u8(OptionCode::MessageType as u8, message_type as u8),
            xid,
        );
        keep_going(
            writer.append(
                OptionCode::VendorClassIdentifier as u8,
                VENDOR_CLASS.as_bytes(),
            ),
            xid,
        );
        keep_going(
            writer.append_ip(OptionCode::ServerIdentifier as u8, server_ip),
            xid,
        );

        if !reply.gateway.is_unspecified() {
            keep_going(writer.append_ip(OptionCode::Routers as u8, reply.gateway), xid);
        }
        if !reply.netmask.is_unspecified() {
            keep_going(
                writer.append_ip(OptionCode::SubnetMask as u8, reply.netmask),
                xid,
            );
        }
        if !reply.broadcast.is_unspecified() {
            keep_going(
                writer.append_ip(OptionCode::BroadcastAddress as u8, reply.broadcast),
                xid,
            );
        }
        if reply.lease_time > 0 {
            let renewal = renewal_time(reply.lease_time);
            keep_going(
                writer.append_u32(OptionCode::LeaseTime as u8, reply.lease_time),
                xid,
            );
            keep_going(writer.append_u32(OptionCode::RenewalTime as u8, renewal), xid);
            keep_going(
                writer.append_u32(OptionCode::RebindingTime as u8, renewal),
                xid,
            );
        }

        if let Some(range) = &reply.range {
            for option in &range.reply_options {
                keep_going(writer.append_option(option), xid);
            }
        }

        if let Some(agent) = codec::find_option(packet, AGENT_OPTIONS, None) {
            keep_going(writer.append(AGENT_OPTIONS, agent), xid);
        }

        writer.finish();
    }

    /// Composes a NAK: header fields, message type, vendor class and server
    /// identifier only.
    pub fn compose_nak(&mut self, server_ip: Ipv4Addr) {
        self.begin_outbound(MessageType::Nak);

        let xid = self.packet.xid;
        let mut writer = OptionWriter::new(&mut self.outbound.options);
        keep_going(
            writer.append_u8(OptionCode::MessageType as u8, MessageType::Nak as u8),
            xid,
        );
        keep_going(
            writer.append(
                OptionCode::VendorClassIdentifier as u8,
                VENDOR_CLASS.as_bytes(),
            ),
            xid,
        );
        keep_going(
            writer.append_ip(OptionCode::ServerIdentifier as u8, server_ip),
            xid,
        );
        writer.finish();
    }

    /// Where the composed packet goes.
    ///
    /// The relay agent on the server port when `giaddr` is set. Otherwise,
    /// on `client_port`: `ciaddr`, else the broadcast address when the
    /// client asked for broadcast, else the assigned `yiaddr`, else the
    /// peer.
    pub fn destination(&self, client_port: u16) -> SocketAddrV4 {
        let outbound = &self.outbound;
        if !outbound.giaddr.is_unspecified() {
            return SocketAddrV4::new(outbound.giaddr, SERVER_PORT);
        }

        let ip = if !outbound.ciaddr.is_unspecified() {
            outbound.ciaddr
        } else if self.packet.is_broadcast() {
            Ipv4Addr::BROADCAST
        } else if !outbound.yiaddr.is_unspecified() {
            outbound.yiaddr
        } else {
            *self.peer.ip()
        };
        SocketAddrV4::new(ip, client_port)
    }

    /// Wire bytes of the composed packet, trailing padding removed.
    pub fn outbound_bytes(&self) -> Vec<u8> {
        self.outbound.encode_trimmed()
    }

    /// Diagnostic dump of the inbound packet.
    pub fn render_inbound(&self) -> String {
        codec::render(&self.packet, SocketAddr::V4(self.peer))
    }

    /// Diagnostic dump of the composed packet.
    pub fn render_outbound(&self) -> String {
        codec::render(&self.outbound, SocketAddr::V4(self.peer))
    }
}
