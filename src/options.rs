//! DHCP option values.
//!
//! DHCP uses options to convey configuration parameters between servers and clients.
//! Each option has a code (1 byte), length (1 byte), and variable-length data.
//!
//! A [`DhcpOption`] pairs the raw value bytes with the dictionary entry that
//! says how to read them. The semantic value is only interpreted on demand
//! (for printing and for range checks), so options the dictionary knows
//! nothing special about travel through the engine untouched.
//!
//! # References
//!
//! - RFC 2132: DHCP Options and BOOTP Vendor Extensions
//! - RFC 3046: DHCP Relay Agent Information Option (Option 82)

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::dict::{self, DictEntry, OptionType, TypeTag};
use crate::error::{Error, Result};

/// Largest value an option TLV can carry (1-byte length field).
pub const MAX_OPTION_LEN: usize = 255;

/// Option codes the engine reads or writes itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OptionCode {
    /// Padding (no operation). Used for alignment.
    Pad = 0,
    /// Subnet mask (RFC 2132 §3.3).
    SubnetMask = 1,
    /// Router/gateway addresses (RFC 2132 §3.5).
    Routers = 3,
    /// Broadcast address (RFC 2132 §5.3).
    BroadcastAddress = 28,
    /// Requested IP address (RFC 2132 §9.1).
    RequestedAddress = 50,
    /// IP address lease time in seconds (RFC 2132 §9.2).
    LeaseTime = 51,
    /// Option overload - indicates sname/file fields contain options (RFC 2132 §9.3).
    OptionOverload = 52,
    /// DHCP message type (RFC 2132 §9.6).
    MessageType = 53,
    /// Server identifier (RFC 2132 §9.7).
    ServerIdentifier = 54,
    /// Renewal time T1 (RFC 2132 §9.11).
    RenewalTime = 58,
    /// Rebinding time T2 (RFC 2132 §9.12).
    RebindingTime = 59,
    /// Vendor class identifier (RFC 2132 §9.13).
    VendorClassIdentifier = 60,
    /// Relay agent information (RFC 3046).
    AgentOptions = 82,
    /// End of options marker.
    End = 255,
}

impl OptionCode {
    /// Dictionary entry for this code.
    pub fn entry(self) -> &'static DictEntry {
        dict::main_dict()
            .get(self as u8)
            .unwrap_or_else(|| unreachable!("main dictionary covers every code"))
    }
}

/// DHCP message types (Option 53) as defined in RFC 2132 §9.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Client broadcast to locate servers.
    Discover = 1,
    /// Server response to DISCOVER with IP offer.
    Offer = 2,
    /// Client request for offered parameters.
    Request = 3,
    /// Client indicates address is already in use.
    Decline = 4,
    /// Server acknowledgement with configuration.
    Ack = 5,
    /// Server negative acknowledgement.
    Nak = 6,
    /// Client releases IP address.
    Release = 7,
    /// Client requests config without IP allocation.
    Inform = 8,
}

impl MessageType {
    /// Whether a message of this type travels client to server.
    pub fn is_client_message(self) -> bool {
        matches!(
            self,
            Self::Discover | Self::Request | Self::Decline | Self::Release | Self::Inform
        )
    }
}

impl TryFrom<u8> for MessageType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Discover),
            2 => Ok(Self::Offer),
            3 => Ok(Self::Request),
            4 => Ok(Self::Decline),
            5 => Ok(Self::Ack),
            6 => Ok(Self::Nak),
            7 => Ok(Self::Release),
            8 => Ok(Self::Inform),
            other => Err(other),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discover => write!(f, "DISCOVER"),
            Self::Offer => write!(f, "OFFER"),
            Self::Request => write!(f, "REQUEST"),
            Self::Decline => write!(f, "DECLINE"),
            Self::Ack => write!(f, "ACK"),
            Self::Nak => write!(f, "NAK"),
            Self::Release => write!(f, "RELEASE"),
            Self::Inform => write!(f, "INFORM"),
        }
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(name: &str) -> std::result::Result<Self, Self::Err> {
        match name.to_ascii_uppercase().as_str() {
            "DISCOVER" => Ok(Self::Discover),
            "OFFER" => Ok(Self::Offer),
            "REQUEST" => Ok(Self::Request),
            "DECLINE" => Ok(Self::Decline),
            "ACK" => Ok(Self::Ack),
            "NAK" => Ok(Self::Nak),
            "RELEASE" => Ok(Self::Release),
            "INFORM" => Ok(Self::Inform),
            _ => Err(format!("unknown message type: {}", name)),
        }
    }
}

/// Printable name for a raw message-type byte, `"unknown"` when unassigned.
pub fn message_type_name(value: Option<u8>) -> String {
    match value.map(MessageType::try_from) {
        Some(Ok(message_type)) => message_type.to_string(),
        _ => "unknown".to_string(),
    }
}

/// Option overload flags (Option 52) as defined in RFC 2132 §9.3.
///
/// Indicates that the `sname` and/or `file` fields in the DHCP packet
/// header contain DHCP options instead of their normal content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OverloadFlag {
    /// The `file` field contains options.
    File = 1,
    /// The `sname` field contains options.
    Sname = 2,
    /// Both `file` and `sname` fields contain options.
    Both = 3,
}

impl OverloadFlag {
    pub fn includes_file(self) -> bool {
        matches!(self, Self::File | Self::Both)
    }

    pub fn includes_sname(self) -> bool {
        matches!(self, Self::Sname | Self::Both)
    }
}

impl TryFrom<u8> for OverloadFlag {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::File),
            2 => Ok(Self::Sname),
            3 => Ok(Self::Both),
            other => Err(other),
        }
    }
}

/// An interpreted option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Boolean(bool),
    U8(u8),
    U16(u16),
    S16(i16),
    U32(u32),
    S32(i32),
    IpAddr(Ipv4Addr),
    String(Vec<u8>),
    List(Vec<OptionValue>),
}

impl OptionValue {
    /// Interprets `data` as `kind`.
    ///
    /// Returns `None` when the length does not fit the type (a scalar of the
    /// wrong size, or a list whose length is not a multiple of the element size).
    pub fn decode(kind: OptionType, data: &[u8]) -> Option<Self> {
        let Some(size) = kind.tag.size() else {
            return Some(Self::String(data.to_vec()));
        };

        if kind.list {
            if data.is_empty() || !data.len().is_multiple_of(size) {
                return None;
            }
            let items = data
                .chunks_exact(size)
                .map(|chunk| Self::decode_scalar(kind.tag, chunk))
                .collect::<Option<Vec<_>>>()?;
            return Some(Self::List(items));
        }

        if data.len() != size {
            return None;
        }
        Self::decode_scalar(kind.tag, data)
    }

    fn decode_scalar(tag: TypeTag, data: &[u8]) -> Option<Self> {
        let value = match tag {
            TypeTag::Boolean => Self::Boolean(data[0] != 0),
            TypeTag::U8 => Self::U8(data[0]),
            TypeTag::U16 => Self::U16(u16::from_be_bytes([data[0], data[1]])),
            TypeTag::S16 => Self::S16(i16::from_be_bytes([data[0], data[1]])),
            TypeTag::U32 => Self::U32(u32::from_be_bytes([data[0], data[1], data[2], data[3]])),
            TypeTag::S32 => Self::S32(i32::from_be_bytes([data[0], data[1], data[2], data[3]])),
            TypeTag::IpAddr => Self::IpAddr(Ipv4Addr::new(data[0], data[1], data[2], data[3])),
            TypeTag::String => Self::String(data.to_vec()),
        };
        Some(value)
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Self::Boolean(value) => out.push(u8::from(*value)),
            Self::U8(value) => out.push(*value),
            Self::U16(value) => out.extend_from_slice(&value.to_be_bytes()),
            Self::S16(value) => out.extend_from_slice(&value.to_be_bytes()),
            Self::U32(value) => out.extend_from_slice(&value.to_be_bytes()),
            Self::S32(value) => out.extend_from_slice(&value.to_be_bytes()),
            Self::IpAddr(addr) => out.extend_from_slice(&addr.octets()),
            Self::String(bytes) => out.extend_from_slice(bytes),
            Self::List(items) => items.iter().for_each(|item| item.encode_into(out)),
        }
    }

    /// Wire bytes for this value.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    /// Numeric view used for type-aware comparison of integer values.
    fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Boolean(value) => Some(i64::from(*value)),
            Self::U8(value) => Some(i64::from(*value)),
            Self::U16(value) => Some(i64::from(*value)),
            Self::S16(value) => Some(i64::from(*value)),
            Self::U32(value) => Some(i64::from(*value)),
            Self::S32(value) => Some(i64::from(*value)),
            _ => None,
        }
    }

    /// Compares two values the way range checks do: addresses by their four
    /// octets, integers by numeric value, strings by bytes.
    pub fn same_as(&self, other: &OptionValue) -> bool {
        match (self, other) {
            (Self::List(left), Self::List(right)) => {
                left.len() == right.len()
                    && left.iter().zip(right).all(|(left, right)| left.same_as(right))
            }
            (Self::IpAddr(left), Self::IpAddr(right)) => left.octets() == right.octets(),
            (Self::String(left), Self::String(right)) => left == right,
            _ => match (self.as_integer(), other.as_integer()) {
                (Some(left), Some(right)) => left == right,
                _ => false,
            },
        }
    }

    fn parse_scalar(tag: TypeTag, text: &str) -> Option<Self> {
        let text = text.trim();
        let value = match tag {
            TypeTag::Boolean => match text.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Self::Boolean(true),
                "0" | "false" | "no" | "off" => Self::Boolean(false),
                _ => return None,
            },
            TypeTag::U8 => Self::U8(text.parse().ok()?),
            TypeTag::U16 => Self::U16(text.parse().ok()?),
            TypeTag::S16 => Self::S16(text.parse().ok()?),
            TypeTag::U32 => Self::U32(text.parse().ok()?),
            TypeTag::S32 => Self::S32(text.parse().ok()?),
            TypeTag::IpAddr => Self::IpAddr(text.parse().ok()?),
            TypeTag::String => Self::String(text.as_bytes().to_vec()),
        };
        Some(value)
    }

    /// Parses administrative text for `kind`.
    ///
    /// List types take comma-separated elements. Strings are taken literally.
    pub fn parse(kind: OptionType, text: &str) -> Option<Self> {
        if kind.tag == TypeTag::String {
            return Some(Self::String(text.as_bytes().to_vec()));
        }
        if kind.list {
            let items = text
                .split(',')
                .filter(|item| !item.trim().is_empty())
                .map(|item| Self::parse_scalar(kind.tag, item))
                .collect::<Option<Vec<_>>>()?;
            if items.is_empty() {
                return None;
            }
            return Some(Self::List(items));
        }
        Self::parse_scalar(kind.tag, text)
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(value) => write!(f, "{}", u8::from(*value)),
            Self::U8(value) => write!(f, "{}", value),
            Self::U16(value) => write!(f, "{}", value),
            Self::S16(value) => write!(f, "{}", value),
            Self::U32(value) => write!(f, "{}", value),
            Self::S32(value) => write!(f, "{}", value),
            Self::IpAddr(addr) => write!(f, "{}", addr),
            Self::String(bytes) => write!(f, "{{{}}}", printable_or_hex(bytes)),
            Self::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

/// Shows bytes verbatim when every byte is printable ASCII, otherwise as
/// lowercase hex.
pub fn printable_or_hex(bytes: &[u8]) -> String {
    if bytes.iter().all(|byte| (0x20..=0x7e).contains(byte)) {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        to_hex(bytes)
    }
}

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

/// Renders `name value` for one option, falling back to hex when the bytes
/// do not fit the entry's type.
pub fn render_value(entry: &DictEntry, data: &[u8]) -> String {
    match OptionValue::decode(entry.kind, data) {
        Some(value) => format!("{} {}", entry.name, value),
        None => format!("{} {{{}}}", entry.name, to_hex(data)),
    }
}

/// The value alone, without the option name or string delimiters.
pub fn value_text(entry: &DictEntry, data: &[u8]) -> String {
    match OptionValue::decode(entry.kind, data) {
        Some(OptionValue::String(bytes)) => printable_or_hex(&bytes),
        Some(value) => value.to_string(),
        None => to_hex(data),
    }
}

/// A single option: its dictionary entry and raw value bytes.
#[derive(Debug, Clone)]
pub struct DhcpOption {
    entry: &'static DictEntry,
    data: Vec<u8>,
}

impl PartialEq for DhcpOption {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.entry, other.entry) && self.data == other.data
    }
}

impl Eq for DhcpOption {}

impl DhcpOption {
    /// Wraps raw value bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOptionValue`] if `data` is longer than a
    /// single TLV can carry.
    pub fn new(entry: &'static DictEntry, data: Vec<u8>) -> Result<Self> {
        if data.len() > MAX_OPTION_LEN {
            return Err(Error::InvalidOptionValue {
                name: entry.name.to_string(),
                value: format!("{} bytes", data.len()),
            });
        }
        Ok(Self { entry, data })
    }

    /// Builds an option from a typed value.
    pub fn from_value(entry: &'static DictEntry, value: &OptionValue) -> Result<Self> {
        Self::new(entry, value.to_bytes())
    }

    /// Parses administrative text (`"192.168.1.1"`, `"3600"`, `"a,b"`) for a
    /// named option.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownName`] when the dictionary has no such option, and
    /// [`Error::InvalidOptionValue`] when the text does not fit its type.
    pub fn from_text(name: &str, text: &str) -> Result<Self> {
        let entry =
            dict::lookup_by_name(name).ok_or_else(|| Error::UnknownName(name.to_string()))?;
        let value = OptionValue::parse(entry.kind, text).ok_or_else(|| {
            Error::InvalidOptionValue {
                name: entry.name.to_string(),
                value: text.to_string(),
            }
        })?;
        Self::from_value(entry, &value)
    }

    pub fn entry(&self) -> &'static DictEntry {
        self.entry
    }

    pub fn code(&self) -> u8 {
        self.entry.code
    }

    /// Code of the enclosing compound option, for sub-options.
    pub fn parent(&self) -> Option<u8> {
        self.entry.parent
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The interpreted value, or `None` if the bytes do not fit the type.
    pub fn value(&self) -> Option<OptionValue> {
        OptionValue::decode(self.entry.kind, &self.data)
    }

    /// Type-aware equality against another value of the same option.
    ///
    /// Falls back to byte equality when either side does not decode.
    pub fn matches_data(&self, other: &[u8]) -> bool {
        match (self.value(), OptionValue::decode(self.entry.kind, other)) {
            (Some(mine), Some(theirs)) => mine.same_as(&theirs),
            _ => self.data == other,
        }
    }
}

impl fmt::Display for DhcpOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_value(self.entry, &self.data))
    }
}
