//! DHCP packet layout per RFC 2131.
//!
//! A DHCP packet consists of a fixed 236-byte header followed by a 4-byte
//! magic cookie and an options area. The options area is kept as the raw
//! 512 bytes it occupies on the wire; [`codec`](crate::codec) walks it as a
//! TLV stream and writes replies into it.
//!
//! # Packet Structure
//!
//! ```text
//! 0                   1                   2                   3
//! 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     op (1)    |   htype (1)   |   hlen (1)    |   hops (1)    |
//! +---------------+---------------+---------------+---------------+
//! |                            xid (4)                            |
//! +-------------------------------+-------------------------------+
//! |           secs (2)            |           flags (2)           |
//! +-------------------------------+-------------------------------+
//! |                          ciaddr (4)                           |
//! +---------------------------------------------------------------+
//! |                          yiaddr (4)                           |
//! +---------------------------------------------------------------+
//! |                          siaddr (4)                           |
//! +---------------------------------------------------------------+
//! |                          giaddr (4)                           |
//! +---------------------------------------------------------------+
//! |                          chaddr (16)                          |
//! +---------------------------------------------------------------+
//! |                          sname (64)                           |
//! +---------------------------------------------------------------+
//! |                          file (128)                           |
//! +---------------------------------------------------------------+
//! |                    magic cookie (4) = 99.130.83.99            |
//! +---------------------------------------------------------------+
//! |                          options (512)                        |
//! +---------------------------------------------------------------+
//! ```
//!
//! # References
//!
//! - RFC 2131: Dynamic Host Configuration Protocol

use std::net::Ipv4Addr;

use crate::codec;
use crate::error::{Error, Result};
use crate::options::{MessageType, OptionCode};

/// DHCP magic cookie that identifies DHCP packets (vs BOOTP).
pub const DHCP_MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];

const DHCP_CHADDR_OFFSET: usize = 28;
const DHCP_CHADDR_SIZE: usize = 16;
const DHCP_SNAME_OFFSET: usize = DHCP_CHADDR_OFFSET + DHCP_CHADDR_SIZE;
const DHCP_SNAME_SIZE: usize = 64;
const DHCP_FILE_OFFSET: usize = DHCP_SNAME_OFFSET + DHCP_SNAME_SIZE;
const DHCP_FILE_SIZE: usize = 128;
const DHCP_MAGIC_COOKIE_OFFSET: usize = DHCP_FILE_OFFSET + DHCP_FILE_SIZE;

/// Size of the fixed header portion including magic cookie.
pub const DHCP_FIXED_HEADER_SIZE: usize = DHCP_MAGIC_COOKIE_OFFSET + DHCP_MAGIC_COOKIE.len();

/// Size of the options area following the magic cookie.
pub const DHCP_OPTIONS_SIZE: usize = 512;

/// Largest datagram accepted or produced.
pub const DHCP_MAX_PACKET_SIZE: usize = DHCP_FIXED_HEADER_SIZE + DHCP_OPTIONS_SIZE;

/// Broadcast bit of the `flags` field.
pub const BROADCAST_FLAG: u16 = 0x8000;

/// BOOTP/DHCP operation code for client requests.
pub const BOOTREQUEST: u8 = 1;

/// BOOTP/DHCP operation code for server replies.
pub const BOOTREPLY: u8 = 2;

/// Hardware type for Ethernet (most common).
pub const HTYPE_ETHERNET: u8 = 1;

/// Hardware address length for Ethernet (6 bytes).
pub const HLEN_ETHERNET: u8 = 6;

/// A DHCP packet with its raw options area.
///
/// This struct represents both client requests and server replies.
/// Use [`parse`](Self::parse) for incoming datagrams and
/// [`new`](Self::new) to start an outbound packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpPacket {
    /// Operation code: [`BOOTREQUEST`] (1) or [`BOOTREPLY`] (2).
    pub op: u8,

    /// Hardware address type. [`HTYPE_ETHERNET`] (1) for Ethernet.
    pub htype: u8,

    /// Hardware address length. [`HLEN_ETHERNET`] (6) for Ethernet.
    pub hlen: u8,

    /// Hop count, incremented by relay agents.
    pub hops: u8,

    /// Transaction ID chosen by client, echoed in replies.
    pub xid: u32,

    /// Seconds elapsed since client began address acquisition.
    pub secs: u16,

    /// Flags. Bit 15 ([`BROADCAST_FLAG`]) asks for a broadcast reply.
    pub flags: u16,

    /// Client IP address (set by client in RENEWING/REBINDING states).
    pub ciaddr: Ipv4Addr,

    /// "Your" IP address - the address being assigned to the client.
    pub yiaddr: Ipv4Addr,

    /// Server IP address (next server in BOOTP, or DHCP server).
    pub siaddr: Ipv4Addr,

    /// Gateway IP address - set by relay agents.
    pub giaddr: Ipv4Addr,

    /// Client hardware address (MAC for Ethernet).
    pub chaddr: [u8; 16],

    /// Server host name (or option overflow area if Option 52 is set).
    pub sname: [u8; 64],

    /// Boot file name (or option overflow area if Option 52 is set).
    pub file: [u8; 128],

    /// Raw options area. Bytes past the received datagram are zero.
    pub options: [u8; DHCP_OPTIONS_SIZE],
}

impl Default for DhcpPacket {
    fn default() -> Self {
        Self::new(BOOTREQUEST)
    }
}

impl DhcpPacket {
    /// Creates an empty Ethernet packet with the given operation code.
    pub fn new(op: u8) -> Self {
        Self {
            op,
            htype: HTYPE_ETHERNET,
            hlen: HLEN_ETHERNET,
            hops: 0,
            xid: 0,
            secs: 0,
            flags: 0,
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::UNSPECIFIED,
            siaddr: Ipv4Addr::UNSPECIFIED,
            giaddr: Ipv4Addr::UNSPECIFIED,
            chaddr: [0u8; 16],
            sname: [0u8; 64],
            file: [0u8; 128],
            options: [0u8; DHCP_OPTIONS_SIZE],
        }
    }

    /// Parses a DHCP packet from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedPacket`] if:
    /// - Packet is shorter than 240 bytes (fixed header + magic cookie)
    /// - Packet is longer than 752 bytes (header + full options area)
    /// - Magic cookie is invalid (not 99.130.83.99)
    /// - Hardware length is neither 6 nor 0
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < DHCP_FIXED_HEADER_SIZE {
            return Err(Error::MalformedPacket(format!(
                "Packet too short: {} bytes (minimum {})",
                data.len(),
                DHCP_FIXED_HEADER_SIZE
            )));
        }

        if data.len() > DHCP_MAX_PACKET_SIZE {
            return Err(Error::MalformedPacket(format!(
                "Packet too long: {} bytes (maximum {})",
                data.len(),
                DHCP_MAX_PACKET_SIZE
            )));
        }

        let magic_cookie = &data[DHCP_MAGIC_COOKIE_OFFSET..DHCP_FIXED_HEADER_SIZE];
        if magic_cookie != DHCP_MAGIC_COOKIE {
            return Err(Error::MalformedPacket("Invalid magic cookie".to_string()));
        }

        let hlen = data[2];
        if hlen != HLEN_ETHERNET && hlen != 0 {
            return Err(Error::MalformedPacket(format!(
                "Invalid hlen {} (expected {} or 0)",
                hlen, HLEN_ETHERNET
            )));
        }

        let mut chaddr = [0u8; 16];
        chaddr.copy_from_slice(&data[DHCP_CHADDR_OFFSET..DHCP_SNAME_OFFSET]);

        let mut sname = [0u8; 64];
        sname.copy_from_slice(&data[DHCP_SNAME_OFFSET..DHCP_FILE_OFFSET]);

        let mut file = [0u8; 128];
        file.copy_from_slice(&data[DHCP_FILE_OFFSET..DHCP_MAGIC_COOKIE_OFFSET]);

        let received = &data[DHCP_FIXED_HEADER_SIZE..];
        let mut options = [0u8; DHCP_OPTIONS_SIZE];
        options[..received.len()].copy_from_slice(received);

        Ok(Self {
            op: data[0],
            htype: data[1],
            hlen,
            hops: data[3],
            xid: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            secs: u16::from_be_bytes([data[8], data[9]]),
            flags: u16::from_be_bytes([data[10], data[11]]),
            ciaddr: Ipv4Addr::new(data[12], data[13], data[14], data[15]),
            yiaddr: Ipv4Addr::new(data[16], data[17], data[18], data[19]),
            siaddr: Ipv4Addr::new(data[20], data[21], data[22], data[23]),
            giaddr: Ipv4Addr::new(data[24], data[25], data[26], data[27]),
            chaddr,
            sname,
            file,
            options,
        })
    }

    /// Encodes the full packet, options area included.
    ///
    /// The result is always [`DHCP_MAX_PACKET_SIZE`] bytes. Use
    /// [`encode_trimmed`](Self::encode_trimmed) for transmission.
    pub fn encode(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(DHCP_MAX_PACKET_SIZE);

        packet.push(self.op);
        packet.push(self.htype);
        packet.push(self.hlen);
        packet.push(self.hops);

        packet.extend_from_slice(&self.xid.to_be_bytes());
        packet.extend_from_slice(&self.secs.to_be_bytes());
        packet.extend_from_slice(&self.flags.to_be_bytes());

        packet.extend_from_slice(&self.ciaddr.octets());
        packet.extend_from_slice(&self.yiaddr.octets());
        packet.extend_from_slice(&self.siaddr.octets());
        packet.extend_from_slice(&self.giaddr.octets());

        packet.extend_from_slice(&self.chaddr);
        packet.extend_from_slice(&self.sname);
        packet.extend_from_slice(&self.file);

        packet.extend_from_slice(&DHCP_MAGIC_COOKIE);
        packet.extend_from_slice(&self.options);

        packet
    }

    /// Encodes the packet with trailing zero padding removed.
    pub fn encode_trimmed(&self) -> Vec<u8> {
        let mut packet = self.encode();
        let len = trimmed_len(&packet);
        packet.truncate(len);
        packet
    }

    /// Raw value of the message type option, if present.
    pub fn message_type_code(&self) -> Option<u8> {
        codec::find_option(self, OptionCode::MessageType as u8, None)
            .and_then(|value| value.first().copied())
    }

    /// Returns the DHCP message type (Option 53) if present and assigned.
    ///
    /// Returns `None` for BOOTP packets which don't have this option.
    pub fn message_type(&self) -> Option<MessageType> {
        self.message_type_code()
            .and_then(|code| MessageType::try_from(code).ok())
    }

    /// Returns the requested IP address (Option 50) if present.
    ///
    /// Clients include this in DISCOVER to request a specific IP,
    /// and in REQUEST to confirm the offered IP.
    pub fn requested_ip(&self) -> Option<Ipv4Addr> {
        codec::find_option(self, OptionCode::RequestedAddress as u8, None).and_then(|value| {
            <[u8; 4]>::try_from(value).ok().map(Ipv4Addr::from)
        })
    }

    /// Returns the client hardware address as 12 lowercase hex digits.
    pub fn mac_string(&self) -> String {
        crate::options::to_hex(&self.chaddr[..HLEN_ETHERNET as usize])
    }

    /// Formats the client hardware address as a colon-separated string.
    ///
    /// For Ethernet, returns format like "aa:bb:cc:dd:ee:ff".
    pub fn format_mac(&self) -> String {
        format_mac(&self.chaddr[..HLEN_ETHERNET as usize])
    }

    /// Returns true if the broadcast flag (bit 15) is set.
    ///
    /// When set, servers must broadcast replies instead of unicasting.
    pub fn is_broadcast(&self) -> bool {
        (self.flags & BROADCAST_FLAG) != 0
    }
}

/// Formats hardware address bytes as colon-separated hex.
pub fn format_mac(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut result = String::with_capacity(bytes.len() * 3);
    for (index, byte) in bytes.iter().enumerate() {
        if index > 0 {
            result.push(':');
        }
        let _ = write!(result, "{:02x}", byte);
    }
    result
}

/// Normalizes a textual MAC address to 12 lowercase hex digits.
///
/// Accepts `aabbccddeeff`, `aa:bb:cc:dd:ee:ff` and `aa-bb-cc-dd-ee-ff` in
/// any case. Returns `None` for anything else.
pub fn normalize_mac(mac: &str) -> Option<String> {
    let digits: String = mac
        .trim()
        .chars()
        .filter(|character| !matches!(character, ':' | '-' | '.'))
        .collect();
    if digits.len() != 12 || !digits.chars().all(|character| character.is_ascii_hexdigit()) {
        return None;
    }
    Some(digits.to_ascii_lowercase())
}

/// Parses a textual MAC address into its six bytes.
pub fn parse_mac(mac: &str) -> Option<[u8; 6]> {
    let digits = normalize_mac(mac)?;
    let mut bytes = [0u8; 6];
    for (index, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&digits[index * 2..index * 2 + 2], 16).ok()?;
    }
    Some(bytes)
}

/// Length of `packet` once trailing zero padding is dropped.
///
/// Shrinks one byte at a time while the last three bytes are all zero, so up
/// to two zero bytes may remain after the end marker.
pub fn trimmed_len(packet: &[u8]) -> usize {
    let mut len = packet.len();
    while len >= 3 && packet[len - 3..len].iter().all(|byte| *byte == 0) {
        len -= 1;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_packet(message_type: MessageType, with_options: bool) -> Vec<u8> {
        let mut packet = vec![0u8; 350];

        packet[0] = BOOTREQUEST;
        packet[1] = HTYPE_ETHERNET;
        packet[2] = HLEN_ETHERNET;
        packet[4..8].copy_from_slice(&0x12345678u32.to_be_bytes());
        packet[10..12].copy_from_slice(&BROADCAST_FLAG.to_be_bytes());
        packet[28..34].copy_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        packet[236..240].copy_from_slice(&DHCP_MAGIC_COOKIE);

        let mut index = 240;
        packet[index] = OptionCode::MessageType as u8;
        packet[index + 1] = 1;
        packet[index + 2] = message_type as u8;
        index += 3;

        if with_options {
            packet[index] = OptionCode::RequestedAddress as u8;
            packet[index + 1] = 4;
            packet[index + 2..index + 6].copy_from_slice(&[192, 168, 1, 100]);
            index += 6;
        }

        packet[index] = OptionCode::End as u8;
        packet
    }

    #[test]
    fn test_parse_and_roundtrip() {
        let data = create_test_packet(MessageType::Discover, false);
        let packet = DhcpPacket::parse(&data).unwrap();

        assert_eq!(packet.op, BOOTREQUEST);
        assert_eq!(packet.xid, 0x12345678);
        assert!(packet.is_broadcast());
        assert_eq!(packet.message_type(), Some(MessageType::Discover));
        assert_eq!(packet.format_mac(), "aa:bb:cc:dd:ee:ff");
        assert_eq!(packet.mac_string(), "aabbccddeeff");

        let encoded = packet.encode();
        assert_eq!(encoded.len(), DHCP_MAX_PACKET_SIZE);
        let reparsed = DhcpPacket::parse(&encoded).unwrap();
        assert_eq!(reparsed, packet);
    }

    #[test]
    fn test_parse_with_options() {
        let data = create_test_packet(MessageType::Request, true);
        let packet = DhcpPacket::parse(&data).unwrap();

        assert_eq!(packet.message_type(), Some(MessageType::Request));
        assert_eq!(packet.requested_ip(), Some(Ipv4Addr::new(192, 168, 1, 100)));
    }

    #[test]
    fn test_invalid_packets() {
        assert!(DhcpPacket::parse(&[0u8; 100]).is_err());
        assert!(DhcpPacket::parse(&[0u8; 239]).is_err());

        let mut bad_cookie = [0u8; 300];
        bad_cookie[236..240].copy_from_slice(&[0, 0, 0, 0]);
        assert!(matches!(
            DhcpPacket::parse(&bad_cookie),
            Err(Error::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_oversized_packet_rejected() {
        let mut packet = vec![0u8; DHCP_MAX_PACKET_SIZE + 1];
        packet[236..240].copy_from_slice(&DHCP_MAGIC_COOKIE);
        assert!(DhcpPacket::parse(&packet).is_err());

        packet.pop();
        assert!(DhcpPacket::parse(&packet).is_ok());
    }

    #[test]
    fn test_hlen_validation() {
        let mut packet = create_test_packet(MessageType::Discover, false);
        packet[2] = 7;
        assert!(DhcpPacket::parse(&packet).is_err());

        packet[2] = 0;
        assert!(DhcpPacket::parse(&packet).is_ok());

        packet[2] = HLEN_ETHERNET;
        assert!(DhcpPacket::parse(&packet).is_ok());
    }

    #[test]
    fn test_minimum_valid_packet() {
        let mut packet = vec![0u8; DHCP_FIXED_HEADER_SIZE];
        packet[0] = BOOTREQUEST;
        packet[1] = HTYPE_ETHERNET;
        packet[2] = HLEN_ETHERNET;
        packet[236..240].copy_from_slice(&DHCP_MAGIC_COOKIE);

        let parsed = DhcpPacket::parse(&packet).unwrap();
        assert_eq!(parsed.op, BOOTREQUEST);
        assert!(parsed.options.iter().all(|byte| *byte == 0));
        assert_eq!(parsed.message_type(), None);
    }

    #[test]
    fn test_unassigned_message_type() {
        let mut packet = create_test_packet(MessageType::Discover, false);
        packet[242] = 42;

        let parsed = DhcpPacket::parse(&packet).unwrap();
        assert_eq!(parsed.message_type_code(), Some(42));
        assert_eq!(parsed.message_type(), None);
    }

    #[test]
    fn test_unicast_flag() {
        let mut packet = create_test_packet(MessageType::Discover, false);
        packet[10..12].copy_from_slice(&0x0000u16.to_be_bytes());

        let parsed = DhcpPacket::parse(&packet).unwrap();
        assert!(!parsed.is_broadcast());
    }

    #[test]
    fn test_all_zero_chaddr() {
        let mut packet = create_test_packet(MessageType::Discover, false);
        packet[28..44].copy_from_slice(&[0u8; 16]);

        let parsed = DhcpPacket::parse(&packet).unwrap();
        assert_eq!(parsed.format_mac(), "00:00:00:00:00:00");
        assert_eq!(parsed.mac_string(), "000000000000");
    }

    #[test]
    fn test_packet_field_offsets_correct() {
        let mut packet = vec![0u8; DHCP_FIXED_HEADER_SIZE + 5];
        packet[0] = BOOTREQUEST;
        packet[1] = HTYPE_ETHERNET;
        packet[2] = HLEN_ETHERNET;
        packet[3] = 5;
        packet[4..8].copy_from_slice(&0xDEADBEEFu32.to_be_bytes());
        packet[8..10].copy_from_slice(&1234u16.to_be_bytes());
        packet[10..12].copy_from_slice(&0x8000u16.to_be_bytes());
        packet[12..16].copy_from_slice(&[10, 0, 0, 1]);
        packet[16..20].copy_from_slice(&[10, 0, 0, 2]);
        packet[20..24].copy_from_slice(&[10, 0, 0, 3]);
        packet[24..28].copy_from_slice(&[10, 0, 0, 4]);
        packet[28..34].copy_from_slice(&[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        packet[44..52].copy_from_slice(b"testname");
        packet[108..116].copy_from_slice(b"bootfile");
        packet[236..240].copy_from_slice(&DHCP_MAGIC_COOKIE);
        packet[240] = OptionCode::End as u8;

        let parsed = DhcpPacket::parse(&packet).unwrap();
        assert_eq!(parsed.hops, 5);
        assert_eq!(parsed.xid, 0xDEADBEEF);
        assert_eq!(parsed.secs, 1234);
        assert_eq!(parsed.flags, 0x8000);
        assert_eq!(parsed.ciaddr, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(parsed.yiaddr, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(parsed.siaddr, Ipv4Addr::new(10, 0, 0, 3));
        assert_eq!(parsed.giaddr, Ipv4Addr::new(10, 0, 0, 4));
        assert_eq!(&parsed.chaddr[..6], &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        assert_eq!(&parsed.sname[..8], b"testname");
        assert_eq!(&parsed.file[..8], b"bootfile");
        assert_eq!(parsed.options[0], OptionCode::End as u8);
    }

    #[test]
    fn test_encode_produces_correct_offsets() {
        let mut packet = DhcpPacket::new(BOOTREPLY);
        packet.hops = 3;
        packet.xid = 0x12345678;
        packet.secs = 999;
        packet.flags = BROADCAST_FLAG;
        packet.ciaddr = Ipv4Addr::new(192, 168, 1, 10);
        packet.yiaddr = Ipv4Addr::new(192, 168, 1, 20);
        packet.siaddr = Ipv4Addr::new(192, 168, 1, 1);
        packet.giaddr = Ipv4Addr::new(192, 168, 2, 1);
        packet.chaddr[..6].copy_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        packet.options[0] = OptionCode::End as u8;

        let encoded = packet.encode();

        assert_eq!(encoded[0], BOOTREPLY);
        assert_eq!(encoded[1], HTYPE_ETHERNET);
        assert_eq!(encoded[2], HLEN_ETHERNET);
        assert_eq!(encoded[3], 3);
        assert_eq!(&encoded[4..8], &0x12345678u32.to_be_bytes());
        assert_eq!(&encoded[8..10], &999u16.to_be_bytes());
        assert_eq!(&encoded[10..12], &0x8000u16.to_be_bytes());
        assert_eq!(&encoded[12..16], &[192, 168, 1, 10]);
        assert_eq!(&encoded[16..20], &[192, 168, 1, 20]);
        assert_eq!(&encoded[20..24], &[192, 168, 1, 1]);
        assert_eq!(&encoded[24..28], &[192, 168, 2, 1]);
        assert_eq!(&encoded[28..34], &[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert_eq!(&encoded[236..240], &DHCP_MAGIC_COOKIE);
        assert_eq!(encoded[240], OptionCode::End as u8);
    }

    #[test]
    fn test_trimmed_len() {
        assert_eq!(trimmed_len(&[1, 2, 255, 0, 0, 0, 0]), 5);
        assert_eq!(trimmed_len(&[1, 2, 255]), 3);
        assert_eq!(trimmed_len(&[1, 0, 0]), 3);
        assert_eq!(trimmed_len(&[0, 0, 0, 0]), 2);
        assert_eq!(trimmed_len(&[]), 0);
    }

    #[test]
    fn test_encode_trimmed_keeps_end_marker() {
        let mut packet = DhcpPacket::new(BOOTREPLY);
        packet.options[..4].copy_from_slice(&[53, 1, 2, 255]);

        let encoded = packet.encode_trimmed();
        assert_eq!(encoded.len(), DHCP_FIXED_HEADER_SIZE + 6);
        assert_eq!(encoded[DHCP_FIXED_HEADER_SIZE + 3], 255);
        assert!(DhcpPacket::parse(&encoded).is_ok());
    }

    #[test]
    fn test_normalize_mac() {
        assert_eq!(
            normalize_mac("AA:BB:CC:DD:EE:FF"),
            Some("aabbccddeeff".to_string())
        );
        assert_eq!(
            normalize_mac("aa-bb-cc-dd-ee-ff"),
            Some("aabbccddeeff".to_string())
        );
        assert_eq!(normalize_mac("aabbccddeeff"), Some("aabbccddeeff".to_string()));
        assert_eq!(normalize_mac("aabbccddee"), None);
        assert_eq!(normalize_mac("gggggggggggg"), None);
        assert_eq!(
            parse_mac("00:11:22:aa:bb:cc"),
            Some([0x00, 0x11, 0x22, 0xaa, 0xbb, 0xcc])
        );
    }
}
