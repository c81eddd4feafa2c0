//! Option TLV codec.
//!
//! Options are stored on the wire as `code, length, value` triples. Code 0
//! is a single pad byte and code 255 ends the stream. When the primary
//! options area carries an option overload (52), the `file` and then the
//! `sname` header fields hold further option streams. The overload option is
//! consumed wherever it appears and never decoded as a value.
//!
//! Every read here is bounds-checked against the region being scanned: an
//! option whose declared length runs past its region stops the scan of that
//! region with [`Error::TruncatedOptions`], and whatever was decoded before
//! it stays usable.
//!
//! # References
//!
//! - RFC 2132 §2: BOOTP Extension/DHCP Option Field Format
//! - RFC 2132 §9.3: Option Overload
//! - RFC 3046: DHCP Relay Agent Information Option

use std::fmt::Write;
use std::net::{Ipv4Addr, SocketAddr};

use tracing::{debug, warn};

use crate::dict::{self, Dictionary};
use crate::error::{Error, Region, Result};
use crate::options::{self, DhcpOption, OptionCode, OverloadFlag, MAX_OPTION_LEN};
use crate::packet::DhcpPacket;

/// One raw TLV as found in a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    pub code: u8,
    /// Offset of the code byte within its region.
    pub offset: usize,
    pub value: &'a [u8],
}

/// Iterator over the TLVs of one region.
///
/// Skips pad bytes, stops at the end marker or the end of the region, and
/// yields a single [`Error::TruncatedOptions`] before stopping when an option
/// overruns the region.
#[derive(Debug, Clone)]
pub struct TlvIter<'a> {
    data: &'a [u8],
    region: Region,
    offset: usize,
    done: bool,
}

impl<'a> TlvIter<'a> {
    pub fn new(data: &'a [u8], region: Region) -> Self {
        Self {
            data,
            region,
            offset: 0,
            done: false,
        }
    }
}

impl<'a> Iterator for TlvIter<'a> {
    type Item = Result<Tlv<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while self.offset < self.data.len() && self.data[self.offset] == OptionCode::Pad as u8 {
            self.offset += 1;
        }

        if self.offset >= self.data.len() || self.data[self.offset] == OptionCode::End as u8 {
            self.done = true;
            return None;
        }

        let offset = self.offset;
        let code = self.data[offset];
        let region = self.region;
        let truncated = || Error::TruncatedOptions {
            region,
            offset,
            code,
        };

        let Some(&length) = self.data.get(offset + 1) else {
            self.done = true;
            return Some(Err(truncated()));
        };

        let end = offset + 2 + length as usize;
        if end > self.data.len() {
            self.done = true;
            return Some(Err(truncated()));
        }

        self.offset = end;
        Some(Ok(Tlv {
            code,
            offset,
            value: &self.data[offset + 2..end],
        }))
    }
}

/// The last well-formed overload flag declared in one region.
fn declared_overload(data: &[u8], region: Region) -> Option<OverloadFlag> {
    TlvIter::new(data, region)
        .map_while(|tlv| tlv.ok())
        .filter(|tlv| tlv.code == OptionCode::OptionOverload as u8)
        .filter_map(|tlv| match tlv.value {
            [flag] => OverloadFlag::try_from(flag & 0x03).ok(),
            _ => None,
        })
        .last()
}

/// The overload flag declared in the primary options area, if any.
///
/// A malformed value (wrong length, or neither bit set) is ignored.
pub fn overload_flag(packet: &DhcpPacket) -> Option<OverloadFlag> {
    declared_overload(&packet.options, Region::Options)
}

/// The option streams of a packet in scan order: options, then `file`, then
/// `sname`, as the overload flag allows.
///
/// An overload option carried inside `file` replaces the primary flag when
/// deciding whether `sname` is scanned.
pub fn regions(packet: &DhcpPacket) -> Vec<(Region, &[u8])> {
    let mut regions = vec![(Region::Options, &packet.options[..])];
    let mut flag = overload_flag(packet);

    if flag.is_some_and(OverloadFlag::includes_file) {
        regions.push((Region::File, &packet.file[..]));
        if let Some(from_file) = declared_overload(&packet.file, Region::File) {
            flag = Some(from_file);
        }
    }
    if flag.is_some_and(OverloadFlag::includes_sname) {
        regions.push((Region::Sname, &packet.sname[..]));
    }
    regions
}

/// Decodes one region into `out`, descending into compound options.
///
/// A truncated sub-option stream ends only that compound option; the scan
/// of the enclosing region carries on and the first error is returned once
/// it finishes.
fn scan_region(
    data: &[u8],
    region: Region,
    dictionary: &'static Dictionary,
    out: &mut Vec<DhcpOption>,
) -> Result<()> {
    let mut nested_error = None;

    for tlv in TlvIter::new(data, region) {
        let tlv = match tlv {
            Ok(tlv) => tlv,
            Err(err) => return Err(nested_error.unwrap_or(err)),
        };

        if tlv.code == OptionCode::OptionOverload as u8 && !matches!(region, Region::Nested(_)) {
            continue;
        }

        let Some(entry) = dictionary.get(tlv.code) else {
            debug!("{}", Error::UnknownOption(tlv.code));
            continue;
        };

        if let Some(subdict) = entry.subdict {
            if let Err(err) = scan_region(tlv.value, Region::Nested(tlv.code), subdict, out) {
                nested_error.get_or_insert(err);
            }
            continue;
        }

        out.push(DhcpOption::new(entry, tlv.value.to_vec())?);
    }

    match nested_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Decodes every option region, continuing past a truncated region.
///
/// Returns the options decoded and the first truncation encountered.
pub fn decode_options(packet: &DhcpPacket) -> (Vec<DhcpOption>, Option<Error>) {
    let mut options = Vec::new();
    let mut first_error = None;

    for (region, data) in regions(packet) {
        if let Err(err) = scan_region(data, region, dict::main_dict(), &mut options)
            && first_error.is_none()
        {
            first_error = Some(err);
        }
    }

    (options, first_error)
}

/// Decodes the options of a packet.
///
/// Nested sub-options (relay agent information) are returned as entries of
/// their own, with [`DhcpOption::parent`] set. The overload option itself is
/// consumed and not returned.
///
/// # Errors
///
/// Returns [`Error::TruncatedOptions`] if any option overruns its region.
pub fn parse_options(packet: &DhcpPacket) -> Result<Vec<DhcpOption>> {
    match decode_options(packet) {
        (options, None) => Ok(options),
        (_, Some(err)) => Err(err),
    }
}

/// Decodes the options of a packet, logging and dropping anything past a
/// truncation.
pub fn parse_options_lossy(packet: &DhcpPacket) -> Vec<DhcpOption> {
    let (options, err) = decode_options(packet);
    if let Some(err) = err {
        warn!("Options truncated for xid {:#010x}: {}", packet.xid, err);
    }
    options
}

/// Raw value of the first occurrence of `code` (or of `code.subcode`).
///
/// Only options decoded before any truncation are considered.
pub fn find_option(packet: &DhcpPacket, code: u8, subcode: Option<u8>) -> Option<&[u8]> {
    let value = regions(packet).into_iter().find_map(|(region, data)| {
        TlvIter::new(data, region)
            .map_while(|tlv| tlv.ok())
            .find(|tlv| tlv.code == code)
            .map(|tlv| tlv.value)
    })?;

    match subcode {
        None => Some(value),
        Some(subcode) => TlvIter::new(value, Region::Nested(code))
            .map_while(|tlv| tlv.ok())
            .find(|tlv| tlv.code == subcode)
            .map(|tlv| tlv.value),
    }
}

/// Appends options to an outbound options area.
///
/// One byte of the area is always held back for the end marker, so
/// [`finish`](Self::finish) can never fail. An option that does not fit is
/// rejected with [`Error::BufferFull`] and leaves the area untouched.
#[derive(Debug)]
pub struct OptionWriter<'a> {
    buffer: &'a mut [u8],
    cursor: usize,
}

impl<'a> OptionWriter<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, cursor: 0 }
    }

    /// Bytes written so far.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Bytes still available for options.
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.cursor + 1)
    }

    fn reserve(&mut self, code: u8, needed: usize) -> Result<&mut [u8]> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(Error::BufferFull {
                code,
                needed,
                remaining,
            });
        }
        let start = self.cursor;
        self.cursor += needed;
        Ok(&mut self.buffer[start..start + needed])
    }

    fn check_length(code: u8, data: &[u8], limit: usize) -> Result<()> {
        if data.len() > limit {
            return Err(Error::InvalidOptionValue {
                name: dict::lookup_by_code(code, None)
                    .map(|entry| entry.name.to_string())
                    .unwrap_or_else(|| code.to_string()),
                value: format!("{} bytes", data.len()),
            });
        }
        Ok(())
    }

    /// Writes `code, len, data`.
    pub fn append(&mut self, code: u8, data: &[u8]) -> Result<()> {
        Self::check_length(code, data, MAX_OPTION_LEN)?;
        let slot = self.reserve(code, data.len() + 2)?;
        slot[0] = code;
        slot[1] = data.len() as u8;
        slot[2..].copy_from_slice(data);
        Ok(())
    }

    pub fn append_u8(&mut self, code: u8, value: u8) -> Result<()> {
        self.append(code, &[value])
    }

    pub fn append_u16(&mut self, code: u8, value: u16) -> Result<()> {
        self.append(code, &value.to_be_bytes())
    }

    pub fn append_u32(&mut self, code: u8, value: u32) -> Result<()> {
        self.append(code, &value.to_be_bytes())
    }

    pub fn append_ip(&mut self, code: u8, addr: Ipv4Addr) -> Result<()> {
        self.append(code, &addr.octets())
    }

    /// Writes a sub-option wrapped in its own parent TLV:
    /// `parent, len + 2, code, len, data`.
    pub fn append_nested(&mut self, parent: u8, code: u8, data: &[u8]) -> Result<()> {
        Self::check_length(parent, data, MAX_OPTION_LEN - 2)?;
        let slot = self.reserve(parent, data.len() + 4)?;
        slot[0] = parent;
        slot[1] = (data.len() + 2) as u8;
        slot[2] = code;
        slot[3] = data.len() as u8;
        slot[4..].copy_from_slice(data);
        Ok(())
    }

    /// Writes an option, wrapping sub-options in their parent.
    pub fn append_option(&mut self, option: &DhcpOption) -> Result<()> {
        match option.parent() {
            Some(parent) => self.append_nested(parent, option.code(), option.data()),
            None => self.append(option.code(), option.data()),
        }
    }

    /// Writes the end marker and returns the number of bytes used.
    pub fn finish(self) -> usize {
        let end = self.cursor.min(self.buffer.len().saturating_sub(1));
        if let Some(byte) = self.buffer.get_mut(end) {
            *byte = OptionCode::End as u8;
            end + 1
        } else {
            0
        }
    }
}

fn render_region(out: &mut String, data: &[u8], region: Region, dictionary: &'static Dictionary) {
    for tlv in TlvIter::new(data, region) {
        match tlv {
            Ok(tlv) => match dictionary.get(tlv.code) {
                Some(entry) => match entry.subdict {
                    Some(subdict) => {
                        render_region(out, tlv.value, Region::Nested(tlv.code), subdict)
                    }
                    None => {
                        let _ = writeln!(out, "  {}", options::render_value(entry, tlv.value));
                    }
                },
                None => {
                    let _ = writeln!(
                        out,
                        "  option-{} {{{}}}",
                        tlv.code,
                        options::to_hex(tlv.value)
                    );
                }
            },
            Err(err) => {
                let _ = writeln!(out, "  ({})", err);
            }
        }
    }
}

/// Human-readable dump of a packet for diagnostics.
pub fn render(packet: &DhcpPacket, peer: SocketAddr) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} from {} op {} hops {} flags {:#06x} xid {:#010x}",
        options::message_type_name(packet.message_type_code()),
        peer,
        packet.op,
        packet.hops,
        packet.flags,
        packet.xid
    );
    let _ = writeln!(
        out,
        "  ciaddr {} yiaddr {} siaddr {} giaddr {}",
        packet.ciaddr, packet.yiaddr, packet.siaddr, packet.giaddr
    );
    let _ = writeln!(out, "  chaddr {}", packet.format_mac());

    for (region, data) in regions(packet) {
        render_region(&mut out, data, region, dict::main_dict());
    }
    out
}
