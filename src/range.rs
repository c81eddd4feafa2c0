//! Address ranges and range matching.
//!
//! A [`Range`] is an administratively configured address pool together with
//! the policy for it: options an inbound request must carry to select it
//! (`check_options`), an optional client MAC filter, and options appended to
//! every reply composed for it (`reply_options`).
//!
//! Ranges are never mutated once added. [`Ranges`] holds them behind a
//! read/write lock and scans them most-recently-added first.

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::options::DhcpOption;
use crate::packet::{DhcpPacket, normalize_mac};

/// An address pool with its match predicates and reply overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub start: Ipv4Addr,
    pub end: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    /// Lease time offered for addresses from this range.
    pub lease_time: Option<u32>,
    /// Client MAC (12 lowercase hex digits) this range is restricted to.
    pub mac_filter: Option<String>,
    pub check_options: Vec<DhcpOption>,
    pub reply_options: Vec<DhcpOption>,
}

impl Range {
    /// Creates a range with no predicates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `start` is after `end`.
    pub fn new(
        start: Ipv4Addr,
        end: Ipv4Addr,
        netmask: Ipv4Addr,
        gateway: Ipv4Addr,
    ) -> Result<Self> {
        if u32::from(start) > u32::from(end) {
            return Err(Error::InvalidConfig(format!(
                "Range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self {
            start,
            end,
            netmask,
            gateway,
            lease_time: None,
            mac_filter: None,
            check_options: Vec::new(),
            reply_options: Vec::new(),
        })
    }

    /// Restricts the range to one client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `mac` is not a 6-byte hardware
    /// address.
    pub fn with_mac_filter(mut self, mac: &str) -> Result<Self> {
        let mac = normalize_mac(mac)
            .ok_or_else(|| Error::InvalidConfig(format!("Invalid MAC address: {}", mac)))?;
        self.mac_filter = Some(mac);
        Ok(self)
    }

    pub fn with_lease_time(mut self, lease_time: u32) -> Self {
        self.lease_time = Some(lease_time);
        self
    }

    pub fn with_check_options(mut self, options: Vec<DhcpOption>) -> Self {
        self.check_options = options;
        self
    }

    pub fn with_reply_options(mut self, options: Vec<DhcpOption>) -> Self {
        self.reply_options = options;
        self
    }

    /// Returns true if `ip` lies within `[start, end]`.
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        (u32::from(self.start)..=u32::from(self.end)).contains(&u32::from(ip))
    }

    /// Addresses of the range in ascending order.
    pub fn addresses(&self) -> impl Iterator<Item = Ipv4Addr> + use<> {
        (u32::from(self.start)..=u32::from(self.end)).map(Ipv4Addr::from)
    }

    /// Whether a request selects this range.
    ///
    /// Every check option needs an inbound option with the same code (and
    /// parent) whose value compares equal, and the MAC filter, if any, has to
    /// equal the client's hardware address.
    pub fn matches(&self, packet: &DhcpPacket, inbound: &[DhcpOption]) -> bool {
        if let Some(mac) = &self.mac_filter
            && *mac != packet.mac_string()
        {
            return false;
        }

        self.check_options.iter().all(|check| {
            inbound
                .iter()
                .filter(|option| option.code() == check.code() && option.parent() == check.parent())
                .any(|option| check.matches_data(option.data()))
        })
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.start, self.end, self.netmask, self.gateway
        )?;
        if let Some(lease_time) = self.lease_time {
            write!(f, " lease-time {}", lease_time)?;
        }
        if let Some(mac) = &self.mac_filter {
            write!(f, " mac {}", mac)?;
        }
        for (label, options) in [("check", &self.check_options), ("reply", &self.reply_options)] {
            if options.is_empty() {
                continue;
            }
            write!(f, " {} {{", label)?;
            for (index, option) in options.iter().enumerate() {
                if index > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{{{}}}", option)?;
            }
            f.write_str("}")?;
        }
        Ok(())
    }
}

/// The ordered set of configured ranges.
#[derive(Debug, Default)]
pub struct Ranges {
    ranges: RwLock<Vec<Arc<Range>>>,
}

impl Ranges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a range. It is consulted before every range added earlier.
    pub async fn add(&self, range: Range) -> Arc<Range> {
        let range = Arc::new(range);
        self.ranges.write().await.push(Arc::clone(&range));
        debug!("Range added: {}", range);
        range
    }

    /// Removes every range spanning exactly `start..=end`.
    ///
    /// Returns the number of ranges removed.
    pub async fn remove(&self, start: Ipv4Addr, end: Ipv4Addr) -> usize {
        let mut ranges = self.ranges.write().await;
        let before = ranges.len();
        ranges.retain(|range| !(range.start == start && range.end == end));
        before - ranges.len()
    }

    /// First range, most recent first, selected by the request.
    pub async fn find(&self, packet: &DhcpPacket, inbound: &[DhcpOption]) -> Option<Arc<Range>> {
        self.ranges
            .read()
            .await
            .iter()
            .rev()
            .find(|range| range.matches(packet, inbound))
            .cloned()
    }

    /// Snapshot of the ranges, most recent first.
    pub async fn list(&self) -> Vec<Arc<Range>> {
        self.ranges.read().await.iter().rev().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.ranges.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
