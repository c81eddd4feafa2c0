//! In-memory lease table.
//!
//! A lease binds one client MAC address to one IPv4 address. The store keeps
//! one record per MAC plus a secondary index from IP to MAC, and updates
//! both under a single [`Mutex`] so lookups by either key always agree.
//!
//! Expiry is recorded but never enforced here; eviction is up to callers.
//! Nothing is persisted across restarts.
//!
//! # Conflicts
//!
//! Adding a lease is last-writer-wins. A new lease for a MAC replaces the
//! old one (and frees its address), and a new lease for an address already
//! held by another MAC evicts that MAC's lease.

use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::packet::normalize_mac;

/// A DHCP lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    /// Client hardware address, 12 lowercase hex digits.
    pub mac: String,

    /// The IP address assigned to this client.
    pub ip: Ipv4Addr,

    /// Lease duration in seconds.
    pub lease_time: u32,

    /// Expiry as seconds since the Unix epoch.
    pub expires: u32,
}

impl Lease {
    /// When the lease expires, as a UTC timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(i64::from(self.expires), 0)
    }
}

impl fmt::Display for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.mac, self.ip, self.lease_time, self.expires
        )
    }
}

/// Current time as epoch seconds, saturating into the `u32` range.
pub fn epoch_now() -> u32 {
    u32::try_from(Utc::now().timestamp().max(0)).unwrap_or(u32::MAX)
}

#[derive(Debug, Default)]
struct LeaseTable {
    by_mac: HashMap<String, Lease>,
    /// Reverse lookup: IP address → MAC.
    by_ip: HashMap<Ipv4Addr, String>,
}

impl LeaseTable {
    fn remove(&mut self, mac: &str) -> Option<Lease> {
        let lease = self.by_mac.remove(mac)?;
        if self.by_ip.get(&lease.ip).is_some_and(|owner| owner == mac) {
            self.by_ip.remove(&lease.ip);
        }
        Some(lease)
    }

    fn insert(&mut self, lease: Lease) {
        self.remove(&lease.mac);
        if let Some(previous) = self.by_ip.get(&lease.ip).cloned() {
            debug!("Evicting lease of {} for {}", previous, lease.ip);
            self.remove(&previous);
        }
        self.by_ip.insert(lease.ip, lease.mac.clone());
        self.by_mac.insert(lease.mac.clone(), lease);
    }
}

/// Thread-safe lease table keyed by MAC with an IP index.
#[derive(Debug, Default)]
pub struct Leases {
    table: Mutex<LeaseTable>,
}

impl Leases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the lease for `mac`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `mac` is not a 6-byte hardware
    /// address.
    pub async fn add(
        &self,
        mac: &str,
        ip: Ipv4Addr,
        lease_time: u32,
        expires: u32,
    ) -> Result<Lease> {
        let mac = normalize_mac(mac)
            .ok_or_else(|| Error::InvalidConfig(format!("Invalid MAC address: {}", mac)))?;
        let lease = Lease {
            mac,
            ip,
            lease_time,
            expires,
        };

        self.table.lock().await.insert(lease.clone());
        debug!("Lease added: {}", lease);
        Ok(lease)
    }

    /// Removes the lease for `mac`, returning it if one existed.
    pub async fn remove(&self, mac: &str) -> Option<Lease> {
        let mac = normalize_mac(mac)?;
        let removed = self.table.lock().await.remove(&mac);
        if let Some(lease) = &removed {
            debug!("Lease removed: {}", lease);
        }
        removed
    }

    pub async fn find_by_mac(&self, mac: &str) -> Option<Lease> {
        let mac = normalize_mac(mac)?;
        self.table.lock().await.by_mac.get(&mac).cloned()
    }

    pub async fn find_by_ip(&self, ip: Ipv4Addr) -> Option<Lease> {
        let table = self.table.lock().await;
        let mac = table.by_ip.get(&ip)?;
        table.by_mac.get(mac).cloned()
    }

    /// First of `candidates` that is unleased or already leased to `mac`.
    ///
    /// The whole scan runs under one lock.
    pub async fn first_available<I>(&self, candidates: I, mac: &str) -> Option<Ipv4Addr>
    where
        I: IntoIterator<Item = Ipv4Addr>,
    {
        let mac = normalize_mac(mac)?;
        let table = self.table.lock().await;
        candidates
            .into_iter()
            .find(|ip| table.by_ip.get(ip).is_none_or(|owner| *owner == mac))
    }

    /// Snapshot of all leases, ordered by IP address.
    pub async fn list(&self) -> Vec<Lease> {
        let table = self.table.lock().await;
        let mut leases: Vec<Lease> = table.by_mac.values().cloned().collect();
        leases.sort_by_key(|lease| lease.ip);
        leases
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.by_mac.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const MAC: &str = "aabbccddeeff";

    #[test]
    fn test_lease_struct() {
        let lease = Lease {
            mac: MAC.to_string(),
            ip: Ipv4Addr::new(10, 0, 0, 5),
            lease_time: 3600,
            expires: 1_700_000_000,
        };
        assert_eq!(lease.to_string(), "aabbccddeeff 10.0.0.5 3600 1700000000");
        assert_eq!(
            lease.expires_at().map(|at| at.timestamp()),
            Some(1_700_000_000)
        );
    }

    #[tokio::test]
    async fn test_first_available_skips_other_clients() {
        let leases = Leases::new();
        leases
            .add("11:22:33:44:55:66", Ipv4Addr::new(10, 0, 0, 1), 60, 0)
            .await
            .unwrap();
        leases
            .add(MAC, Ipv4Addr::new(10, 0, 0, 2), 60, 0)
            .await
            .unwrap();
        let candidates = (1..=3).map(|last| Ipv4Addr::new(10, 0, 0, last));

        assert_eq!(
            leases.first_available(candidates.clone(), MAC).await,
            Some(Ipv4Addr::new(10, 0, 0, 2))
        );
        assert_eq!(
            leases
                .first_available(candidates, "aa:aa:aa:aa:aa:aa")
                .await,
            Some(Ipv4Addr::new(10, 0, 0, 3))
        );
        assert_eq!(
            leases
                .first_available([Ipv4Addr::new(10, 0, 0, 1)], "aa:aa:aa:aa:aa:aa")
                .await,
            None
        );
    }

    #[tokio::test]
    async fn test_lease_lifecycle() {
        let leases = Leases::new();
        let ip = Ipv4Addr::new(10, 0, 0, 5);

        let lease = leases.add("AA:BB:CC:DD:EE:FF", ip, 3600, 100).await.unwrap();
        assert_eq!(lease.mac, MAC);

        assert_eq!(leases.find_by_mac(MAC).await, Some(lease.clone()));
        assert_eq!(leases.find_by_ip(ip).await, Some(lease.clone()));
        assert_eq!(leases.list().await, vec![lease.clone()]);

        assert_eq!(leases.remove("aa-bb-cc-dd-ee-ff").await, Some(lease));
        assert!(leases.find_by_mac(MAC).await.is_none());
        assert!(leases.find_by_ip(ip).await.is_none());
        assert!(leases.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalid_mac_rejected() {
        let leases = Leases::new();
        let result = leases
            .add("not-a-mac", Ipv4Addr::new(10, 0, 0, 1), 60, 0)
            .await;
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
        assert!(leases.remove("not-a-mac").await.is_none());
    }

    #[tokio::test]
    async fn test_client_changes_ip() {
        let leases = Leases::new();
        let first = Ipv4Addr::new(10, 0, 0, 5);
        let second = Ipv4Addr::new(10, 0, 0, 6);

        leases.add(MAC, first, 60, 0).await.unwrap();
        leases.add(MAC, second, 60, 0).await.unwrap();

        assert_eq!(leases.len().await, 1);
        assert!(leases.find_by_ip(first).await.is_none());
        assert_eq!(leases.find_by_ip(second).await.unwrap().mac, MAC);
    }

    #[tokio::test]
    async fn test_ip_already_leased_to_different_client() {
        let leases = Leases::new();
        let ip = Ipv4Addr::new(10, 0, 0, 5);

        leases.add("111111111111", ip, 60, 0).await.unwrap();
        leases.add("222222222222", ip, 60, 0).await.unwrap();

        assert_eq!(leases.len().await, 1);
        assert!(leases.find_by_mac("111111111111").await.is_none());
        assert_eq!(leases.find_by_ip(ip).await.unwrap().mac, "222222222222");
    }

    #[tokio::test]
    async fn test_remove_nonexistent_lease() {
        let leases = Leases::new();
        assert!(leases.remove(MAC).await.is_none());
    }

    #[tokio::test]
    async fn test_list_leases_sorted_by_ip() {
        let leases = Leases::new();
        leases
            .add("000000000002", Ipv4Addr::new(10, 0, 0, 9), 60, 0)
            .await
            .unwrap();
        leases
            .add("000000000001", Ipv4Addr::new(10, 0, 0, 3), 60, 0)
            .await
            .unwrap();

        let ips: Vec<Ipv4Addr> = leases.list().await.iter().map(|lease| lease.ip).collect();
        assert_eq!(
            ips,
            vec![Ipv4Addr::new(10, 0, 0, 3), Ipv4Addr::new(10, 0, 0, 9)]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_same_mac() {
        let leases = Arc::new(Leases::new());
        let mut handles = vec![];

        for host in 1..=50u8 {
            let leases = Arc::clone(&leases);
            handles.push(tokio::spawn(async move {
                leases
                    .add(MAC, Ipv4Addr::new(10, 0, 0, host), 60, 0)
                    .await
                    .unwrap()
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(leases.len().await, 1);
        let lease = leases.find_by_mac(MAC).await.unwrap();
        assert_eq!(leases.find_by_ip(lease.ip).await, Some(lease.clone()));

        let mut indexed = 0;
        for host in 1..=50u8 {
            if leases
                .find_by_ip(Ipv4Addr::new(10, 0, 0, host))
                .await
                .is_some()
            {
                indexed += 1;
            }
        }
        assert_eq!(indexed, 1);
    }
}
