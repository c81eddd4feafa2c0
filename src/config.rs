use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::Path;

use crate::error::{Error, Result};
use crate::options::DhcpOption;
use crate::packet;
use crate::range::Range;
use crate::request::{CLIENT_PORT, SERVER_PORT};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub server_ip: Ipv4Addr,
    pub listen_address: Ipv4Addr,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_client_port")]
    pub client_port: u16,
    #[serde(default)]
    pub debug: u32,
    #[serde(default)]
    pub ranges: Vec<RangeConfig>,
    #[serde(default)]
    pub leases: Vec<LeaseConfig>,
}

/// An address range as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeConfig {
    pub start: Ipv4Addr,
    pub end: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    /// Options the inbound packet must carry for the range to match.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub check: Vec<OptionSetting>,
    /// Options added to every reply from the range.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reply: Vec<OptionSetting>,
}

/// An option by dictionary name with a textual value, e.g.
/// `{ "name": "routers", "value": "10.0.0.1,10.0.0.2" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSetting {
    pub name: String,
    pub value: String,
}

/// A lease preloaded at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseConfig {
    pub mac: String,
    pub ip: Ipv4Addr,
    pub lease_time: u32,
    #[serde(default)]
    pub expires: u32,
}

fn default_port() -> u16 {
    SERVER_PORT
}

fn default_client_port() -> u16 {
    CLIENT_PORT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_ip: Ipv4Addr::new(192, 168, 1, 1),
            listen_address: Ipv4Addr::UNSPECIFIED,
            port: SERVER_PORT,
            client_port: CLIENT_PORT,
            debug: 0,
            ranges: vec![RangeConfig {
                start: Ipv4Addr::new(192, 168, 1, 100),
                end: Ipv4Addr::new(192, 168, 1, 200),
                netmask: Ipv4Addr::new(255, 255, 255, 0),
                gateway: Ipv4Addr::new(192, 168, 1, 1),
                lease_time: Some(86400),
                mac_address: None,
                check: Vec::new(),
                reply: Vec::new(),
            }],
            leases: Vec::new(),
        }
    }
}

impl OptionSetting {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn to_option(&self) -> Result<DhcpOption> {
        DhcpOption::from_text(&self.name, &self.value)
    }
}

impl RangeConfig {
    /// Builds the runtime range, resolving option names and values.
    pub fn to_range(&self) -> Result<Range> {
        let mut range = Range::new(self.start, self.end, self.netmask, self.gateway)?
            .with_check_options(to_options(&self.check)?)
            .with_reply_options(to_options(&self.reply)?);

        if let Some(lease_time) = self.lease_time {
            range = range.with_lease_time(lease_time);
        }
        if let Some(mac) = &self.mac_address {
            range = range.with_mac_filter(mac)?;
        }
        Ok(range)
    }
}

fn to_options(settings: &[OptionSetting]) -> Result<Vec<DhcpOption>> {
    settings.iter().map(OptionSetting::to_option).collect()
}

impl Config {
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 || self.client_port == 0 {
            return Err(Error::InvalidConfig(
                "port and client_port must be non-zero".to_string(),
            ));
        }

        for range in &self.ranges {
            if u32::from(range.start) > u32::from(range.end) {
                return Err(Error::InvalidConfig(format!(
                    "range start {} must be less than or equal to end {}",
                    range.start, range.end
                )));
            }
            if range.lease_time == Some(0) {
                return Err(Error::InvalidConfig(format!(
                    "range {} - {} has a zero lease_time",
                    range.start, range.end
                )));
            }
            range.to_range()?;
        }

        for lease in &self.leases {
            if packet::normalize_mac(&lease.mac).is_none() {
                return Err(Error::InvalidConfig(format!(
                    "lease for {} has invalid MAC address {}",
                    lease.ip, lease.mac
                )));
            }
        }

        Ok(())
    }

    /// Runtime ranges in file order.
    pub fn build_ranges(&self) -> Result<Vec<Range>> {
        self.ranges.iter().map(RangeConfig::to_range).collect()
    }

    pub fn listen_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.listen_address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestGuard(String);
    impl Drop for TestGuard {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.0);
        }
    }

    fn test_path(name: &str) -> (String, TestGuard) {
        let path = std::env::temp_dir()
            .join(format!("dhcprange_test_config_{}.json", name))
            .to_string_lossy()
            .into_owned();
        let _ = std::fs::remove_file(&path);
        (path.clone(), TestGuard(path))
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.build_ranges().unwrap().len(), 1);
    }

    #[test]
    fn test_range_start_greater_than_end() {
        let mut config = Config::default();
        config.ranges[0].start = Ipv4Addr::new(192, 168, 1, 201);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_unknown_option_name_rejected() {
        let mut config = Config::default();
        config.ranges[0]
            .reply
            .push(OptionSetting::new("no-such-option", "1"));
        assert!(matches!(config.validate(), Err(Error::UnknownName(_))));
    }

    #[test]
    fn test_unparsable_option_value_rejected() {
        let mut config = Config::default();
        config.ranges[0]
            .check
            .push(OptionSetting::new("interface-mtu", "huge"));
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidOptionValue { .. })
        ));
    }

    #[test]
    fn test_invalid_lease_mac_rejected() {
        let mut config = Config::default();
        config.leases.push(LeaseConfig {
            mac: "not-a-mac".to_string(),
            ip: Ipv4Addr::new(192, 168, 1, 120),
            lease_time: 60,
            expires: 0,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_build_ranges_resolves_options() {
        let mut config = Config::default();
        config.ranges[0].mac_address = Some("AA:BB:CC:DD:EE:FF".to_string());
        config.ranges[0]
            .check
            .push(OptionSetting::new("vendor-class-identifier", "PXEClient"));
        config.ranges[0]
            .reply
            .push(OptionSetting::new("routers", "192.168.1.1,192.168.1.2"));

        let ranges = config.build_ranges().unwrap();
        let range = &ranges[0];
        assert_eq!(range.lease_time, Some(86400));
        assert_eq!(range.mac_filter.as_deref(), Some("aabbccddeeff"));
        assert_eq!(range.check_options[0].data(), b"PXEClient");
        assert_eq!(
            range.reply_options[0].data(),
            &[192, 168, 1, 1, 192, 168, 1, 2]
        );
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let (path, _guard) = test_path("defaults");
        let created = Config::load_or_create(&path).unwrap();
        assert_eq!(created, Config::default());
        assert!(Path::new(&path).exists());

        let loaded = Config::load_or_create(&path).unwrap();
        assert_eq!(loaded, created);
    }

    #[test]
    fn test_load_minimal_file() {
        let (path, _guard) = test_path("minimal");
        std::fs::write(
            &path,
            r#"{
                "server_ip": "10.0.0.2",
                "listen_address": "0.0.0.0",
                "ranges": [
                    {
                        "start": "10.0.0.10",
                        "end": "10.0.0.20",
                        "netmask": "255.255.255.0",
                        "gateway": "10.0.0.1",
                        "reply": [{ "name": "domain-name", "value": "lab.example" }]
                    }
                ],
                "leases": [
                    { "mac": "aa:bb:cc:dd:ee:ff", "ip": "10.0.0.15", "lease_time": 600 }
                ]
            }"#,
        )
        .unwrap();

        let config = Config::load_or_create(&path).unwrap();
        assert_eq!(config.port, 67);
        assert_eq!(config.client_port, 68);
        assert_eq!(config.debug, 0);
        assert_eq!(config.ranges[0].lease_time, None);
        assert_eq!(config.leases[0].expires, 0);
        assert_eq!(
            config.listen_addr(),
            "0.0.0.0:67".parse::<SocketAddrV4>().unwrap()
        );
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let (path, _guard) = test_path("bad_json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::load_or_create(&path), Err(Error::Json(_))));
    }
}
