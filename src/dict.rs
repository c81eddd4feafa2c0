//! The DHCP option dictionary.
//!
//! Every option code 0-255 has an entry describing its name and how its
//! value bytes are interpreted. Codes the registry subset does not name are
//! present as opaque `option-N` strings. Compound options point at a nested
//! dictionary for their sub-options: option 82 (relay agent information)
//! carries circuit-id, remote-id, agent-id and device-class.
//!
//! The tables are built once on first use and are never mutated afterwards,
//! so entries are handed out as `&'static` references.
//!
//! # References
//!
//! - RFC 2132: DHCP Options and BOOTP Vendor Extensions
//! - RFC 3046: DHCP Relay Agent Information Option

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

/// Scalar element type of an option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Boolean,
    U8,
    U16,
    S16,
    U32,
    S32,
    IpAddr,
    String,
}

impl TypeTag {
    /// Wire size of one element, or `None` for variable-length strings.
    pub fn size(self) -> Option<usize> {
        match self {
            Self::Boolean | Self::U8 => Some(1),
            Self::U16 | Self::S16 => Some(2),
            Self::U32 | Self::S32 | Self::IpAddr => Some(4),
            Self::String => None,
        }
    }

    /// Administrative type name, as reported by dictionary lookups.
    pub fn name(self) -> &'static str {
        match self {
            Self::IpAddr => "ipaddr",
            Self::Boolean => "boolean",
            Self::U8 => "ubyte",
            Self::S16 => "short",
            Self::U16 => "ushort",
            Self::U32 => "uint",
            Self::S32 => "int",
            Self::String => "string",
        }
    }
}

/// The semantic type of an option: a scalar, or a list of same-sized scalars.
///
/// The list flag is interpretation policy only. The codec stores and emits
/// list values as opaque concatenated bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionType {
    pub tag: TypeTag,
    pub list: bool,
}

impl OptionType {
    pub const fn scalar(tag: TypeTag) -> Self {
        Self { tag, list: false }
    }

    pub const fn list_of(tag: TypeTag) -> Self {
        Self { tag, list: true }
    }

    pub fn name(&self) -> &'static str {
        self.tag.name()
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.list {
            write!(f, "list of {}", self.tag.name())
        } else {
            f.write_str(self.tag.name())
        }
    }
}

/// One named option code.
#[derive(Debug)]
pub struct DictEntry {
    pub name: Cow<'static, str>,
    pub kind: OptionType,
    pub code: u8,
    /// Code of the enclosing compound option, for sub-options.
    pub parent: Option<u8>,
    /// Nested dictionary for compound options.
    pub subdict: Option<&'static Dictionary>,
}

impl DictEntry {
    /// The part of the name after the parent prefix (`circuit-id` for
    /// `agent.circuit-id`).
    pub fn short_name(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((_, short)) => short,
            None => &self.name,
        }
    }
}

/// A 256-slot table of entries indexed by option code.
#[derive(Debug)]
pub struct Dictionary {
    entries: Vec<Option<DictEntry>>,
}

impl Dictionary {
    fn build(
        named: &[(&'static str, OptionType, u8)],
        parent: Option<u8>,
        fill_gaps: bool,
    ) -> Self {
        let mut entries: Vec<Option<DictEntry>> = (0..=255u8)
            .map(|code| {
                fill_gaps.then(|| DictEntry {
                    name: Cow::Owned(format!("option-{}", code)),
                    kind: STRING,
                    code,
                    parent,
                    subdict: None,
                })
            })
            .collect();

        for &(name, kind, code) in named {
            entries[code as usize] = Some(DictEntry {
                name: Cow::Borrowed(name),
                kind,
                code,
                parent,
                subdict: None,
            });
        }

        Self { entries }
    }

    /// Returns the entry for `code`, if this dictionary defines one.
    pub fn get(&self, code: u8) -> Option<&DictEntry> {
        self.entries[code as usize].as_ref()
    }

    /// Iterates over defined entries in code order.
    pub fn iter(&self) -> impl Iterator<Item = &DictEntry> {
        self.entries.iter().flatten()
    }

    /// First entry (in code order) whose name starts with `prefix`,
    /// ignoring ASCII case. An exact match wins over a prefix match.
    fn find(&self, prefix: &str, short: bool) -> Option<&DictEntry> {
        let key = |entry: &DictEntry| -> String {
            if short {
                entry.short_name().to_ascii_lowercase()
            } else {
                entry.name.to_ascii_lowercase()
            }
        };
        let wanted = prefix.to_ascii_lowercase();
        self.iter()
            .find(|entry| key(entry) == wanted)
            .or_else(|| self.iter().find(|entry| key(entry).starts_with(&wanted)))
    }
}

const BOOL: OptionType = OptionType::scalar(TypeTag::Boolean);
const U8: OptionType = OptionType::scalar(TypeTag::U8);
const U16: OptionType = OptionType::scalar(TypeTag::U16);
const U32: OptionType = OptionType::scalar(TypeTag::U32);
const S32: OptionType = OptionType::scalar(TypeTag::S32);
const IP: OptionType = OptionType::scalar(TypeTag::IpAddr);
const STRING: OptionType = OptionType::scalar(TypeTag::String);
const U8_LIST: OptionType = OptionType::list_of(TypeTag::U8);
const U16_LIST: OptionType = OptionType::list_of(TypeTag::U16);
const IP_LIST: OptionType = OptionType::list_of(TypeTag::IpAddr);

/// Code of the relay agent information option.
pub const AGENT_OPTIONS: u8 = 82;

#[rustfmt::skip]
const AGENT_ENTRIES: &[(&str, OptionType, u8)] = &[
    ("agent.circuit-id",          STRING, 1),
    ("agent.remote-id",           STRING, 2),
    ("agent.agent-id",            IP,     3),
    ("agent.docsis-device-class", U32,    4),
];

#[rustfmt::skip]
const MAIN_ENTRIES: &[(&str, OptionType, u8)] = &[
    ("pad",                         STRING,   0),
    ("subnet-mask",                 IP,       1),
    ("time-offset",                 S32,      2),
    ("routers",                     IP_LIST,  3),
    ("time-servers",                IP_LIST,  4),
    ("ien116-name-servers",         IP_LIST,  5),
    ("domain-name-servers",         IP_LIST,  6),
    ("log-servers",                 IP_LIST,  7),
    ("cookie-servers",              IP_LIST,  8),
    ("lpr-servers",                 IP_LIST,  9),
    ("impress-servers",             IP_LIST,  10),
    ("resource-location-servers",   IP_LIST,  11),
    ("host-name",                   STRING,   12),
    ("boot-size",                   U16,      13),
    ("merit-dump",                  STRING,   14),
    ("domain-name",                 STRING,   15),
    ("swap-server",                 IP,       16),
    ("root-path",                   STRING,   17),
    ("extensions-path",             STRING,   18),
    ("ip-forwarding",               BOOL,     19),
    ("non-local-source-routing",    BOOL,     20),
    ("policy-filter",               IP_LIST,  21),
    ("max-dgram-reassembly",        U16,      22),
    ("default-ip-ttl",              U8,       23),
    ("path-mtu-aging-timeout",      U32,      24),
    ("path-mtu-plateau-table",      U16_LIST, 25),
    ("interface-mtu",               U16,      26),
    ("all-subnets-local",           BOOL,     27),
    ("broadcast-address",           IP,       28),
    ("perform-mask-discovery",      BOOL,     29),
    ("mask-supplier",               BOOL,     30),
    ("router-discovery",            BOOL,     31),
    ("router-solicitation-address", IP,       32),
    ("static-routes",               IP_LIST,  33),
    ("trailer-encapsulation",       BOOL,     34),
    ("arp-cache-timeout",           U32,      35),
    ("ieee802-3-encapsulation",     BOOL,     36),
    ("default-tcp-ttl",             U8,       37),
    ("tcp-keepalive-interval",      U32,      38),
    ("tcp-keepalive-garbage",       BOOL,     39),
    ("nis-domain",                  STRING,   40),
    ("nis-servers",                 IP_LIST,  41),
    ("ntp-servers",                 IP_LIST,  42),
    ("vendor",                      STRING,   43),
    ("netbios-name-servers",        IP_LIST,  44),
    ("netbios-dd-server",           IP_LIST,  45),
    ("netbios-node-type",           U8,       46),
    ("netbios-scope",               STRING,   47),
    ("font-servers",                IP_LIST,  48),
    ("x-display-manager",           IP_LIST,  49),
    ("requested-address",           IP,       50),
    ("lease-time",                  U32,      51),
    ("option-overload",             U8,       52),
    ("message-type",                U8,       53),
    ("server-identifier",           IP,       54),
    ("parameter-request-list",      U8_LIST,  55),
    ("message",                     STRING,   56),
    ("max-message-size",            U16,      57),
    ("renewal-time",                U32,      58),
    ("rebinding-time",              U32,      59),
    ("vendor-class-identifier",     STRING,   60),
    ("client-identifier",           STRING,   61),
    ("nwip-domain",                 STRING,   62),
    ("nwip",                        STRING,   63),
    ("nisplus-domain",              STRING,   64),
    ("nisplus-servers",             IP_LIST,  65),
    ("tftp-server-name",            STRING,   66),
    ("bootfile-name",               STRING,   67),
    ("mobile-ip-home-agent",        IP_LIST,  68),
    ("smtp-server",                 IP_LIST,  69),
    ("pop-server",                  IP_LIST,  70),
    ("nntp-server",                 IP_LIST,  71),
    ("www-server",                  IP_LIST,  72),
    ("finger-server",               IP_LIST,  73),
    ("irc-server",                  IP_LIST,  74),
    ("streettalk-server",           IP_LIST,  75),
    ("streettalk-assist-servers",   IP_LIST,  76),
    ("user-class",                  STRING,   77),
    ("slp-directory-agent",         STRING,   78),
    ("slp-service-scope",           STRING,   79),
    ("fqdn",                        STRING,   81),
    ("agent",                       STRING,   82),
    ("nds-servers",                 IP_LIST,  85),
    ("nds-tree-name",               STRING,   86),
    ("nds-context",                 STRING,   87),
    ("uap-servers",                 STRING,   98),
    ("subnet-selection",            IP,       118),
    ("authenticate",                STRING,   210),
    ("end",                         STRING,   255),
];

static AGENT_DICT: LazyLock<Dictionary> =
    LazyLock::new(|| Dictionary::build(AGENT_ENTRIES, Some(AGENT_OPTIONS), false));

static MAIN_DICT: LazyLock<Dictionary> = LazyLock::new(|| {
    let mut dict = Dictionary::build(MAIN_ENTRIES, None, true);
    if let Some(agent) = dict.entries[AGENT_OPTIONS as usize].as_mut() {
        agent.subdict = Some(&*AGENT_DICT);
    }
    dict
});

/// The top-level dictionary.
pub fn main_dict() -> &'static Dictionary {
    &MAIN_DICT
}

/// Looks up an option by code, or a sub-option by `(code, subcode)`.
///
/// Returns `None` when `subcode` is given but `code` has no nested
/// dictionary, or the nested dictionary does not define `subcode`.
pub fn lookup_by_code(code: u8, subcode: Option<u8>) -> Option<&'static DictEntry> {
    let entry = main_dict().get(code)?;
    match subcode {
        None => Some(entry),
        Some(subcode) => entry.subdict?.get(subcode),
    }
}

/// Looks up an option by name.
///
/// Plain names match the first top-level entry they are a case-insensitive
/// prefix of (`"sub"` finds `subnet-mask`). Dotted names such as
/// `"agent.circuit-id"` resolve the part before the dot at the top level and
/// then the remainder inside that entry's nested dictionary.
pub fn lookup_by_name(name: &str) -> Option<&'static DictEntry> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    match name.split_once('.') {
        None => main_dict().find(name, false),
        Some((parent, child)) => {
            if parent.is_empty() || child.is_empty() {
                return None;
            }
            let parent = main_dict().find(parent, false)?;
            parent.subdict?.find(child, true)
        }
    }
}
