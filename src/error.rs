//! Error types for the DHCP engine.
//!
//! All fallible operations in this crate return [`Result<T>`], which uses
//! the [`Error`] enum for error variants. None of these are fatal to the
//! process: each one is local to a single datagram or a single option.

use std::fmt;

/// Which part of a packet an option stream was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// The 512-byte options area after the magic cookie.
    Options,
    /// The 128-byte `file` header field (option overload).
    File,
    /// The 64-byte `sname` header field (option overload).
    Sname,
    /// The value of a compound option holding nested sub-options.
    Nested(u8),
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Options => write!(f, "options"),
            Self::File => write!(f, "file"),
            Self::Sname => write!(f, "sname"),
            Self::Nested(code) => write!(f, "option {}", code),
        }
    }
}

/// Errors that can occur while decoding, composing or configuring.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File system or network I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (config file).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The datagram is not a usable DHCP packet.
    ///
    /// Wrong size, bad magic cookie or a disallowed hardware address length.
    /// Such datagrams are discarded before a request is built.
    #[error("Malformed DHCP packet: {0}")]
    MalformedPacket(String),

    /// An option's declared length runs past the end of its region.
    ///
    /// Options decoded before the offending one remain valid.
    #[error("Option {code} at offset {offset} overruns the {region} area")]
    TruncatedOptions { region: Region, offset: usize, code: u8 },

    /// No dictionary entry exists for the option code.
    #[error("Unknown option code {0}")]
    UnknownOption(u8),

    /// No dictionary entry matches the option name.
    #[error("Unknown option name: {0}")]
    UnknownName(String),

    /// The outbound options area has no room left for an option.
    #[error("Option {code} needs {needed} bytes but only {remaining} remain")]
    BufferFull {
        code: u8,
        needed: usize,
        remaining: usize,
    },

    /// A textual option value does not parse for the option's type.
    #[error("Invalid value {value:?} for option {name}")]
    InvalidOptionValue { name: String, value: String },

    /// Invalid server configuration.
    ///
    /// Returned by [`Config::validate`](crate::Config::validate).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Socket creation or configuration error.
    ///
    /// Typically occurs when binding to port 67 without administrator privileges.
    #[error("Socket error: {0}")]
    Socket(String),

    /// No reply arrived within the probe timeout.
    #[error("Timed out waiting for a reply")]
    Timeout,
}

/// A specialized Result type for DHCP operations.
pub type Result<T> = std::result::Result<T, Error>;
