//! # dhcprange
//!
//! A DHCP protocol engine that answers clients from administratively
//! configured address ranges (RFC 2131, options per RFC 2132).
//!
//! ## Features
//!
//! - Option dictionary with typed values and nested relay agent sub-options
//! - TLV codec honouring option overload into the `file` and `sname` fields
//! - Ranges matched on client MAC and on arbitrary inbound options
//! - Per-range reply options and lease times
//! - In-memory lease store
//! - Policy hook that can inspect a request and decide the reply
//! - Async/await with Tokio
//!
//! ## Quick Start
//!
//! ```no_run
//! use dhcprange::{Config, DhcpServer};
//!
//! #[tokio::main]
//! async fn main() -> dhcprange::Result<()> {
//!     let config = Config::load_or_create("config.json")?;
//!     let server = DhcpServer::new(&config).await?;
//!     server.run().await
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`dict`] - Option names, codes and value types
//! - [`codec`] - Option scanning, writing and rendering
//! - [`Engine`] - Request state machine and administrative surface
//! - [`Request`] - One datagram being answered, with its reply scratch
//! - [`Ranges`] / [`Leases`] - Configured pools and issued leases
//! - [`DhcpServer`] - UDP transport on port 67

pub mod codec;
pub mod config;
pub mod dict;
pub mod engine;
pub mod error;
pub mod hook;
pub mod lease;
pub mod options;
pub mod packet;
pub mod range;
pub mod request;
pub mod server;

pub use config::Config;
pub use engine::{Engine, Reply, Transport};
pub use error::{Error, Result};
pub use hook::{Decision, PolicyHook};
pub use lease::{Lease, Leases};
pub use options::{DhcpOption, MessageType};
pub use packet::DhcpPacket;
pub use range::{Range, Ranges};
pub use request::Request;
pub use server::{DhcpServer, ProbeOptions};
