//! Policy hook.
//!
//! A hook runs once per request, after range matching and before the
//! default message-type handling. It can read request fields with
//! [`Request::get`], adjust the reply with [`Request::set`] or the public
//! scratch fields, and decide the outcome outright.

use crate::options::MessageType;
use crate::request::Request;

/// Outcome chosen by a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Compose and send an OFFER.
    Offer,
    /// Compose and send an ACK.
    Ack,
    /// Send a NAK.
    Nak,
    /// Send nothing.
    Drop,
}

impl Decision {
    /// The decision implied by a reply message type, if it is one a server
    /// sends.
    pub fn from_message_type(message_type: MessageType) -> Option<Self> {
        match message_type {
            MessageType::Offer => Some(Self::Offer),
            MessageType::Ack => Some(Self::Ack),
            MessageType::Nak => Some(Self::Nak),
            _ => None,
        }
    }
}

/// Per-request policy evaluated before default processing.
///
/// Returning `None` lets default processing run. A hook that only sets
/// `reply.message_type` (for instance through `request.set("type", "ACK")`)
/// is treated as having decided on that type.
pub trait PolicyHook: Send + Sync {
    fn evaluate(&self, request: &mut Request) -> Option<Decision>;
}

impl<F> PolicyHook for F
where
    F: Fn(&mut Request) -> Option<Decision> + Send + Sync,
{
    fn evaluate(&self, request: &mut Request) -> Option<Decision> {
        self(request)
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddrV4};

    use super::*;
    use crate::packet::{BOOTREQUEST, DhcpPacket};

    #[test]
    fn test_decision_from_message_type() {
        assert_eq!(
            Decision::from_message_type(MessageType::Offer),
            Some(Decision::Offer)
        );
        assert_eq!(
            Decision::from_message_type(MessageType::Ack),
            Some(Decision::Ack)
        );
        assert_eq!(
            Decision::from_message_type(MessageType::Nak),
            Some(Decision::Nak)
        );
        assert_eq!(Decision::from_message_type(MessageType::Discover), None);
    }

    #[test]
    fn test_closure_hook() {
        let hook = |request: &mut Request| {
            request.set("lease_time", "30").ok()?;
            Some(Decision::Ack)
        };

        let mut request = Request::new(
            DhcpPacket::new(BOOTREQUEST),
            SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 68),
        );
        assert_eq!(hook.evaluate(&mut request), Some(Decision::Ack));
        assert_eq!(request.reply.lease_time, 30);
    }
}
