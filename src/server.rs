use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

use crate::codec::{self, OptionWriter};
use crate::config::Config;
use crate::engine::{Engine, Transport};
use crate::error::{Error, Result};
use crate::options::{MessageType, OptionCode};
use crate::packet::{BOOTREQUEST, BROADCAST_FLAG, DhcpPacket};
use crate::request::{CLIENT_PORT, SERVER_PORT};

const RECV_BUFFER_SIZE: usize = 1500;

/// Creates a UDP socket with address reuse and broadcast enabled, bound to
/// `bind_addr`.
pub fn create_socket(bind_addr: SocketAddrV4) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|error| Error::Socket(format!("Failed to create socket: {}", error)))?;

    socket
        .set_reuse_address(true)
        .map_err(|error| Error::Socket(format!("Failed to set SO_REUSEADDR: {}", error)))?;

    socket
        .set_broadcast(true)
        .map_err(|error| Error::Socket(format!("Failed to set SO_BROADCAST: {}", error)))?;

    socket
        .set_nonblocking(true)
        .map_err(|error| Error::Socket(format!("Failed to set non-blocking: {}", error)))?;

    socket
        .bind(&bind_addr.into())
        .map_err(|error| Error::Socket(format!("Failed to bind to {}: {}", bind_addr, error)))?;

    let std_socket: std::net::UdpSocket = socket.into();
    let tokio_socket = UdpSocket::from_std(std_socket).map_err(|error| {
        Error::Socket(format!("Failed to convert to tokio socket: {}", error))
    })?;

    Ok(tokio_socket)
}

impl Transport for UdpSocket {
    async fn recv(&self, buffer: &mut [u8]) -> Result<(usize, SocketAddr)> {
        Ok(self.recv_from(buffer).await?)
    }

    async fn send(&self, data: &[u8], destination: SocketAddrV4) -> Result<usize> {
        Ok(self.send_to(data, SocketAddr::V4(destination)).await?)
    }
}

/// Listens on the server port and feeds every datagram to an [`Engine`].
pub struct DhcpServer {
    engine: Arc<Engine>,
    socket: Arc<UdpSocket>,
}

impl DhcpServer {
    pub async fn new(config: &Config) -> Result<Self> {
        let engine = Engine::from_config(config).await?;
        Self::bind(Arc::new(engine), config.listen_addr())
    }

    /// Binds `bind_addr` for an existing engine.
    pub fn bind(engine: Arc<Engine>, bind_addr: SocketAddrV4) -> Result<Self> {
        let socket = Arc::new(create_socket(bind_addr)?);

        info!(
            "DHCP server {} listening on {}",
            engine.server_ip(),
            bind_addr
        );

        Ok(Self { engine, socket })
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receives datagrams forever, handling each on its own task.
    pub async fn run(&self) -> Result<()> {
        let mut buffer = [0u8; RECV_BUFFER_SIZE];

        info!("DHCP server ready and listening");

        loop {
            match self.socket.recv_from(&mut buffer).await {
                Ok((size, source)) => {
                    let data = buffer[..size].to_vec();
                    let engine = Arc::clone(&self.engine);
                    let socket = Arc::clone(&self.socket);

                    tokio::spawn(async move {
                        if let Err(error) =
                            engine.handle_datagram(socket.as_ref(), &data, source).await
                        {
                            warn!("Error handling packet from {}: {}", source, error);
                        }
                    });
                }
                Err(error) => {
                    error!("Error receiving packet: {}", error);
                }
            }
        }
    }
}

/// Parameters for sending a single test request.
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub message_type: MessageType,
    pub mac: [u8; 6],
    /// Where the request is sent.
    pub address: SocketAddrV4,
    /// Set the broadcast flag so the server broadcasts its reply.
    pub broadcast: bool,
    /// Wait this long for a reply; `None` sends and returns at once.
    pub timeout: Option<Duration>,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            message_type: MessageType::Discover,
            mac: [0x02, 0x00, 0x00, 0x00, 0x00, 0x01],
            address: SocketAddrV4::new(Ipv4Addr::BROADCAST, SERVER_PORT),
            broadcast: true,
            timeout: None,
        }
    }
}

fn probe_xid() -> u32 {
    chrono::Utc::now().timestamp_subsec_nanos() ^ std::process::id().rotate_left(16)
}

/// Builds the request a probe sends.
pub fn build_probe(options: &ProbeOptions, xid: u32) -> Result<DhcpPacket> {
    let mut packet = DhcpPacket::new(BOOTREQUEST);
    packet.xid = xid;
    if options.broadcast {
        packet.flags = BROADCAST_FLAG;
    }
    packet.chaddr[..6].copy_from_slice(&options.mac);

    let mut writer = OptionWriter::new(&mut packet.options);
    writer.append_u8(OptionCode::MessageType as u8, options.message_type as u8)?;
    writer.finish();

    Ok(packet)
}

/// Sends a probe from a socket bound to the client port.
///
/// Returns the rendered reply when waiting was requested and one arrived.
pub async fn probe(options: &ProbeOptions) -> Result<Option<String>> {
    let listen_port = if options.timeout.is_some() {
        CLIENT_PORT
    } else {
        0
    };
    let socket = create_socket(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, listen_port))?;
    probe_on(&socket, options).await
}

/// Sends a probe through `transport` and optionally waits for the reply
/// carrying the same transaction id.
///
/// # Errors
///
/// Returns [`Error::Timeout`] if no matching reply arrives in time.
pub async fn probe_on<T: Transport>(
    transport: &T,
    options: &ProbeOptions,
) -> Result<Option<String>> {
    let xid = probe_xid();
    let packet = build_probe(options, xid)?;
    let size = transport
        .send(&packet.encode_trimmed(), options.address)
        .await?;
    info!(
        "Sent {} ({} bytes, xid {:#010x}) to {}",
        options.message_type, size, xid, options.address
    );

    let Some(timeout) = options.timeout else {
        return Ok(None);
    };

    let wait = async {
        let mut buffer = [0u8; RECV_BUFFER_SIZE];
        loop {
            let (size, source) = transport.recv(&mut buffer).await?;
            match DhcpPacket::parse(&buffer[..size]) {
                Ok(reply) if reply.xid == xid => {
                    return Ok::<_, Error>(codec::render(&reply, source));
                }
                Ok(reply) => debug!("Skipping xid {:#010x} from {}", reply.xid, source),
                Err(err) => debug!("Skipping datagram from {}: {}", source, err),
            }
        }
    };

    match tokio::time::timeout(timeout, wait).await {
        Ok(rendered) => rendered.map(Some),
        Err(_) => Err(Error::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::find_option;
    use crate::packet::DHCP_MAX_PACKET_SIZE;
    use crate::range::Range;

    fn loopback() -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)
    }

    fn is_network_error(err: &Error) -> bool {
        matches!(err, Error::Socket(_) | Error::Io(_))
    }

    #[test]
    fn test_build_probe() {
        let options = ProbeOptions {
            message_type: MessageType::Request,
            mac: [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff],
            ..Default::default()
        };
        let packet = build_probe(&options, 0xdead_beef).unwrap();

        assert_eq!(packet.op, BOOTREQUEST);
        assert_eq!(packet.xid, 0xdead_beef);
        assert!(packet.is_broadcast());
        assert_eq!(packet.mac_string(), "aabbccddeeff");
        assert_eq!(packet.message_type(), Some(MessageType::Request));
        assert_eq!(find_option(&packet, 53, None), Some(&[3u8][..]));
    }

    #[test]
    fn test_probe_defaults() {
        let options = ProbeOptions::default();
        assert_eq!(options.address.ip(), &Ipv4Addr::BROADCAST);
        assert_eq!(options.address.port(), 67);
        assert!(options.broadcast);
        assert!(options.timeout.is_none());
    }

    #[tokio::test]
    async fn test_udp_transport_round_trip() {
        let (a, b) = match (create_socket(loopback()), create_socket(loopback())) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(err), _) | (_, Err(err)) => {
                assert!(is_network_error(&err));
                return;
            }
        };
        let SocketAddr::V4(b_addr) = b.local_addr().unwrap() else {
            panic!("expected an IPv4 address");
        };

        Transport::send(&a, b"ping", b_addr).await.unwrap();
        let mut buffer = [0u8; 16];
        let (size, source) = Transport::recv(&b, &mut buffer).await.unwrap();
        assert_eq!(&buffer[..size], b"ping");
        assert_eq!(source, a.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_probe_against_server() {
        let client = match create_socket(loopback()) {
            Ok(socket) => socket,
            Err(err) => {
                assert!(is_network_error(&err));
                return;
            }
        };
        let client_port = client.local_addr().unwrap().port();

        let engine = Arc::new(
            Engine::new(Ipv4Addr::new(10, 0, 0, 2)).with_client_port(client_port),
        );
        engine
            .add_range(
                Range::new(
                    Ipv4Addr::new(127, 0, 0, 1),
                    Ipv4Addr::new(127, 0, 0, 1),
                    Ipv4Addr::new(255, 0, 0, 0),
                    Ipv4Addr::new(127, 0, 0, 254),
                )
                .unwrap()
                .with_lease_time(600),
            )
            .await;

        let server = match DhcpServer::bind(Arc::clone(&engine), loopback()) {
            Ok(server) => Arc::new(server),
            Err(err) => {
                assert!(is_network_error(&err));
                return;
            }
        };
        let SocketAddr::V4(server_addr) = server.local_addr().unwrap() else {
            panic!("expected an IPv4 address");
        };
        let runner = Arc::clone(&server);
        let task = tokio::spawn(async move { runner.run().await });

        let options = ProbeOptions {
            message_type: MessageType::Discover,
            address: server_addr,
            broadcast: false,
            timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        let rendered = probe_on(&client, &options).await.unwrap().unwrap();
        assert!(rendered.starts_with("OFFER from"));
        assert!(rendered.contains("lease-time 600"));

        let options = ProbeOptions {
            message_type: MessageType::Release,
            timeout: Some(Duration::from_millis(200)),
            ..options
        };
        assert!(matches!(
            probe_on(&client, &options).await,
            Err(Error::Timeout)
        ));

        task.abort();
    }

    #[tokio::test]
    async fn test_probe_without_wait() {
        let client = match create_socket(loopback()) {
            Ok(socket) => socket,
            Err(err) => {
                assert!(is_network_error(&err));
                return;
            }
        };
        let sink = match create_socket(loopback()) {
            Ok(socket) => socket,
            Err(err) => {
                assert!(is_network_error(&err));
                return;
            }
        };
        let SocketAddr::V4(sink_addr) = sink.local_addr().unwrap() else {
            panic!("expected an IPv4 address");
        };

        let options = ProbeOptions {
            address: sink_addr,
            broadcast: false,
            ..Default::default()
        };
        assert_eq!(probe_on(&client, &options).await.unwrap(), None);

        let mut buffer = [0u8; DHCP_MAX_PACKET_SIZE];
        let (size, _) = Transport::recv(&sink, &mut buffer).await.unwrap();
        let packet = DhcpPacket::parse(&buffer[..size]).unwrap();
        assert_eq!(packet.message_type(), Some(MessageType::Discover));
    }
}
