use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dhcprange::packet::parse_mac;
use dhcprange::request::SERVER_PORT;
use dhcprange::{Config, DhcpServer, Error, MessageType, ProbeOptions, Result, dict, server};

#[derive(Parser)]
#[command(name = "dhcprange")]
#[command(author, version, about = "A range-matching DHCP server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve requests until interrupted
    Run,
    /// Print the effective configuration
    ShowConfig,
    /// Look up an option by name
    DictGet { name: String },
    /// Send one request and optionally print the reply
    Probe {
        #[arg(short = 't', long = "type", default_value = "discover")]
        message_type: MessageType,

        #[arg(short, long)]
        mac: Option<String>,

        #[arg(short, long, default_value_t = Ipv4Addr::BROADCAST)]
        address: Ipv4Addr,

        #[arg(short, long, default_value_t = SERVER_PORT)]
        port: u16,

        /// Wait for a reply on the client port
        #[arg(short, long)]
        listen: bool,

        /// Seconds to wait for a reply
        #[arg(long, default_value_t = 5)]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let config = Config::load_or_create(&cli.config)?;
            info!("Starting DHCP server with config: {:?}", cli.config);
            let server = DhcpServer::new(&config).await?;

            for range in server.engine().list_ranges().await {
                info!("Range: {}", range);
            }

            tokio::select! {
                result = server.run() => result,
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal, stopping server...");
                    Ok(())
                }
            }
        }
        Commands::ShowConfig => {
            let config = Config::load_or_create(&cli.config)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::DictGet { name } => {
            let entry =
                dict::lookup_by_name(&name).ok_or_else(|| Error::UnknownName(name.clone()))?;
            println!("{} {} {}", entry.name, entry.code, entry.kind);
            Ok(())
        }
        Commands::Probe {
            message_type,
            mac,
            address,
            port,
            listen,
            timeout,
        } => {
            let mut options = ProbeOptions {
                message_type,
                address: SocketAddrV4::new(address, port),
                broadcast: address == Ipv4Addr::BROADCAST,
                timeout: listen.then(|| Duration::from_secs(timeout)),
                ..Default::default()
            };
            if let Some(mac) = mac {
                options.mac = parse_mac(&mac).ok_or_else(|| Error::InvalidOptionValue {
                    name: "mac".to_string(),
                    value: mac.clone(),
                })?;
            }

            if let Some(reply) = server::probe(&options).await? {
                print!("{}", reply);
            }
            Ok(())
        }
    }
}
