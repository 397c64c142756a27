mod participant;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::*;
use duet_core::{IceServerConfig, ParticipantId};
use duet_server::ServerConfig;
use std::net::{IpAddr, SocketAddr};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "duet")]
#[command(about = "Two-party room calls over a signaling relay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling relay.
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        bind: IpAddr,

        #[arg(short, long, default_value_t = 8000)]
        port: u16,

        /// STUN/TURN url announced to participants; repeatable.
        #[arg(long = "ice-server", default_value = "stun:stun.l.google.com:19302")]
        ice_servers: Vec<String>,
    },

    /// Join a room as a headless participant.
    Join(JoinArgs),
}

#[derive(Args)]
pub struct JoinArgs {
    #[arg(long, default_value = "ws://127.0.0.1:8000")]
    pub server: String,

    /// Prompted for when missing.
    #[arg(long)]
    pub room: Option<String>,

    /// Prompted for when missing.
    #[arg(long)]
    pub email: Option<String>,

    /// Participant id to connect with; random when missing.
    #[arg(long)]
    pub id: Option<ParticipantId>,

    /// Call the first participant who joins after us.
    #[arg(long)]
    pub call: bool,

    /// Also send local tracks when answering a call.
    #[arg(long)]
    pub send_streams: bool,

    /// Seconds an offer may stay unanswered.
    #[arg(long, default_value_t = 30)]
    pub offer_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Serve {
            bind,
            port,
            ice_servers,
        } => {
            let config = ServerConfig {
                bind: SocketAddr::new(bind, port),
                ice_servers: ice_servers
                    .into_iter()
                    .map(|url| IceServerConfig {
                        urls: vec![url],
                        username: None,
                        credential: None,
                    })
                    .collect(),
            };

            println!(
                "{} {}",
                "📡 Signaling relay on".green().bold(),
                config.bind.to_string().bold()
            );
            duet_server::serve(config).await?;
        }

        Commands::Join(args) => participant::join(args).await?,
    }

    Ok(())
}
