use crate::JoinArgs;
use anyhow::{Context, Result};
use colored::*;
use dialoguer::Input;
use duet_core::{ClientSignal, RelaySignal, RoomId};
use duet_peer::{
    CallCommand, CallCoordinator, CallEvent, ChannelSignalSink, PeerConfig, RtcMediaSource,
    RtcTransportFactory,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, warn};

pub async fn join(args: JoinArgs) -> Result<()> {
    let room = match args.room {
        Some(room) => room,
        None => Input::<String>::new().with_prompt("Room").interact_text()?,
    };
    let email = match args.email {
        Some(email) => email,
        None => Input::<String>::new().with_prompt("Email").interact_text()?,
    };
    let id = args.id.unwrap_or_default();

    let url = format!("{}/ws/{}", args.server.trim_end_matches('/'), id);
    let (socket, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("Failed to connect to {url}"))?;
    println!("{} {}", "🔌 Connected as".green().bold(), id.to_string().bold());

    let (mut ws_tx, mut ws_rx) = socket.split();

    let (signal_tx, mut signal_rx) = mpsc::unbounded_channel::<ClientSignal>();
    let writer = tokio::spawn(async move {
        while let Some(signal) = signal_rx.recv().await {
            let json = match serde_json::to_string(&signal) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize signal message: {}", e);
                    continue;
                }
            };
            if ws_tx.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let (relay_tx, relay_rx) = mpsc::unbounded_channel::<RelaySignal>();
    let reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<RelaySignal>(&text) {
                    Ok(signal) => {
                        if relay_tx.send(signal).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Invalid RelaySignal: {}", e),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    let config = PeerConfig {
        offer_timeout: Duration::from_secs(args.offer_timeout),
        auto_send_streams: args.send_streams,
        ..PeerConfig::default()
    };
    let (coordinator, mut events) = CallCoordinator::new(
        id,
        config,
        Arc::new(ChannelSignalSink::new(signal_tx)),
        Arc::new(RtcTransportFactory),
        Arc::new(RtcMediaSource::new(id.to_string())),
    );

    let (command_tx, command_rx) = mpsc::channel(16);
    let run = tokio::spawn(coordinator.run(command_rx, relay_rx));
    command_tx
        .send(CallCommand::JoinRoom {
            email,
            room: RoomId::from(room),
        })
        .await
        .context("Call loop stopped before joining")?;

    println!(
        "{}",
        "Type call, send, hangup or reconnect; Ctrl-C leaves.".dimmed()
    );
    let (input_tx, mut input_rx) = mpsc::unbounded_channel();
    let input = tokio::spawn(read_commands(input_tx));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    print_event(&event);
                    if args.call && matches!(event, CallEvent::PeerJoined { .. }) {
                        let _ = command_tx.send(CallCommand::Call).await;
                    }
                }
                None => {
                    println!("{}", "Relay connection closed".yellow());
                    break;
                }
            },

            Some(command) = input_rx.recv() => {
                let _ = command_tx.send(command).await;
            }

            result = &mut ctrl_c => {
                result.context("Failed to listen for Ctrl-C")?;
                println!("{}", "👋 Hanging up".cyan());
                let _ = command_tx.send(CallCommand::Disconnect).await;
                break;
            }
        }
    }

    drop(command_tx);
    input.abort();
    run.await.context("Call loop panicked")?;
    // Flushes a final user:disconnect before the socket closes.
    let _ = writer.await;
    reader.abort();

    Ok(())
}

async fn read_commands(tx: mpsc::UnboundedSender<CallCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let command = match line.trim() {
            "call" => CallCommand::Call,
            "send" => CallCommand::SendStreams,
            "hangup" => CallCommand::Disconnect,
            "reconnect" => CallCommand::Reconnect,
            "" => continue,
            other => {
                println!("{} '{}'", "Unknown command".red(), other);
                continue;
            }
        };
        if tx.send(command).is_err() {
            break;
        }
    }
}

fn print_event(event: &CallEvent) {
    match event {
        CallEvent::Joined { room } => {
            println!("{} {}", "✔ Joined room".green().bold(), room.to_string().bold())
        }
        CallEvent::PeerJoined { id, email } => {
            println!("{} {} ({})", "➕".cyan(), email.cyan(), id)
        }
        CallEvent::PeerLeft { id } => println!("{} {}", "➖ Left:".yellow(), id),
        CallEvent::StateChanged { session_id, state } => {
            println!("{}", format!("   session {session_id}: {state:?}").dimmed())
        }
        CallEvent::MediaUnavailable { reason } => {
            println!("{} {}", "🎥 Media unavailable:".red().bold(), reason)
        }
        CallEvent::RemoteTrack { track_id, kind } => {
            println!("{} {:?} track '{}'", "📺 Receiving".cyan(), kind, track_id)
        }
        CallEvent::OfferTimedOut { remote } => {
            println!("{} {}", "⏱ No answer from".yellow(), remote)
        }
        CallEvent::CallEnded { remote } => println!("{} {}", "📴 Call ended with".yellow(), remote),
        CallEvent::Error { reason } => println!("{} {}", "✖".red().bold(), reason.red()),
    }
}
