use crate::SignalingService;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use duet_core::{ClientSignal, ParticipantId, RelaySignal};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(participant_id): Path<String>,
    State(service): State<SignalingService>,
) -> Response {
    let participant_id = match participant_id.parse::<ParticipantId>() {
        Ok(id) => id,
        Err(e) => {
            warn!("Rejecting socket with malformed id '{}': {}", participant_id, e);
            return (StatusCode::BAD_REQUEST, "malformed participant id").into_response();
        }
    };

    if service.is_connected(&participant_id) {
        return (StatusCode::CONFLICT, "participant already connected").into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, participant_id, service))
}

async fn handle_socket(socket: WebSocket, participant_id: ParticipantId, service: SignalingService) {
    info!("New WebSocket connection: {}", participant_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<RelaySignal>();

    if let Err(e) = service.connect(participant_id, tx) {
        warn!("{}", e);
        return;
    }

    let mut send_task = tokio::spawn(async move {
        while let Some(signal) = rx.recv().await {
            let json = match serde_json::to_string(&signal) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize signal message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let service = service.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientSignal>(&text) {
                        Ok(signal) => service.dispatch(participant_id, signal),
                        Err(e) => warn!(
                            "Invalid ClientSignal from {}: {}",
                            participant_id, e
                        ),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    service.disconnect(&participant_id);
    info!("WebSocket disconnected: {}", participant_id);
}
