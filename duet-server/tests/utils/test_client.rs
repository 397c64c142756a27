use anyhow::{Context, Result};
use duet_core::{ClientSignal, ParticipantId, RelaySignal};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// Timeout for a single expected signal (ms).
pub const SIGNAL_TIMEOUT_MS: u64 = 2000;

/// Signaling participant talking to a real relay over WebSocket.
pub struct TestClient {
    pub id: ParticipantId,
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr, id: ParticipantId) -> Result<Self> {
        let url = format!("ws://{}/ws/{}", addr, id);
        let (ws, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;
        Ok(Self { id, ws })
    }

    pub async fn send(&mut self, signal: &ClientSignal) -> Result<()> {
        let json = serde_json::to_string(signal)?;
        self.ws.send(Message::Text(json)).await?;
        Ok(())
    }

    pub async fn send_raw(&mut self, text: &str) -> Result<()> {
        self.ws.send(Message::Text(text.to_owned())).await?;
        Ok(())
    }

    /// Next relay message, skipping control frames.
    pub async fn recv(&mut self) -> Result<RelaySignal> {
        let timeout = std::time::Duration::from_millis(SIGNAL_TIMEOUT_MS);

        loop {
            let frame = tokio::time::timeout(timeout, self.ws.next())
                .await
                .context("Timeout waiting for signal")?
                .context("Socket closed")??;

            if let Message::Text(text) = frame {
                tracing::debug!("[TestClient {}] <- {}", self.id, text);
                return serde_json::from_str(&text).context("Relay sent invalid JSON");
            }
        }
    }

    /// Asserts that nothing arrives within `ms`.
    pub async fn expect_silence(&mut self, ms: u64) {
        let res = tokio::time::timeout(std::time::Duration::from_millis(ms), self.ws.next()).await;
        assert!(res.is_err(), "Unexpected frame: {:?}", res);
    }

    pub async fn close(mut self) -> Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}
