use async_trait::async_trait;
use duet_core::ClientSignal;
use tokio::sync::mpsc;
use tracing::debug;

/// Where a participant's outgoing signaling messages go.
///
/// Delivery is fire-and-forget: a lost message is never reported back.
#[async_trait]
pub trait SignalSink: Send + Sync {
    async fn emit(&self, signal: ClientSignal);
}

/// Queues signals for a writer task (e.g. a WebSocket sender).
#[derive(Debug, Clone)]
pub struct ChannelSignalSink {
    tx: mpsc::UnboundedSender<ClientSignal>,
}

impl ChannelSignalSink {
    pub fn new(tx: mpsc::UnboundedSender<ClientSignal>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl SignalSink for ChannelSignalSink {
    async fn emit(&self, signal: ClientSignal) {
        let op = signal.op();
        if self.tx.send(signal).is_err() {
            debug!("Signal writer is gone, dropped '{}'", op);
        }
    }
}
