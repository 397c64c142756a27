use crate::media::LocalTrack;
use crate::transport::{TransportConfig, TransportEvent};
use anyhow::Result;
use async_trait::async_trait;
use duet_core::{IceCandidate, SessionDescription, SessionId};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Offer/answer/track primitives of one media-transport connection.
///
/// Exactly one `PeerSession` owns each instance. A local offer, once set,
/// cannot be taken back; the owner closes the transport instead.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn add_track(&self, track: &LocalTrack) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Allocates a fresh transport for every new session.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(
        &self,
        session_id: SessionId,
        config: &TransportConfig,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Box<dyn MediaTransport>>;
}

/// A factory bound to the settings and event channel of one participant.
#[derive(Clone)]
pub struct TransportSource {
    factory: Arc<dyn TransportFactory>,
    config: TransportConfig,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportSource {
    pub fn new(
        factory: Arc<dyn TransportFactory>,
        config: TransportConfig,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            factory,
            config,
            events,
        }
    }

    pub async fn open(&self, session_id: SessionId) -> Result<Box<dyn MediaTransport>> {
        self.factory
            .create(session_id, &self.config, self.events.clone())
            .await
    }
}
