use crate::media::TrackKind;
use duet_core::{IceCandidate, SessionId};

/// Connection state as reported by the media transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Events a media transport raises for the coordinator that owns its session.
/// Every event carries the session it belongs to so that events of a retired
/// session can be dropped.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Local trickle-ICE candidate to forward to the peer.
    CandidateGenerated(SessionId, IceCandidate),

    /// The local description is stale (e.g. a track was added).
    NegotiationNeeded(SessionId),

    StateChanged(SessionId, TransportState),

    /// The peer started sending a track.
    RemoteTrack {
        session_id: SessionId,
        track_id: String,
        kind: TrackKind,
    },
}

impl TransportEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            TransportEvent::CandidateGenerated(id, _)
            | TransportEvent::NegotiationNeeded(id)
            | TransportEvent::StateChanged(id, _) => *id,
            TransportEvent::RemoteTrack { session_id, .. } => *session_id,
        }
    }
}
