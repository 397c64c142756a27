use crate::media::TrackKind;
use crate::negotiation::NegotiationState;
use duet_core::{ParticipantId, RoomId, SessionId};

/// Things the local user should know about. Never sent to the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    /// The relay acknowledged our `room:join`.
    Joined { room: RoomId },

    PeerJoined { id: ParticipantId, email: String },

    PeerLeft { id: ParticipantId },

    StateChanged {
        session_id: SessionId,
        state: NegotiationState,
    },

    MediaUnavailable { reason: String },

    RemoteTrack { track_id: String, kind: TrackKind },

    OfferTimedOut { remote: ParticipantId },

    /// The session ended because of the peer, a failure, or a timeout.
    CallEnded { remote: ParticipantId },

    /// Relay rejection or a local failure worth showing.
    Error { reason: String },
}
