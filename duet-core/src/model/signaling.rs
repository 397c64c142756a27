use crate::model::participant::ParticipantId;
use crate::model::room::RoomId;
use crate::model::session::{IceCandidate, SessionDescription};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// Messages a participant sends to the relay. Routed kinds name their target in `to`.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "op", content = "d")]
pub enum ClientSignal {
    #[serde(rename = "room:join")]
    RoomJoin { email: String, room: RoomId },

    #[serde(rename = "user:call")]
    CallOffer {
        to: ParticipantId,
        offer: SessionDescription,
    },

    #[serde(rename = "call:accepted")]
    CallAccepted {
        to: ParticipantId,
        ans: SessionDescription,
    },

    #[serde(rename = "peer:nego:needed")]
    RenegotiationOffer {
        to: ParticipantId,
        offer: SessionDescription,
    },

    #[serde(rename = "peer:nego:done")]
    RenegotiationAnswer {
        to: ParticipantId,
        ans: SessionDescription,
    },

    #[serde(rename = "ice:candidate")]
    IceCandidate {
        to: ParticipantId,
        candidate: IceCandidate,
    },

    #[serde(rename = "user:disconnect")]
    Disconnect,
}

impl ClientSignal {
    pub fn op(&self) -> &'static str {
        match self {
            ClientSignal::RoomJoin { .. } => "room:join",
            ClientSignal::CallOffer { .. } => "user:call",
            ClientSignal::CallAccepted { .. } => "call:accepted",
            ClientSignal::RenegotiationOffer { .. } => "peer:nego:needed",
            ClientSignal::RenegotiationAnswer { .. } => "peer:nego:done",
            ClientSignal::IceCandidate { .. } => "ice:candidate",
            ClientSignal::Disconnect => "user:disconnect",
        }
    }

    /// Target of a point-to-point message, `None` for room-scoped ones.
    pub fn target(&self) -> Option<ParticipantId> {
        match self {
            ClientSignal::CallOffer { to, .. }
            | ClientSignal::CallAccepted { to, .. }
            | ClientSignal::RenegotiationOffer { to, .. }
            | ClientSignal::RenegotiationAnswer { to, .. }
            | ClientSignal::IceCandidate { to, .. } => Some(*to),
            ClientSignal::RoomJoin { .. } | ClientSignal::Disconnect => None,
        }
    }
}

/// Messages the relay delivers to a participant. Routed kinds name their sender in `from`.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "op", content = "d")]
pub enum RelaySignal {
    #[serde(rename = "welcome")]
    Welcome {
        id: ParticipantId,
        ice_servers: Vec<IceServerConfig>,
    },

    /// Acknowledges a successful `room:join` to the joiner.
    #[serde(rename = "room:join")]
    RoomJoin { email: String, room: RoomId },

    #[serde(rename = "user:joined")]
    UserJoined { id: ParticipantId, email: String },

    #[serde(rename = "incomming:call")]
    IncomingCall {
        from: ParticipantId,
        offer: SessionDescription,
    },

    #[serde(rename = "call:accepted")]
    CallAccepted {
        from: ParticipantId,
        ans: SessionDescription,
    },

    #[serde(rename = "peer:nego:needed")]
    RenegotiationOffer {
        from: ParticipantId,
        offer: SessionDescription,
    },

    #[serde(rename = "peer:nego:done")]
    RenegotiationAnswer {
        from: ParticipantId,
        ans: SessionDescription,
    },

    #[serde(rename = "ice:candidate")]
    IceCandidate {
        from: ParticipantId,
        candidate: IceCandidate,
    },

    #[serde(rename = "user:disconnect")]
    Disconnect { from: ParticipantId },

    #[serde(rename = "user:left")]
    UserLeft { id: ParticipantId },

    #[serde(rename = "error")]
    Error { reason: String },
}

impl RelaySignal {
    pub fn op(&self) -> &'static str {
        match self {
            RelaySignal::Welcome { .. } => "welcome",
            RelaySignal::RoomJoin { .. } => "room:join",
            RelaySignal::UserJoined { .. } => "user:joined",
            RelaySignal::IncomingCall { .. } => "incomming:call",
            RelaySignal::CallAccepted { .. } => "call:accepted",
            RelaySignal::RenegotiationOffer { .. } => "peer:nego:needed",
            RelaySignal::RenegotiationAnswer { .. } => "peer:nego:done",
            RelaySignal::IceCandidate { .. } => "ice:candidate",
            RelaySignal::Disconnect { .. } => "user:disconnect",
            RelaySignal::UserLeft { .. } => "user:left",
            RelaySignal::Error { .. } => "error",
        }
    }
}
