use duet_core::{ParticipantId, RoomId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("participant {participant} is already in room '{room}'")]
    AlreadyInRoom {
        participant: ParticipantId,
        room: RoomId,
    },
}

/// Result of a participant leaving its room.
#[derive(Debug, Clone)]
pub struct Departure {
    pub participant: ParticipantId,
    pub room: RoomId,
    /// Members still in the room, the ones to notify.
    pub remaining: Vec<ParticipantId>,
}
