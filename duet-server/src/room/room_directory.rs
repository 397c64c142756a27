use crate::room::membership::{Departure, DirectoryError};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use duet_core::{ParticipantId, RoomId};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct Member {
    email: String,
    room: RoomId,
}

/// Room membership shared by every connection of the relay.
///
/// Mutations lock the participant entry first and the room entry second, and
/// never hold either across an `.await`.
#[derive(Clone, Default)]
pub struct RoomDirectory {
    participants: Arc<DashMap<ParticipantId, Member>>,
    rooms: Arc<DashMap<RoomId, HashSet<ParticipantId>>>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `participant_id` in `room_id`, creating the room on first use.
    /// Returns the members that were present before the join.
    pub fn join(
        &self,
        participant_id: ParticipantId,
        room_id: RoomId,
        email: String,
    ) -> Result<Vec<ParticipantId>, DirectoryError> {
        let slot = match self.participants.entry(participant_id) {
            Entry::Occupied(current) => {
                return Err(DirectoryError::AlreadyInRoom {
                    participant: participant_id,
                    room: current.get().room.clone(),
                });
            }
            Entry::Vacant(slot) => slot,
        };

        let existing = {
            let mut members = self.rooms.entry(room_id.clone()).or_default();
            if members.is_empty() {
                info!("Creating new room: {}", room_id);
            }
            let existing: Vec<ParticipantId> = members.iter().copied().collect();
            members.insert(participant_id);
            existing
        };

        slot.insert(Member {
            email,
            room: room_id.clone(),
        });

        info!(
            "Participant {} joined room '{}' ({} already there)",
            participant_id,
            room_id,
            existing.len()
        );
        Ok(existing)
    }

    /// Removes the participant from its room. Not being in a room is not an error.
    pub fn leave(&self, participant_id: &ParticipantId) -> Option<Departure> {
        let (_, member) = self.participants.remove(participant_id)?;

        let remaining = match self.rooms.get_mut(&member.room) {
            Some(mut members) => {
                members.remove(participant_id);
                members.iter().copied().collect()
            }
            None => Vec::new(),
        };

        if self
            .rooms
            .remove_if(&member.room, |_, members| members.is_empty())
            .is_some()
        {
            debug!("Room '{}' is empty, discarding it", member.room);
        }

        info!("Participant {} left room '{}'", participant_id, member.room);
        Some(Departure {
            participant: *participant_id,
            room: member.room,
            remaining,
        })
    }

    pub fn room_of(&self, participant_id: &ParticipantId) -> Option<RoomId> {
        self.participants
            .get(participant_id)
            .map(|member| member.room.clone())
    }

    pub fn email_of(&self, participant_id: &ParticipantId) -> Option<String> {
        self.participants
            .get(participant_id)
            .map(|member| member.email.clone())
    }

    pub fn members(&self, room_id: &RoomId) -> Vec<ParticipantId> {
        self.rooms
            .get(room_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
