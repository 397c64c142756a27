use crate::room::RoomDirectory;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use duet_core::{ClientSignal, IceServerConfig, ParticipantId, RelaySignal, RoomId};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("participant {0} is already connected")]
    AlreadyConnected(ParticipantId),
}

struct SignalingInner {
    peers: DashMap<ParticipantId, mpsc::UnboundedSender<RelaySignal>>,
    directory: RoomDirectory,
    ice_servers: Vec<IceServerConfig>,
}

/// Relays signaling messages between the participants of a room.
///
/// Every connected participant owns one FIFO outbound queue, so messages from
/// one sender to one receiver keep their send order.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl SignalingService {
    pub fn new(directory: RoomDirectory, ice_servers: Vec<IceServerConfig>) -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                peers: DashMap::new(),
                directory,
                ice_servers,
            }),
        }
    }

    pub fn directory(&self) -> &RoomDirectory {
        &self.inner.directory
    }

    pub fn get_ice_servers(&self) -> Vec<IceServerConfig> {
        self.inner.ice_servers.clone()
    }

    pub fn is_connected(&self, participant_id: &ParticipantId) -> bool {
        self.inner.peers.contains_key(participant_id)
    }

    /// Registers the outbound queue of a freshly connected participant and greets it.
    pub fn connect(
        &self,
        participant_id: ParticipantId,
        tx: mpsc::UnboundedSender<RelaySignal>,
    ) -> Result<(), RelayError> {
        match self.inner.peers.entry(participant_id) {
            Entry::Occupied(_) => return Err(RelayError::AlreadyConnected(participant_id)),
            Entry::Vacant(slot) => {
                slot.insert(tx);
            }
        }

        info!("Participant {} connected", participant_id);
        self.send(
            RelaySignal::Welcome {
                id: participant_id,
                ice_servers: self.get_ice_servers(),
            },
            &participant_id,
        );
        Ok(())
    }

    /// Forgets a participant, removes it from its room and tells the room.
    pub fn disconnect(&self, participant_id: &ParticipantId) {
        self.inner.peers.remove(participant_id);

        if let Some(departure) = self.inner.directory.leave(participant_id) {
            debug!(
                "Telling {} member(s) of room '{}' that {} left",
                departure.remaining.len(),
                departure.room,
                departure.participant
            );
            for member in &departure.remaining {
                self.send(
                    RelaySignal::UserLeft {
                        id: departure.participant,
                    },
                    member,
                );
            }
        }
        info!("Participant {} disconnected", participant_id);
    }

    /// Delivers to one participant. Unknown or gone targets are dropped without
    /// telling the sender: delivery is never guaranteed.
    pub fn send(&self, msg: RelaySignal, to: &ParticipantId) {
        let Some(peer) = self.inner.peers.get(to) else {
            debug!("Dropping '{}' for disconnected participant {}", msg.op(), to);
            return;
        };

        let op = msg.op();
        if peer.send(msg).is_err() {
            debug!("Outbound queue of {} is closed, dropped '{}'", to, op);
        }
    }

    /// Delivers to every current member of `room` except `excluding`.
    pub fn broadcast(&self, msg: RelaySignal, room: &RoomId, excluding: &ParticipantId) {
        for member in self.inner.directory.members(room) {
            if &member != excluding {
                self.send(msg.clone(), &member);
            }
        }
    }

    /// Routes one message received from `from`.
    pub fn dispatch(&self, from: ParticipantId, signal: ClientSignal) {
        debug!("'{}' from {}", signal.op(), from);

        match signal {
            ClientSignal::RoomJoin { email, room } => self.handle_join(from, email, room),

            ClientSignal::Disconnect => match self.inner.directory.room_of(&from) {
                Some(room) => self.broadcast(RelaySignal::Disconnect { from }, &room, &from),
                None => debug!("Participant {} hung up outside of any room", from),
            },

            routed => {
                let Some(to) = routed.target() else {
                    return;
                };
                if !self.share_room(&from, &to) {
                    warn!(
                        "Dropping '{}' from {}: {} is not in the same room",
                        routed.op(),
                        from,
                        to
                    );
                    return;
                }
                if let Some(msg) = Self::forwarded(from, routed) {
                    self.send(msg, &to);
                }
            }
        }
    }

    fn handle_join(&self, from: ParticipantId, email: String, room: RoomId) {
        match self.inner.directory.join(from, room.clone(), email.clone()) {
            Ok(existing) => {
                for member in &existing {
                    self.send(
                        RelaySignal::UserJoined {
                            id: from,
                            email: email.clone(),
                        },
                        member,
                    );
                }
                self.send(RelaySignal::RoomJoin { email, room }, &from);
            }
            Err(e) => {
                warn!("Rejected room:join from {}: {}", from, e);
                self.send(
                    RelaySignal::Error {
                        reason: e.to_string(),
                    },
                    &from,
                );
            }
        }
    }

    fn share_room(&self, a: &ParticipantId, b: &ParticipantId) -> bool {
        match self.inner.directory.room_of(a) {
            Some(room) => self.inner.directory.room_of(b).as_ref() == Some(&room),
            None => false,
        }
    }

    /// Rewrites the addressing of a point-to-point message from `to` to `from`.
    fn forwarded(from: ParticipantId, signal: ClientSignal) -> Option<RelaySignal> {
        let msg = match signal {
            ClientSignal::CallOffer { offer, .. } => RelaySignal::IncomingCall { from, offer },
            ClientSignal::CallAccepted { ans, .. } => RelaySignal::CallAccepted { from, ans },
            ClientSignal::RenegotiationOffer { offer, .. } => {
                RelaySignal::RenegotiationOffer { from, offer }
            }
            ClientSignal::RenegotiationAnswer { ans, .. } => {
                RelaySignal::RenegotiationAnswer { from, ans }
            }
            ClientSignal::IceCandidate { candidate, .. } => {
                RelaySignal::IceCandidate { from, candidate }
            }
            ClientSignal::RoomJoin { .. } | ClientSignal::Disconnect => return None,
        };
        Some(msg)
    }
}
