use crate::error::NegotiationError;
use crate::media::LocalTrack;
use crate::negotiation::state::NegotiationState;
use crate::transport::{MediaTransport, TransportSource};
use duet_core::{ClientSignal, IceCandidate, ParticipantId, SessionDescription, SessionId};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Outcome of checking a session's offer deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferExpiry {
    NotDue,
    /// An offer went unanswered; the session is closed.
    Abandoned,
}

/// One side's view of a call with one remote participant.
///
/// Owns its media transport exclusively. Operations that produce a message for
/// the peer return it instead of sending it; the caller emits it and then calls
/// [`PeerSession::confirm_sent`].
///
/// A local offer cannot be taken back once set on a transport, so the polite
/// side of a glare closes its transport and answers on a fresh one from
/// `source`, with the same session id and tracks.
pub struct PeerSession {
    id: SessionId,
    local_id: ParticipantId,
    remote_id: ParticipantId,
    state: NegotiationState,
    has_local_description: bool,
    has_remote_description: bool,
    polite: bool,
    offer_timeout: Duration,
    offer_deadline: Option<Instant>,
    source: TransportSource,
    transport: Box<dyn MediaTransport>,
    attached_tracks: Vec<LocalTrack>,
    pending_candidates: Vec<IceCandidate>,
    renegotiation_deferred: bool,
}

impl PeerSession {
    /// Opens the session's first transport.
    pub async fn open(
        id: SessionId,
        local_id: ParticipantId,
        remote_id: ParticipantId,
        source: TransportSource,
        offer_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let transport = source.open(id).await?;
        let polite = local_id.is_polite_towards(&remote_id);
        debug!(
            "Session {} with {} created ({})",
            id,
            remote_id,
            if polite { "polite" } else { "impolite" }
        );

        Ok(Self {
            id,
            local_id,
            remote_id,
            state: NegotiationState::Idle,
            has_local_description: false,
            has_remote_description: false,
            polite,
            offer_timeout,
            offer_deadline: None,
            source,
            transport,
            attached_tracks: Vec::new(),
            pending_candidates: Vec::new(),
            renegotiation_deferred: false,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn local_id(&self) -> ParticipantId {
        self.local_id
    }

    pub fn remote_id(&self) -> ParticipantId {
        self.remote_id
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn is_polite(&self) -> bool {
        self.polite
    }

    pub fn has_local_description(&self) -> bool {
        self.has_local_description
    }

    pub fn has_remote_description(&self) -> bool {
        self.has_remote_description
    }

    pub fn offer_deadline(&self) -> Option<Instant> {
        self.offer_deadline
    }

    pub fn attached_track_count(&self) -> usize {
        self.attached_tracks.len()
    }

    pub fn pending_candidate_count(&self) -> usize {
        self.pending_candidates.len()
    }

    /// Idle → OfferCreated. Returns the `user:call` to emit.
    pub async fn initiate_call(&mut self) -> Result<ClientSignal, NegotiationError> {
        const EVENT: &str = "initiate_call";
        if self.state != NegotiationState::Idle {
            return Err(self.invalid(EVENT));
        }

        self.state = NegotiationState::OfferCreated;
        let offer = self.local_offer(EVENT).await?;

        Ok(ClientSignal::CallOffer {
            to: self.remote_id,
            offer,
        })
    }

    /// Answers the peer's initial offer. With our own initial offer outstanding
    /// this is glare: the polite side drops its offer and answers, the impolite
    /// side ignores the remote offer and keeps waiting.
    pub async fn incoming_offer(
        &mut self,
        offer: SessionDescription,
    ) -> Result<Option<ClientSignal>, NegotiationError> {
        const EVENT: &str = "incoming_offer";
        match self.state {
            NegotiationState::Idle => {}
            NegotiationState::OfferSent if self.polite => {
                info!("Call glare with {}: dropping our offer", self.remote_id);
                self.replace_transport(EVENT).await?;
            }
            NegotiationState::OfferSent => {
                info!("Call glare with {}: keeping our offer", self.remote_id);
                return Ok(None);
            }
            _ => return Err(self.invalid(EVENT)),
        }

        self.state = NegotiationState::ReceivingOffer;
        let ans = self.answer_remote_offer(EVENT, offer).await?;
        self.state = NegotiationState::AnswerSent;

        Ok(Some(ClientSignal::CallAccepted {
            to: self.remote_id,
            ans,
        }))
    }

    /// OfferSent → Connected.
    pub async fn answer_received(&mut self, ans: SessionDescription) -> Result<(), NegotiationError> {
        const EVENT: &str = "answer_received";
        if self.state != NegotiationState::OfferSent {
            return Err(self.invalid(EVENT));
        }

        self.apply_remote(EVENT, ans).await?;
        self.offer_deadline = None;
        self.state = NegotiationState::Connected;
        info!("Call with {} connected", self.remote_id);
        Ok(())
    }

    /// Connected → Renegotiating. While another exchange is in flight the
    /// request is remembered and served once the session is Connected again.
    pub async fn negotiation_needed(&mut self) -> Result<Option<ClientSignal>, NegotiationError> {
        const EVENT: &str = "negotiation_needed";
        match self.state {
            NegotiationState::Connected => {}
            NegotiationState::Idle | NegotiationState::Closed => return Err(self.invalid(EVENT)),
            _ => {
                debug!("Deferring renegotiation in state {:?}", self.state);
                self.renegotiation_deferred = true;
                return Ok(None);
            }
        }

        let offer = self.local_offer(EVENT).await?;
        self.state = NegotiationState::Renegotiating;
        self.offer_deadline = Some(Instant::now() + self.offer_timeout);

        Ok(Some(ClientSignal::RenegotiationOffer {
            to: self.remote_id,
            offer,
        }))
    }

    /// Answers a renegotiation offer, resolving glare by politeness.
    pub async fn renegotiation_offer_received(
        &mut self,
        offer: SessionDescription,
    ) -> Result<Option<ClientSignal>, NegotiationError> {
        const EVENT: &str = "renegotiation_offer_received";
        match self.state {
            NegotiationState::Connected => {}
            NegotiationState::Renegotiating if self.polite => {
                info!("Renegotiation glare with {}: dropping our offer", self.remote_id);
                self.replace_transport(EVENT).await?;
            }
            NegotiationState::Renegotiating => {
                info!("Renegotiation glare with {}: keeping our offer", self.remote_id);
                return Ok(None);
            }
            _ => return Err(self.invalid(EVENT)),
        }

        let ans = self.answer_remote_offer(EVENT, offer).await?;
        self.state = NegotiationState::Connected;

        Ok(Some(ClientSignal::RenegotiationAnswer {
            to: self.remote_id,
            ans,
        }))
    }

    /// Renegotiating → Connected.
    pub async fn renegotiation_answer_received(
        &mut self,
        ans: SessionDescription,
    ) -> Result<(), NegotiationError> {
        const EVENT: &str = "renegotiation_answer_received";
        if self.state != NegotiationState::Renegotiating {
            return Err(self.invalid(EVENT));
        }

        self.apply_remote(EVENT, ans).await?;
        self.offer_deadline = None;
        self.state = NegotiationState::Connected;
        Ok(())
    }

    /// Advances the "sent" states once the returned message has been emitted:
    /// OfferCreated → OfferSent (arming the offer deadline), AnswerSent → Connected.
    pub fn confirm_sent(&mut self) {
        match self.state {
            NegotiationState::OfferCreated => {
                self.state = NegotiationState::OfferSent;
                self.offer_deadline = Some(Instant::now() + self.offer_timeout);
            }
            NegotiationState::AnswerSent => {
                self.state = NegotiationState::Connected;
                info!("Call with {} connected", self.remote_id);
            }
            _ => {}
        }
    }

    /// True once if a deferred renegotiation can now run.
    pub fn take_deferred_renegotiation(&mut self) -> bool {
        if self.state == NegotiationState::Connected && self.renegotiation_deferred {
            self.renegotiation_deferred = false;
            return true;
        }
        false
    }

    /// Applies a peer candidate, or buffers it until a remote description exists.
    pub async fn remote_candidate(&mut self, candidate: IceCandidate) -> Result<(), NegotiationError> {
        if self.state.is_closed() {
            return Err(self.invalid("remote_candidate"));
        }

        if !self.has_remote_description {
            debug!("Buffering ICE candidate until the remote description is set");
            self.pending_candidates.push(candidate);
            return Ok(());
        }

        if let Err(e) = self.transport.add_ice_candidate(candidate).await {
            warn!("Failed to add ICE candidate from {}: {:#}", self.remote_id, e);
        }
        Ok(())
    }

    /// Wraps a locally gathered candidate for the peer.
    pub fn local_candidate(&self, candidate: IceCandidate) -> Option<ClientSignal> {
        if self.state.is_closed() {
            return None;
        }
        Some(ClientSignal::IceCandidate {
            to: self.remote_id,
            candidate,
        })
    }

    /// Attaches each track not attached yet. Returns how many were added.
    pub async fn attach_tracks(&mut self, tracks: &[LocalTrack]) -> Result<usize, NegotiationError> {
        if !matches!(
            self.state,
            NegotiationState::Connected | NegotiationState::Renegotiating
        ) {
            return Err(self.invalid("send_streams"));
        }

        let mut added = 0;
        for track in tracks {
            if self.attached_tracks.iter().any(|t| t.id == track.id) {
                continue;
            }
            match self.transport.add_track(track).await {
                Ok(()) => {
                    self.attached_tracks.push(track.clone());
                    added += 1;
                }
                Err(e) => warn!("Failed to attach track '{}': {:#}", track.id, e),
            }
        }
        Ok(added)
    }

    /// Abandons the call when its outstanding offer is past the deadline.
    /// The transport cannot drop an offer it has set, so this holds for
    /// renegotiation offers too.
    pub async fn expire_offer(&mut self, now: Instant) -> OfferExpiry {
        match self.offer_deadline {
            Some(deadline) if now >= deadline => {}
            _ => return OfferExpiry::NotDue,
        }
        self.offer_deadline = None;

        match self.state {
            NegotiationState::OfferCreated
            | NegotiationState::OfferSent
            | NegotiationState::Renegotiating => {
                warn!(
                    "Offer to {} was never answered in state {:?}, abandoning the call",
                    self.remote_id, self.state
                );
                self.disconnect().await;
                OfferExpiry::Abandoned
            }
            _ => OfferExpiry::NotDue,
        }
    }

    /// Closes the transport and clears tracks. Safe from any state, idempotent.
    pub async fn disconnect(&mut self) {
        if self.state.is_closed() {
            return;
        }

        if let Err(e) = self.transport.close().await {
            warn!("Error while closing transport of session {}: {:#}", self.id, e);
        }
        self.attached_tracks.clear();
        self.pending_candidates.clear();
        self.renegotiation_deferred = false;
        self.offer_deadline = None;
        self.state = NegotiationState::Closed;
        info!("Session {} with {} closed", self.id, self.remote_id);
    }

    fn invalid(&self, event: &'static str) -> NegotiationError {
        NegotiationError::InvalidStateTransition {
            state: self.state,
            event,
        }
    }

    /// Closes the session after a description failure.
    async fn fail(&mut self, event: &'static str, e: anyhow::Error) -> NegotiationError {
        error!("Session {} failed during '{}': {:#}", self.id, event, e);
        self.disconnect().await;
        NegotiationError::DescriptionApplyFailed {
            event,
            reason: format!("{e:#}"),
        }
    }

    async fn local_offer(&mut self, event: &'static str) -> Result<SessionDescription, NegotiationError> {
        let offer = match self.transport.create_offer().await {
            Ok(offer) => offer,
            Err(e) => return Err(self.fail(event, e).await),
        };
        if let Err(e) = self.transport.set_local_description(offer.clone()).await {
            return Err(self.fail(event, e).await);
        }
        self.has_local_description = true;
        Ok(offer)
    }

    /// Drops the pending local offer by swapping in a fresh transport and
    /// attaching the tracks of the old one to it.
    async fn replace_transport(&mut self, event: &'static str) -> Result<(), NegotiationError> {
        let fresh = match self.source.open(self.id).await {
            Ok(transport) => transport,
            Err(e) => return Err(self.fail(event, e).await),
        };
        let stale = std::mem::replace(&mut self.transport, fresh);
        if let Err(e) = stale.close().await {
            warn!("Error while closing replaced transport of session {}: {:#}", self.id, e);
        }

        self.has_local_description = false;
        self.has_remote_description = false;
        self.offer_deadline = None;

        let mut kept = Vec::with_capacity(self.attached_tracks.len());
        for track in std::mem::take(&mut self.attached_tracks) {
            match self.transport.add_track(&track).await {
                Ok(()) => kept.push(track),
                Err(e) => warn!("Failed to re-attach track '{}': {:#}", track.id, e),
            }
        }
        self.attached_tracks = kept;

        debug!(
            "Session {} continues on a fresh transport with {} track(s)",
            self.id,
            self.attached_tracks.len()
        );
        Ok(())
    }

    async fn apply_remote(
        &mut self,
        event: &'static str,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError> {
        if let Err(e) = self.transport.set_remote_description(desc).await {
            return Err(self.fail(event, e).await);
        }
        self.has_remote_description = true;

        for candidate in std::mem::take(&mut self.pending_candidates) {
            if let Err(e) = self.transport.add_ice_candidate(candidate).await {
                warn!("Failed to add buffered ICE candidate: {:#}", e);
            }
        }
        Ok(())
    }

    async fn answer_remote_offer(
        &mut self,
        event: &'static str,
        offer: SessionDescription,
    ) -> Result<SessionDescription, NegotiationError> {
        self.apply_remote(event, offer).await?;

        let ans = match self.transport.create_answer().await {
            Ok(ans) => ans,
            Err(e) => return Err(self.fail(event, e).await),
        };
        if let Err(e) = self.transport.set_local_description(ans.clone()).await {
            return Err(self.fail(event, e).await);
        }
        self.has_local_description = true;
        Ok(ans)
    }
}
