use crate::call::{CallCommand, CallEvent, SignalSink};
use crate::config::PeerConfig;
use crate::error::{CallError, NegotiationError};
use crate::media::{LocalMedia, MediaSource};
use crate::negotiation::{NegotiationState, OfferExpiry, PeerSession};
use crate::transport::{TransportEvent, TransportFactory, TransportSource, TransportState};
use duet_core::{
    ClientSignal, IceServerConfig, ParticipantId, RelaySignal, RoomId, SessionDescription,
    SessionId,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Drives one participant's side of a call: reacts to relay messages, local
/// commands and transport events, and owns at most one `PeerSession`.
pub struct CallCoordinator {
    local_id: ParticipantId,
    config: PeerConfig,
    sink: Arc<dyn SignalSink>,
    factory: Arc<dyn TransportFactory>,
    media_source: Arc<dyn MediaSource>,
    remote_id: Option<ParticipantId>,
    session: Option<PeerSession>,
    local_media: Option<LocalMedia>,
    last_state: Option<(SessionId, NegotiationState)>,
    transport_tx: mpsc::UnboundedSender<TransportEvent>,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    events: mpsc::UnboundedSender<CallEvent>,
}

impl CallCoordinator {
    pub fn new(
        local_id: ParticipantId,
        config: PeerConfig,
        sink: Arc<dyn SignalSink>,
        factory: Arc<dyn TransportFactory>,
        media_source: Arc<dyn MediaSource>,
    ) -> (Self, mpsc::UnboundedReceiver<CallEvent>) {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();

        let coordinator = Self {
            local_id,
            config,
            sink,
            factory,
            media_source,
            remote_id: None,
            session: None,
            local_media: None,
            last_state: None,
            transport_tx,
            transport_rx,
            events,
        };
        (coordinator, events_rx)
    }

    pub fn local_id(&self) -> ParticipantId {
        self.local_id
    }

    pub fn remote_id(&self) -> Option<ParticipantId> {
        self.remote_id
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(PeerSession::id)
    }

    pub fn session_state(&self) -> Option<NegotiationState> {
        self.session.as_ref().map(PeerSession::state)
    }

    pub fn session(&self) -> Option<&PeerSession> {
        self.session.as_ref()
    }

    pub fn has_local_media(&self) -> bool {
        self.local_media.is_some()
    }

    pub fn ice_servers(&self) -> &[IceServerConfig] {
        &self.config.transport.ice_servers
    }

    /// When the outstanding offer, if any, times out.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.session.as_ref().and_then(PeerSession::offer_deadline)
    }

    pub async fn join_room(&mut self, email: String, room: RoomId) {
        info!("Joining room '{}' as {}", room, email);
        self.sink.emit(ClientSignal::RoomJoin { email, room }).await;
    }

    /// Calls the participant announced by the relay.
    pub async fn call(&mut self) -> Result<(), CallError> {
        let remote = self.remote_id.ok_or(CallError::NoRemote)?;
        if let Some(session) = &self.session {
            return Err(CallError::Busy(session.remote_id()));
        }
        self.start_call(remote).await
    }

    /// Answers `incomming:call`. With our own call to `from` still pending this
    /// is glare and politeness decides which offer wins.
    pub async fn accept_incoming_call(&mut self, from: ParticipantId, offer: SessionDescription) {
        if let Some(session) = self.session.as_mut() {
            if session.remote_id() != from {
                warn!("Ignoring call from {}: busy with {}", from, session.remote_id());
                return;
            }
            if session.state() == NegotiationState::OfferSent {
                let outcome = session.incoming_offer(offer).await;
                self.finish_answer(outcome).await;
                return;
            }
            info!("{} restarted the call, replacing session {}", from, session.id());
            self.teardown().await;
        }

        self.remote_id = Some(from);
        if self.ensure_media().await.is_err() {
            return;
        }
        let mut session = match self.new_session(from).await {
            Ok(session) => session,
            Err(e) => {
                error!("Cannot answer {}: {}", from, e);
                self.report(CallEvent::Error {
                    reason: e.to_string(),
                });
                return;
            }
        };

        let outcome = session.incoming_offer(offer).await;
        self.session = Some(session);
        self.finish_answer(outcome).await;
    }

    /// Attaches every local track not yet attached to the running call.
    pub async fn send_streams(&mut self) -> Result<(), CallError> {
        let session = self.session.as_mut().ok_or(CallError::NotInCall)?;
        let media = self.local_media.as_ref().ok_or(CallError::NoLocalMedia)?;

        let added = session.attach_tracks(media.tracks()).await?;
        if added > 0 {
            info!("Attached {} local track(s) to session {}", added, session.id());
        }
        Ok(())
    }

    /// Hangs up: closes the session, releases local media, and tells the room.
    /// Does nothing when there is no call. The remote participant is kept.
    pub async fn disconnect(&mut self) {
        let Some(remote) = self.teardown().await else {
            debug!("Nothing to hang up");
            return;
        };
        info!("Hung up on {}", remote);
        self.sink.emit(ClientSignal::Disconnect).await;
    }

    /// Retires any session and, if a remote participant is known, calls it again
    /// with a fresh session.
    pub async fn reconnect(&mut self) -> Result<(), CallError> {
        self.teardown().await;

        let Some(remote) = self.remote_id else {
            info!("Reconnect requested but nobody to call");
            return Ok(());
        };
        info!("Reconnecting to {}", remote);
        self.start_call(remote).await
    }

    pub async fn handle_command(&mut self, command: CallCommand) {
        let result = match command {
            CallCommand::JoinRoom { email, room } => {
                self.join_room(email, room).await;
                Ok(())
            }
            CallCommand::Call => self.call().await,
            CallCommand::SendStreams => self.send_streams().await,
            CallCommand::Disconnect => {
                self.disconnect().await;
                Ok(())
            }
            CallCommand::Reconnect => self.reconnect().await,
        };

        match result {
            Ok(()) => {}
            // already reported as MediaUnavailable
            Err(CallError::Media(_)) => {}
            Err(e) => {
                warn!("Command failed: {}", e);
                self.report(CallEvent::Error {
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Reacts to one message delivered by the relay.
    pub async fn handle_signal(&mut self, signal: RelaySignal) {
        debug!("Received '{}'", signal.op());

        match signal {
            RelaySignal::Welcome { id, ice_servers } => {
                if id != self.local_id {
                    warn!("Relay welcomed {} but we are {}", id, self.local_id);
                }
                if !ice_servers.is_empty() {
                    self.config.transport.ice_servers = ice_servers;
                }
            }

            RelaySignal::RoomJoin { room, .. } => {
                info!("Joined room '{}'", room);
                self.report(CallEvent::Joined { room });
            }

            RelaySignal::UserJoined { id, email } => {
                info!("{} ({}) joined the room", email, id);
                match &self.session {
                    Some(session) if session.remote_id() != id => {
                        warn!("{} joined while in a call with {}", id, session.remote_id());
                    }
                    _ => self.remote_id = Some(id),
                }
                self.report(CallEvent::PeerJoined { id, email });
            }

            RelaySignal::IncomingCall { from, offer } => {
                info!("Incoming call from {}", from);
                self.accept_incoming_call(from, offer).await;
            }

            RelaySignal::CallAccepted { from, ans } => {
                let Some(session) = self.session_with(from, "call:accepted") else {
                    return;
                };
                let outcome = session.answer_received(ans).await.map(|()| None);
                if self.settle(outcome).await.is_ok() {
                    if let Err(e) = self.send_streams().await {
                        warn!("Could not send streams after the call was accepted: {}", e);
                    }
                }
            }

            RelaySignal::RenegotiationOffer { from, offer } => {
                let Some(session) = self.session_with(from, "peer:nego:needed") else {
                    return;
                };
                let outcome = session.renegotiation_offer_received(offer).await;
                self.settle_remote(outcome).await;
            }

            RelaySignal::RenegotiationAnswer { from, ans } => {
                let Some(session) = self.session_with(from, "peer:nego:done") else {
                    return;
                };
                let outcome = session.renegotiation_answer_received(ans).await.map(|()| None);
                self.settle_remote(outcome).await;
            }

            RelaySignal::IceCandidate { from, candidate } => {
                let Some(session) = self.session_with(from, "ice:candidate") else {
                    return;
                };
                if let Err(e) = session.remote_candidate(candidate).await {
                    debug!("Dropping candidate from {}: {}", from, e);
                }
            }

            RelaySignal::Disconnect { from } => {
                if self.remote_id != Some(from) {
                    debug!("Ignoring hang-up of {}", from);
                    return;
                }
                info!("{} hung up", from);
                if self.teardown().await.is_some() {
                    self.report(CallEvent::CallEnded { remote: from });
                }
            }

            RelaySignal::UserLeft { id } => {
                if self.remote_id != Some(id) {
                    debug!("Ignoring departure of {}", id);
                    return;
                }
                info!("{} left the room", id);
                if self.teardown().await.is_some() {
                    self.report(CallEvent::CallEnded { remote: id });
                }
                self.remote_id = None;
                self.report(CallEvent::PeerLeft { id });
            }

            RelaySignal::Error { reason } => {
                warn!("Relay error: {}", reason);
                self.report(CallEvent::Error { reason });
            }
        }
    }

    /// Reacts to one event of the current transport. Events of retired
    /// sessions are dropped.
    pub async fn handle_transport_event(&mut self, event: TransportEvent) {
        let Some(session) = self
            .session
            .as_mut()
            .filter(|s| s.id() == event.session_id())
        else {
            debug!("Dropping event of retired session {}", event.session_id());
            return;
        };

        match event {
            TransportEvent::CandidateGenerated(_, candidate) => {
                if let Some(signal) = session.local_candidate(candidate) {
                    self.sink.emit(signal).await;
                }
            }

            TransportEvent::NegotiationNeeded(_) => {
                let outcome = session.negotiation_needed().await;
                self.settle_remote(outcome).await;
            }

            TransportEvent::StateChanged(_, TransportState::Failed) => {
                let remote = session.remote_id();
                warn!("Transport to {} failed", remote);
                self.teardown().await;
                self.report(CallEvent::CallEnded { remote });
            }

            TransportEvent::StateChanged(_, state) => {
                debug!("Transport of session {} is {:?}", session.id(), state);
            }

            TransportEvent::RemoteTrack { track_id, kind, .. } => {
                self.report(CallEvent::RemoteTrack { track_id, kind });
            }
        }
    }

    /// Handles every transport event already queued. Returns how many there were.
    pub async fn pump_transport_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.transport_rx.try_recv() {
            self.handle_transport_event(event).await;
            handled += 1;
        }
        handled
    }

    /// Applies the offer timeout of the current session.
    pub async fn expire_offer_if_due(&mut self, now: Instant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match session.expire_offer(now).await {
            OfferExpiry::NotDue => {}
            OfferExpiry::Abandoned => {
                let remote = session.remote_id();
                self.report_state();
                self.session = None;
                self.local_media = None;
                self.sink.emit(ClientSignal::Disconnect).await;
                self.report(CallEvent::OfferTimedOut { remote });
            }
        }
    }

    /// Event loop. Runs until the command or the relay channel closes.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<CallCommand>,
        mut signals: mpsc::UnboundedReceiver<RelaySignal>,
    ) {
        info!("Call loop of {} started", self.local_id);

        loop {
            let deadline = self.next_deadline();

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        info!("Command channel closed");
                        break;
                    }
                },

                signal = signals.recv() => match signal {
                    Some(signal) => self.handle_signal(signal).await,
                    None => {
                        info!("Relay connection closed");
                        break;
                    }
                },

                Some(event) = self.transport_rx.recv() => {
                    self.handle_transport_event(event).await;
                }

                _ = sleep_until(deadline) => {
                    self.expire_offer_if_due(Instant::now()).await;
                }
            }
        }

        self.teardown().await;
        info!("Call loop of {} finished", self.local_id);
    }

    async fn start_call(&mut self, remote: ParticipantId) -> Result<(), CallError> {
        self.ensure_media().await?;
        let mut session = self.new_session(remote).await?;

        let outcome = session.initiate_call().await.map(Some);
        self.session = Some(session);
        self.settle(outcome).await?;
        info!("Calling {}", remote);
        Ok(())
    }

    async fn ensure_media(&mut self) -> Result<(), CallError> {
        if self.local_media.is_some() {
            return Ok(());
        }

        match self.media_source.acquire().await {
            Ok(media) => {
                self.local_media = Some(media);
                Ok(())
            }
            Err(e) => {
                warn!("{}", e);
                self.report(CallEvent::MediaUnavailable {
                    reason: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    async fn new_session(&mut self, remote: ParticipantId) -> Result<PeerSession, CallError> {
        let id = SessionId::new();
        let source = TransportSource::new(
            Arc::clone(&self.factory),
            self.config.transport.clone(),
            self.transport_tx.clone(),
        );

        let session =
            PeerSession::open(id, self.local_id, remote, source, self.config.offer_timeout).await?;
        self.note_state(id, session.state());
        Ok(session)
    }

    fn session_with(&mut self, from: ParticipantId, op: &str) -> Option<&mut PeerSession> {
        match self.session.as_mut() {
            Some(session) if session.remote_id() == from => Some(session),
            _ => {
                debug!("Ignoring '{}' from {}: no call with them", op, from);
                None
            }
        }
    }

    /// Emits what a transition produced, reports the new state, retires a
    /// closed session and runs a renegotiation deferred until now.
    async fn settle(
        &mut self,
        outcome: Result<Option<ClientSignal>, NegotiationError>,
    ) -> Result<(), NegotiationError> {
        let result = match outcome {
            Ok(signal) => {
                self.emit_and_confirm(signal).await;
                Ok(())
            }
            Err(e) => Err(e),
        };

        loop {
            self.report_state();
            if self.retire_closed_session() {
                break;
            }
            let Some(session) = self.session.as_mut() else {
                break;
            };
            if !session.take_deferred_renegotiation() {
                break;
            }
            match session.negotiation_needed().await {
                Ok(signal) => self.emit_and_confirm(signal).await,
                Err(e) => self.log_rejected(e),
            }
        }

        result
    }

    async fn settle_remote(&mut self, outcome: Result<Option<ClientSignal>, NegotiationError>) {
        if let Err(e) = self.settle(outcome).await {
            self.log_rejected(e);
        }
    }

    /// Settles the answer to an incoming call and, when configured, attaches
    /// local tracks right away.
    async fn finish_answer(&mut self, outcome: Result<Option<ClientSignal>, NegotiationError>) {
        let answered = matches!(outcome, Ok(Some(_)));

        match self.settle(outcome).await {
            Ok(()) if answered && self.config.auto_send_streams => {
                if let Err(e) = self.send_streams().await {
                    warn!("Could not send streams after answering: {}", e);
                }
            }
            Ok(()) => {}
            Err(e) => self.log_rejected(e),
        }
    }

    async fn emit_and_confirm(&mut self, signal: Option<ClientSignal>) {
        let Some(signal) = signal else {
            return;
        };
        self.sink.emit(signal).await;
        if let Some(session) = self.session.as_mut() {
            session.confirm_sent();
        }
    }

    fn log_rejected(&self, e: NegotiationError) {
        match e {
            NegotiationError::InvalidStateTransition { .. } => warn!("Ignored: {}", e),
            NegotiationError::DescriptionApplyFailed { .. } => {
                error!("{}", e);
                self.report(CallEvent::Error {
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Drops a session that closed itself after a failure.
    fn retire_closed_session(&mut self) -> bool {
        let Some(session) = self.session.take_if(|s| s.state().is_closed()) else {
            return false;
        };
        self.local_media = None;
        self.report(CallEvent::CallEnded {
            remote: session.remote_id(),
        });
        true
    }

    /// Closes and drops the session and releases local media. Returns the
    /// remote of the session that was torn down.
    async fn teardown(&mut self) -> Option<ParticipantId> {
        self.local_media = None;

        let mut session = self.session.take()?;
        session.disconnect().await;
        self.note_state(session.id(), session.state());
        Some(session.remote_id())
    }

    fn report_state(&mut self) {
        if let Some((id, state)) = self.session.as_ref().map(|s| (s.id(), s.state())) {
            self.note_state(id, state);
        }
    }

    fn note_state(&mut self, session_id: SessionId, state: NegotiationState) {
        if self.last_state == Some((session_id, state)) {
            return;
        }
        self.last_state = Some((session_id, state));
        self.report(CallEvent::StateChanged { session_id, state });
    }

    fn report(&self, event: CallEvent) {
        let _ = self.events.send(event);
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
