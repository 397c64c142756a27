use duet_core::{ParticipantId, RelaySignal, RoomId};
use duet_peer::{
    CallCommand, CallCoordinator, CallEvent, DEFAULT_OFFER_TIMEOUT, NegotiationState, PeerConfig,
};
use duet_server::{RoomDirectory, SignalingService};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::integration::init_tracing;
use crate::utils::{
    MockMediaSource, MockTransportFactory, RecordingSink, connected_pair, exchange, joined_pair,
    test_ice_servers,
};

#[tokio::test(start_paused = true)]
async fn test_unanswered_offer_is_abandoned() {
    init_tracing();

    let service = SignalingService::new(RoomDirectory::new(), test_ice_servers());
    let (bob_id, alice_id) = (ParticipantId::new(), ParticipantId::new());
    let (mut alice, mut bob) = joined_pair(&service, alice_id, bob_id).await;
    alice.drain_events();

    alice.coordinator.call().await.unwrap();
    bob.lose_inbound();

    tokio::time::advance(DEFAULT_OFFER_TIMEOUT - Duration::from_secs(1)).await;
    alice.coordinator.expire_offer_if_due(Instant::now()).await;
    assert_eq!(alice.coordinator.session_state(), Some(NegotiationState::OfferSent));

    tokio::time::advance(Duration::from_secs(1)).await;
    alice.coordinator.expire_offer_if_due(Instant::now()).await;

    assert!(alice.coordinator.session().is_none());
    assert!(!alice.coordinator.has_local_media());
    assert!(alice.transports.last().record().closed);
    assert_eq!(alice.sent_ops().last(), Some(&"user:disconnect"));
    assert!(
        alice
            .drain_events()
            .contains(&CallEvent::OfferTimedOut { remote: bob_id })
    );

    // The room still works: a fresh call connects.
    exchange(&mut alice, &mut bob).await;
    alice.coordinator.reconnect().await.unwrap();
    exchange(&mut alice, &mut bob).await;
    assert_eq!(alice.coordinator.session_state(), Some(NegotiationState::Connected));
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_renegotiation_ends_the_call() {
    init_tracing();

    let service = SignalingService::new(RoomDirectory::new(), test_ice_servers());
    let (alice_id, bob_id) = (ParticipantId::new(), ParticipantId::new());
    let (mut alice, mut bob) = connected_pair(&service, alice_id, bob_id).await;

    bob.coordinator.send_streams().await.unwrap();
    bob.pump().await;
    assert_eq!(bob.coordinator.session_state(), Some(NegotiationState::Renegotiating));
    alice.lose_inbound();
    bob.drain_events();

    tokio::time::advance(DEFAULT_OFFER_TIMEOUT).await;
    bob.coordinator.expire_offer_if_due(Instant::now()).await;

    assert!(bob.coordinator.session().is_none());
    assert!(bob.coordinator.next_deadline().is_none());
    assert!(bob.transports.last().record().closed);
    assert_eq!(bob.count_sent("user:disconnect"), 1);
    assert!(
        bob.drain_events()
            .contains(&CallEvent::OfferTimedOut { remote: alice_id })
    );

    // Alice hears the hang-up and can call again.
    exchange(&mut alice, &mut bob).await;
    assert!(alice.coordinator.session().is_none());
    assert_eq!(alice.coordinator.remote_id(), Some(bob_id));
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_enforces_offer_timeout() {
    init_tracing();

    let local = ParticipantId::new();
    let remote = ParticipantId::new();
    let sink = RecordingSink::default();
    let config = PeerConfig {
        offer_timeout: Duration::from_secs(5),
        ..PeerConfig::default()
    };

    let (coordinator, mut events) = CallCoordinator::new(
        local,
        config,
        Arc::new(sink.clone()),
        Arc::new(MockTransportFactory::new("local")),
        Arc::new(MockMediaSource::default()),
    );
    let (command_tx, command_rx) = mpsc::channel(8);
    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    let run = tokio::spawn(coordinator.run(command_rx, signal_rx));

    command_tx
        .send(CallCommand::JoinRoom {
            email: "local@example.com".into(),
            room: RoomId::from("quiet"),
        })
        .await
        .unwrap();
    signal_tx
        .send(RelaySignal::UserJoined {
            id: remote,
            email: "remote@example.com".into(),
        })
        .unwrap();
    while let Some(event) = events.recv().await {
        if matches!(event, CallEvent::PeerJoined { .. }) {
            break;
        }
    }
    command_tx.send(CallCommand::Call).await.unwrap();

    let started = Instant::now();
    let timed_out = tokio::time::timeout(Duration::from_secs(60), async {
        while let Some(event) = events.recv().await {
            if let CallEvent::OfferTimedOut { remote: r } = event {
                return r;
            }
        }
        panic!("event channel closed before the offer timed out");
    })
    .await
    .expect("offer never timed out");

    assert_eq!(timed_out, remote);
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(sink.ops().first(), Some(&"room:join"));
    assert_eq!(sink.ops().iter().filter(|op| **op == "user:call").count(), 1);
    assert_eq!(sink.ops().last(), Some(&"user:disconnect"));

    drop(command_tx);
    run.await.unwrap();
}
