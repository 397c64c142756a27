use duet_core::ParticipantId;
use duet_peer::CallError;
use duet_server::{RoomDirectory, SignalingService};

use crate::integration::init_tracing;
use crate::utils::{connected_pair, exchange, joined_pair, test_ice_servers};

#[tokio::test]
async fn test_send_streams_twice_attaches_each_track_once() {
    init_tracing();

    let service = SignalingService::new(RoomDirectory::new(), test_ice_servers());
    let (mut alice, mut bob) = connected_pair(&service, ParticipantId::new(), ParticipantId::new()).await;
    let renegotiations = alice.count_sent("peer:nego:needed");

    alice.coordinator.send_streams().await.unwrap();
    alice.coordinator.send_streams().await.unwrap();
    exchange(&mut alice, &mut bob).await;

    assert_eq!(
        alice.transports.last().record().tracks,
        vec!["audio-test".to_owned(), "video-test".to_owned()]
    );
    assert_eq!(alice.coordinator.session().unwrap().attached_track_count(), 2);
    assert_eq!(alice.count_sent("peer:nego:needed"), renegotiations);
}

#[tokio::test]
async fn test_send_streams_outside_a_call_fails() {
    init_tracing();

    let service = SignalingService::new(RoomDirectory::new(), test_ice_servers());
    let (mut alice, _bob) = joined_pair(&service, ParticipantId::new(), ParticipantId::new()).await;

    assert!(matches!(
        alice.coordinator.send_streams().await,
        Err(CallError::NotInCall)
    ));

    // Offer still unanswered: tracks wait for the call to connect.
    alice.coordinator.call().await.unwrap();
    assert!(matches!(
        alice.coordinator.send_streams().await,
        Err(CallError::Negotiation(_))
    ));
    alice.pump().await;
    assert!(alice.transports.last().record().tracks.is_empty());
}
