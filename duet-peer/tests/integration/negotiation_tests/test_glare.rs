use duet_core::ClientSignal;
use duet_peer::{LocalTrack, NegotiationState, TrackKind};

use crate::integration::init_tracing;
use crate::integration::negotiation_tests::mock_session;
use crate::utils::polite_then_impolite;

#[tokio::test]
async fn test_simultaneous_calls_converge_on_impolite_offer() {
    init_tracing();

    let (polite_id, impolite_id) = polite_then_impolite();
    let (mut polite, polite_transports, _pe) = mock_session("polite", polite_id, impolite_id).await;
    let (mut impolite, impolite_transports, _ie) =
        mock_session("impolite", impolite_id, polite_id).await;
    assert!(polite.is_polite());
    assert!(!impolite.is_polite());

    let ClientSignal::CallOffer { offer: polite_offer, .. } = polite.initiate_call().await.unwrap()
    else {
        panic!("expected user:call");
    };
    polite.confirm_sent();
    let ClientSignal::CallOffer { offer: impolite_offer, .. } =
        impolite.initiate_call().await.unwrap()
    else {
        panic!("expected user:call");
    };
    impolite.confirm_sent();

    // Both offers cross in flight.
    assert_eq!(impolite.incoming_offer(polite_offer).await.unwrap(), None);
    assert_eq!(impolite.state(), NegotiationState::OfferSent);

    let Some(ClientSignal::CallAccepted { ans, .. }) =
        polite.incoming_offer(impolite_offer.clone()).await.unwrap()
    else {
        panic!("polite side must answer");
    };
    polite.confirm_sent();
    assert_eq!(polite.state(), NegotiationState::Connected);
    assert!(polite.offer_deadline().is_none());

    // The polite offer died with its transport; the answer came from a fresh one.
    let handles = polite_transports.handles();
    assert_eq!(handles.len(), 2);
    assert!(handles[0].record().closed);
    assert!(!handles[1].record().closed);
    assert!(handles.iter().all(|h| h.session_id == polite.id()));
    assert_eq!(handles[1].record().remote_descriptions, vec![impolite_offer]);
    assert_eq!(handles[1].record().local_descriptions, vec![ans.clone()]);

    impolite.answer_received(ans).await.unwrap();
    assert_eq!(impolite.state(), NegotiationState::Connected);
    assert_eq!(impolite_transports.created(), 1);
    assert_eq!(impolite_transports.last().record().remote_descriptions.len(), 1);
}

#[tokio::test]
async fn test_renegotiation_glare_keeps_polite_tracks() {
    init_tracing();

    let (polite_id, impolite_id) = polite_then_impolite();
    let (mut polite, polite_transports, _pe) = mock_session("polite", polite_id, impolite_id).await;
    let (mut impolite, impolite_transports, _ie) =
        mock_session("impolite", impolite_id, polite_id).await;

    let ClientSignal::CallOffer { offer, .. } = impolite.initiate_call().await.unwrap() else {
        panic!("expected user:call");
    };
    impolite.confirm_sent();
    let Some(ClientSignal::CallAccepted { ans, .. }) = polite.incoming_offer(offer).await.unwrap()
    else {
        panic!("expected call:accepted");
    };
    polite.confirm_sent();
    impolite.answer_received(ans).await.unwrap();

    let tracks = [
        LocalTrack::new(TrackKind::Audio, "polite"),
        LocalTrack::new(TrackKind::Video, "polite"),
    ];
    assert_eq!(polite.attach_tracks(&tracks).await.unwrap(), 2);

    let Some(ClientSignal::RenegotiationOffer { offer: from_polite, .. }) =
        polite.negotiation_needed().await.unwrap()
    else {
        panic!("expected peer:nego:needed");
    };
    let Some(ClientSignal::RenegotiationOffer { offer: from_impolite, .. }) =
        impolite.negotiation_needed().await.unwrap()
    else {
        panic!("expected peer:nego:needed");
    };

    assert_eq!(
        impolite.renegotiation_offer_received(from_polite).await.unwrap(),
        None
    );
    let Some(ClientSignal::RenegotiationAnswer { ans, .. }) =
        polite.renegotiation_offer_received(from_impolite).await.unwrap()
    else {
        panic!("polite side must answer");
    };
    impolite.renegotiation_answer_received(ans).await.unwrap();

    assert_eq!(polite.state(), NegotiationState::Connected);
    assert_eq!(impolite.state(), NegotiationState::Connected);
    assert_eq!(impolite_transports.created(), 1);

    // The replacement carries the tracks and asks to negotiate them again.
    assert_eq!(polite_transports.created(), 2);
    assert_eq!(polite.attached_track_count(), 2);
    let fresh = polite_transports.last();
    assert_eq!(fresh.record().tracks, vec!["audio-polite", "video-polite"]);
    assert_eq!(fresh.record().negotiation_requests, 1);
    assert!(!polite.take_deferred_renegotiation());
}
