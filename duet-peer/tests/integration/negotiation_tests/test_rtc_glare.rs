use duet_core::{ClientSignal, ParticipantId, SessionId};
use duet_peer::{
    DEFAULT_OFFER_TIMEOUT, NegotiationState, PeerSession, TransportConfig, TransportSource,
};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::integration::init_tracing;
use crate::utils::{AudioRtcFactory, polite_then_impolite};

async fn rtc_session(local: ParticipantId, remote: ParticipantId) -> PeerSession {
    let (tx, _rx) = mpsc::unbounded_channel();
    let config = TransportConfig {
        ice_servers: Vec::new(),
    };
    let source = TransportSource::new(Arc::new(AudioRtcFactory), config, tx);
    PeerSession::open(SessionId::new(), local, remote, source, DEFAULT_OFFER_TIMEOUT)
        .await
        .expect("Failed to open session")
}

#[tokio::test]
async fn test_call_glare_on_webrtc_transports() {
    init_tracing();

    let (polite_id, impolite_id) = polite_then_impolite();
    let mut polite = rtc_session(polite_id, impolite_id).await;
    let mut impolite = rtc_session(impolite_id, polite_id).await;

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

    assert_eq!(impolite.incoming_offer(polite_offer).await.unwrap(), None);
    let Some(ClientSignal::CallAccepted { ans, .. }) =
        polite.incoming_offer(impolite_offer).await.unwrap()
    else {
        panic!("polite side must answer");
    };
    polite.confirm_sent();
    impolite.answer_received(ans).await.unwrap();

    assert_eq!(polite.state(), NegotiationState::Connected);
    assert_eq!(impolite.state(), NegotiationState::Connected);
    assert!(polite.has_local_description() && polite.has_remote_description());

    polite.disconnect().await;
    impolite.disconnect().await;
}

#[tokio::test]
async fn test_renegotiation_glare_on_webrtc_transports() {
    init_tracing();

    let (polite_id, impolite_id) = polite_then_impolite();
    let mut polite = rtc_session(polite_id, impolite_id).await;
    let mut impolite = rtc_session(impolite_id, polite_id).await;

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

    polite.disconnect().await;
    impolite.disconnect().await;
}
