use duet_core::{ClientSignal, IceCandidate, ParticipantId, SessionDescription};
use duet_peer::{NegotiationState, TransportEvent};

use crate::integration::init_tracing;
use crate::integration::negotiation_tests::mock_session;

fn candidate(n: u16) -> IceCandidate {
    IceCandidate {
        candidate: format!("candidate:{n} 1 udp 2130706431 10.0.0.{n} 5000 typ host"),
        sdp_mid: Some("0".to_owned()),
        sdp_m_line_index: Some(0),
    }
}

#[tokio::test]
async fn test_early_candidates_are_applied_after_remote_description() {
    init_tracing();

    let remote = ParticipantId::new();
    let (mut session, transports, _events) = mock_session("bob", ParticipantId::new(), remote).await;

    session.remote_candidate(candidate(1)).await.unwrap();
    session.remote_candidate(candidate(2)).await.unwrap();
    assert_eq!(session.pending_candidate_count(), 2);
    assert!(transports.last().record().applied_candidates.is_empty());

    session
        .incoming_offer(SessionDescription::offer("offer"))
        .await
        .unwrap();

    assert_eq!(session.pending_candidate_count(), 0);
    assert_eq!(
        transports.last().record().applied_candidates,
        vec![candidate(1), candidate(2)]
    );

    session.remote_candidate(candidate(3)).await.unwrap();
    assert_eq!(transports.last().record().applied_candidates.len(), 3);
}

#[tokio::test]
async fn test_local_candidates_are_addressed_to_remote() {
    init_tracing();

    let remote = ParticipantId::new();
    let (mut session, _transports, mut events) =
        mock_session("alice", ParticipantId::new(), remote).await;
    session.initiate_call().await.unwrap();

    let Ok(TransportEvent::CandidateGenerated(session_id, gathered)) = events.try_recv() else {
        panic!("setting the local offer must gather a candidate");
    };
    assert_eq!(session_id, session.id());

    assert_eq!(
        session.local_candidate(gathered.clone()),
        Some(ClientSignal::IceCandidate {
            to: remote,
            candidate: gathered.clone(),
        })
    );

    session.disconnect().await;
    assert_eq!(session.state(), NegotiationState::Closed);
    assert_eq!(session.local_candidate(gathered), None);
    assert!(session.remote_candidate(candidate(9)).await.is_err());
}
