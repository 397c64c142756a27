/// Negotiation progress of one `PeerSession`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    Idle,
    OfferCreated,
    OfferSent,
    ReceivingOffer,
    AnswerSent,
    Connected,
    Renegotiating,
    Closed,
}

impl NegotiationState {
    pub fn is_closed(self) -> bool {
        self == NegotiationState::Closed
    }
}
