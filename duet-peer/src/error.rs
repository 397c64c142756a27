use crate::negotiation::NegotiationState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NegotiationError {
    /// The session is in a state that does not accept `event`. Ignored by callers.
    #[error("'{event}' is not accepted in state {state:?}")]
    InvalidStateTransition {
        state: NegotiationState,
        event: &'static str,
    },

    /// A description could not be created or applied. The session is closed.
    #[error("description failed during '{event}': {reason}")]
    DescriptionApplyFailed { event: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("local media unavailable: {0}")]
    AcquisitionFailed(String),
}

/// Failures of locally initiated call operations.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("no remote participant known yet")]
    NoRemote,

    #[error("a call with {0} is already in progress")]
    Busy(duet_core::ParticipantId),

    #[error("no call to send streams into")]
    NotInCall,

    #[error("no local media acquired")]
    NoLocalMedia,

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    #[error("failed to create media transport: {0:#}")]
    Transport(#[from] anyhow::Error),
}
