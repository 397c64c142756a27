mod participant;
mod room;
mod session;
mod signaling;

pub use participant::ParticipantId;
pub use room::RoomId;
pub use session::{IceCandidate, SdpKind, SessionDescription, SessionId};
pub use signaling::{ClientSignal, IceServerConfig, RelaySignal};
