pub use duet_core::model::{ParticipantId, RoomId};

pub mod model {
    pub use duet_core::model::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use duet_server::*;
}

#[cfg(feature = "peer")]
pub mod peer {
    pub use duet_peer::*;
}
