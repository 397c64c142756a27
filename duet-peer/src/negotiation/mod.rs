mod peer_session;
mod state;

pub use peer_session::*;
pub use state::*;
