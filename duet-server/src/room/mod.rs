mod membership;
mod room_directory;

pub use membership::*;
pub use room_directory::*;
