mod call_command;
mod call_event;
mod coordinator;
mod signal_sink;

pub use call_command::*;
pub use call_event::*;
pub use coordinator::*;
pub use signal_sink::*;
