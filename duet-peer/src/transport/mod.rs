mod media_transport;
mod rtc_transport;
mod transport_config;
mod transport_event;

pub use media_transport::*;
pub use rtc_transport::*;
pub use transport_config::*;
pub use transport_event::*;
