pub mod call;
pub mod config;
pub mod error;
pub mod media;
pub mod negotiation;
pub mod transport;

pub use call::{CallCommand, CallCoordinator, CallEvent, ChannelSignalSink, SignalSink};
pub use config::{DEFAULT_OFFER_TIMEOUT, PeerConfig};
pub use error::{CallError, MediaError, NegotiationError};
pub use media::{LocalMedia, LocalTrack, MediaSource, RtcMediaSource, TrackKind};
pub use negotiation::{NegotiationState, OfferExpiry, PeerSession};
pub use transport::{
    MediaTransport, RtcTransport, RtcTransportFactory, TransportConfig, TransportEvent,
    TransportFactory, TransportSource, TransportState,
};
