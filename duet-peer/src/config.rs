use crate::transport::TransportConfig;
use std::time::Duration;

pub const DEFAULT_OFFER_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-participant call settings.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// How long an offer may stay unanswered before it is abandoned.
    pub offer_timeout: Duration,
    /// Attach local tracks as soon as an incoming call is answered, not only on the caller side.
    pub auto_send_streams: bool,
    /// Initial transport settings; replaced by the ICE servers the relay announces.
    pub transport: TransportConfig,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            offer_timeout: DEFAULT_OFFER_TIMEOUT,
            auto_send_streams: false,
            transport: TransportConfig::default(),
        }
    }
}
