use crate::error::MediaError;
use crate::media::local_media::{LocalMedia, LocalTrack, TrackKind};
use async_trait::async_trait;
use tracing::info;

/// Local capture devices.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self) -> Result<LocalMedia, MediaError>;
}

/// Produces sample-fed audio/video tracks for a headless participant.
#[derive(Debug, Clone)]
pub struct RtcMediaSource {
    pub stream_id: String,
    pub audio: bool,
    pub video: bool,
}

impl RtcMediaSource {
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            audio: true,
            video: true,
        }
    }
}

#[async_trait]
impl MediaSource for RtcMediaSource {
    async fn acquire(&self) -> Result<LocalMedia, MediaError> {
        let mut tracks = Vec::new();
        if self.audio {
            tracks.push(LocalTrack::new(TrackKind::Audio, &self.stream_id));
        }
        if self.video {
            tracks.push(LocalTrack::new(TrackKind::Video, &self.stream_id));
        }

        if tracks.is_empty() {
            return Err(MediaError::AcquisitionFailed(
                "neither audio nor video was requested".to_owned(),
            ));
        }

        info!("Acquired {} local track(s) for stream '{}'", tracks.len(), self.stream_id);
        Ok(LocalMedia::new(tracks))
    }
}
