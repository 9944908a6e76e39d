//! Frame sources for the motion loop.
//!
//! Every source yields RGB frames until it is exhausted. Exhaustion covers
//! both a clean end of stream and any failure; callers stop on the first
//! error and never retry.

pub mod directory;
pub mod ffmpeg;
pub mod mjpeg;

use motion_watch_common::config::CaptureConfig;
use motion_watch_common::frame::{Frame, FrameError};

use directory::DirectorySource;
use ffmpeg::FfmpegSource;
use mjpeg::MjpegSource;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("end of stream")]
    EndOfStream,
    #[error("unknown capture source '{0}', expected 'ffmpeg', 'mjpeg' or 'directory'")]
    UnknownSource(String),
    #[error("missing capture setting: {0}")]
    MissingSetting(&'static str),
    #[error("failed to spawn ffmpeg: {0}")]
    Spawn(std::io::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP connection failed: {0}")]
    HttpConnect(reqwest::Error),
    #[error("HTTP stream error: {0}")]
    HttpStream(reqwest::Error),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("bad frame: {0}")]
    Frame(#[from] FrameError),
}

#[allow(async_fn_in_trait)]
pub trait CaptureSource {
    /// Wait for the next frame. Any error means the source is exhausted.
    async fn next_frame(&mut self) -> Result<Frame, CaptureError>;

    /// Free the device, process or connection behind the source.
    async fn release(&mut self);
}

/// The source selected by configuration.
pub enum AnySource {
    Ffmpeg(FfmpegSource),
    Mjpeg(MjpegSource),
    Directory(DirectorySource),
}

impl AnySource {
    pub fn from_config(config: &CaptureConfig) -> Result<Self, CaptureError> {
        match config.source.as_str() {
            "ffmpeg" => Ok(Self::Ffmpeg(FfmpegSource::new(
                &config.input,
                config.format.as_deref(),
                config.width,
                config.height,
                config.fps,
            ))),
            "mjpeg" => {
                let url = config.url.as_deref().ok_or(CaptureError::MissingSetting("capture.url"))?;
                Ok(Self::Mjpeg(MjpegSource::new(url)))
            }
            "directory" => {
                let path = config
                    .path
                    .as_deref()
                    .ok_or(CaptureError::MissingSetting("capture.path"))?;
                Ok(Self::Directory(DirectorySource::new(path)))
            }
            other => Err(CaptureError::UnknownSource(other.to_string())),
        }
    }
}

impl CaptureSource for AnySource {
    async fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        match self {
            Self::Ffmpeg(s) => s.next_frame().await,
            Self::Mjpeg(s) => s.next_frame().await,
            Self::Directory(s) => s.next_frame().await,
        }
    }

    async fn release(&mut self) {
        match self {
            Self::Ffmpeg(s) => s.release().await,
            Self::Mjpeg(s) => s.release().await,
            Self::Directory(s) => s.release().await,
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
