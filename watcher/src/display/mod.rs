pub mod directory;
pub mod video;

use image::DynamicImage;
use motion_watch_common::config::DisplayConfig;

use directory::DirectorySink;
use video::VideoSink;

pub const MOTION_SURFACE: &str = "Motion Detection";
pub const MASK_SURFACE: &str = "Difference";
pub const EFFECTS_SURFACE: &str = "Effects";

#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("unknown display sink '{0}', expected 'directory', 'video' or 'none'")]
    UnknownSink(String),
    #[error("failed to write surface {surface}: {source}")]
    Io {
        surface: String,
        source: std::io::Error,
    },
    #[error("failed to encode surface {surface}: {message}")]
    Encode { surface: String, message: String },
    #[error("surface {surface} is {expected:?}, got a {got:?} frame")]
    FrameSize {
        surface: String,
        expected: (u32, u32),
        got: (u32, u32),
    },
}

/// Where annotated frames and masks end up. Last write wins per surface.
#[allow(async_fn_in_trait)]
pub trait DisplaySink {
    async fn show(&mut self, surface: &str, image: &DynamicImage) -> Result<(), DisplayError>;

    /// Flush and close every surface. Called once when the loop stops.
    async fn release(&mut self);
}

/// Discards every frame.
#[derive(Debug, Default)]
pub struct NullSink;

impl DisplaySink for NullSink {
    async fn show(&mut self, _surface: &str, _image: &DynamicImage) -> Result<(), DisplayError> {
        Ok(())
    }

    async fn release(&mut self) {}
}

/// The sink selected by configuration.
pub enum AnySink {
    Directory(DirectorySink),
    Video(VideoSink),
    Null(NullSink),
}

impl AnySink {
    pub fn from_config(config: &DisplayConfig) -> Result<Self, DisplayError> {
        match config.sink.as_str() {
            "directory" => Ok(Self::Directory(DirectorySink::new(&config.path))),
            "video" => Ok(Self::Video(VideoSink::new(&config.path, config.fps))),
            "none" => Ok(Self::Null(NullSink)),
            other => Err(DisplayError::UnknownSink(other.to_string())),
        }
    }
}

impl DisplaySink for AnySink {
    async fn show(&mut self, surface: &str, image: &DynamicImage) -> Result<(), DisplayError> {
        match self {
            Self::Directory(s) => s.show(surface, image).await,
            Self::Video(s) => s.show(surface, image).await,
            Self::Null(s) => s.show(surface, image).await,
        }
    }

    async fn release(&mut self) {
        match self {
            Self::Directory(s) => s.release().await,
            Self::Video(s) => s.release().await,
            Self::Null(s) => s.release().await,
        }
    }
}

/// File-name form of a surface name: "Motion Detection" -> "motion-detection".
pub fn surface_slug(surface: &str) -> String {
    let mut slug = String::with_capacity(surface.len());
    for c in surface.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let trimmed = slug.trim_matches('-');
    if trimmed.is_empty() {
        "surface".to_string()
    } else {
        trimmed.to_string()
    }
}
