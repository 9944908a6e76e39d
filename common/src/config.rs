use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub capture: CaptureConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// "motion" or "effects".
    #[serde(default = "default_pipeline_mode")]
    pub mode: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// "ffmpeg", "mjpeg" or "directory".
    #[serde(default = "default_capture_source")]
    pub source: String,
    /// ffmpeg input: device node, file or URL.
    #[serde(default = "default_capture_input")]
    pub input: String,
    /// Optional ffmpeg demuxer, e.g. "v4l2" or "avfoundation".
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: f64,
    /// MJPEG stream URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Directory of still images.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Side of the square Gaussian kernel. Must be odd; 1 disables smoothing.
    #[serde(default = "default_blur_kernel")]
    pub blur_kernel: u32,
    /// 0 derives sigma from the kernel size.
    #[serde(default)]
    pub blur_sigma: f32,
    /// A pixel is "changed" when its difference is strictly greater than this.
    #[serde(default = "default_threshold")]
    pub threshold: u8,
    /// A region is kept when its area is strictly greater than this.
    #[serde(default = "default_min_area")]
    pub min_area: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// "directory", "video" or "none".
    #[serde(default = "default_display_sink")]
    pub sink: String,
    #[serde(default = "default_display_path")]
    pub path: PathBuf,
    /// Frame rate written into encoded surfaces.
    #[serde(default = "default_fps")]
    pub fps: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: default_pipeline_mode(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            blur_kernel: default_blur_kernel(),
            blur_sigma: 0.0,
            threshold: default_threshold(),
            min_area: default_min_area(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            sink: default_display_sink(),
            path: default_display_path(),
            fps: default_fps(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let kernel = self.detection.blur_kernel;
        if kernel == 0 || kernel % 2 == 0 {
            return Err(ConfigError::Invalid(format!(
                "detection.blur_kernel must be odd and positive, got {kernel}"
            )));
        }
        if self.detection.blur_sigma < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "detection.blur_sigma must not be negative, got {}",
                self.detection.blur_sigma
            )));
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "capture dimensions must be non-zero, got {}x{}",
                self.capture.width, self.capture.height
            )));
        }
        if self.capture.fps <= 0.0 || self.display.fps <= 0.0 {
            return Err(ConfigError::Invalid("fps must be positive".into()));
        }
        match self.capture.source.as_str() {
            "mjpeg" if self.capture.url.is_none() => {
                Err(ConfigError::Invalid("capture.url is required for mjpeg".into()))
            }
            "directory" if self.capture.path.is_none() => Err(ConfigError::Invalid(
                "capture.path is required for directory".into(),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_pipeline_mode() -> String {
    "motion".into()
}
fn default_capture_source() -> String {
    "ffmpeg".into()
}
fn default_capture_input() -> String {
    "/dev/video0".into()
}
fn default_width() -> u32 {
    640
}
fn default_height() -> u32 {
    480
}
fn default_fps() -> f64 {
    30.0
}
fn default_blur_kernel() -> u32 {
    21
}
fn default_threshold() -> u8 {
    25
}
fn default_min_area() -> u32 {
    1000
}
fn default_display_sink() -> String {
    "directory".into()
}
fn default_display_path() -> PathBuf {
    PathBuf::from("surfaces")
}
fn default_log_level() -> String {
    "info".into()
}
