use image::DynamicImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, error, info, warn};

use super::{surface_slug, DisplayError, DisplaySink};

/// One ffmpeg process per surface, fed raw rgb24 frames on stdin.
struct SurfaceEncoder {
    child: Child,
    stdin: ChildStdin,
    output_path: PathBuf,
    dimensions: (u32, u32),
    frame_count: u32,
}

impl SurfaceEncoder {
    fn start(output_path: PathBuf, dimensions: (u32, u32), fps: f64) -> std::io::Result<Self> {
        let size = format!("{}x{}", dimensions.0, dimensions.1);
        let fps_str = fps.to_string();

        let mut cmd = Command::new("ffmpeg");
        cmd.args([
            "-hide_banner",
            "-loglevel", "error",
            "-f", "rawvideo",
            "-pix_fmt", "rgb24",
            "-s", &size,
            "-r", &fps_str,
            "-i", "pipe:0",
            "-c:v", "libx264",
            "-pix_fmt", "yuv420p",
            "-movflags", "+faststart",
            "-y",
        ])
        .arg(&output_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        let stdin = child.stdin.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "could not get stdin handle")
        })?;

        debug!(
            size,
            fps,
            output = output_path.display().to_string(),
            "ffmpeg surface encoder started"
        );

        Ok(Self {
            child,
            stdin,
            output_path,
            dimensions,
            frame_count: 0,
        })
    }

    async fn push_frame(&mut self, rgb: &[u8]) -> std::io::Result<()> {
        self.stdin.write_all(rgb).await?;
        self.frame_count += 1;
        Ok(())
    }

    /// Close stdin and wait for ffmpeg to write the container trailer.
    async fn finish(self) {
        drop(self.stdin);
        match self.child.wait_with_output().await {
            Ok(output) if output.status.success() => {
                info!(
                    output = self.output_path.display().to_string(),
                    frame_count = self.frame_count,
                    "surface video finalized"
                );
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                error!(stderr = %stderr, "ffmpeg exited with error");
            }
            Err(e) => {
                error!(error = %e, "failed to wait for ffmpeg");
            }
        }
    }
}

/// Encodes every surface into `<dir>/<slug>.mp4`.
pub struct VideoSink {
    dir: PathBuf,
    fps: f64,
    encoders: HashMap<String, SurfaceEncoder>,
}

impl VideoSink {
    pub fn new(dir: &Path, fps: f64) -> Self {
        Self {
            dir: dir.to_path_buf(),
            fps,
            encoders: HashMap::new(),
        }
    }
}

impl DisplaySink for VideoSink {
    async fn show(&mut self, surface: &str, image: &DynamicImage) -> Result<(), DisplayError> {
        let io_err = |source| DisplayError::Io {
            surface: surface.to_string(),
            source,
        };
        let dimensions = (image.width(), image.height());

        if !self.encoders.contains_key(surface) {
            tokio::fs::create_dir_all(&self.dir).await.map_err(io_err)?;
            let path = self.dir.join(format!("{}.mp4", surface_slug(surface)));
            let encoder = SurfaceEncoder::start(path, dimensions, self.fps).map_err(io_err)?;
            self.encoders.insert(surface.to_string(), encoder);
        }
        let Some(encoder) = self.encoders.get_mut(surface) else {
            return Ok(());
        };

        if encoder.dimensions != dimensions {
            return Err(DisplayError::FrameSize {
                surface: surface.to_string(),
                expected: encoder.dimensions,
                got: dimensions,
            });
        }

        let rgb = image.to_rgb8();
        encoder.push_frame(rgb.as_raw()).await.map_err(io_err)
    }

    async fn release(&mut self) {
        if self.encoders.is_empty() {
            warn!("video sink released without any frames");
        }
        for (surface, encoder) in self.encoders.drain() {
            debug!(surface, "finalizing surface video");
            encoder.finish().await;
        }
    }
}
