use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{surface_slug, DisplayError, DisplaySink};

/// Writes each surface to `<dir>/<slug>.png`, replacing the previous image.
///
/// The new image goes to a temp file first and is renamed over the old one,
/// so a viewer polling the file never sees a half-written PNG.
pub struct DirectorySink {
    dir: PathBuf,
    created: bool,
    frames_written: u64,
}

impl DirectorySink {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            created: false,
            frames_written: 0,
        }
    }

    pub fn surface_path(&self, surface: &str) -> PathBuf {
        self.dir.join(format!("{}.png", surface_slug(surface)))
    }
}

impl DisplaySink for DirectorySink {
    async fn show(&mut self, surface: &str, image: &DynamicImage) -> Result<(), DisplayError> {
        let io_err = |source| DisplayError::Io {
            surface: surface.to_string(),
            source,
        };

        if !self.created {
            tokio::fs::create_dir_all(&self.dir).await.map_err(io_err)?;
            info!(dir = self.dir.display().to_string(), "writing surfaces as PNG");
            self.created = true;
        }

        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| DisplayError::Encode {
                surface: surface.to_string(),
                message: e.to_string(),
            })?;

        let path = self.surface_path(surface);
        let tmp = path.with_extension("png.tmp");
        tokio::fs::write(&tmp, &png).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err)?;

        self.frames_written += 1;
        debug!(surface, bytes = png.len(), "surface updated");
        Ok(())
    }

    async fn release(&mut self) {
        info!(
            dir = self.dir.display().to_string(),
            frames_written = self.frames_written,
            "directory sink released"
        );
    }
}
