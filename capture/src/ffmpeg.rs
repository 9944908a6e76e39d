use motion_watch_common::frame::Frame;
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::{now_ms, CaptureError, CaptureSource};

/// Reads raw rgb24 frames from an ffmpeg child process.
///
/// ffmpeg does the device access and decoding; this side only slices its
/// stdout into `width * height * 3` byte frames. The process is spawned on
/// the first request so a source that is never read never opens the device.
pub struct FfmpegSource {
    input: String,
    format: Option<String>,
    width: u32,
    height: u32,
    fps: f64,
    child: Option<(Child, ChildStdout)>,
    seq: u64,
    finished: bool,
}

impl FfmpegSource {
    pub fn new(input: &str, format: Option<&str>, width: u32, height: u32, fps: f64) -> Self {
        Self {
            input: input.to_string(),
            format: format.map(str::to_string),
            width,
            height,
            fps,
            child: None,
            seq: 0,
            finished: false,
        }
    }

    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// ffmpeg arguments: input options, input, then scaled rgb24 on stdout.
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["-hide_banner".into(), "-loglevel".into(), "error".into()];
        if let Some(format) = &self.format {
            args.extend(["-f".into(), format.clone()]);
            args.extend(["-framerate".into(), self.fps.to_string()]);
        }
        args.extend(["-i".into(), self.input.clone()]);
        args.extend([
            "-vf".into(),
            format!("scale={}:{}", self.width, self.height),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgb24".into(),
            "pipe:1".into(),
        ]);
        args
    }

    fn spawn(&self) -> Result<(Child, ChildStdout), CaptureError> {
        let mut child = Command::new("ffmpeg")
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(CaptureError::Spawn)?;
        let stdout = child.stdout.take().ok_or_else(|| {
            CaptureError::Spawn(std::io::Error::new(
                ErrorKind::BrokenPipe,
                "could not get stdout handle",
            ))
        })?;
        info!(
            input = self.input,
            width = self.width,
            height = self.height,
            "ffmpeg capture started"
        );
        Ok((child, stdout))
    }
}

impl CaptureSource for FfmpegSource {
    async fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        if self.finished {
            return Err(CaptureError::EndOfStream);
        }
        if self.child.is_none() {
            self.child = Some(self.spawn()?);
        }
        let frame_len = self.frame_len();
        let Some((_, stdout)) = self.child.as_mut() else {
            return Err(CaptureError::EndOfStream);
        };

        let mut buf = vec![0u8; frame_len];
        if let Err(e) = stdout.read_exact(&mut buf).await {
            self.finished = true;
            return Err(if e.kind() == ErrorKind::UnexpectedEof {
                debug!(frames = self.seq, "ffmpeg output ended");
                CaptureError::EndOfStream
            } else {
                CaptureError::Io(e)
            });
        }

        let seq = self.seq;
        self.seq += 1;
        Ok(Frame::from_rgb24(self.width, self.height, buf, now_ms(), seq)?)
    }

    async fn release(&mut self) {
        self.finished = true;
        if let Some((mut child, stdout)) = self.child.take() {
            drop(stdout);
            if let Err(e) = child.kill().await {
                warn!(error = %e, "failed to stop ffmpeg capture");
            }
            debug!(frames = self.seq, "ffmpeg capture released");
        }
    }
}
