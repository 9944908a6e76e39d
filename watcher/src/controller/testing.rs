use image::{DynamicImage, Rgb, RgbImage};
use motion_watch_capture::{CaptureError, CaptureSource};
use motion_watch_common::frame::Frame;
use std::collections::VecDeque;

use crate::display::{DisplayError, DisplaySink};
use crate::keys::{KeyCode, KeySource};

pub fn solid_frame(w: u32, h: u32, value: u8) -> RgbImage {
    RgbImage::from_pixel(w, h, Rgb([value, value, value]))
}

pub fn block_frame(w: u32, h: u32, bx: u32, by: u32, side: u32, value: u8) -> RgbImage {
    RgbImage::from_fn(w, h, |x, y| {
        if x >= bx && x < bx + side && y >= by && y < by + side {
            Rgb([value, value, value])
        } else {
            Rgb([0, 0, 0])
        }
    })
}

/// Yields the given images in order, then reports end of stream.
pub struct ScriptedCapture {
    frames: VecDeque<RgbImage>,
    seq: u64,
    pub releases: u32,
}

impl ScriptedCapture {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self {
            frames: frames.into(),
            seq: 0,
            releases: 0,
        }
    }
}

impl CaptureSource for ScriptedCapture {
    async fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        let image = self.frames.pop_front().ok_or(CaptureError::EndOfStream)?;
        let seq = self.seq;
        self.seq += 1;
        Ok(Frame::new(image, 1708300000000 + seq as i64 * 33, seq))
    }

    async fn release(&mut self) {
        self.releases += 1;
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub shown: Vec<(String, DynamicImage)>,
    pub releases: u32,
}

impl RecordingSink {
    pub fn last(&self, surface: &str) -> Option<&DynamicImage> {
        self.shown
            .iter()
            .rev()
            .find(|(name, _)| name == surface)
            .map(|(_, image)| image)
    }
}

impl DisplaySink for RecordingSink {
    async fn show(&mut self, surface: &str, image: &DynamicImage) -> Result<(), DisplayError> {
        self.shown.push((surface.to_string(), image.clone()));
        Ok(())
    }

    async fn release(&mut self) {
        self.releases += 1;
    }
}

/// One scripted answer per poll; `None` once the script runs out.
pub struct ScriptedKeys {
    script: VecDeque<Option<char>>,
}

impl ScriptedKeys {
    pub fn new(script: Vec<Option<char>>) -> Self {
        Self {
            script: script.into(),
        }
    }

    pub fn none() -> Self {
        Self::new(Vec::new())
    }
}

impl KeySource for ScriptedKeys {
    fn poll_key(&mut self) -> Option<KeyCode> {
        self.script.pop_front().flatten().map(KeyCode)
    }
}
