use image::{DynamicImage, Rgb, RgbImage};
use imageproc::edges::canny;

use super::glyphs::draw_text;
use crate::detect::normalize::{luma, Normalizer};
use crate::keys::KeyCode;

const BLUR_KERNEL: u32 = 21;
const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;
const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    Grayscale,
    Blur,
    Edges,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Select(Effect),
    Quit,
    Ignore,
}

/// Map a key press to what the live view should do.
pub fn dispatch(key: KeyCode) -> KeyAction {
    if key.is_quit() {
        return KeyAction::Quit;
    }
    match key.0.to_ascii_lowercase() {
        'g' => KeyAction::Select(Effect::Grayscale),
        'b' => KeyAction::Select(Effect::Blur),
        'e' => KeyAction::Select(Effect::Edges),
        'n' => KeyAction::Select(Effect::None),
        _ => KeyAction::Ignore,
    }
}

impl Effect {
    pub fn label(self) -> &'static str {
        match self {
            Effect::None => "",
            Effect::Grayscale => "GRAY",
            Effect::Blur => "BLUR",
            Effect::Edges => "EDGES",
        }
    }
}

/// Applies the selected effect to colour frames.
pub struct EffectRenderer {
    blur: Normalizer,
}

impl Default for EffectRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectRenderer {
    pub fn new() -> Self {
        Self {
            blur: Normalizer::new(BLUR_KERNEL, 0.0),
        }
    }

    pub fn apply(&self, effect: Effect, frame: &RgbImage) -> RgbImage {
        let mut out = match effect {
            Effect::None => return frame.clone(),
            Effect::Grayscale => DynamicImage::ImageLuma8(luma(frame)).to_rgb8(),
            Effect::Blur => self.blur.blur_rgb(frame),
            Effect::Edges => {
                let edges = canny(&luma(frame), CANNY_LOW, CANNY_HIGH);
                DynamicImage::ImageLuma8(edges).to_rgb8()
            }
        };
        draw_text(&mut out, 4, 4, 2, LABEL_COLOR, effect.label());
        out
    }
}
