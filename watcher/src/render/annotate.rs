use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use super::glyphs::{draw_text, text_width, GLYPH_HEIGHT};
use crate::detect::regions::Region;

pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const LABEL: &str = "MOTION";
const THICKNESS: u32 = 2;
const LABEL_GAP: i32 = 10;

/// Copy of `frame` with a box and label drawn at every region.
pub fn annotate(frame: &RgbImage, regions: &[Region]) -> RgbImage {
    let mut out = frame.clone();
    for region in regions {
        draw_box(&mut out, region);
        let label_y = (region.y as i32 - LABEL_GAP).max(0);
        let label_y = label_y.min(out.height() as i32 - GLYPH_HEIGHT as i32);
        let label_x = (region.x as i32).min(out.width() as i32 - text_width(LABEL, 1) as i32);
        draw_text(&mut out, label_x.max(0), label_y, 1, BOX_COLOR, LABEL);
    }
    out
}

fn draw_box(img: &mut RgbImage, region: &Region) {
    for inset in 0..THICKNESS {
        let w = region.width.saturating_sub(2 * inset);
        let h = region.height.saturating_sub(2 * inset);
        if w == 0 || h == 0 {
            break;
        }
        let rect = Rect::at((region.x + inset) as i32, (region.y + inset) as i32).of_size(w, h);
        draw_hollow_rect_mut(img, rect, BOX_COLOR);
    }
}
