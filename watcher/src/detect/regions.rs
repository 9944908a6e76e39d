use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use super::change::{CHANGED, UNCHANGED};

/// One connected region of changed pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Number of changed pixels in the region.
    pub area: u32,
}

#[derive(Debug, Clone, Copy)]
struct Accumulator {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    area: u32,
    outermost: bool,
}

impl Accumulator {
    fn new(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            area: 0,
            outermost: false,
        }
    }

    fn add(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.area += 1;
    }

    fn region(&self) -> Region {
        Region {
            x: self.min_x,
            y: self.min_y,
            width: self.max_x - self.min_x + 1,
            height: self.max_y - self.min_y + 1,
            area: self.area,
        }
    }
}

/// Extract the outermost 8-connected regions of a binary mask.
///
/// A region sitting inside a hole of another region is not reported.
/// Changed pixels are grouped with 8-connectivity, so the background they
/// enclose is grouped with 4-connectivity.
pub fn extract(mask: &GrayImage) -> Vec<Region> {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let fg = connected_components(mask, Connectivity::Eight, Luma([UNCHANGED]));
    let bg = connected_components(mask, Connectivity::Four, Luma([CHANGED]));

    // Background labels reachable from the image border.
    let max_bg = bg.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
    let mut outside = vec![false; max_bg + 1];
    for x in 0..width {
        outside[bg.get_pixel(x, 0)[0] as usize] = true;
        outside[bg.get_pixel(x, height - 1)[0] as usize] = true;
    }
    for y in 0..height {
        outside[bg.get_pixel(0, y)[0] as usize] = true;
        outside[bg.get_pixel(width - 1, y)[0] as usize] = true;
    }
    // Label 0 marks changed pixels in the background labelling.
    outside[0] = false;

    let max_fg = fg.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
    let mut acc: Vec<Option<Accumulator>> = vec![None; max_fg + 1];

    for (x, y, label) in fg.enumerate_pixels() {
        let label = label[0] as usize;
        if label == 0 {
            continue;
        }
        let entry = acc[label].get_or_insert_with(|| Accumulator::new(x, y));
        entry.add(x, y);

        if entry.outermost {
            continue;
        }
        let on_border = x == 0 || y == 0 || x == width - 1 || y == height - 1;
        let touches_outside = on_border
            || [(0i64, -1i64), (0, 1), (-1, 0), (1, 0)].iter().any(|&(dx, dy)| {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                outside[bg.get_pixel(nx as u32, ny as u32)[0] as usize]
            });
        if touches_outside {
            entry.outermost = true;
        }
    }

    acc.into_iter()
        .flatten()
        .filter(|a| a.outermost)
        .map(|a| a.region())
        .collect()
}

/// Keep regions whose area is strictly greater than `min_area`.
pub fn filter_by_area(regions: Vec<Region>, min_area: u32) -> Vec<Region> {
    regions.into_iter().filter(|r| r.area > min_area).collect()
}
