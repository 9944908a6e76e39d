pub mod annotate;
pub mod effects;
pub mod glyphs;
