//! Pixel-metric measurement of raster files.

use crate::Result;
use std::path::Path;

/// Measured pixel metrics of a raster file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measured {
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
}

/// Decode a file far enough to learn its dimensions and whether it carries
/// an alpha channel. Channel presence is what matters, not whether any
/// pixel is actually transparent; store validation checks the same thing.
pub fn probe(path: impl AsRef<Path>) -> Result<Measured> {
    let img = image::open(path.as_ref())?;
    Ok(Measured {
        width: img.width(),
        height: img.height(),
        has_alpha: img.color().has_alpha(),
    })
}
