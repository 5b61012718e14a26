//! In-process transform backend built on the `image` crate.

use super::TransformTool;
use crate::Result;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage, RgbaImage};
use std::io::Cursor;
use std::path::Path;

/// Decodes, flattens, and resizes entirely in process. Always available.
pub struct ImageBackend;

impl TransformTool for ImageBackend {
    fn name(&self) -> &'static str {
        "image-rs"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn resize_flatten(
        &self,
        source: &Path,
        width: u32,
        height: u32,
        forbid_alpha: bool,
    ) -> Result<Vec<u8>> {
        let img = image::open(source)?;

        // Flatten before resizing so the filter never samples transparent
        // texels into visible ones.
        let out = if forbid_alpha {
            let flat = flatten_onto_white(&img.to_rgba8());
            DynamicImage::ImageRgb8(image::imageops::resize(
                &flat,
                width,
                height,
                FilterType::Lanczos3,
            ))
        } else {
            img.resize_exact(width, height, FilterType::Lanczos3)
        };

        let mut buf = Cursor::new(Vec::new());
        out.write_to(&mut buf, image::ImageFormat::Png)?;
        Ok(buf.into_inner())
    }
}

/// Composite onto an opaque white background, discarding the alpha channel.
fn flatten_onto_white(rgba: &RgbaImage) -> RgbImage {
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, px) in rgba.enumerate_pixels() {
        let a = px[3] as u32;
        let blend = |c: u8| (((c as u32 * a) + 255 * (255 - a)) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(px[0]), blend(px[1]), blend(px[2])]));
    }
    out
}
