//! Icon matrix generation.
//!
//! Drives the transform tool chain against the platform spec table to
//! produce a complete icon set from one source raster.

pub mod measure;
mod generate;
mod specs;

pub use generate::{GeneratedIcon, IconBatch, IconMatrixGenerator};
pub use measure::Measured;
pub use specs::{max_pixel_size, IconSpec, Idiom, ICON_TABLE_VERSION, IOS_ICON_SPECS};

use crate::Result;
use std::path::{Path, PathBuf};

/// The one source raster every icon is derived from.
///
/// Immutable once read; metrics are captured at open time.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
}

impl SourceImage {
    /// Read and validate the source raster's pixel metrics.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let m = measure::probe(&path)?;
        Ok(Self {
            path,
            width: m.width,
            height: m.height,
            has_alpha: m.has_alpha,
        })
    }
}
