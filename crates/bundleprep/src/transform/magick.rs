//! ImageMagick backend.

use super::{find_in_path, run_tool, TransformTool};
use crate::{Error, Result};
use std::path::Path;
use std::process::Command;

/// ImageMagick, via the v7 `magick` entry point or the legacy `convert`.
pub struct MagickTool;

impl MagickTool {
    fn binary() -> Option<&'static str> {
        if find_in_path("magick").is_some() {
            Some("magick")
        } else if find_in_path("convert").is_some() {
            Some("convert")
        } else {
            None
        }
    }
}

impl TransformTool for MagickTool {
    fn name(&self) -> &'static str {
        "imagemagick"
    }

    fn is_available(&self) -> bool {
        Self::binary().is_some()
    }

    fn resize_flatten(
        &self,
        source: &Path,
        width: u32,
        height: u32,
        forbid_alpha: bool,
    ) -> Result<Vec<u8>> {
        let binary = Self::binary().ok_or_else(|| {
            Error::TransformFailed("imagemagick binary disappeared from PATH".to_string())
        })?;

        let out = tempfile::Builder::new()
            .prefix("bundleprep-magick-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| Error::TransformFailed(format!("imagemagick temp file: {}", e)))?;

        let mut cmd = Command::new(binary);
        cmd.arg(source)
            .arg("-resize")
            .arg(format!("{}x{}!", width, height));

        if forbid_alpha {
            cmd.arg("-background")
                .arg("white")
                .arg("-alpha")
                .arg("remove")
                .arg("-alpha")
                .arg("off");
        }

        cmd.arg(out.path());

        run_tool(cmd, "imagemagick", out.path())
    }
}
