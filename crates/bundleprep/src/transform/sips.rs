//! `sips` backend (the scriptable image processing system shipped with
//! macOS).

use super::{find_in_path, run_tool, TransformTool};
use crate::{Error, Result};
use std::path::Path;
use std::process::Command;

/// Platform scaler. `sips` cannot strip an alpha channel, so when the
/// request forbids alpha the chain's validation decides whether its output
/// is acceptable.
pub struct SipsTool;

impl TransformTool for SipsTool {
    fn name(&self) -> &'static str {
        "sips"
    }

    fn is_available(&self) -> bool {
        find_in_path("sips").is_some()
    }

    fn resize_flatten(
        &self,
        source: &Path,
        width: u32,
        height: u32,
        _forbid_alpha: bool,
    ) -> Result<Vec<u8>> {
        let out = tempfile::Builder::new()
            .prefix("bundleprep-sips-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| Error::TransformFailed(format!("sips temp file: {}", e)))?;

        let mut cmd = Command::new("sips");
        cmd.arg("-s")
            .arg("format")
            .arg("png")
            .arg("-z")
            .arg(height.to_string())
            .arg(width.to_string())
            .arg(source)
            .arg("--out")
            .arg(out.path());

        run_tool(cmd, "sips", out.path())
    }
}
