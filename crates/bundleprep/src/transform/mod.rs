//! Image transform tool adapter.
//!
//! Wraps one or more raster-resize backends behind a uniform
//! resize/flatten interface with ordered fallback. The chain consults each
//! backend at most once per request; the first one whose output decodes,
//! matches the target dimensions, and satisfies the alpha constraint wins.

mod image_backend;
mod magick;
mod sips;

pub use image_backend::ImageBackend;
pub use magick::MagickTool;
pub use sips::SipsTool;

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// A single backing resize tool.
///
/// Implementations return raw encoded image bytes; the chain re-validates
/// them before accepting, so a backend that cannot honor `forbid_alpha`
/// (e.g. `sips`) may still participate and simply loses the request to the
/// next tool in order.
pub trait TransformTool: Send + Sync {
    /// Short tool name for diagnostics.
    fn name(&self) -> &'static str;

    /// Whether the backing tool is installed. Must not invoke the tool.
    fn is_available(&self) -> bool;

    /// Resize `source` to exactly `width`x`height`, flattening the alpha
    /// channel onto opaque white when `forbid_alpha` is set, and return the
    /// encoded output bytes.
    fn resize_flatten(
        &self,
        source: &Path,
        width: u32,
        height: u32,
        forbid_alpha: bool,
    ) -> Result<Vec<u8>>;
}

/// Ordered strategy list of transform backends.
///
/// # Example
///
/// ```no_run
/// use bundleprep::transform::ToolChain;
///
/// let chain = ToolChain::platform_default();
/// let bytes = chain.resize_flatten("icon.png".as_ref(), 120, 120, true)?;
/// # Ok::<(), bundleprep::Error>(())
/// ```
pub struct ToolChain {
    tools: Vec<Box<dyn TransformTool>>,
}

impl ToolChain {
    /// Chain with an explicit tool order.
    pub fn new(tools: Vec<Box<dyn TransformTool>>) -> Self {
        Self { tools }
    }

    /// Default order: in-process decoder first, then the platform scaler,
    /// then ImageMagick. The in-process backend handles every common raster
    /// format; the external tools cover inputs it cannot decode.
    pub fn platform_default() -> Self {
        Self::new(vec![
            Box::new(ImageBackend),
            Box::new(SipsTool),
            Box::new(MagickTool),
        ])
    }

    /// Resize and flatten through the chain.
    ///
    /// # Errors
    ///
    /// - [`Error::ToolUnavailable`] when no backend reports itself installed
    /// - [`Error::TransformFailed`] when every available backend ran and
    ///   none produced output passing validation; the message carries the
    ///   per-tool reasons in chain order
    pub fn resize_flatten(
        &self,
        source: &Path,
        width: u32,
        height: u32,
        forbid_alpha: bool,
    ) -> Result<Vec<u8>> {
        let mut failures: Vec<String> = Vec::new();
        let mut any_available = false;

        for tool in &self.tools {
            if !tool.is_available() {
                continue;
            }
            any_available = true;

            match tool.resize_flatten(source, width, height, forbid_alpha) {
                Ok(bytes) => match validate_output(&bytes, width, height, forbid_alpha) {
                    Ok(()) => return Ok(bytes),
                    Err(reason) => failures.push(format!("{}: {}", tool.name(), reason)),
                },
                Err(e) => failures.push(format!("{}: {}", tool.name(), e)),
            }
        }

        if !any_available {
            let tried: Vec<&str> = self.tools.iter().map(|t| t.name()).collect();
            return Err(Error::ToolUnavailable(tried.join(", ")));
        }

        Err(Error::TransformFailed(failures.join("; ")))
    }
}

/// Check that tool output honors the request contract.
fn validate_output(
    bytes: &[u8],
    width: u32,
    height: u32,
    forbid_alpha: bool,
) -> std::result::Result<(), String> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| format!("output not decodable: {}", e))?;

    if img.width() != width || img.height() != height {
        return Err(format!(
            "expected {}x{}, got {}x{}",
            width,
            height,
            img.width(),
            img.height()
        ));
    }

    if forbid_alpha && img.color().has_alpha() {
        return Err("output carries an alpha channel".to_string());
    }

    Ok(())
}

/// Locate an executable on PATH without invoking it.
pub(crate) fn find_in_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Run an external tool command and read back the file it was asked to
/// write. Exit status and stderr are folded into the failure message.
pub(crate) fn run_tool(mut cmd: Command, tool: &str, output: &Path) -> Result<Vec<u8>> {
    let out = cmd
        .output()
        .map_err(|e| Error::TransformFailed(format!("{} failed to start: {}", tool, e)))?;

    if !out.status.success() {
        return Err(Error::TransformFailed(format!(
            "{} exited with {}: {}",
            tool,
            out.status,
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    Ok(std::fs::read(output)?)
}
