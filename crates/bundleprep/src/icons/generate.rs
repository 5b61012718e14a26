//! The icon matrix generator.

use super::measure::{self, Measured};
use super::specs::{max_pixel_size, IconSpec, IOS_ICON_SPECS};
use super::SourceImage;
use crate::backup::BackupHandle;
use crate::report::{UnmetSpec, Warning};
use crate::transform::ToolChain;
use crate::Result;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// One produced (or revalidated) icon, with its measured metrics.
#[derive(Debug, Clone)]
pub struct GeneratedIcon {
    pub spec: IconSpec,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
    /// False when an existing valid output was kept as-is.
    pub regenerated: bool,
}

impl GeneratedIcon {
    /// Dimension- and alpha-exact against the owning spec.
    pub fn is_valid(&self, forbid_alpha: bool) -> bool {
        let px = self.spec.pixel_size();
        self.width == px && self.height == px && !(forbid_alpha && self.has_alpha)
    }
}

/// Outcome of one generation run over the full spec table.
///
/// Partial failure is data: an unmet spec never aborts the remaining
/// specs. The marketing icon is the exception and is flagged separately
/// because the pipeline treats it as a hard error.
#[derive(Debug)]
pub struct IconBatch {
    pub icons: Vec<GeneratedIcon>,
    pub unmet: Vec<UnmetSpec>,
    pub warnings: Vec<Warning>,
    /// True when the unmet list includes the marketing spec.
    pub marketing_unmet: bool,
}

/// Drives the transform chain against a fixed spec table.
pub struct IconMatrixGenerator<'a> {
    chain: &'a ToolChain,
    specs: &'static [IconSpec],
    forbid_alpha: bool,
}

impl<'a> IconMatrixGenerator<'a> {
    /// Generator for the iOS table. iOS forbids alpha across the set.
    pub fn ios(chain: &'a ToolChain) -> Self {
        Self {
            chain,
            specs: &IOS_ICON_SPECS,
            forbid_alpha: true,
        }
    }

    /// The table this generator satisfies.
    pub fn specs(&self) -> &'static [IconSpec] {
        self.specs
    }

    pub fn forbid_alpha(&self) -> bool {
        self.forbid_alpha
    }

    /// Produce the complete icon set under `out_dir`.
    ///
    /// Specs whose existing output already validates are skipped, except
    /// the marketing icon, which is always regenerated and re-measured.
    /// Each spec writes only its own file, so the fan-out is parallel.
    pub fn generate(&self, source: &SourceImage, out_dir: &Path) -> Result<IconBatch> {
        fs::create_dir_all(out_dir)?;

        let mut warnings = Vec::new();
        let required = max_pixel_size(self.specs);
        if source.width.min(source.height) < required {
            warnings.push(Warning::LowResolutionSource {
                width: source.width,
                height: source.height,
                required,
            });
        }

        let results: Vec<_> = self
            .specs
            .par_iter()
            .map(|spec| self.generate_one(source, out_dir, spec))
            .collect();

        let mut icons = Vec::new();
        let mut unmet = Vec::new();
        let mut marketing_unmet = false;

        for (spec, result) in self.specs.iter().zip(results) {
            match result {
                Ok(icon) => icons.push(icon),
                Err(u) => {
                    if spec.is_marketing() {
                        marketing_unmet = true;
                    }
                    unmet.push(u);
                }
            }
        }

        tracing::info!(
            generated = icons.iter().filter(|i| i.regenerated).count(),
            kept = icons.iter().filter(|i| !i.regenerated).count(),
            unmet = unmet.len(),
            "icon matrix complete"
        );

        Ok(IconBatch {
            icons,
            unmet,
            warnings,
            marketing_unmet,
        })
    }

    fn generate_one(
        &self,
        source: &SourceImage,
        out_dir: &Path,
        spec: &IconSpec,
    ) -> std::result::Result<GeneratedIcon, UnmetSpec> {
        let path = out_dir.join(spec.filename);
        let unmet = |reason: String| UnmetSpec {
            filename: spec.filename.to_string(),
            reason,
        };

        // Skip-if-valid fast path. The marketing icon never takes it.
        if !spec.is_marketing() && path.exists() {
            if let Ok(m) = measure::probe(&path) {
                if self.measured_ok(spec, m) {
                    return Ok(GeneratedIcon {
                        spec: *spec,
                        path,
                        width: m.width,
                        height: m.height,
                        has_alpha: m.has_alpha,
                        regenerated: false,
                    });
                }
            }
        }

        let px = spec.pixel_size();
        let bytes = self
            .chain
            .resize_flatten(&source.path, px, px, self.forbid_alpha)
            .map_err(|e| unmet(e.to_string()))?;

        let backup = BackupHandle::create(&path)
            .map_err(|e| unmet(format!("backup failed: {}", e)))?;

        if let Err(e) = fs::write(&path, &bytes) {
            let _ = backup.restore();
            return Err(unmet(format!("write failed: {}", e)));
        }

        // Re-measure the artifact that actually landed on disk.
        match measure::probe(&path) {
            Ok(m) if self.measured_ok(spec, m) => {
                let _ = backup.discard();
                Ok(GeneratedIcon {
                    spec: *spec,
                    path,
                    width: m.width,
                    height: m.height,
                    has_alpha: m.has_alpha,
                    regenerated: true,
                })
            }
            Ok(m) => {
                let _ = backup.restore();
                Err(unmet(format!(
                    "output measured {}x{} (alpha: {}), spec requires {}x{}",
                    m.width, m.height, m.has_alpha, px, px
                )))
            }
            Err(e) => {
                let _ = backup.restore();
                Err(unmet(format!("output unreadable: {}", e)))
            }
        }
    }

    fn measured_ok(&self, spec: &IconSpec, m: Measured) -> bool {
        let px = spec.pixel_size();
        m.width == px && m.height == px && !(self.forbid_alpha && m.has_alpha)
    }
}
