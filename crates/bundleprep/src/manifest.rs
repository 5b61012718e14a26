//! Icon catalog manifest synthesis.
//!
//! The manifest is built purely from the platform spec table, never by
//! scanning disk, so it always reflects the contract regardless of which
//! specs actually generated. Key names are part of the wire contract; the
//! downstream compiler and store validator parse this file directly.

use crate::icons::{IconBatch, IconSpec, IOS_ICON_SPECS};
use crate::report::{UnmetSpec, Warning};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Wire value of the manifest format-version block.
pub const MANIFEST_VERSION: u32 = 1;
/// Author string the downstream tooling expects.
pub const MANIFEST_AUTHOR: &str = "xcode";

/// One catalog entry naming a generated icon file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    pub size: String,
    pub idiom: String,
    pub filename: String,
    pub scale: String,
}

/// Format-version block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestInfo {
    pub version: u32,
    pub author: String,
}

/// The structured catalog document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    pub images: Vec<ManifestEntry>,
    pub info: ManifestInfo,
}

impl Manifest {
    /// Build the canonical manifest for a spec table.
    pub fn from_specs(specs: &[IconSpec]) -> Self {
        Self {
            images: specs
                .iter()
                .map(|s| ManifestEntry {
                    size: s.size_label(),
                    idiom: s.idiom.as_str().to_string(),
                    filename: s.filename.to_string(),
                    scale: s.scale_label(),
                })
                .collect(),
            info: ManifestInfo {
                version: MANIFEST_VERSION,
                author: MANIFEST_AUTHOR.to_string(),
            },
        }
    }

    /// Structural validation beyond what parsing enforces.
    fn validate(&self) -> std::result::Result<(), String> {
        if self.info.version != MANIFEST_VERSION {
            return Err(format!(
                "unsupported format version {}",
                self.info.version
            ));
        }
        if self.images.is_empty() {
            return Err("empty image list".to_string());
        }
        if self.images.iter().any(|e| e.filename.is_empty()) {
            return Err("entry with empty filename".to_string());
        }
        Ok(())
    }

    /// Parse and structurally validate an on-disk manifest.
    ///
    /// # Errors
    ///
    /// [`Error::StructuralCorruption`] for unparseable or invalid
    /// documents; plain I/O errors pass through unchanged.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read(path.as_ref())?;
        let manifest: Manifest =
            serde_json::from_slice(&data).map_err(|e| Error::StructuralCorruption {
                artifact: "icon manifest".to_string(),
                reason: e.to_string(),
            })?;
        manifest
            .validate()
            .map_err(|reason| Error::StructuralCorruption {
                artifact: "icon manifest".to_string(),
                reason,
            })?;
        Ok(manifest)
    }

    /// Serialize to the pretty-printed JSON wire form.
    pub fn to_json(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }

    /// Write to disk, creating parent directories as needed.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Builds and repairs the catalog manifest for one spec table.
pub struct ManifestSynthesizer {
    specs: &'static [IconSpec],
}

impl ManifestSynthesizer {
    /// Synthesizer for the iOS table.
    pub fn ios() -> Self {
        Self {
            specs: &IOS_ICON_SPECS,
        }
    }

    /// The canonical manifest for this table.
    pub fn synthesize(&self) -> Manifest {
        Manifest::from_specs(self.specs)
    }

    /// Make the on-disk manifest canonical.
    ///
    /// A manifest that parses and already equals the canonical document is
    /// left untouched. A corrupt one is replaced wholesale, never patched;
    /// partial repair of a malformed document is not attempted. The
    /// replacement is recorded as a warning.
    pub fn ensure(&self, path: &Path, warnings: &mut Vec<Warning>) -> Result<Manifest> {
        let canonical = self.synthesize();

        if path.exists() {
            match Manifest::load(path) {
                Ok(existing) if existing == canonical => return Ok(canonical),
                Ok(_) => {
                    tracing::debug!("manifest diverged from spec table, rewriting");
                }
                Err(Error::StructuralCorruption { reason, .. }) => {
                    warnings.push(Warning::ArtifactReplaced {
                        artifact: "icon manifest".to_string(),
                        reason,
                    });
                }
                Err(e) => return Err(e),
            }
        }

        canonical.write(path)?;
        Ok(canonical)
    }

    /// Cross-check the bijection between manifest entries and valid
    /// generated icons.
    ///
    /// Entries without a valid icon come back as blocking unmet specs,
    /// carrying the generator's failure reason when one exists. Icon files
    /// on disk that no entry names are surfaced as warnings.
    pub fn cross_check(
        &self,
        manifest: &Manifest,
        batch: &IconBatch,
        iconset_dir: &Path,
        warnings: &mut Vec<Warning>,
    ) -> Vec<UnmetSpec> {
        let valid: HashSet<&str> = batch
            .icons
            .iter()
            .map(|i| i.spec.filename)
            .collect();

        let mut unmet = Vec::new();
        for entry in &manifest.images {
            if valid.contains(entry.filename.as_str()) {
                continue;
            }
            let reason = batch
                .unmet
                .iter()
                .find(|u| u.filename == entry.filename)
                .map(|u| u.reason.clone())
                .unwrap_or_else(|| "no valid generated icon on disk".to_string());
            unmet.push(UnmetSpec {
                filename: entry.filename.clone(),
                reason,
            });
        }

        let named: HashSet<&str> = manifest
            .images
            .iter()
            .map(|e| e.filename.as_str())
            .collect();

        for entry in WalkDir::new(iconset_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(".png") || named.contains(name) {
                continue;
            }
            warnings.push(Warning::StrayIcon {
                filename: name.to_string(),
            });
        }

        unmet
    }
}
