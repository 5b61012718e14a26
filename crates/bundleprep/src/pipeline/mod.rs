//! Pipeline orchestration.
//!
//! One control thread walks the components in dependency order: icons →
//! manifest → descriptor → credentials. Parallelism exists only inside the
//! icon matrix generator. Every mutation of a persisted artifact is
//! bracketed by backup-before-mutate and verify-after-mutate; verified
//! backups are retained until the run completes so a late fatal error
//! rolls the whole tree back to its pre-run state.

use crate::backup::BackupHandle;
use crate::context::BuildContext;
use crate::descriptor::{DescriptorDocument, DescriptorPatcher};
use crate::icons::{IconMatrixGenerator, SourceImage};
use crate::manifest::{Manifest, ManifestSynthesizer};
use crate::report::{ReadinessReport, ResolvedIdentifiers, UnmetSpec, Warning};
use crate::signing::{CredentialConfig, CredentialStore, SigningResolver};
use crate::transform::ToolChain;
use crate::{Error, Result};
use std::fmt;
use std::path::Path;

/// Pipeline components, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    IconMatrix,
    Manifest,
    Descriptor,
    SigningResolver,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::IconMatrix => "icon-matrix",
            Component::Manifest => "manifest-synthesizer",
            Component::Descriptor => "descriptor-patcher",
            Component::SigningResolver => "signing-resolver",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sequences the preparation components under one shared build context.
pub struct Pipeline<'a> {
    chain: ToolChain,
    credentials: CredentialConfig,
    store: &'a dyn CredentialStore,
}

impl<'a> Pipeline<'a> {
    /// Pipeline with the platform-default transform chain.
    pub fn new(credentials: CredentialConfig, store: &'a dyn CredentialStore) -> Self {
        Self {
            chain: ToolChain::platform_default(),
            credentials,
            store,
        }
    }

    /// Override the transform tool chain.
    pub fn with_tool_chain(mut self, chain: ToolChain) -> Self {
        self.chain = chain;
        self
    }

    /// Run the full pipeline and produce the readiness report.
    ///
    /// The report is the single surface for all outcomes; no error escapes
    /// this function.
    pub fn run(&self, ctx: &mut BuildContext, source_icon: &Path) -> ReadinessReport {
        let mut warnings: Vec<Warning> = Vec::new();
        let mut retained: Vec<BackupHandle> = Vec::new();

        // Icon matrix. The generator owns per-file backup/restore, so
        // nothing is retained at this stage.
        tracing::info!(component = %Component::IconMatrix, "starting");
        let source = match SourceImage::open(source_icon) {
            Ok(source) => source,
            Err(e) => return abort(Component::IconMatrix, e, &retained, Vec::new(), warnings),
        };
        let generator = IconMatrixGenerator::ios(&self.chain);
        let mut batch = match generator.generate(&source, &ctx.paths().iconset_dir()) {
            Ok(batch) => batch,
            Err(e) => return abort(Component::IconMatrix, e, &retained, Vec::new(), warnings),
        };
        warnings.append(&mut batch.warnings);

        if batch.marketing_unmet {
            let reason = batch
                .unmet
                .iter()
                .find(|u| {
                    generator
                        .specs()
                        .iter()
                        .any(|s| s.is_marketing() && s.filename == u.filename)
                })
                .map(|u| u.reason.clone())
                .unwrap_or_else(|| "marketing icon unmet".to_string());
            return abort(
                Component::IconMatrix,
                format!("marketing icon: {}", reason),
                &retained,
                batch.unmet,
                warnings,
            );
        }

        // Manifest.
        tracing::info!(component = %Component::Manifest, "starting");
        let manifest_path = ctx.paths().manifest_path();
        let backup = match BackupHandle::create(&manifest_path) {
            Ok(backup) => backup,
            Err(e) => return abort(Component::Manifest, e, &retained, batch.unmet, warnings),
        };
        let synthesizer = ManifestSynthesizer::ios();
        let manifest = match synthesizer.ensure(&manifest_path, &mut warnings) {
            Ok(manifest) => manifest,
            Err(e) => {
                restore_or_log(&backup);
                return abort(Component::Manifest, e, &retained, batch.unmet, warnings);
            }
        };
        if let Err(e) = verify_manifest(&manifest, &manifest_path) {
            restore_or_log(&backup);
            return abort(Component::Manifest, e, &retained, batch.unmet, warnings);
        }
        let unmet: Vec<UnmetSpec> =
            synthesizer.cross_check(&manifest, &batch, &ctx.paths().iconset_dir(), &mut warnings);
        retained.push(backup);

        // Descriptor.
        tracing::info!(component = %Component::Descriptor, "starting");
        let descriptor_path = ctx.paths().descriptor_path();
        let backup = match BackupHandle::create(&descriptor_path) {
            Ok(backup) => backup,
            Err(e) => return abort(Component::Descriptor, e, &retained, unmet, warnings),
        };
        let patcher = DescriptorPatcher::standard(ctx);
        if let Err(e) = patcher.ensure(&descriptor_path, ctx, &mut warnings) {
            restore_or_log(&backup);
            return abort(Component::Descriptor, e, &retained, unmet, warnings);
        }
        if let Err(e) = verify_descriptor(&patcher, &descriptor_path, ctx) {
            restore_or_log(&backup);
            return abort(Component::Descriptor, e, &retained, unmet, warnings);
        }
        retained.push(backup);

        // Signing credentials.
        tracing::info!(component = %Component::SigningResolver, "starting");
        let mut resolver = SigningResolver::new(self.credentials.clone());
        let mut resolved = match resolver.resolve(ctx) {
            Ok(resolved) => resolved,
            Err(e) => return abort(Component::SigningResolver, e, &retained, unmet, warnings),
        };
        warnings.append(&mut resolved.warnings);

        if let Err(e) = self.store.register(&resolved.credential, &resolved.profile) {
            return abort(Component::SigningResolver, e, &retained, unmet, warnings);
        }
        resolver.mark_registered();

        // The run is committed; the pre-run snapshots have served their
        // purpose.
        for backup in retained {
            if let Err(e) = backup.discard() {
                tracing::warn!(error = %e, "failed to remove backup copy");
            }
        }

        tracing::info!(
            unmet = unmet.len(),
            warnings = warnings.len(),
            "pipeline complete"
        );

        ReadinessReport::completed(
            unmet,
            warnings,
            ResolvedIdentifiers {
                bundle_id: ctx.bundle_id.clone(),
                team_id: ctx.team_id.clone(),
                profile_uuid: resolved.profile.uuid.clone(),
                certificate_name: resolved.credential.common_name.clone(),
            },
        )
    }
}

/// Roll back every retained mutation, newest first, and build the failure
/// report.
fn abort(
    component: Component,
    reason: impl fmt::Display,
    retained: &[BackupHandle],
    unmet: Vec<UnmetSpec>,
    warnings: Vec<Warning>,
) -> ReadinessReport {
    for backup in retained.iter().rev() {
        restore_or_log(backup);
    }
    tracing::error!(component = %component, reason = %reason, "pipeline failed");
    ReadinessReport::failed(component.as_str(), reason, unmet, warnings)
}

fn restore_or_log(backup: &BackupHandle) {
    if let Err(e) = backup.restore() {
        tracing::error!(
            path = %backup.original().display(),
            error = %e,
            "failed to restore backup"
        );
    }
}

fn verification_failed(component: Component, reason: impl fmt::Display) -> Error {
    Error::Verification {
        component: component.as_str().to_string(),
        reason: reason.to_string(),
    }
}

/// The manifest on disk must parse and equal the synthesized catalog.
fn verify_manifest(expected: &Manifest, path: &Path) -> Result<()> {
    match Manifest::load(path) {
        Ok(found) if found == *expected => Ok(()),
        Ok(_) => Err(verification_failed(
            Component::Manifest,
            "manifest on disk does not match the synthesized catalog",
        )),
        Err(e) => Err(verification_failed(Component::Manifest, e)),
    }
}

/// The descriptor on disk must be a fixed point of the active rule set:
/// re-applying every rule changes nothing.
fn verify_descriptor(
    patcher: &DescriptorPatcher,
    path: &Path,
    ctx: &BuildContext,
) -> Result<()> {
    let fail = |reason: &dyn fmt::Display| verification_failed(Component::Descriptor, reason);

    let reloaded = DescriptorDocument::load(path).map_err(|e| fail(&e))?;

    let mut replayed = reloaded.clone();
    patcher.apply(&mut replayed, ctx);

    let on_disk = reloaded.to_bytes().map_err(|e| fail(&e))?;
    let after_replay = replayed.to_bytes().map_err(|e| fail(&e))?;

    if on_disk != after_replay {
        return Err(fail(
            &"descriptor is not a fixed point of the active rule set",
        ));
    }
    Ok(())
}
