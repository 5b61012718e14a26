//! Application descriptor document handling.
//!
//! The descriptor is a nested key/value property list mutated only through
//! declarative patch rules, never by free-form editing. Key names and
//! array/dict shapes are fixed by the consuming platform toolchain.

mod rules;

pub use rules::{flags, standard_groups, PatchOp, PatchRule, RuleGroup};

use crate::context::BuildContext;
use crate::report::Warning;
use crate::{Error, Result};
use plist::{Dictionary, Value};
use std::fs;
use std::path::Path;

/// The application's structured metadata/capability document.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorDocument {
    root: Dictionary,
}

impl DescriptorDocument {
    /// Parse and structurally validate an on-disk descriptor.
    ///
    /// # Errors
    ///
    /// [`Error::StructuralCorruption`] when the document does not parse or
    /// its top level is not a dictionary; I/O errors pass through.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read(path.as_ref())?;
        let value: Value =
            plist::from_bytes(&data).map_err(|e| Error::StructuralCorruption {
                artifact: "app descriptor".to_string(),
                reason: e.to_string(),
            })?;

        let root = value
            .into_dictionary()
            .ok_or_else(|| Error::StructuralCorruption {
                artifact: "app descriptor".to_string(),
                reason: "top level is not a dictionary".to_string(),
            })?;

        Ok(Self { root })
    }

    /// The minimal canonical template: identity fields only. Used when a
    /// corrupt document is replaced; every dynamic key is reinstated by
    /// replaying the rule groups afterwards.
    pub fn minimal_template(ctx: &BuildContext) -> Self {
        let mut root = Dictionary::new();
        root.insert(
            "CFBundleIdentifier".to_string(),
            Value::String(ctx.bundle_id.clone()),
        );
        root.insert(
            "CFBundleDisplayName".to_string(),
            Value::String(ctx.display_name.clone()),
        );
        root.insert(
            "CFBundleName".to_string(),
            Value::String(ctx.display_name.clone()),
        );
        root.insert(
            "CFBundleShortVersionString".to_string(),
            Value::String(ctx.version.clone()),
        );
        root.insert(
            "CFBundleVersion".to_string(),
            Value::String(ctx.build_number.clone()),
        );
        Self { root }
    }

    /// Serialize to the XML property-list wire form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        Value::Dictionary(self.root.clone()).to_writer_xml(&mut buf)?;
        Ok(buf)
    }

    /// Write to disk, creating parent directories as needed.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Look up a value by nested key path.
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut value = self.root.get(*first)?;
        for seg in rest {
            value = value.as_dictionary()?.get(*seg)?;
        }
        Some(value)
    }

    /// The underlying dictionary.
    pub fn root(&self) -> &Dictionary {
        &self.root
    }

    fn root_mut(&mut self) -> &mut Dictionary {
        &mut self.root
    }
}

/// Applies rule groups to the descriptor, idempotently.
pub struct DescriptorPatcher {
    groups: Vec<RuleGroup>,
}

impl DescriptorPatcher {
    /// Patcher with the standard rule set computed from the context.
    pub fn standard(ctx: &BuildContext) -> Self {
        Self {
            groups: standard_groups(ctx),
        }
    }

    /// Patcher with an explicit rule set.
    pub fn new(groups: Vec<RuleGroup>) -> Self {
        Self { groups }
    }

    /// Apply every active group. Returns the number of groups applied.
    ///
    /// Rule application records no history, and every value is a pure
    /// function of the context, so applying the same set twice leaves the
    /// document byte-identical.
    pub fn apply(&self, doc: &mut DescriptorDocument, ctx: &BuildContext) -> usize {
        let mut applied = 0;
        for group in &self.groups {
            if !group.is_active(ctx) {
                continue;
            }
            for rule in &group.rules {
                rule.apply(doc.root_mut());
            }
            applied += 1;
        }
        applied
    }

    /// Load (or rebuild) the descriptor at `path`, apply all active
    /// groups, and write it back.
    ///
    /// A document failing structural validation is replaced by the minimal
    /// identity template and every active rule group is replayed from the
    /// context, so no dynamic key is silently lost as long as its origin
    /// flag is still set. The replacement is recorded as a warning.
    pub fn ensure(
        &self,
        path: &Path,
        ctx: &BuildContext,
        warnings: &mut Vec<Warning>,
    ) -> Result<DescriptorDocument> {
        let mut doc = if path.exists() {
            match DescriptorDocument::load(path) {
                Ok(doc) => doc,
                Err(Error::StructuralCorruption { reason, .. }) => {
                    warnings.push(Warning::ArtifactReplaced {
                        artifact: "app descriptor".to_string(),
                        reason,
                    });
                    DescriptorDocument::minimal_template(ctx)
                }
                Err(e) => return Err(e),
            }
        } else {
            DescriptorDocument::minimal_template(ctx)
        };

        let applied = self.apply(&mut doc, ctx);
        tracing::debug!(groups = applied, "descriptor patched");

        doc.write(path)?;
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ctx() -> BuildContext {
        BuildContext::new("/tmp/proj")
            .bundle_id("com.acme.app")
            .display_name("Acme")
            .version("1.2.3")
            .build_number("7")
            .with_flag(flags::PUSH_NOTIFICATIONS)
            .with_flag(flags::ALLOW_HTTP)
    }

    #[test]
    fn test_apply_twice_is_byte_identical() {
        let ctx = ctx();
        let patcher = DescriptorPatcher::standard(&ctx);

        let mut doc = DescriptorDocument::minimal_template(&ctx);
        patcher.apply(&mut doc, &ctx);
        let first = doc.to_bytes().unwrap();

        patcher.apply(&mut doc, &ctx);
        let second = doc.to_bytes().unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_ensure_twice_leaves_identical_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Info.plist");
        let ctx = ctx();
        let patcher = DescriptorPatcher::standard(&ctx);

        let mut warnings = Vec::new();
        patcher.ensure(&path, &ctx, &mut warnings).unwrap();
        let first = fs::read(&path).unwrap();

        patcher.ensure(&path, &ctx, &mut warnings).unwrap();
        let second = fs::read(&path).unwrap();

        assert_eq!(first, second);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_flag_group_is_all_or_nothing() {
        let with = ctx();
        let without = BuildContext::new("/tmp/proj")
            .bundle_id("com.acme.app")
            .display_name("Acme");

        let mut doc = DescriptorDocument::minimal_template(&with);
        DescriptorPatcher::standard(&with).apply(&mut doc, &with);
        assert!(doc.get(&["aps-environment"]).is_some());
        assert!(doc.get(&["NSUserNotificationsUsageDescription"]).is_some());
        let modes = doc
            .get(&["UIBackgroundModes"])
            .and_then(Value::as_array)
            .unwrap();
        assert!(modes.contains(&Value::String("remote-notification".to_string())));

        let mut bare = DescriptorDocument::minimal_template(&without);
        DescriptorPatcher::standard(&without).apply(&mut bare, &without);
        assert!(bare.get(&["aps-environment"]).is_none());
        assert!(bare.get(&["UIBackgroundModes"]).is_none());
        assert!(bare.get(&["NSUserNotificationsUsageDescription"]).is_none());
    }

    #[test]
    fn test_corrupt_descriptor_is_rebuilt_with_flag_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Info.plist");
        fs::write(&path, b"<?xml version=\"1.0\"?><plist><dict><key>Trunc").unwrap();

        let ctx = ctx();
        let patcher = DescriptorPatcher::standard(&ctx);
        let mut warnings = Vec::new();
        let doc = patcher.ensure(&path, &ctx, &mut warnings).unwrap();

        assert!(matches!(
            warnings.as_slice(),
            [Warning::ArtifactReplaced { .. }]
        ));
        // Identity fields and every flag-driven key survive the rebuild.
        assert_eq!(
            doc.get(&["CFBundleIdentifier"]),
            Some(&Value::String("com.acme.app".to_string()))
        );
        assert!(doc.get(&["aps-environment"]).is_some());
        assert_eq!(
            doc.get(&["NSAppTransportSecurity", "NSAllowsArbitraryLoads"]),
            Some(&Value::Boolean(true))
        );

        // And the rebuilt file parses.
        DescriptorDocument::load(&path).unwrap();
    }

    #[test]
    fn test_existing_unrelated_keys_survive_patching() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Info.plist");

        let ctx = ctx();
        let mut doc = DescriptorDocument::minimal_template(&ctx);
        doc.root_mut().insert(
            "UILaunchStoryboardName".to_string(),
            Value::String("LaunchScreen".to_string()),
        );
        doc.write(&path).unwrap();

        let patcher = DescriptorPatcher::standard(&ctx);
        let mut warnings = Vec::new();
        let patched = patcher.ensure(&path, &ctx, &mut warnings).unwrap();

        assert_eq!(
            patched.get(&["UILaunchStoryboardName"]),
            Some(&Value::String("LaunchScreen".to_string()))
        );
    }
}
