//! Shared build context threaded through the pipeline.
//!
//! The [`BuildContext`] is the single mutable aggregate every component
//! reads from. It is created once by the invoker from external
//! configuration; components never re-read ambient process state (env vars,
//! cwd) and instead take the context by reference.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Bundle identifiers that ship with project templates and must never be
/// signed as-is. A context carrying one of these is treated as having no
/// real identifier and is overwritten from the provisioning profile.
pub const PLACEHOLDER_BUNDLE_IDS: &[&str] = &[
    "",
    "com.example.app",
    "com.example.helloworld",
    "io.cordova.hellocordova",
    "org.apache.cordova.hello",
];

/// Well-known locations of the artifacts this pipeline owns, all derived
/// from the project directory.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    project_dir: PathBuf,
}

impl ArtifactPaths {
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            project_dir: project_dir.as_ref().to_path_buf(),
        }
    }

    /// Root of the project tree.
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Directory holding the generated icon set and its manifest.
    pub fn iconset_dir(&self) -> PathBuf {
        self.project_dir.join("Assets.xcassets/AppIcon.appiconset")
    }

    /// The icon catalog manifest. Downstream tooling parses this file
    /// directly, so the path is part of the contract.
    pub fn manifest_path(&self) -> PathBuf {
        self.iconset_dir().join("Contents.json")
    }

    /// The application descriptor document.
    pub fn descriptor_path(&self) -> PathBuf {
        self.project_dir.join("Info.plist")
    }
}

/// The single mutable aggregate threaded through the pipeline.
///
/// Holds identity fields, named boolean feature flags, and artifact
/// locations. Components may enrich it: the signing resolver overwrites
/// [`bundle_id`](Self::bundle_id) with the profile's decoded identifier
/// when the context value is empty or a known placeholder.
///
/// # Example
///
/// ```
/// use bundleprep::BuildContext;
///
/// let ctx = BuildContext::new("/tmp/project")
///     .bundle_id("com.acme.app")
///     .display_name("Acme")
///     .version("1.2.0")
///     .with_flag("push_notifications");
/// assert!(ctx.flag("push_notifications"));
/// ```
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Application bundle identifier. May be a placeholder until the
    /// signing resolver reconciles it against the provisioning profile.
    pub bundle_id: String,
    /// Human-visible application name.
    pub display_name: String,
    /// Marketing version string (`CFBundleShortVersionString`).
    pub version: String,
    /// Build number string (`CFBundleVersion`).
    pub build_number: String,
    /// Team identifier, if known up front. The resolver fills it in from
    /// the profile or certificate when absent.
    pub team_id: Option<String>,
    /// Release build: selects the production push environment.
    pub release: bool,
    paths: ArtifactPaths,
    flags: BTreeSet<String>,
}

impl BuildContext {
    /// Create a context rooted at the given project directory.
    ///
    /// Identity fields start empty and are filled via the fluent setters.
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            bundle_id: String::new(),
            display_name: String::new(),
            version: String::from("1.0.0"),
            build_number: String::from("1"),
            team_id: None,
            release: false,
            paths: ArtifactPaths::new(project_dir),
            flags: BTreeSet::new(),
        }
    }

    /// Set the bundle identifier.
    pub fn bundle_id(mut self, id: impl Into<String>) -> Self {
        self.bundle_id = id.into();
        self
    }

    /// Set the display name.
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Set the marketing version string.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the build number string.
    pub fn build_number(mut self, build: impl Into<String>) -> Self {
        self.build_number = build.into();
        self
    }

    /// Set the team identifier.
    pub fn team_id(mut self, team: impl Into<String>) -> Self {
        self.team_id = Some(team.into());
        self
    }

    /// Mark this as a release build.
    pub fn release(mut self, release: bool) -> Self {
        self.release = release;
        self
    }

    /// Enable a named feature flag.
    pub fn with_flag(mut self, name: impl Into<String>) -> Self {
        self.flags.insert(name.into());
        self
    }

    /// Whether a named feature flag is set.
    pub fn flag(&self, name: &str) -> bool {
        self.flags.contains(name)
    }

    /// Enable a flag on an existing context.
    pub fn set_flag(&mut self, name: impl Into<String>) {
        self.flags.insert(name.into());
    }

    /// Artifact locations for this project.
    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Whether the current bundle identifier is empty or one of the known
    /// template placeholders.
    pub fn bundle_id_is_placeholder(&self) -> bool {
        PLACEHOLDER_BUNDLE_IDS
            .iter()
            .any(|p| *p == self.bundle_id.as_str())
    }
}
