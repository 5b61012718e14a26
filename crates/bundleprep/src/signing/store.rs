//! Platform secure credential store capability.
//!
//! Registration is an external capability the orchestrator invokes; the
//! resolver itself never touches the store. The real implementation shells
//! out to the platform `security` tool; the no-op implementation backs
//! dry runs and tests.

use super::normalize::NormalizedCredential;
use super::profile::ProfileInfo;
use crate::{Error, Result};
use secrecy::ExposeSecret;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

/// Destination for resolved credentials.
pub trait CredentialStore {
    /// Hand the normalized credential and decoded profile to the store.
    fn register(&self, credential: &NormalizedCredential, profile: &ProfileInfo) -> Result<()>;
}

/// Registers via the platform `security` tool and installs the profile
/// under the provisioning-profiles directory, named by UUID.
pub struct SecurityToolStore {
    profiles_dir: PathBuf,
    keychain: Option<String>,
}

impl SecurityToolStore {
    pub fn new(profiles_dir: impl Into<PathBuf>, keychain: Option<String>) -> Self {
        Self {
            profiles_dir: profiles_dir.into(),
            keychain,
        }
    }
}

impl CredentialStore for SecurityToolStore {
    fn register(&self, credential: &NormalizedCredential, profile: &ProfileInfo) -> Result<()> {
        fs::create_dir_all(&self.profiles_dir)?;
        let profile_path = self
            .profiles_dir
            .join(format!("{}.mobileprovision", profile.uuid));
        fs::write(&profile_path, &profile.raw)?;

        let mut p12_file = tempfile::NamedTempFile::new()?;
        p12_file.write_all(&credential.pkcs12_der)?;
        p12_file.flush()?;

        let mut cmd = Command::new("security");
        cmd.arg("import")
            .arg(p12_file.path())
            .arg("-f")
            .arg("pkcs12")
            .arg("-P")
            .arg(credential.password.expose_secret())
            .arg("-T")
            .arg("/usr/bin/codesign");
        if let Some(keychain) = &self.keychain {
            cmd.arg("-k").arg(keychain);
        }

        let output = cmd
            .output()
            .map_err(|e| Error::Store(format!("failed to run security tool: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Store(format!(
                "security import exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        tracing::info!(
            uuid = %profile.uuid,
            profile_path = %profile_path.display(),
            "credential registered"
        );
        Ok(())
    }
}

/// Store that accepts everything and writes nothing. For dry runs.
pub struct NoopStore;

impl CredentialStore for NoopStore {
    fn register(&self, credential: &NormalizedCredential, profile: &ProfileInfo) -> Result<()> {
        tracing::debug!(
            uuid = %profile.uuid,
            certificate = credential.common_name.as_deref().unwrap_or("<unnamed>"),
            "dry run, skipping credential registration"
        );
        Ok(())
    }
}
