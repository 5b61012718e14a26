//! Signing credential resolution.
//!
//! Fetches certificate and provisioning-profile artifacts, normalizes the
//! certificate into a single PKCS#12 form, decodes the identifiers the
//! profile embeds, and reconciles them against the build context. The
//! resolver advances through fixed states and has no fallback: retrieval
//! failure is fatal to the pipeline.

mod fetch;
mod normalize;
mod profile;
mod store;

pub use fetch::{CredentialSource, FETCH_TIMEOUT};
pub use normalize::NormalizedCredential;
pub use profile::ProfileInfo;
pub use store::{CredentialStore, NoopStore, SecurityToolStore};

use crate::context::BuildContext;
use crate::report::Warning;
use crate::{Error, Result};
use secrecy::SecretString;
use std::fmt;

/// Resolver progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    Unresolved,
    Fetched,
    Normalized,
    Decoded,
    Reconciled,
    Registered,
}

impl fmt::Display for ResolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolverState::Unresolved => "unresolved",
            ResolverState::Fetched => "fetched",
            ResolverState::Normalized => "normalized",
            ResolverState::Decoded => "decoded",
            ResolverState::Reconciled => "reconciled",
            ResolverState::Registered => "registered",
        };
        f.write_str(name)
    }
}

/// Credential inputs, in whichever of the two accepted forms.
///
/// # Example
///
/// ```
/// use bundleprep::signing::{CredentialConfig, CredentialSource};
///
/// let config = CredentialConfig::new()
///     .pkcs12(CredentialSource::parse("https://ci.example.com/dist.p12"))
///     .password("secret")
///     .profile(CredentialSource::parse("/secrets/dist.mobileprovision"));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CredentialConfig {
    certificate: Option<CredentialSource>,
    private_key: Option<CredentialSource>,
    pkcs12: Option<CredentialSource>,
    profile: Option<CredentialSource>,
    password: Option<SecretString>,
}

impl CredentialConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Certificate source (PEM or DER). Use with `private_key`.
    pub fn certificate(mut self, source: CredentialSource) -> Self {
        self.certificate = Some(source);
        self
    }

    /// Private key source (PEM or DER). Use with `certificate`.
    pub fn private_key(mut self, source: CredentialSource) -> Self {
        self.private_key = Some(source);
        self
    }

    /// PKCS#12 source carrying both certificate and key.
    pub fn pkcs12(mut self, source: CredentialSource) -> Self {
        self.pkcs12 = Some(source);
        self
    }

    /// Provisioning profile source. Required.
    pub fn profile(mut self, source: CredentialSource) -> Self {
        self.profile = Some(source);
        self
    }

    /// Password for the private key or PKCS#12 container.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::new(password.into()));
        self
    }

    /// Validate the configuration shape.
    pub fn validate(&self) -> Result<()> {
        if self.profile.is_none() {
            return Err(Error::Config(
                "a provisioning profile source is required".into(),
            ));
        }

        let has_p12 = self.pkcs12.is_some();
        let has_pair = self.certificate.is_some() || self.private_key.is_some();

        if has_p12 && has_pair {
            return Err(Error::Config(
                "cannot specify both PKCS#12 and certificate/key pair".into(),
            ));
        }

        if !has_p12 && !has_pair {
            return Err(Error::Config(
                "must specify either PKCS#12 or certificate/key pair".into(),
            ));
        }

        if has_pair && (self.certificate.is_none() || self.private_key.is_none()) {
            return Err(Error::Config(
                "both certificate and private key must be specified".into(),
            ));
        }

        Ok(())
    }
}

/// What resolution produced: the normalized credential, the decoded
/// profile, and any reconciliation warnings.
pub struct ResolvedSigning {
    pub credential: NormalizedCredential,
    pub profile: ProfileInfo,
    pub warnings: Vec<Warning>,
}

/// Drives credential resolution through its states.
pub struct SigningResolver {
    config: CredentialConfig,
    state: ResolverState,
}

impl SigningResolver {
    pub fn new(config: CredentialConfig) -> Self {
        Self {
            config,
            state: ResolverState::Unresolved,
        }
    }

    pub fn state(&self) -> ResolverState {
        self.state
    }

    /// Fetch, normalize, decode, and reconcile against the context.
    ///
    /// On success the resolver is left in the `Reconciled` state;
    /// registration is the orchestrator's move.
    pub fn resolve(&mut self, ctx: &mut BuildContext) -> Result<ResolvedSigning> {
        self.config.validate()?;

        // Fetch: all sources up front, so a retrieval failure costs
        // nothing downstream.
        let profile_bytes = self
            .config
            .profile
            .as_ref()
            .ok_or_else(|| Error::Config("a provisioning profile source is required".into()))?
            .fetch()?;
        let pkcs12_bytes = match &self.config.pkcs12 {
            Some(source) => Some(source.fetch()?),
            None => None,
        };
        let cert_bytes = match &self.config.certificate {
            Some(source) => Some(source.fetch()?),
            None => None,
        };
        let key_bytes = match &self.config.private_key {
            Some(source) => Some(source.fetch()?),
            None => None,
        };
        self.state = ResolverState::Fetched;

        let credential = match (pkcs12_bytes, cert_bytes, key_bytes) {
            (Some(der), _, _) => normalize::from_pkcs12(der, self.config.password.as_ref())?,
            (None, Some(cert), Some(key)) => {
                normalize::from_pem_pair(&cert, &key, self.config.password.as_ref())?
            }
            _ => {
                return Err(Error::Config(
                    "must specify either PKCS#12 or certificate/key pair".into(),
                ))
            }
        };
        self.state = ResolverState::Normalized;

        let profile = profile::decode(&profile_bytes)?;
        self.state = ResolverState::Decoded;

        let warnings = reconcile(&profile, &credential, ctx);
        self.state = ResolverState::Reconciled;

        tracing::info!(
            uuid = %profile.uuid,
            bundle_id = %ctx.bundle_id,
            team = ctx.team_id.as_deref().unwrap_or("<unknown>"),
            "signing credentials resolved"
        );

        Ok(ResolvedSigning {
            credential,
            profile,
            warnings,
        })
    }

    /// Record that the orchestrator registered the credential.
    pub fn mark_registered(&mut self) {
        self.state = ResolverState::Registered;
    }
}

/// Reconcile profile identifiers into the context.
///
/// An empty or placeholder context bundle id is overwritten with the
/// profile's decoded pattern (wildcard patterns never overwrite, since
/// they are not concrete identifiers). A differing real identifier is
/// kept, with a mismatch warning for the readiness report. The team id is
/// filled in from the profile, then the certificate, when absent.
fn reconcile(
    profile: &ProfileInfo,
    credential: &NormalizedCredential,
    ctx: &mut BuildContext,
) -> Vec<Warning> {
    let mut warnings = Vec::new();
    let pattern = &profile.app_id_pattern;
    let is_wildcard = pattern.contains('*');

    if ctx.bundle_id_is_placeholder() {
        if !is_wildcard {
            tracing::debug!(from = %ctx.bundle_id, to = %pattern, "bundle id taken from profile");
            ctx.bundle_id = pattern.clone();
        }
    } else if !pattern_matches(pattern, &ctx.bundle_id) {
        warnings.push(Warning::BundleIdMismatch {
            context: ctx.bundle_id.clone(),
            profile: pattern.clone(),
        });
    }

    if ctx.team_id.is_none() {
        ctx.team_id = profile
            .team_id
            .clone()
            .or_else(|| credential.team_id.clone());
    }

    warnings
}

/// Whether a profile app-id pattern covers a concrete bundle id.
fn pattern_matches(pattern: &str, bundle_id: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => bundle_id.starts_with(prefix),
        None => pattern == bundle_id,
    }
}
