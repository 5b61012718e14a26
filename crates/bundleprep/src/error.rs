//! Error types for build-preparation operations.
//!
//! This module defines the [`enum@Error`] enum covering all failure cases in
//! the preparation pipeline: icon transformation, manifest and descriptor
//! handling, credential retrieval, and post-mutation verification.
//!
//! # See Also
//!
//! - [`crate::Result`] - Convenience type alias using this error

use thiserror::Error;

/// Error type for build-preparation operations.
///
/// All public functions in this crate return [`crate::Result<T>`], which uses
/// this error type. Match on variants to handle specific failure cases.
///
/// Recoverable conditions (a transform tool falling through to the next in
/// the chain, a corrupt manifest being rebuilt from the spec table) are
/// handled inside the owning component and surface as report warnings, not
/// as these errors. A variant reaching the caller means the pipeline had no
/// defined recovery for it.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No backing transform tool is installed.
    ///
    /// Raised by the tool chain when every configured backend reports
    /// itself unavailable. The payload lists the tools that were consulted.
    #[error("no transform tool available (tried: {0})")]
    ToolUnavailable(String),

    /// Every available transform tool ran but none produced valid output.
    ///
    /// The payload carries the per-tool failure reasons in chain order.
    #[error("image transform failed: {0}")]
    TransformFailed(String),

    /// A persisted artifact failed structural validation.
    ///
    /// Malformed documents are never partially repaired; callers replace
    /// them wholesale from their canonical source.
    #[error("{artifact} failed structural validation: {reason}")]
    StructuralCorruption { artifact: String, reason: String },

    /// Credential fetch failed (network, HTTP status, or missing file).
    ///
    /// Fatal to the pipeline; there is no credential fallback.
    #[error("credential retrieval failed: {0}")]
    Retrieval(String),

    /// Invalid or malformed certificate material.
    #[error("invalid certificate: {0}")]
    Certificate(String),

    /// Invalid or malformed provisioning profile.
    ///
    /// The `.mobileprovision` blob could not be parsed or lacks a required
    /// field (UUID, application identifier).
    #[error("invalid provisioning profile: {0}")]
    ProvisioningProfile(String),

    /// A post-mutation verification check failed.
    ///
    /// The orchestrator restores the pre-mutation backup before surfacing
    /// this error.
    #[error("verification failed in {component}: {reason}")]
    Verification { component: String, reason: String },

    /// The platform credential store rejected a registration.
    #[error("credential store error: {0}")]
    Store(String),

    /// Invalid resolver or pipeline configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Property list parsing or serialization failed.
    #[error("plist error: {0}")]
    Plist(#[from] plist::Error),

    /// JSON parsing or serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raster decode or encode failed.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// OpenSSL operation failed.
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),
}
