//! Readiness report: the pipeline's single structured output.
//!
//! Callers must consult the report rather than infer success from the
//! absence of an error, since partial icon-spec failure is reported as data.

use serde::Serialize;
use std::fmt;

/// A non-fatal finding carried into the readiness report.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// Source raster is smaller than the largest required icon edge.
    /// Upscaled output will be accepted by tooling but looks soft.
    LowResolutionSource {
        width: u32,
        height: u32,
        required: u32,
    },
    /// The context bundle identifier differs from the one decoded out of
    /// the provisioning profile. Signing will fail downstream if the two
    /// truly refer to different applications.
    BundleIdMismatch { context: String, profile: String },
    /// A persisted artifact failed structural validation and was replaced
    /// wholesale from its canonical source.
    ArtifactReplaced { artifact: String, reason: String },
    /// A file in the icon set directory is not named by any manifest entry.
    StrayIcon { filename: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::LowResolutionSource {
                width,
                height,
                required,
            } => write!(
                f,
                "source image is {}x{}, below the largest required edge of {}px",
                width, height, required
            ),
            Warning::BundleIdMismatch { context, profile } => write!(
                f,
                "bundle id {:?} does not match provisioning profile id {:?}",
                context, profile
            ),
            Warning::ArtifactReplaced { artifact, reason } => {
                write!(f, "{} was corrupt ({}) and was rebuilt", artifact, reason)
            }
            Warning::StrayIcon { filename } => {
                write!(f, "icon set contains unmanaged file {:?}", filename)
            }
        }
    }
}

/// An icon spec the generator could not satisfy. Blocking for the
/// downstream compile stage.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UnmetSpec {
    /// Filename from the spec table.
    pub filename: String,
    /// Why the spec could not be met.
    pub reason: String,
}

impl fmt::Display for UnmetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.filename, self.reason)
    }
}

/// Identifiers the signing resolver settled on, consumed by the downstream
/// compile/sign stage.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedIdentifiers {
    /// Final bundle identifier after reconciliation.
    pub bundle_id: String,
    /// Team identifier from the profile or certificate.
    pub team_id: Option<String>,
    /// Provisioning profile UUID.
    pub profile_uuid: String,
    /// Certificate common name, when the certificate carries one.
    pub certificate_name: Option<String>,
}

/// The pipeline's structured result.
///
/// `success` is true only when no component failed fatally *and* every icon
/// spec was met. Unmet non-marketing specs do not abort the run but still
/// force `success = false`, since the manifest names files that do not
/// validate.
#[derive(Debug, Serialize)]
pub struct ReadinessReport {
    pub success: bool,
    /// Component that aborted the run, if any.
    pub failed_component: Option<String>,
    /// Original cause of the abort, if any.
    pub failure_reason: Option<String>,
    /// Specs from the table without a valid generated icon.
    pub unmet_specs: Vec<UnmetSpec>,
    /// Non-fatal findings, in the order they were recorded.
    pub warnings: Vec<Warning>,
    /// Present when the signing resolver completed.
    pub resolved: Option<ResolvedIdentifiers>,
}

impl ReadinessReport {
    /// Report for a run where a component aborted the pipeline.
    pub fn failed(
        component: &str,
        reason: impl fmt::Display,
        unmet_specs: Vec<UnmetSpec>,
        warnings: Vec<Warning>,
    ) -> Self {
        Self {
            success: false,
            failed_component: Some(component.to_string()),
            failure_reason: Some(reason.to_string()),
            unmet_specs,
            warnings,
            resolved: None,
        }
    }

    /// Report for a run that reached the end of the pipeline.
    pub fn completed(
        unmet_specs: Vec<UnmetSpec>,
        warnings: Vec<Warning>,
        resolved: ResolvedIdentifiers,
    ) -> Self {
        Self {
            success: unmet_specs.is_empty(),
            failed_component: None,
            failure_reason: None,
            unmet_specs,
            warnings,
            resolved: Some(resolved),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_report_success_requires_zero_unmet() {
        let resolved = ResolvedIdentifiers {
            bundle_id: "com.acme.app".into(),
            team_id: Some("ABCDE12345".into()),
            profile_uuid: "a1b2".into(),
            certificate_name: None,
        };
        let ok = ReadinessReport::completed(vec![], vec![], resolved.clone());
        assert!(ok.success);

        let unmet = vec![UnmetSpec {
            filename: "icon-60@3x.png".into(),
            reason: "wrong dimensions".into(),
        }];
        let blocked = ReadinessReport::completed(unmet, vec![], resolved);
        assert!(!blocked.success);
        assert!(blocked.failed_component.is_none());
    }

    #[test]
    fn test_failed_report_names_component() {
        let report = ReadinessReport::failed("signing-resolver", "HTTP 404", vec![], vec![]);
        assert!(!report.success);
        assert_eq!(report.failed_component.as_deref(), Some("signing-resolver"));
        assert_eq!(report.failure_reason.as_deref(), Some("HTTP 404"));
    }

    #[test]
    fn test_warning_serializes_with_kind_tag() {
        let w = Warning::StrayIcon {
            filename: "old.png".into(),
        };
        let json = serde_json::to_string(&w).unwrap();
        assert!(json.contains("\"kind\":\"stray_icon\""));
    }
}
