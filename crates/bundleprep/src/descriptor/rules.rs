//! Declarative patch rules for the application descriptor.
//!
//! Rules are grouped by the feature flag that activates them; a group is
//! applied all-or-nothing. Rule values are pure functions of the build
//! context, which is what makes re-application a no-op.

use crate::context::BuildContext;
use plist::{Dictionary, Value};

/// Feature flag names recognized by the standard rule set.
pub mod flags {
    pub const PUSH_NOTIFICATIONS: &str = "push_notifications";
    pub const BACKGROUND_LOCATION: &str = "background_location";
    pub const CAMERA: &str = "camera";
    pub const PHOTO_LIBRARY: &str = "photo_library";
    pub const ALLOW_HTTP: &str = "allow_http";
}

/// What a rule does at its key path.
#[derive(Debug, Clone)]
pub enum PatchOp {
    /// Insert the key if absent, else overwrite it with this value.
    Set(Value),
    /// Treat the key as an array and append the element iff absent.
    EnsureInArray(Value),
}

/// One declarative insertion/update at a nested key path.
#[derive(Debug, Clone)]
pub struct PatchRule {
    key_path: Vec<String>,
    op: PatchOp,
}

impl PatchRule {
    /// Rule that sets `value` at the dotted-down `path`.
    pub fn set(path: &[&str], value: Value) -> Self {
        Self {
            key_path: path.iter().map(|s| s.to_string()).collect(),
            op: PatchOp::Set(value),
        }
    }

    /// Rule that guarantees `element` is present in the array at `path`.
    pub fn ensure_in_array(path: &[&str], element: Value) -> Self {
        Self {
            key_path: path.iter().map(|s| s.to_string()).collect(),
            op: PatchOp::EnsureInArray(element),
        }
    }

    /// Apply to a descriptor root dictionary. Intermediate dictionaries
    /// are created on demand; a non-dictionary in the way is replaced,
    /// since the rule value is the canonical shape.
    pub fn apply(&self, root: &mut Dictionary) {
        let Some((last, parents)) = self.key_path.split_last() else {
            return;
        };

        let mut cur = root;
        for seg in parents {
            let needs_dict = cur
                .get(seg)
                .and_then(Value::as_dictionary)
                .is_none();
            if needs_dict {
                cur.insert(seg.clone(), Value::Dictionary(Dictionary::new()));
            }
            cur = match cur.get_mut(seg).and_then(Value::as_dictionary_mut) {
                Some(d) => d,
                None => return,
            };
        }

        match &self.op {
            PatchOp::Set(value) => {
                cur.insert(last.clone(), value.clone());
            }
            PatchOp::EnsureInArray(element) => {
                if cur.get(last).and_then(Value::as_array).is_none() {
                    cur.insert(last.clone(), Value::Array(Vec::new()));
                }
                if let Some(arr) = cur.get_mut(last).and_then(Value::as_array_mut) {
                    if !arr.contains(element) {
                        arr.push(element.clone());
                    }
                }
            }
        }
    }
}

/// A named rule group gated on one feature flag (or always active).
#[derive(Debug, Clone)]
pub struct RuleGroup {
    pub name: &'static str,
    pub flag: Option<&'static str>,
    pub rules: Vec<PatchRule>,
}

impl RuleGroup {
    /// Whether this group applies under the given context.
    pub fn is_active(&self, ctx: &BuildContext) -> bool {
        self.flag.map_or(true, |f| ctx.flag(f))
    }
}

/// The standard rule set, with every value computed from the context.
pub fn standard_groups(ctx: &BuildContext) -> Vec<RuleGroup> {
    let aps_environment = if ctx.release {
        "production"
    } else {
        "development"
    };

    vec![
        RuleGroup {
            name: "identity",
            flag: None,
            rules: vec![
                PatchRule::set(
                    &["CFBundleIdentifier"],
                    Value::String(ctx.bundle_id.clone()),
                ),
                PatchRule::set(
                    &["CFBundleDisplayName"],
                    Value::String(ctx.display_name.clone()),
                ),
                PatchRule::set(
                    &["CFBundleName"],
                    Value::String(ctx.display_name.clone()),
                ),
                PatchRule::set(
                    &["CFBundleShortVersionString"],
                    Value::String(ctx.version.clone()),
                ),
                PatchRule::set(
                    &["CFBundleVersion"],
                    Value::String(ctx.build_number.clone()),
                ),
            ],
        },
        RuleGroup {
            name: "push-notifications",
            flag: Some(flags::PUSH_NOTIFICATIONS),
            rules: vec![
                PatchRule::ensure_in_array(
                    &["UIBackgroundModes"],
                    Value::String("remote-notification".to_string()),
                ),
                PatchRule::set(
                    &["aps-environment"],
                    Value::String(aps_environment.to_string()),
                ),
                PatchRule::set(
                    &["NSUserNotificationsUsageDescription"],
                    Value::String(format!(
                        "{} uses notifications to keep you up to date.",
                        ctx.display_name
                    )),
                ),
            ],
        },
        RuleGroup {
            name: "background-location",
            flag: Some(flags::BACKGROUND_LOCATION),
            rules: vec![
                PatchRule::ensure_in_array(
                    &["UIBackgroundModes"],
                    Value::String("location".to_string()),
                ),
                PatchRule::set(
                    &["NSLocationWhenInUseUsageDescription"],
                    Value::String(format!(
                        "{} uses your location while the app is open.",
                        ctx.display_name
                    )),
                ),
                PatchRule::set(
                    &["NSLocationAlwaysAndWhenInUseUsageDescription"],
                    Value::String(format!(
                        "{} uses your location in the background.",
                        ctx.display_name
                    )),
                ),
            ],
        },
        RuleGroup {
            name: "camera",
            flag: Some(flags::CAMERA),
            rules: vec![PatchRule::set(
                &["NSCameraUsageDescription"],
                Value::String(format!("{} uses the camera.", ctx.display_name)),
            )],
        },
        RuleGroup {
            name: "photo-library",
            flag: Some(flags::PHOTO_LIBRARY),
            rules: vec![PatchRule::set(
                &["NSPhotoLibraryUsageDescription"],
                Value::String(format!(
                    "{} accesses your photo library.",
                    ctx.display_name
                )),
            )],
        },
        RuleGroup {
            name: "allow-http",
            flag: Some(flags::ALLOW_HTTP),
            rules: vec![PatchRule::set(
                &["NSAppTransportSecurity", "NSAllowsArbitraryLoads"],
                Value::Boolean(true),
            )],
        },
    ]
}
