//! Provisioning profile decoding.
//!
//! Profiles are CMS-signed property lists. Verifying the CMS signature is
//! the platform's job; this module only locates the embedded plist and
//! extracts the identifiers the pipeline needs.

use crate::{Error, Result};
use plist::Value;

/// Identifiers decoded out of a provisioning profile.
#[derive(Debug, Clone)]
pub struct ProfileInfo {
    /// Profile UUID, used to name the installed profile.
    pub uuid: String,
    /// Human-readable profile name.
    pub name: Option<String>,
    /// Application-identifier pattern with the team prefix stripped.
    /// May contain a trailing wildcard.
    pub app_id_pattern: String,
    /// Team identifier.
    pub team_id: Option<String>,
    /// Entitlement keys granted by the profile, sorted.
    pub capabilities: Vec<String>,
    /// The original signed blob, kept for installation.
    pub raw: Vec<u8>,
}

/// Decode a `.mobileprovision` blob.
pub fn decode(data: &[u8]) -> Result<ProfileInfo> {
    let plist_start = data
        .windows(6)
        .position(|w| w == b"<?xml ")
        .ok_or_else(|| Error::ProvisioningProfile("no embedded plist found".into()))?;

    let plist_end = data
        .windows(8)
        .rposition(|w| w == b"</plist>")
        .map(|p| p + 8)
        .ok_or_else(|| Error::ProvisioningProfile("embedded plist is unterminated".into()))?;

    if plist_start >= plist_end {
        return Err(Error::ProvisioningProfile(
            "embedded plist is malformed".into(),
        ));
    }

    let value: Value = plist::from_bytes(&data[plist_start..plist_end])
        .map_err(|e| Error::ProvisioningProfile(format!("failed to parse plist: {}", e)))?;

    let dict = value
        .as_dictionary()
        .ok_or_else(|| Error::ProvisioningProfile("profile is not a dictionary".into()))?;

    let uuid = dict
        .get("UUID")
        .and_then(Value::as_string)
        .ok_or_else(|| Error::ProvisioningProfile("profile has no UUID".into()))?
        .to_string();

    let name = dict
        .get("Name")
        .and_then(Value::as_string)
        .map(|s| s.to_string());

    let entitlements = dict
        .get("Entitlements")
        .and_then(Value::as_dictionary)
        .ok_or_else(|| Error::ProvisioningProfile("profile has no Entitlements".into()))?;

    let app_identifier = entitlements
        .get("application-identifier")
        .and_then(Value::as_string)
        .ok_or_else(|| {
            Error::ProvisioningProfile("entitlements carry no application-identifier".into())
        })?;

    let team_id = dict
        .get("TeamIdentifier")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
        .and_then(Value::as_string)
        .or_else(|| {
            entitlements
                .get("com.apple.developer.team-identifier")
                .and_then(Value::as_string)
        })
        .map(|s| s.to_string());

    let mut capabilities: Vec<String> = entitlements
        .keys()
        .filter(|k| {
            k.as_str() != "application-identifier"
                && k.as_str() != "com.apple.developer.team-identifier"
                && k.as_str() != "keychain-access-groups"
        })
        .cloned()
        .collect();
    capabilities.sort();

    Ok(ProfileInfo {
        uuid,
        name,
        app_id_pattern: strip_team_prefix(app_identifier, team_id.as_deref()),
        team_id,
        capabilities,
        raw: data.to_vec(),
    })
}

/// Remove the leading team identifier from an application-identifier.
///
/// Falls back to shape detection (10 uppercase alphanumerics before the
/// first dot) when the profile does not name its team.
pub fn strip_team_prefix(app_id: &str, team: Option<&str>) -> String {
    if let Some(team) = team {
        if let Some(rest) = app_id.strip_prefix(&format!("{}.", team)) {
            return rest.to_string();
        }
    }

    if let Some((prefix, rest)) = app_id.split_once('.') {
        let looks_like_team = prefix.len() == 10
            && prefix
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        if looks_like_team {
            return rest.to_string();
        }
    }

    app_id.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_blob(app_id: &str) -> Vec<u8> {
        let plist = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Name</key>
    <string>Acme Distribution</string>
    <key>UUID</key>
    <string>f3c6b1a2-9d4e-4f70-8a55-1c2d3e4f5a6b</string>
    <key>TeamIdentifier</key>
    <array>
        <string>ABCDE12345</string>
    </array>
    <key>Entitlements</key>
    <dict>
        <key>application-identifier</key>
        <string>{}</string>
        <key>aps-environment</key>
        <string>production</string>
        <key>get-task-allow</key>
        <false/>
    </dict>
</dict>
</plist>"#,
            app_id
        );
        let mut blob = b"CMS_SIGNATURE_HEADER".to_vec();
        blob.extend_from_slice(plist.as_bytes());
        blob.extend_from_slice(b"CMS_SIGNATURE_TRAILER");
        blob
    }

    #[test]
    fn test_decode_extracts_identifiers() {
        let blob = profile_blob("ABCDE12345.com.acme.app");
        let info = decode(&blob).unwrap();

        assert_eq!(info.uuid, "f3c6b1a2-9d4e-4f70-8a55-1c2d3e4f5a6b");
        assert_eq!(info.name.as_deref(), Some("Acme Distribution"));
        assert_eq!(info.team_id.as_deref(), Some("ABCDE12345"));
        assert_eq!(info.app_id_pattern, "com.acme.app");
        assert_eq!(
            info.capabilities,
            vec!["aps-environment".to_string(), "get-task-allow".to_string()]
        );
        assert_eq!(info.raw, blob);
    }

    #[test]
    fn test_decode_keeps_wildcard_pattern() {
        let info = decode(&profile_blob("ABCDE12345.com.acme.*")).unwrap();
        assert_eq!(info.app_id_pattern, "com.acme.*");
    }

    #[test]
    fn test_decode_without_plist_fails() {
        match decode(b"just CMS noise, no xml") {
            Err(Error::ProvisioningProfile(msg)) => assert!(msg.contains("no embedded plist")),
            other => panic!("expected ProvisioningProfile, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_decode_unterminated_plist_fails() {
        assert!(decode(b"<?xml version=\"1.0\"?><plist><dict>").is_err());
    }

    #[test]
    fn test_strip_team_prefix_variants() {
        assert_eq!(
            strip_team_prefix("ABCDE12345.com.acme.app", Some("ABCDE12345")),
            "com.acme.app"
        );
        // Shape fallback when the team is unknown.
        assert_eq!(
            strip_team_prefix("ABCDE12345.com.acme.app", None),
            "com.acme.app"
        );
        // No recognizable prefix: identifier passes through.
        assert_eq!(
            strip_team_prefix("com.acme.app", None),
            "com.acme.app"
        );
    }
}
