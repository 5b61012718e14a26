//! End-to-end pipeline tests over a real temporary project tree.
//!
//! Certificates and provisioning profiles are synthesized on the fly;
//! no network access and no platform credential store are involved.

use bundleprep::descriptor::{flags, DescriptorDocument};
use bundleprep::manifest::Manifest;
use bundleprep::signing::{
    CredentialConfig, CredentialSource, CredentialStore, NormalizedCredential, ProfileInfo,
};
use bundleprep::{BuildContext, Pipeline, Result, Warning};
use image::{Rgba, RgbaImage};
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::x509::{X509Builder, X509NameBuilder, X509};
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Credential store that records registrations instead of persisting them.
#[derive(Default)]
struct RecordingStore {
    registrations: Cell<usize>,
}

impl CredentialStore for RecordingStore {
    fn register(&self, _: &NormalizedCredential, profile: &ProfileInfo) -> Result<()> {
        assert!(!profile.uuid.is_empty());
        self.registrations.set(self.registrations.get() + 1);
        Ok(())
    }
}

fn generate_key_and_cert() -> (PKey<Private>, X509) {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

    let mut name_builder = X509NameBuilder::new().unwrap();
    name_builder
        .append_entry_by_text("CN", "Apple Distribution: Acme Inc")
        .unwrap();
    name_builder.append_entry_by_text("OU", "ABCDE12345").unwrap();
    let name = name_builder.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap();
    builder
        .set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    let not_before = Asn1Time::days_from_now(0).unwrap();
    let not_after = Asn1Time::days_from_now(365).unwrap();
    builder.set_not_before(&not_before).unwrap();
    builder.set_not_after(&not_after).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    (key, builder.build())
}

fn profile_blob(app_id: &str) -> Vec<u8> {
    let plist = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
    <key>Name</key>
    <string>Acme Distribution</string>
    <key>UUID</key>
    <string>aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee</string>
    <key>TeamIdentifier</key>
    <array><string>ABCDE12345</string></array>
    <key>Entitlements</key>
    <dict>
        <key>application-identifier</key>
        <string>{}</string>
        <key>aps-environment</key>
        <string>development</string>
    </dict>
</dict>
</plist>"#,
        app_id
    );
    let mut blob = b"CMS_WRAPPER".to_vec();
    blob.extend_from_slice(plist.as_bytes());
    blob.extend_from_slice(b"TRAILER");
    blob
}

/// Lay out source icon, certificate pair, and profile under one temp dir.
struct Fixture {
    dir: TempDir,
    source_icon: PathBuf,
    cert_path: PathBuf,
    key_path: PathBuf,
    profile_path: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();

        let source_icon = dir.path().join("icon-source.png");
        RgbaImage::from_pixel(1200, 1200, Rgba([30, 144, 255, 200]))
            .save(&source_icon)
            .unwrap();

        let (key, cert) = generate_key_and_cert();
        let cert_path = dir.path().join("cert.pem");
        let key_path = dir.path().join("key.pem");
        let profile_path = dir.path().join("dist.mobileprovision");
        fs::write(&cert_path, cert.to_pem().unwrap()).unwrap();
        fs::write(&key_path, key.private_key_to_pem_pkcs8().unwrap()).unwrap();
        fs::write(&profile_path, profile_blob("ABCDE12345.com.acme.app")).unwrap();

        Self {
            dir,
            source_icon,
            cert_path,
            key_path,
            profile_path,
        }
    }

    fn project_dir(&self) -> PathBuf {
        self.dir.path().join("project")
    }

    fn credentials(&self) -> CredentialConfig {
        CredentialConfig::new()
            .certificate(CredentialSource::Path(self.cert_path.clone()))
            .private_key(CredentialSource::Path(self.key_path.clone()))
            .profile(CredentialSource::Path(self.profile_path.clone()))
    }

    fn context(&self) -> BuildContext {
        BuildContext::new(self.project_dir())
            .display_name("Acme")
            .version("1.2.0")
            .build_number("34")
            .with_flag(flags::PUSH_NOTIFICATIONS)
    }
}

fn count_pngs(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".png"))
        .count()
}

#[test]
fn test_full_run_produces_ready_tree() {
    let fixture = Fixture::new();
    let store = RecordingStore::default();
    let pipeline = Pipeline::new(fixture.credentials(), &store);

    // Placeholder bundle id: the profile supplies the real one.
    let mut ctx = fixture.context();
    let report = pipeline.run(&mut ctx, &fixture.source_icon);

    assert!(report.success, "report: {:?}", report);
    assert!(report.unmet_specs.is_empty());
    assert!(report.failed_component.is_none());

    let resolved = report.resolved.expect("resolved identifiers");
    assert_eq!(resolved.bundle_id, "com.acme.app");
    assert_eq!(resolved.team_id.as_deref(), Some("ABCDE12345"));
    assert_eq!(resolved.profile_uuid, "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee");
    assert_eq!(store.registrations.get(), 1);

    // Fifteen icons, all flattened.
    let iconset = ctx.paths().iconset_dir();
    assert_eq!(count_pngs(&iconset), 15);
    for entry in fs::read_dir(&iconset).unwrap().filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.extension().map(|e| e == "png").unwrap_or(false) {
            let img = image::open(&path).unwrap();
            assert!(!img.color().has_alpha(), "{:?} carries alpha", path);
        }
    }

    // Manifest bijective with the files on disk.
    let manifest = Manifest::load(ctx.paths().manifest_path()).unwrap();
    assert_eq!(manifest.images.len(), 15);
    for entry in &manifest.images {
        assert!(iconset.join(&entry.filename).exists(), "{} missing", entry.filename);
    }

    // Descriptor carries identity and flag-driven keys.
    let doc = DescriptorDocument::load(ctx.paths().descriptor_path()).unwrap();
    assert_eq!(
        doc.get(&["CFBundleShortVersionString"])
            .and_then(plist::Value::as_string),
        Some("1.2.0")
    );
    assert!(doc.get(&["aps-environment"]).is_some());

    // No backup files left behind.
    let leftovers: Vec<_> = walk_for_backups(fixture.project_dir().as_path());
    assert!(leftovers.is_empty(), "leftover backups: {:?}", leftovers);
}

fn walk_for_backups(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else { continue };
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.to_string_lossy().contains(".bak-") {
                found.push(path);
            }
        }
    }
    found
}

#[test]
fn test_second_run_is_idempotent() {
    let fixture = Fixture::new();
    let store = RecordingStore::default();
    let pipeline = Pipeline::new(fixture.credentials(), &store);

    let mut ctx = fixture.context();
    let first = pipeline.run(&mut ctx, &fixture.source_icon);
    assert!(first.success);

    let manifest_before = fs::read(ctx.paths().manifest_path()).unwrap();
    let descriptor_before = fs::read(ctx.paths().descriptor_path()).unwrap();

    let mut ctx2 = fixture.context();
    let second = pipeline.run(&mut ctx2, &fixture.source_icon);
    assert!(second.success);

    assert_eq!(fs::read(ctx.paths().manifest_path()).unwrap(), manifest_before);
    assert_eq!(
        fs::read(ctx.paths().descriptor_path()).unwrap(),
        descriptor_before
    );
}

#[test]
fn test_credential_fetch_failure_leaves_fresh_tree_unchanged() {
    let fixture = Fixture::new();
    let store = RecordingStore::default();

    let bad_credentials = CredentialConfig::new()
        .certificate(CredentialSource::Path(fixture.cert_path.clone()))
        .private_key(CredentialSource::Path(fixture.key_path.clone()))
        .profile(CredentialSource::Path(
            fixture.dir.path().join("missing.mobileprovision"),
        ));
    let pipeline = Pipeline::new(bad_credentials, &store);

    let mut ctx = fixture.context();
    let report = pipeline.run(&mut ctx, &fixture.source_icon);

    assert!(!report.success);
    assert_eq!(report.failed_component.as_deref(), Some("signing-resolver"));
    assert_eq!(store.registrations.get(), 0);

    // Neither catalog nor descriptor existed before the run; rollback
    // must remove what the earlier stages wrote.
    assert!(!ctx.paths().manifest_path().exists());
    assert!(!ctx.paths().descriptor_path().exists());
}

#[test]
fn test_credential_fetch_failure_restores_previous_artifacts() {
    let fixture = Fixture::new();
    let store = RecordingStore::default();

    // First, a successful run to put real artifacts in place.
    let pipeline = Pipeline::new(fixture.credentials(), &store);
    let mut ctx = fixture.context();
    assert!(pipeline.run(&mut ctx, &fixture.source_icon).success);

    let manifest_before = fs::read(ctx.paths().manifest_path()).unwrap();
    let descriptor_before = fs::read(ctx.paths().descriptor_path()).unwrap();

    // Then a run that dies at credential fetch.
    let bad_credentials = CredentialConfig::new()
        .certificate(CredentialSource::Path(fixture.cert_path.clone()))
        .private_key(CredentialSource::Path(fixture.key_path.clone()))
        .profile(CredentialSource::Path(
            fixture.dir.path().join("missing.mobileprovision"),
        ));
    let failing = Pipeline::new(bad_credentials, &store);
    let mut ctx2 = fixture.context();
    let report = failing.run(&mut ctx2, &fixture.source_icon);

    assert!(!report.success);
    assert_eq!(report.failed_component.as_deref(), Some("signing-resolver"));

    assert_eq!(fs::read(ctx.paths().manifest_path()).unwrap(), manifest_before);
    assert_eq!(
        fs::read(ctx.paths().descriptor_path()).unwrap(),
        descriptor_before
    );
}

#[test]
fn test_bundle_id_mismatch_is_warned_not_fatal() {
    let fixture = Fixture::new();
    let store = RecordingStore::default();
    let pipeline = Pipeline::new(fixture.credentials(), &store);

    let mut ctx = fixture.context().bundle_id("com.other.product");
    let report = pipeline.run(&mut ctx, &fixture.source_icon);

    assert!(report.success);
    assert!(report
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::BundleIdMismatch { .. })));
    let resolved = report.resolved.unwrap();
    assert_eq!(resolved.bundle_id, "com.other.product");
}

#[test]
fn test_corrupt_artifacts_are_repaired_with_warnings() {
    let fixture = Fixture::new();
    let store = RecordingStore::default();
    let pipeline = Pipeline::new(fixture.credentials(), &store);

    // Seed corrupt artifacts where the pipeline expects its documents.
    let mut ctx = fixture.context();
    fs::create_dir_all(ctx.paths().iconset_dir()).unwrap();
    fs::write(ctx.paths().manifest_path(), b"{ truncated").unwrap();
    fs::write(ctx.paths().descriptor_path(), b"<?xml not a plist").unwrap();

    let report = pipeline.run(&mut ctx, &fixture.source_icon);

    assert!(report.success, "report: {:?}", report);
    let replaced: Vec<_> = report
        .warnings
        .iter()
        .filter(|w| matches!(w, Warning::ArtifactReplaced { .. }))
        .collect();
    assert_eq!(replaced.len(), 2, "warnings: {:?}", report.warnings);

    // Repaired documents pass validation and carry the flag-driven keys.
    Manifest::load(ctx.paths().manifest_path()).unwrap();
    let doc = DescriptorDocument::load(ctx.paths().descriptor_path()).unwrap();
    assert!(doc.get(&["aps-environment"]).is_some());
}

#[test]
fn test_low_resolution_source_warns_but_succeeds() {
    let fixture = Fixture::new();
    let small_icon = fixture.dir.path().join("small.png");
    RgbaImage::from_pixel(512, 512, Rgba([10, 10, 10, 255]))
        .save(&small_icon)
        .unwrap();

    let store = RecordingStore::default();
    let pipeline = Pipeline::new(fixture.credentials(), &store);
    let mut ctx = fixture.context();
    let report = pipeline.run(&mut ctx, &small_icon);

    assert!(report.success);
    assert!(report
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::LowResolutionSource { required: 1024, .. })));
}
