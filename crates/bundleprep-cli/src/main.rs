//! Command-line interface for the bundleprep build-preparation pipeline.
//!
//! Builds a [`BuildContext`] from flags and an optional JSON config file,
//! runs the pipeline, and prints the readiness report. Exit code 0 means
//! the report said `success`.

use bundleprep::descriptor;
use bundleprep::signing::{CredentialConfig, CredentialSource, CredentialStore, NoopStore, SecurityToolStore};
use bundleprep::{BuildContext, Pipeline, ReadinessReport};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bundleprep")]
#[command(about = "Prepare an app bundle for compilation and signing")]
struct Cli {
    /// Project directory holding the bundle artifacts
    project_dir: PathBuf,

    /// Source raster every icon is generated from
    #[arg(short = 'i', long)]
    source_icon: Option<PathBuf>,

    /// Certificate source, URL or path (PEM or DER)
    #[arg(short = 'c', long)]
    certificate: Option<String>,

    /// Private key source, URL or path (PEM or DER)
    #[arg(short = 'k', long)]
    private_key: Option<String>,

    /// PKCS#12 source, URL or path
    #[arg(short = 'p', long)]
    pkcs12: Option<String>,

    /// Provisioning profile source, URL or path
    #[arg(short = 'm', long)]
    profile: Option<String>,

    /// Password for the private key or PKCS#12 container
    #[arg(long)]
    password: Option<String>,

    /// Application bundle identifier
    #[arg(short = 'b', long)]
    bundle_id: Option<String>,

    /// Human-visible application name
    #[arg(short = 'n', long)]
    display_name: Option<String>,

    /// Marketing version string
    #[arg(long)]
    version: Option<String>,

    /// Build number string
    #[arg(long)]
    build_number: Option<String>,

    /// Team identifier, if known up front
    #[arg(short = 't', long)]
    team_id: Option<String>,

    /// Feature flag to enable (repeatable), e.g. push_notifications
    #[arg(short = 'f', long = "feature")]
    features: Vec<String>,

    /// JSON config file; explicit flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Release build (selects the production push environment)
    #[arg(long)]
    release: bool,

    /// Resolve credentials without registering them
    #[arg(long)]
    dry_run: bool,

    /// Keychain the certificate is imported into
    #[arg(long)]
    keychain: Option<String>,

    /// Directory provisioning profiles are installed under
    #[arg(long)]
    profiles_dir: Option<PathBuf>,

    /// Print the readiness report as JSON
    #[arg(long)]
    json: bool,
}

/// Config-file mirror of the flags. Anything given on the command line
/// wins; feature lists are merged.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    source_icon: Option<PathBuf>,
    certificate: Option<String>,
    private_key: Option<String>,
    pkcs12: Option<String>,
    profile: Option<String>,
    password: Option<String>,
    bundle_id: Option<String>,
    display_name: Option<String>,
    version: Option<String>,
    build_number: Option<String>,
    team_id: Option<String>,
    #[serde(default)]
    features: Vec<String>,
    release: Option<bool>,
}

impl FileConfig {
    fn load(path: &PathBuf) -> Result<Self, String> {
        let data = std::fs::read(path)
            .map_err(|e| format!("failed to read config {}: {}", path.display(), e))?;
        serde_json::from_slice(&data)
            .map_err(|e| format!("failed to parse config {}: {}", path.display(), e))
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(success) => {
            if success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(message) => {
            eprintln!("error: {}", message);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<bool, String> {
    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };

    let source_icon = cli
        .source_icon
        .clone()
        .or(file.source_icon.clone())
        .ok_or("a source icon is required (--source-icon or config)")?;

    let ctx = build_context(&cli, &file);
    let credentials = build_credentials(&cli, &file)?;

    let report = if cli.dry_run {
        let store = NoopStore;
        run_pipeline(credentials, &store, ctx, &source_icon)
    } else {
        let store = SecurityToolStore::new(profiles_dir(&cli)?, cli.keychain.clone());
        run_pipeline(credentials, &store, ctx, &source_icon)
    };

    if cli.json {
        let body = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("failed to serialize report: {}", e))?;
        println!("{}", body);
    } else {
        print_report(&report);
    }

    Ok(report.success)
}

fn run_pipeline(
    credentials: CredentialConfig,
    store: &dyn CredentialStore,
    mut ctx: BuildContext,
    source_icon: &PathBuf,
) -> ReadinessReport {
    Pipeline::new(credentials, store).run(&mut ctx, source_icon)
}

fn build_context(cli: &Cli, file: &FileConfig) -> BuildContext {
    let mut ctx = BuildContext::new(&cli.project_dir);

    if let Some(id) = cli.bundle_id.clone().or_else(|| file.bundle_id.clone()) {
        ctx = ctx.bundle_id(id);
    }
    if let Some(name) = cli
        .display_name
        .clone()
        .or_else(|| file.display_name.clone())
    {
        ctx = ctx.display_name(name);
    }
    if let Some(version) = cli.version.clone().or_else(|| file.version.clone()) {
        ctx = ctx.version(version);
    }
    if let Some(build) = cli
        .build_number
        .clone()
        .or_else(|| file.build_number.clone())
    {
        ctx = ctx.build_number(build);
    }
    if let Some(team) = cli.team_id.clone().or_else(|| file.team_id.clone()) {
        ctx = ctx.team_id(team);
    }

    ctx = ctx.release(cli.release || file.release.unwrap_or(false));

    for feature in cli.features.iter().chain(file.features.iter()) {
        ctx.set_flag(canonical_flag(feature));
    }

    ctx
}

/// Accept dashed spellings of the well-known flag names.
fn canonical_flag(name: &str) -> String {
    let normalized = name.replace('-', "_");
    for known in [
        descriptor::flags::PUSH_NOTIFICATIONS,
        descriptor::flags::BACKGROUND_LOCATION,
        descriptor::flags::CAMERA,
        descriptor::flags::PHOTO_LIBRARY,
        descriptor::flags::ALLOW_HTTP,
    ] {
        if normalized == known {
            return known.to_string();
        }
    }
    normalized
}

fn build_credentials(cli: &Cli, file: &FileConfig) -> Result<CredentialConfig, String> {
    let mut config = CredentialConfig::new();

    if let Some(source) = cli.pkcs12.as_deref().or(file.pkcs12.as_deref()) {
        config = config.pkcs12(CredentialSource::parse(source));
    }
    if let Some(source) = cli.certificate.as_deref().or(file.certificate.as_deref()) {
        config = config.certificate(CredentialSource::parse(source));
    }
    if let Some(source) = cli.private_key.as_deref().or(file.private_key.as_deref()) {
        config = config.private_key(CredentialSource::parse(source));
    }
    if let Some(source) = cli.profile.as_deref().or(file.profile.as_deref()) {
        config = config.profile(CredentialSource::parse(source));
    }
    if let Some(password) = cli.password.as_deref().or(file.password.as_deref()) {
        config = config.password(password);
    }

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn profiles_dir(cli: &Cli) -> Result<PathBuf, String> {
    if let Some(dir) = &cli.profiles_dir {
        return Ok(dir.clone());
    }
    let home = std::env::var_os("HOME")
        .ok_or("cannot locate the provisioning profiles directory; pass --profiles-dir")?;
    Ok(PathBuf::from(home).join("Library/MobileDevice/Provisioning Profiles"))
}

fn print_report(report: &ReadinessReport) {
    if report.success {
        println!("ready");
    } else {
        match (&report.failed_component, &report.failure_reason) {
            (Some(component), Some(reason)) => {
                println!("failed in {}: {}", component, reason)
            }
            _ => println!("not ready"),
        }
    }

    if let Some(resolved) = &report.resolved {
        println!("  bundle id:    {}", resolved.bundle_id);
        if let Some(team) = &resolved.team_id {
            println!("  team id:      {}", team);
        }
        println!("  profile uuid: {}", resolved.profile_uuid);
        if let Some(name) = &resolved.certificate_name {
            println!("  certificate:  {}", name);
        }
    }

    for unmet in &report.unmet_specs {
        println!("  unmet: {}", unmet);
    }
    for warning in &report.warnings {
        println!("  warning: {}", warning);
    }
}
