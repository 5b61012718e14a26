//! Certificate normalization.
//!
//! Whatever form the certificate arrives in, the rest of the pipeline and
//! the credential store see exactly one shape: a PKCS#12 container plus
//! its password. A cert+key file pair is validated and repacked; a .p12 is
//! validated and passed through.

use crate::{Error, Result};
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::x509::X509;
use secrecy::{ExposeSecret, SecretString};

/// The single normalized credential form.
///
/// The password is zeroized on drop and never serialized.
pub struct NormalizedCredential {
    /// DER-encoded PKCS#12 container holding certificate and key.
    pub pkcs12_der: Vec<u8>,
    /// Password protecting the container.
    pub password: SecretString,
    /// Certificate subject common name, when present.
    pub common_name: Option<String>,
    /// Team identifier from the certificate subject OU, when present.
    pub team_id: Option<String>,
}

/// Validate a PKCS#12 input and carry it through unchanged.
pub fn from_pkcs12(der: Vec<u8>, password: Option<&SecretString>) -> Result<NormalizedCredential> {
    let pkcs12 = Pkcs12::from_der(&der)
        .map_err(|e| Error::Certificate(format!("invalid PKCS#12: {}", e)))?;

    let pass = password.map(|s| s.expose_secret().as_str()).unwrap_or("");
    let parsed = pkcs12
        .parse2(pass)
        .map_err(|e| Error::Certificate(format!("failed to parse PKCS#12: {}", e)))?;

    let cert = parsed
        .cert
        .ok_or_else(|| Error::Certificate("no certificate in PKCS#12".into()))?;
    if parsed.pkey.is_none() {
        return Err(Error::Certificate("no private key in PKCS#12".into()));
    }

    Ok(NormalizedCredential {
        pkcs12_der: der,
        password: SecretString::new(pass.to_string()),
        common_name: subject_entry(&cert, Nid::COMMONNAME),
        team_id: subject_entry(&cert, Nid::ORGANIZATIONALUNITNAME),
    })
}

/// Convert a PEM/DER certificate + private key pair into the normalized
/// PKCS#12 form.
pub fn from_pem_pair(
    cert_data: &[u8],
    key_data: &[u8],
    password: Option<&SecretString>,
) -> Result<NormalizedCredential> {
    let certificate = X509::from_pem(cert_data)
        .or_else(|_| X509::from_der(cert_data))
        .map_err(|e| Error::Certificate(format!("failed to load certificate: {}", e)))?;

    let private_key = if let Some(pass) = password {
        PKey::private_key_from_pem_passphrase(key_data, pass.expose_secret().as_bytes())
    } else {
        PKey::private_key_from_pem(key_data)
            .or_else(|_| PKey::private_key_from_der(key_data))
    }
    .map_err(|e| Error::Certificate(format!("failed to load private key: {}", e)))?;

    validate_key_pair(&certificate, &private_key)?;

    let common_name = subject_entry(&certificate, Nid::COMMONNAME);
    let team_id = subject_entry(&certificate, Nid::ORGANIZATIONALUNITNAME);

    let out_password = password
        .cloned()
        .unwrap_or_else(|| SecretString::new(String::new()));

    let friendly_name = common_name.as_deref().unwrap_or("signing certificate");
    let mut builder = Pkcs12::builder();
    builder.name(friendly_name);
    builder.pkey(&private_key);
    builder.cert(&certificate);
    let pkcs12 = builder.build2(out_password.expose_secret())?;

    Ok(NormalizedCredential {
        pkcs12_der: pkcs12.to_der()?,
        password: out_password,
        common_name,
        team_id,
    })
}

/// The private key must match the certificate's public key.
fn validate_key_pair(cert: &X509, private_key: &PKey<Private>) -> Result<()> {
    let cert_public_key = cert.public_key().map_err(|e| {
        Error::Certificate(format!(
            "failed to extract public key from certificate: {}",
            e
        ))
    })?;

    if !private_key.public_eq(&cert_public_key) {
        return Err(Error::Certificate(
            "private key does not match certificate public key".into(),
        ));
    }

    Ok(())
}

/// First subject-name entry for a given NID.
fn subject_entry(cert: &X509, nid: Nid) -> Option<String> {
    for entry in cert.subject_name().entries() {
        if entry.object().nid() == nid {
            if let Ok(data) = entry.data().as_utf8() {
                return Some(data.to_string());
            }
        }
    }
    None
}
