//! Credential artifact retrieval.

use crate::{Error, Result};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Bound on remote fetches. Exceeding it surfaces as a retrieval error;
/// the pipeline imposes no other timeout.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a credential artifact comes from.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    Url(String),
    Path(PathBuf),
}

impl CredentialSource {
    /// Classify an input string: anything with an HTTP scheme is remote,
    /// everything else is a local path.
    pub fn parse(input: &str) -> Self {
        if input.starts_with("http://") || input.starts_with("https://") {
            CredentialSource::Url(input.to_string())
        } else {
            CredentialSource::Path(PathBuf::from(input))
        }
    }

    /// Retrieve the artifact bytes.
    ///
    /// # Errors
    ///
    /// Every failure mode (missing file, connect/read timeout, non-2xx
    /// status) maps to [`Error::Retrieval`]; retrieval is fatal to the
    /// pipeline and has no fallback.
    pub fn fetch(&self) -> Result<Vec<u8>> {
        match self {
            CredentialSource::Path(path) => fs::read(path)
                .map_err(|e| Error::Retrieval(format!("{}: {}", path.display(), e))),
            CredentialSource::Url(url) => {
                let client = reqwest::blocking::Client::builder()
                    .timeout(FETCH_TIMEOUT)
                    .build()
                    .map_err(|e| Error::Retrieval(e.to_string()))?;

                let response = client
                    .get(url)
                    .send()
                    .map_err(|e| Error::Retrieval(format!("{}: {}", url, e)))?;

                if !response.status().is_success() {
                    return Err(Error::Retrieval(format!(
                        "{}: HTTP {}",
                        url,
                        response.status()
                    )));
                }

                response
                    .bytes()
                    .map(|b| b.to_vec())
                    .map_err(|e| Error::Retrieval(format!("{}: {}", url, e)))
            }
        }
    }
}
