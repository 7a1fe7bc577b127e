//! Baseline image used for visual-difference comparisons.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use url::Url;

const REMOTE_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_REFERENCE_BYTES: u64 = 10 * 1024 * 1024;

/// Where the current reference image lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReferenceImage {
    Local(PathBuf),
    Remote(Url),
    Memory(Vec<u8>),
}

impl ReferenceImage {
    /// Interpret a configured source: `http(s)://` URLs are remote, anything
    /// else is a local path.
    pub fn from_source(source: &str) -> Result<Self> {
        if source.starts_with("http://") || source.starts_with("https://") {
            let url = Url::parse(source).context("parse reference url")?;
            return Ok(Self::Remote(url));
        }
        Ok(Self::Local(PathBuf::from(source)))
    }

    /// Fetch the encoded image bytes.
    pub fn load(&self) -> Result<Vec<u8>> {
        match self {
            Self::Local(path) => std::fs::read(path)
                .with_context(|| format!("read reference image {}", path.display())),
            Self::Remote(url) => fetch_remote(url),
            Self::Memory(bytes) => Ok(bytes.clone()),
        }
    }
}

fn fetch_remote(url: &Url) -> Result<Vec<u8>> {
    let response = ureq::get(url.as_str())
        .timeout(REMOTE_FETCH_TIMEOUT)
        .call()
        .with_context(|| format!("fetch reference image {}", url))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_REFERENCE_BYTES)
        .read_to_end(&mut bytes)
        .context("read reference image body")?;
    if bytes.is_empty() {
        return Err(anyhow!("reference image {} is empty", url));
    }
    Ok(bytes)
}

/// Owns the process-wide reference image. Only the ingestion unit touches it.
#[derive(Debug)]
pub struct ReferenceStore {
    path: PathBuf,
    current: Option<ReferenceImage>,
}

impl ReferenceStore {
    /// Store that persists new references at `path`. An existing file there
    /// becomes the initial reference; otherwise `fallback` (if any) does.
    pub fn open(path: impl Into<PathBuf>, fallback: Option<ReferenceImage>) -> Self {
        let path = path.into();
        let current = if path.is_file() {
            log::info!("using existing reference image {}", path.display());
            Some(ReferenceImage::Local(path.clone()))
        } else {
            if let Some(fallback) = &fallback {
                log::info!("using configured reference image {:?}", fallback);
            }
            fallback
        };
        Self { path, current }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> Option<&ReferenceImage> {
        self.current.as_ref()
    }

    /// Persist `bytes` as the new reference and switch to it.
    pub fn replace(&mut self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create reference dir {}", parent.display()))?;
            }
        }
        std::fs::write(&self.path, bytes)
            .with_context(|| format!("write reference image {}", self.path.display()))?;
        self.current = Some(ReferenceImage::Local(self.path.clone()));
        Ok(())
    }

    /// Switch to `bytes` without persisting them. Used when the reference
    /// path cannot be written; the image is lost on restart.
    pub fn hold_in_memory(&mut self, bytes: Vec<u8>) {
        self.current = Some(ReferenceImage::Memory(bytes));
    }
}
