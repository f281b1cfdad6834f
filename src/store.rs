//! Where rendered mockups go.
//!
//! The pipeline only sees [`ArtifactStore`]; the server wires in
//! [`FsArtifactStore`] pointing at the results directory.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::Builder as TempFileBuilder;
use tracing::debug;

use crate::error::StoreError;

/// Length of the random part of an artifact name.
const ID_LEN: usize = 16;
const EXTENSION: &str = ".png";

/// Opaque, randomly generated name of a stored artifact, e.g. `Ab3...Z9.png`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    /// Accepts only names this store could have produced, which also rules
    /// out path separators and `..`.
    pub fn parse(name: &str) -> Result<Self, StoreError> {
        let valid = name
            .strip_suffix(EXTENSION)
            .is_some_and(|id| id.len() == ID_LEN && id.bytes().all(|b| b.is_ascii_alphanumeric()));
        if valid {
            Ok(Self(name.to_string()))
        } else {
            Err(StoreError::InvalidReference(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait ArtifactStore: Send + Sync {
    /// Persists `bytes` under a fresh reference. Nothing is left behind on failure.
    fn put(&self, bytes: &[u8]) -> Result<ArtifactRef, StoreError>;

    /// Location of a previously stored artifact.
    fn resolve(&self, reference: &ArtifactRef) -> Result<PathBuf, StoreError>;
}

/// Stores artifacts as files in a single directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Opens (creating if needed) the directory at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactStore for FsArtifactStore {
    fn put(&self, bytes: &[u8]) -> Result<ArtifactRef, StoreError> {
        // The temp file is removed on drop unless it is kept, so an error
        // anywhere before `keep` leaves no partial artifact.
        let mut file = TempFileBuilder::new()
            .prefix("")
            .suffix(EXTENSION)
            .rand_bytes(ID_LEN)
            .tempfile_in(&self.root)?;
        file.write_all(bytes)?;
        file.as_file().sync_all()?;
        let (_, path) = file.keep().map_err(|e| StoreError::Io(e.error))?;

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::InvalidReference(path.display().to_string()))?;
        let reference = ArtifactRef::parse(name)?;
        debug!(path = %path.display(), bytes = bytes.len(), "Stored artifact");
        Ok(reference)
    }

    fn resolve(&self, reference: &ArtifactRef) -> Result<PathBuf, StoreError> {
        let path = self.root.join(reference.as_str());
        if path.is_file() {
            Ok(path)
        } else {
            Err(StoreError::NotFound(reference.to_string()))
        }
    }
}
