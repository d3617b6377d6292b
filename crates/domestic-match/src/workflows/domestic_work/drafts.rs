use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{RegistrationDraft, WizardStep};

/// Saved wizard progress. Attachments are not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftSnapshot {
    pub step: WizardStep,
    pub draft: RegistrationDraft,
    pub saved_at: DateTime<Utc>,
}

impl DraftSnapshot {
    pub fn capture(step: WizardStep, draft: &RegistrationDraft) -> Self {
        Self {
            step,
            draft: draft.clone(),
            saved_at: Utc::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DraftStoreError {
    #[error("draft file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("draft could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("draft file {path} is corrupt: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Where in-progress registrations are kept between visits.
pub trait DraftStore: Send + Sync {
    fn save(&self, snapshot: &DraftSnapshot) -> Result<(), DraftStoreError>;
    fn load(&self) -> Result<Option<DraftSnapshot>, DraftStoreError>;
    fn clear(&self) -> Result<(), DraftStoreError>;
}

/// JSON file store. Writes go to a sibling temp file that is renamed into place.
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    path: PathBuf,
}

impl FileDraftStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> DraftStoreError {
        DraftStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl DraftStore for FileDraftStore {
    fn save(&self, snapshot: &DraftSnapshot) -> Result<(), DraftStoreError> {
        let encoded = serde_json::to_vec_pretty(snapshot).map_err(DraftStoreError::Encode)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }

        let temp = self.temp_path();
        fs::write(&temp, encoded).map_err(|err| self.io_error(err))?;
        fs::rename(&temp, &self.path).map_err(|err| self.io_error(err))
    }

    fn load(&self) -> Result<Option<DraftSnapshot>, DraftStoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error(err)),
        };

        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|source| DraftStoreError::Decode {
                path: self.path.clone(),
                source,
            })
    }

    fn clear(&self) -> Result<(), DraftStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(err)),
        }
    }
}
