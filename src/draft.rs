//! Sign-up draft persistence.
//!
//! The profile form is saved before it is submitted so an interrupted
//! sign-up can be resumed. Drafts expire after 24 hours and are discarded
//! on load once stale.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CircaError, Result};

/// Storage key for the draft. The file-backed store uses it as the
/// default file name.
pub const DRAFT_KEY: &str = "circa_signup_data";

/// Drafts older than this are discarded on load.
pub const DRAFT_TTL_HOURS: i64 = 24;

/// The profile form fields plus the instant they were captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupDraft {
    pub full_name: String,
    pub email: String,
    pub display_name: String,
    pub timestamp: DateTime<Utc>,
}

impl SignupDraft {
    pub fn new(
        full_name: impl Into<String>,
        email: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        SignupDraft {
            full_name: full_name.into(),
            email: email.into(),
            display_name: display_name.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.timestamp) < Duration::hours(DRAFT_TTL_HOURS)
    }
}

/// Where drafts live. Implementations apply the TTL on load so callers
/// never see a stale draft.
pub trait DraftStore: Send + Sync {
    fn load(&self) -> Result<Option<SignupDraft>>;
    fn save(&self, draft: &SignupDraft) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Draft stored as a JSON file on disk.
pub struct FileDraftStore {
    path: PathBuf,
}

impl FileDraftStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileDraftStore { path: path.into() }
    }
}

impl DraftStore for FileDraftStore {
    fn load(&self) -> Result<Option<SignupDraft>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CircaError::Storage(e.to_string())),
        };
        let draft: SignupDraft = match serde_json::from_str(&raw) {
            Ok(draft) => draft,
            // Unreadable drafts are dropped rather than surfaced.
            Err(_) => {
                self.clear()?;
                return Ok(None);
            }
        };
        if !draft.is_fresh(Utc::now()) {
            self.clear()?;
            return Ok(None);
        }
        Ok(Some(draft))
    }

    fn save(&self, draft: &SignupDraft) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| CircaError::Storage(e.to_string()))?;
            }
        }
        let json = serde_json::to_string(draft)?;
        fs::write(&self.path, json).map_err(|e| CircaError::Storage(e.to_string()))
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CircaError::Storage(e.to_string())),
        }
    }
}

/// In-memory draft slot, used by tests and headless embedders.
#[derive(Default)]
pub struct MemoryDraftStore {
    slot: Mutex<Option<SignupDraft>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DraftStore for MemoryDraftStore {
    fn load(&self) -> Result<Option<SignupDraft>> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(draft) = slot.as_ref() {
            if !draft.is_fresh(Utc::now()) {
                *slot = None;
            }
        }
        Ok(slot.clone())
    }

    fn save(&self, draft: &SignupDraft) -> Result<()> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(draft.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = None;
        Ok(())
    }
}
