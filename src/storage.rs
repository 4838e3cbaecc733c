//! Persisted session credential.
//!
//! The bearer token and the last known identity live in one JSON file under
//! the fixed keys `userToken` and `userInfo`. Only the session holder writes
//! or clears it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::models::runner::RunnerIdentity;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoredCredential {
    #[serde(rename = "userToken", default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(rename = "userInfo", default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<RunnerIdentity>,
}

#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable files count as "no credential".
    pub fn load(&self) -> StoredCredential {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return StoredCredential::default();
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to read credential file");
                return StoredCredential::default();
            }
        };

        match serde_json::from_str(&data) {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!(error = %err, "failed to parse credential file");
                StoredCredential::default()
            }
        }
    }

    pub fn save_token(&self, token: &str) -> Result<(), ClientError> {
        let mut stored = self.load();
        stored.token = Some(token.to_string());
        self.write(&stored)
    }

    pub fn save(&self, token: &str, identity: &RunnerIdentity) -> Result<(), ClientError> {
        self.write(&StoredCredential {
            token: Some(token.to_string()),
            identity: Some(identity.clone()),
        })
    }

    pub fn clear(&self) -> Result<(), ClientError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ClientError::Storage(format!(
                "failed to remove {}: {err}",
                self.path.display()
            ))),
        }
    }

    fn write(&self, stored: &StoredCredential) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| {
                ClientError::Storage(format!("failed to create {}: {err}", parent.display()))
            })?;
        }

        let json = serde_json::to_string_pretty(stored)?;
        std::fs::write(&self.path, json).map_err(|err| {
            ClientError::Storage(format!("failed to write {}: {err}", self.path.display()))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&self.path, perms);
        }

        Ok(())
    }
}
