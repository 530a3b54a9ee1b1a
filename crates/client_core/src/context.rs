//! Process-wide application context: the persisted dark-mode preference and
//! the signed-in session. Built once on startup and passed to whatever needs
//! it.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shared::{domain::SessionUser, protocol::Session};
use tracing::{debug, warn};

const PREFERENCES_FILE: &str = "preferences.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub dark_mode: bool,
}

#[derive(Debug, Default)]
pub struct AppContext {
    preferences_path: Option<PathBuf>,
    preferences: Preferences,
    session: Option<Session>,
}

impl AppContext {
    /// Context without a backing file; preference changes are not persisted.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Reads the persisted preferences. A missing or unreadable file falls
    /// back to defaults so a corrupt preference never blocks startup.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let preferences = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(path = %path.display(), error = %err, "ignoring malformed preferences");
                Preferences::default()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no preferences file yet");
                Preferences::default()
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read preferences");
                Preferences::default()
            }
        };

        Self {
            preferences_path: Some(path),
            preferences,
            session: None,
        }
    }

    pub fn default_preferences_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("inventory").join(PREFERENCES_FILE))
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn preferences_path(&self) -> Option<&Path> {
        self.preferences_path.as_deref()
    }

    pub fn dark_mode(&self) -> bool {
        self.preferences.dark_mode
    }

    pub fn set_dark_mode(&mut self, enabled: bool) -> Result<()> {
        self.preferences.dark_mode = enabled;
        self.persist()
    }

    pub fn toggle_dark_mode(&mut self) -> Result<bool> {
        let enabled = !self.preferences.dark_mode;
        self.set_dark_mode(enabled)?;
        Ok(enabled)
    }

    pub fn sign_in(&mut self, session: Session) {
        self.session = Some(session);
    }

    pub fn sign_out(&mut self) -> Option<Session> {
        self.session.take()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.session.as_ref().map(|session| &session.user)
    }

    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.token.as_str())
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.preferences_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create preferences directory '{}'", parent.display())
            })?;
        }
        let raw = serde_json::to_string_pretty(&self.preferences)?;
        fs::write(path, raw)
            .with_context(|| format!("failed to write preferences to '{}'", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/context_tests.rs"]
mod tests;
