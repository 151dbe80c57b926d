//! Session token storage.
//!
//! The token lives in memory and is mirrored to one durable file, so a new
//! process restores a prior session without any network call. There is no
//! expiry: a token is valid until explicitly cleared.

use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Holds the opaque credential token. Cloning shares the same session.
#[derive(Clone)]
pub struct SessionStore {
  token: Arc<Mutex<Option<String>>>,
  path: PathBuf,
}

impl SessionStore {
  /// Open the session at the default location, restoring a persisted token
  /// if one exists.
  pub fn open() -> Result<Self> {
    Self::with_path(Self::default_path()?)
  }

  /// Open the session backed by an explicit file path.
  pub fn with_path(path: PathBuf) -> Result<Self> {
    let token = match std::fs::read_to_string(&path) {
      Ok(contents) => {
        let trimmed = contents.trim();
        if trimmed.is_empty() {
          None
        } else {
          debug!("restored session from {}", path.display());
          Some(trimmed.to_string())
        }
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
      Err(e) => {
        return Err(eyre!(
          "Failed to read session file {}: {}",
          path.display(),
          e
        ))
      }
    };

    Ok(Self {
      token: Arc::new(Mutex::new(token)),
      path,
    })
  }

  /// Default token file location.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("kardex").join("auth_token"))
  }

  /// The current token, if authenticated.
  pub fn token(&self) -> Option<String> {
    self
      .token
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  pub fn is_authenticated(&self) -> bool {
    self.token().is_some()
  }

  /// Store the token in memory and on disk.
  pub fn login(&self, token: &str) -> Result<()> {
    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create session directory: {}", e))?;
    }
    std::fs::write(&self.path, token)
      .map_err(|e| eyre!("Failed to write session file {}: {}", self.path.display(), e))?;

    *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
    debug!("session stored");
    Ok(())
  }

  /// Clear the token from memory and disk.
  pub fn logout(&self) -> Result<()> {
    match std::fs::remove_file(&self.path) {
      Ok(()) => {}
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
      Err(e) => {
        return Err(eyre!(
          "Failed to remove session file {}: {}",
          self.path.display(),
          e
        ))
      }
    }

    *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
    debug!("session cleared");
    Ok(())
  }
}
