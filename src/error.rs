//! Typed errors for the data layer.
//!
//! Every gateway call and mutation returns one of these as a value; nothing
//! in the data layer panics or surfaces an untyped failure. The view layer
//! only ever prints the message.

use thiserror::Error;

/// Errors produced at operation boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
  /// Local validation failure. Never reaches the network.
  #[error("{0}")]
  Validation(String),

  /// Authentication rejected (401).
  #[error("{message}")]
  Auth { message: String },

  /// The requested entity does not exist server-side (404).
  #[error("{message}")]
  NotFound { message: String },

  /// Transport failure or any other non-2xx response.
  #[error("{message}")]
  Fetch { status: Option<u16>, message: String },
}

impl ApiError {
  /// Map a non-2xx status plus the server-provided message, when the body
  /// carried one.
  pub fn from_status(status: u16, message: Option<String>) -> Self {
    let message =
      message.unwrap_or_else(|| format!("Request failed with status {}", status));
    match status {
      401 => Self::Auth { message },
      404 => Self::NotFound { message },
      _ => Self::Fetch {
        status: Some(status),
        message,
      },
    }
  }

  /// Transport-level failure with no HTTP status.
  pub fn network(message: impl Into<String>) -> Self {
    Self::Fetch {
      status: None,
      message: message.into(),
    }
  }

  /// True for errors raised before any network or cache work starts.
  pub fn is_validation(&self) -> bool {
    matches!(self, Self::Validation(_))
  }
}
