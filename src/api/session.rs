//! Bearer credential holder.
//!
//! The session is an explicit service: build one at startup, hydrate it from
//! a token (flag, environment, or persisted token file), and share it by
//! `Arc` with every component that talks to the API. Teardown happens either
//! through [`Session::logout`] or when the request client sees a 401.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info, warn};

/// Environment variable consulted by [`Session::hydrate`].
pub const TOKEN_ENV_VAR: &str = "DOCVAULT_TOKEN";

/// Why the previous session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEndReason {
    /// The server rejected the credential (HTTP 401).
    Expired,
}

/// Errors from persisting a credential.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Token file I/O failed.
    #[error("IO error on token file {path}: {source}")]
    Io {
        /// The token file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    end_reason: Option<SessionEndReason>,
}

/// Holds the bearer credential attached to outgoing requests.
#[derive(Debug, Default)]
pub struct Session {
    state: Mutex<SessionState>,
    token_file: Option<PathBuf>,
}

impl Session {
    /// Creates an empty session with no persisted token file.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session holding `token`.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::new();
        session.lock().token = Some(token.into());
        session
    }

    /// Creates a session backed by a token file.
    ///
    /// The file is read by [`hydrate`](Self::hydrate) and removed whenever
    /// the credential is cleared.
    #[must_use]
    pub fn with_token_file(path: impl Into<PathBuf>) -> Self {
        Self {
            state: Mutex::new(SessionState::default()),
            token_file: Some(path.into()),
        }
    }

    /// Loads the credential from, in order: `explicit`, `DOCVAULT_TOKEN`, the token file.
    ///
    /// Returns whether a credential is now held.
    pub fn hydrate(&self, explicit: Option<&str>) -> bool {
        let from_env = std::env::var(TOKEN_ENV_VAR).ok();
        let token = explicit
            .map(str::to_string)
            .or(from_env)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .or_else(|| self.token_file.as_deref().and_then(read_token_file));

        let hydrated = token.is_some();
        debug!(hydrated, "session hydrated");
        self.lock().token = token;
        hydrated
    }

    /// Installs a freshly issued credential, optionally persisting it.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Io`] if `persist` is set and the token file
    /// cannot be written. The in-memory credential is installed regardless.
    pub fn login(&self, token: impl Into<String>, persist: bool) -> Result<(), SessionError> {
        let token = token.into();
        {
            let mut state = self.lock();
            state.token = Some(token.clone());
            state.end_reason = None;
        }
        if persist && let Some(path) = &self.token_file {
            write_token_file(path, &token)?;
        }
        info!("session credential installed");
        Ok(())
    }

    /// Clears the credential at the user's request.
    pub fn logout(&self) {
        self.lock().token = None;
        self.remove_token_file();
        info!("session cleared by logout");
    }

    /// Returns the current bearer token.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    /// Whether a credential is currently held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.lock().token.is_some()
    }

    /// Clears the credential after a 401.
    ///
    /// Returns `true` only for the call that actually removed a credential, so
    /// concurrent 401s produce a single expiry signal.
    pub fn expire(&self) -> bool {
        let cleared = {
            let mut state = self.lock();
            let cleared = state.token.take().is_some();
            if cleared {
                state.end_reason = Some(SessionEndReason::Expired);
            }
            cleared
        };
        if cleared {
            self.remove_token_file();
            warn!("session expired; credential cleared");
        }
        cleared
    }

    /// Takes the one-shot reason the previous session ended, if any.
    pub fn take_end_reason(&self) -> Option<SessionEndReason> {
        self.lock().end_reason.take()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove_token_file(&self) {
        let Some(path) = &self.token_file else {
            return;
        };
        match fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed persisted token"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove persisted token"),
        }
    }
}

fn read_token_file(path: &Path) -> Option<String> {
    let raw = fs::read_to_string(path).ok()?;
    let token = raw.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn write_token_file(path: &Path, token: &str) -> Result<(), SessionError> {
    let io_err = |source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, token).map_err(io_err)
}
