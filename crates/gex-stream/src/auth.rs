//! Credentials and the token-file authenticator.

use crate::error::AuthError;
use crate::transport::{Authenticator, BoxFuture};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Bearer credential handed to the transport. The token is wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    token: String,
    #[zeroize(skip)]
    expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenFile {
    #[serde(default)]
    access_token: String,
    /// Unix seconds.
    #[serde(default)]
    expires_at: Option<i64>,
}

/// Reads an access token from a JSON file kept current by an external
/// OAuth helper.
///
/// A missing file or an empty token is a permanent denial. An expired token
/// or a file that does not parse (e.g. caught mid-rewrite) is retryable,
/// since the helper is expected to replace it.
#[derive(Debug, Clone)]
pub struct TokenFileAuth {
    path: PathBuf,
}

impl TokenFileAuth {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Credential, AuthError> {
        let mut raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AuthError::permanent(format!(
                    "token file not found: {}",
                    self.path.display()
                )));
            }
            Err(e) => {
                return Err(AuthError::retryable(format!(
                    "failed to read token file {}: {e}",
                    self.path.display()
                )));
            }
        };

        let parsed: Result<TokenFile, _> = serde_json::from_str(&raw);
        raw.zeroize();
        let mut file = parsed
            .map_err(|e| AuthError::retryable(format!("malformed token file: {e}")))?;

        if file.access_token.trim().is_empty() {
            return Err(AuthError::permanent("token file has no access_token"));
        }

        let expires_at = file
            .expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
        let credential = Credential::new(std::mem::take(&mut file.access_token), expires_at);

        if credential.is_expired(Utc::now()) {
            return Err(AuthError::retryable("access token expired"));
        }

        debug!(path = %self.path.display(), expires_at = ?expires_at, "Loaded access token");
        Ok(credential)
    }
}

impl Authenticator for TokenFileAuth {
    fn authenticate(&self) -> BoxFuture<'_, Result<Credential, AuthError>> {
        Box::pin(self.load())
    }

    fn refresh<'a>(
        &'a self,
        _credential: &'a Credential,
    ) -> BoxFuture<'a, Result<Credential, AuthError>> {
        // The helper rewrites the file; re-reading picks up the new token.
        Box::pin(self.load())
    }
}
