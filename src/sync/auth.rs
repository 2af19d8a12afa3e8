//! Password handshake with the storage server.
//!
//! ```text
//! Unchecked ──status──▶ unset      ─▶ prompt, digest, set_password ─▶ Ok
//!                      incorrect  ─▶ prompt, digest, re-query until the
//!                                    server stops answering `unset`,
//!                                    then run the whole check again
//!                      otherwise  ─▶ Ok (cached for the client's lifetime)
//! ```
//!
//! The prompt loop is unbounded by design of the protocol: it only ends
//! when the person at the prompt supplies a password the server accepts,
//! or the prompt itself fails.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::client::{ensure_success, SyncClient};
use super::models::{DigestRequest, PasswordStatus, PasswordStatusResponse, SetPasswordRequest};
use super::{Result, SyncError};

pub const AUTH_HEADER: &str = "risu-auth";

pub const PASSWORD_STATUS_PATH: &str = "/api/password";
pub const SET_PASSWORD_PATH:    &str = "/api/set_password";
pub const DIGEST_PATH:          &str = "/api/crypto";

/// File name used by [`FileTokenStore`].
pub const TOKEN_FILE_NAME: &str = "risuauth";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unchecked,
    Unset,
    Incorrect,
    Ok,
}

/// Which question the prompt is being asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// The server has no password yet; choose one.
    SetPassword,
    /// The held token was rejected; enter the existing password.
    EnterPassword,
}

/// Interactive source of plaintext passwords.
#[async_trait]
pub trait PasswordPrompt: Send + Sync {
    async fn prompt(&self, kind: PromptKind) -> Result<String>;
}

/// Persistent home of the auth token between runs.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> io::Result<Option<String>>;
    fn save(&self, token: &str) -> io::Result<()>;
}

/// Token kept in a single file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self { path: dir.as_ref().join(TOKEN_FILE_NAME) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(s) => {
                let token = s.trim();
                Ok((!token.is_empty()).then(|| token.to_owned()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, token: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, token)
    }
}

/// Token kept for the life of the process only.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new(token: Option<String>) -> Self {
        Self { token: Mutex::new(token) }
    }

    pub fn current(&self) -> Option<String> {
        self.token.lock().ok().and_then(|t| t.clone())
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> io::Result<Option<String>> {
        Ok(self.current())
    }

    fn save(&self, token: &str) -> io::Result<()> {
        let mut slot = self
            .token
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "token store poisoned"))?;
        *slot = Some(token.to_owned());
        Ok(())
    }
}

/// Per-client handshake state.
#[derive(Debug)]
pub(crate) struct AuthSession {
    pub(crate) token: Option<String>,
    pub(crate) state: AuthState,
}

impl Default for AuthSession {
    fn default() -> Self {
        Self { token: None, state: AuthState::Unchecked }
    }
}

impl SyncClient {
    /// Run the handshake if this client has not completed it yet and
    /// return the token to send with data requests.
    pub(crate) async fn authenticate(&self) -> Result<String> {
        let mut session = self.session.lock().await;

        if session.token.is_none() {
            session.token = self.tokens.load().map_err(SyncError::TokenStore)?;
        }
        if session.state == AuthState::Ok {
            return Ok(session.token.clone().unwrap_or_default());
        }

        loop {
            let held = session.token.clone().unwrap_or_default();
            match self.password_status(&held).await? {
                PasswordStatus::Unset => {
                    session.state = AuthState::Unset;
                    let password = self.prompt.prompt(PromptKind::SetPassword).await?;
                    let digest = self.digest_password(&password).await?;
                    self.set_password(&held, &digest).await?;
                    self.tokens.save(&digest).map_err(SyncError::TokenStore)?;
                    session.token = Some(digest);
                    session.state = AuthState::Ok;
                    info!("remote password set");
                    break;
                }
                PasswordStatus::Incorrect => {
                    session.state = AuthState::Incorrect;
                    warn!("auth token rejected, asking for password");
                    loop {
                        let password = self.prompt.prompt(PromptKind::EnterPassword).await?;
                        let candidate = self.digest_password(&password).await?;
                        if self.password_status(&candidate).await? != PasswordStatus::Unset {
                            self.tokens.save(&candidate).map_err(SyncError::TokenStore)?;
                            session.token = Some(candidate);
                            break;
                        }
                    }
                }
                PasswordStatus::Ok => {
                    session.state = AuthState::Ok;
                    debug!("auth token accepted");
                    break;
                }
            }
        }

        Ok(session.token.clone().unwrap_or_default())
    }

    pub async fn auth_state(&self) -> AuthState {
        self.session.lock().await.state
    }

    /// Forget the handshake result; the next call re-checks with the server.
    pub async fn reset_auth(&self) {
        *self.session.lock().await = AuthSession::default();
    }

    async fn password_status(&self, token: &str) -> Result<PasswordStatus> {
        let resp = self
            .http
            .get(self.config.endpoint(PASSWORD_STATUS_PATH))
            .header(AUTH_HEADER, token)
            .send()
            .await?;
        let body: PasswordStatusResponse = serde_json::from_slice(&resp.bytes().await?)?;
        Ok(body.status())
    }

    /// Token returned by the server for `password`, trimmed the same way
    /// [`FileTokenStore::load`] trims it.
    async fn digest_password(&self, password: &str) -> Result<String> {
        let resp = self
            .http
            .post(self.config.endpoint(DIGEST_PATH))
            .json(&DigestRequest { data: password })
            .send()
            .await?;
        let resp = ensure_success(resp, "crypto").await?;
        let digest = resp.text().await?.trim().to_owned();
        if digest.is_empty() {
            return Err(SyncError::remote("crypto returned an empty digest"));
        }
        Ok(digest)
    }

    async fn set_password(&self, token: &str, digest: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.config.endpoint(SET_PASSWORD_PATH))
            .header(AUTH_HEADER, token)
            .json(&SetPasswordRequest { password: digest })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(SyncError::remote(format!("set_password failed: {}", resp.status())));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested"));
        assert_eq!(store.load().unwrap(), None);
        store.save("abc123").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("abc123"));
    }

    #[test]
    fn file_store_ignores_blank_file() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path());
        std::fs::write(store.path(), "  \n").unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn memory_store() {
        let store = MemoryTokenStore::default();
        assert_eq!(store.load().unwrap(), None);
        store.save("t").unwrap();
        assert_eq!(store.current().as_deref(), Some("t"));
    }
}
