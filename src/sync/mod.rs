//! Remote storage client: password handshake, per-key blob storage, and
//! delta upload of changed blocks.

pub mod auth;
pub mod client;
pub mod config;
pub mod models;

use std::io;

use thiserror::Error;

pub use auth::{AuthState, FileTokenStore, MemoryTokenStore, PasswordPrompt, PromptKind, TokenStore};
pub use client::SyncClient;
pub use config::SyncConfig;
pub use models::SyncReport;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Remote storage error: {message}")]
    RemoteStorage { message: String },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid JSON from remote: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Token store error: {0}")]
    TokenStore(#[source] io::Error),
    #[error("Password prompt failed: {0}")]
    Prompt(String),
}

impl SyncError {
    pub(crate) fn remote(message: impl Into<String>) -> Self {
        SyncError::RemoteStorage { message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
