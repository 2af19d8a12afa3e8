//! HTTP client for the storage server.

use std::sync::Arc;

use reqwest::{Client, Response};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::auth::{AuthSession, PasswordPrompt, TokenStore, AUTH_HEADER};
use super::config::SyncConfig;
use super::models::{ListResponse, StorageAck, SyncBlocksResponse, SyncReport, check_error};
use super::{Result, SyncError};
use crate::container::Container;
use crate::dirty::DirtyTracker;
use crate::merge::Delta;

/// Header carrying the hex-encoded blob key.
pub const KEY_HEADER: &str = "file-path";

pub const READ_PATH:        &str = "/api/read";
pub const WRITE_PATH:       &str = "/api/write";
pub const REMOVE_PATH:      &str = "/api/remove";
pub const LIST_PATH:        &str = "/api/list";
pub const SYNC_BLOCKS_PATH: &str = "/api/sync-blocks";

/// Storage client.  Each instance owns its own handshake state; every data
/// operation authenticates lazily before touching the network.
pub struct SyncClient {
    pub(crate) http:    Client,
    pub(crate) config:  SyncConfig,
    pub(crate) prompt:  Arc<dyn PasswordPrompt>,
    pub(crate) tokens:  Arc<dyn TokenStore>,
    pub(crate) session: Mutex<AuthSession>,
}

impl SyncClient {
    pub fn new(
        config: SyncConfig,
        prompt: Arc<dyn PasswordPrompt>,
        tokens: Arc<dyn TokenStore>,
    ) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            config,
            prompt,
            tokens,
            session: Mutex::new(AuthSession::default()),
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    // ── Blob storage ─────────────────────────────────────────────────────────

    /// Fetch a blob.  `None` means the server holds nothing under `key`.
    pub async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let token = self.authenticate().await?;
        let resp = self
            .http
            .get(self.config.endpoint(READ_PATH))
            .header(KEY_HEADER, hex::encode(key))
            .header(AUTH_HEADER, token)
            .send()
            .await?;
        let resp = ensure_success(resp, "read").await?;
        let data = resp.bytes().await?;
        debug!(key, len = data.len(), "read blob");
        Ok((!data.is_empty()).then(|| data.to_vec()))
    }

    pub async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let token = self.authenticate().await?;
        let resp = self
            .http
            .post(self.config.endpoint(WRITE_PATH))
            .header(KEY_HEADER, hex::encode(key))
            .header(AUTH_HEADER, token)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data.to_vec())
            .send()
            .await?;
        let resp = ensure_success(resp, "write").await?;
        let ack: StorageAck = serde_json::from_slice(&resp.bytes().await?)?;
        ack.into_result()?;
        debug!(key, len = data.len(), "wrote blob");
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        let token = self.authenticate().await?;
        let resp = self
            .http
            .get(self.config.endpoint(REMOVE_PATH))
            .header(KEY_HEADER, hex::encode(key))
            .header(AUTH_HEADER, token)
            .send()
            .await?;
        let resp = ensure_success(resp, "remove").await?;
        let ack: StorageAck = serde_json::from_slice(&resp.bytes().await?)?;
        ack.into_result()
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        let token = self.authenticate().await?;
        let resp = self
            .http
            .get(self.config.endpoint(LIST_PATH))
            .header(AUTH_HEADER, token)
            .send()
            .await?;
        let resp = ensure_success(resp, "list").await?;
        let body: ListResponse = serde_json::from_slice(&resp.bytes().await?)?;
        check_error(body.error)?;
        Ok(body.content)
    }

    pub async fn list_items(&self) -> Result<Vec<String>> {
        self.list().await
    }

    // ── Delta sync ───────────────────────────────────────────────────────────

    /// Upload changed raw records and deleted names to the delta endpoint.
    pub async fn sync_blocks<'a, I>(&self, changed: I, deleted: Vec<String>) -> Result<SyncReport>
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let delta = Delta::from_raw(changed, deleted);
        let token = self.authenticate().await?;
        let resp = self
            .http
            .post(self.config.endpoint(SYNC_BLOCKS_PATH))
            .header(AUTH_HEADER, token)
            .json(&delta)
            .send()
            .await?;
        let resp = ensure_success(resp, "sync-blocks").await?;
        let body: SyncBlocksResponse = serde_json::from_slice(&resp.bytes().await?)?;
        check_error(body.error)?;

        info!(
            changed = delta.blocks.len(),
            deleted = delta.deleted.len(),
            success = body.success,
            size = body.size,
            "synced blocks"
        );
        Ok(SyncReport { success: body.success, size: body.size })
    }

    /// Push everything `tracker` has pending, taking record bytes from the
    /// local `container`.  The tracker is cleared only when the server
    /// reports success.  Returns `None` without any network traffic when
    /// nothing is pending.
    pub async fn flush(
        &self,
        tracker:   &mut DirtyTracker,
        container: &Container,
    ) -> Result<Option<SyncReport>> {
        if !tracker.has_pending_changes() {
            return Ok(None);
        }

        let dirty   = tracker.list_dirty();
        let deleted = tracker.list_deleted();
        let changed: Vec<(&str, &[u8])> = dirty
            .iter()
            .filter_map(|name| match container.get(name) {
                Some(block) => Some((block.name.as_str(), block.raw.as_slice())),
                None => {
                    warn!(block = %name, "dirty block missing from local container, skipping");
                    None
                }
            })
            .collect();

        let report = self.sync_blocks(changed, deleted).await?;
        if report.success {
            tracker.clear();
        } else {
            warn!("server did not confirm sync; keeping pending changes");
        }
        Ok(Some(report))
    }
}

pub(crate) async fn ensure_success(resp: Response, op: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SyncError::remote(format!("{op} failed ({status}): {body}")))
}
