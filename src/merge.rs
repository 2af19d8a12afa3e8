//! Apply a delta (changed records + deleted names) to an encoded container.
//!
//! Changed records arrive fully encoded and base64-wrapped; they replace
//! the named entry wholesale and are never re-parsed.  Blocks that are
//! neither changed nor deleted are carried through from their preserved
//! `raw` bytes, so merge cost on untouched blocks is bookkeeping only.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::block::Block;
use crate::codec::Compression;
use crate::container::{decode, encode_container, ContainerError};

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Merge failed: {0}")]
    MergeFailed(#[source] ContainerError),
    #[error("Changed block {name:?} is not valid base64: {reason}")]
    InvalidBlockEncoding { name: String, reason: String },
}

/// Incremental update to a container.  This is also the JSON body of the
/// remote sync endpoint: `{"blocks": {name: base64}, "deleted": [names]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub blocks:  BTreeMap<String, String>,
    #[serde(default)]
    pub deleted: Vec<String>,
}

impl Delta {
    /// Build a delta from raw records, base64-wrapping each one.
    pub fn from_raw<'a, I>(changed: I, deleted: Vec<String>) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let blocks = changed
            .into_iter()
            .map(|(name, raw)| (name.to_owned(), STANDARD.encode(raw)))
            .collect();
        Self { blocks, deleted }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.deleted.is_empty()
    }
}

/// Decode `existing`, drop `deleted`, substitute `changed`, re-encode.
///
/// `default_compression` only matters to callers that encode new blocks
/// before merging; changed records are already encoded and are stored as
/// given.
pub fn merge<'a, C, D>(
    existing:            &[u8],
    changed:             C,
    deleted:             D,
    default_compression: Compression,
) -> Result<Vec<u8>, MergeError>
where
    C: IntoIterator<Item = (&'a str, &'a str)>,
    D: IntoIterator<Item = &'a str>,
{
    let mut blocks = decode(existing).map_err(MergeError::MergeFailed)?;
    let existing_count = blocks.len();

    let mut deleted_count = 0usize;
    for name in deleted {
        if blocks.remove(name).is_some() {
            debug!(block = name, "deleted block");
        }
        deleted_count += 1;
    }

    let mut changed_count = 0usize;
    for (name, encoded) in changed {
        let raw = STANDARD
            .decode(encoded)
            .map_err(|e| MergeError::InvalidBlockEncoding {
                name:   name.to_owned(),
                reason: e.to_string(),
            })?;
        if raw.len() < 2 {
            warn!(block = name, len = raw.len(), "changed block shorter than its header");
        }
        let block = Block::from_raw(name, raw);
        debug!(
            block = name,
            block_type = block.block_type,
            compression = block.compression.name(),
            "updated block"
        );
        blocks.insert(block);
        changed_count += 1;
    }

    info!(
        existing = existing_count,
        changed = changed_count,
        deleted = deleted_count,
        default_compression = default_compression.name(),
        "merged delta"
    );

    Ok(encode_container(blocks.iter().map(|b| b.raw.as_slice())))
}

/// [`merge`] driven by a [`Delta`].
pub fn merge_delta(
    existing:            &[u8],
    delta:               &Delta,
    default_compression: Compression,
) -> Result<Vec<u8>, MergeError> {
    merge(
        existing,
        delta.blocks.iter().map(|(n, b)| (n.as_str(), b.as_str())),
        delta.deleted.iter().map(String::as_str),
        default_compression,
    )
}
