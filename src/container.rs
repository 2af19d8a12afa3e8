//! In-memory container and its binary codec.
//!
//! A container is `MAGIC` followed by zero or more block records, back to
//! back, with no trailer.  The end of the stream is the end of the
//! container.
//!
//! # Raw preservation
//! Every decoded [`Block`] keeps the exact byte span of its record in
//! `raw`.  [`Container::encode`] writes those spans back verbatim, so a
//! decode/encode cycle reproduces the input byte-for-byte and untouched
//! blocks are never recompressed.
//!
//! # Failure policy
//! - Bad signature: [`ContainerError::InvalidHeader`], nothing decoded.
//! - Any declared length running past the end of the buffer:
//!   [`ContainerError::CorruptContainer`], nothing decoded.
//! - A gzip payload that fails to inflate: the block is logged, listed in
//!   [`Container::dropped`], and decoding continues with the next record.

use std::io::{self, Cursor};

use indexmap::IndexMap;
use thiserror::Error;
use tracing::warn;

use crate::block::{Block, BlockError, BlockHeader, BlockType, BLOCK_PREFIX_SIZE, DATA_LEN_SIZE};
use crate::codec::{get_codec, Compression};
use crate::header::{read_magic, HeaderError, MAGIC, MAGIC_LEN};

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("Invalid RISUSAVE header")]
    InvalidHeader,
    #[error("Corrupt container: record at offset {offset} needs {needed} bytes, {available} remain")]
    CorruptContainer { offset: usize, needed: usize, available: usize },
    #[error(transparent)]
    Block(#[from] BlockError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<HeaderError> for ContainerError {
    fn from(e: HeaderError) -> Self {
        match e {
            HeaderError::InvalidMagic => ContainerError::InvalidHeader,
            HeaderError::Io(e)        => ContainerError::Io(e),
        }
    }
}

/// Ordered name → block map.  Iteration order is insertion order and is
/// the order records are written back out.
#[derive(Debug, Clone, Default)]
pub struct Container {
    blocks:  IndexMap<String, Block>,
    dropped: Vec<String>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(data: &[u8]) -> Result<Self, ContainerError> {
        decode(data)
    }

    /// Re-emit the container from each block's preserved `raw` record.
    pub fn encode(&self) -> Vec<u8> {
        encode_container(self.blocks.values().map(|b| b.raw.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Block> {
        self.blocks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.blocks.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.blocks.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    /// Blocks skipped during decode because their payload did not inflate.
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    /// Insert or replace a block.  A replaced name keeps its position.
    pub fn insert(&mut self, block: Block) -> Option<Block> {
        self.blocks.insert(block.name.clone(), block)
    }

    /// Encode `content` as a fresh record and insert it under `name`.
    pub fn insert_block(
        &mut self,
        block_type:  BlockType,
        compression: Compression,
        name:        &str,
        content:     &str,
    ) -> Result<(), ContainerError> {
        self.insert(Block::new(block_type, compression, name, content)?);
        Ok(())
    }

    /// Remove a block, keeping the relative order of the rest.
    pub fn remove(&mut self, name: &str) -> Option<Block> {
        self.blocks.shift_remove(name)
    }
}

/// Decode a full container.
pub fn decode(data: &[u8]) -> Result<Container, ContainerError> {
    read_magic(Cursor::new(data))?;

    let mut container = Container::new();
    let mut offset = MAGIC_LEN;

    while offset < data.len() {
        let available = data.len() - offset;
        if available < BLOCK_PREFIX_SIZE {
            return Err(corrupt(offset, BLOCK_PREFIX_SIZE, available));
        }
        let name_len   = data[offset + 2] as usize;
        let header_len = BLOCK_PREFIX_SIZE + name_len + DATA_LEN_SIZE;
        if available < header_len {
            return Err(corrupt(offset, header_len, available));
        }

        let header     = BlockHeader::read(&data[offset..offset + header_len])?;
        let record_len = header_len + header.data_len as usize;
        if available < record_len {
            return Err(corrupt(offset, record_len, available));
        }

        let raw     = &data[offset..offset + record_len];
        let payload = &raw[header_len..];
        offset += record_len;

        let content = match get_codec(header.compression).decompress(payload) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!(block = %header.name, error = %e, "dropping block that failed to decompress");
                container.dropped.push(header.name);
                continue;
            }
        };

        container.insert(Block {
            name:        header.name,
            block_type:  header.block_type,
            compression: header.compression,
            content:     Some(content),
            raw:         raw.to_vec(),
        });
    }

    Ok(container)
}

/// Concatenate `MAGIC` and the given records in order.  Records are
/// assumed to be well formed.
pub fn encode_container<'a, I>(raw_blocks: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut out = MAGIC.to_vec();
    for raw in raw_blocks {
        out.extend_from_slice(raw);
    }
    out
}

/// Block names in container order.
pub fn list_block_names(data: &[u8]) -> Result<Vec<String>, ContainerError> {
    Ok(decode(data)?.names().map(str::to_owned).collect())
}

fn corrupt(offset: usize, needed: usize, available: usize) -> ContainerError {
    ContainerError::CorruptContainer { offset, needed, available }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::encode_block;

    fn root_hello() -> Vec<u8> {
        let mut data = MAGIC.to_vec();
        data.extend_from_slice(&[1, 0, 4]);
        data.extend_from_slice(b"root");
        data.extend_from_slice(&5u32.to_le_bytes());
        data.extend_from_slice(b"hello");
        data
    }

    #[test]
    fn decodes_single_stored_block() {
        let data = root_hello();
        let c = decode(&data).unwrap();
        assert_eq!(c.len(), 1);
        let b = c.get("root").unwrap();
        assert_eq!(b.kind(), Some(BlockType::Root));
        assert_eq!(b.compression, Compression::Stored);
        assert_eq!(b.content.as_deref(), Some("hello"));
        assert_eq!(c.encode(), data);
    }

    #[test]
    fn magic_only_is_empty_container() {
        let c = decode(MAGIC).unwrap();
        assert!(c.is_empty());
        assert_eq!(c.encode(), MAGIC.to_vec());
    }

    #[test]
    fn bad_magic() {
        assert!(matches!(decode(b"RISUSAVX\0"), Err(ContainerError::InvalidHeader)));
        assert!(matches!(decode(b""), Err(ContainerError::InvalidHeader)));
    }

    #[test]
    fn overlong_data_length_is_corrupt() {
        let mut data = root_hello();
        data.extend_from_slice(&[3, 0, 2]);
        data.extend_from_slice(b"c1");
        data.extend_from_slice(&100u32.to_le_bytes());
        data.extend_from_slice(b"short");
        match decode(&data) {
            Err(ContainerError::CorruptContainer { offset, needed, available }) => {
                assert_eq!(offset, root_hello().len());
                assert_eq!(needed, 3 + 2 + 4 + 100);
                assert_eq!(available, 3 + 2 + 4 + 5);
            }
            other => panic!("expected CorruptContainer, got {other:?}"),
        }
    }

    #[test]
    fn truncated_name_is_corrupt() {
        let mut data = MAGIC.to_vec();
        data.extend_from_slice(&[1, 0, 10, b'a', b'b']);
        assert!(matches!(decode(&data), Err(ContainerError::CorruptContainer { .. })));
    }

    #[test]
    fn dangling_prefix_is_corrupt() {
        let mut data = root_hello();
        data.push(2);
        assert!(matches!(
            decode(&data),
            Err(ContainerError::CorruptContainer { needed: 3, available: 1, .. })
        ));
    }

    #[test]
    fn bad_gzip_drops_only_that_block() {
        let mut data = root_hello();
        let mut bad = vec![2u8, 1, 3];
        bad.extend_from_slice(b"bad");
        bad.extend_from_slice(&4u32.to_le_bytes());
        bad.extend_from_slice(b"nope");
        data.extend_from_slice(&bad);
        data.extend_from_slice(
            &encode_block(BlockType::Modules, Compression::Gzip, "modules", "[]").unwrap(),
        );

        let c = decode(&data).unwrap();
        assert_eq!(c.names().collect::<Vec<_>>(), vec!["root", "modules"]);
        assert_eq!(c.dropped(), &["bad".to_string()]);
        assert_eq!(c.get("modules").unwrap().content.as_deref(), Some("[]"));
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut c = decode(&root_hello()).unwrap();
        c.insert_block(BlockType::Config, Compression::Stored, "config", "{}").unwrap();
        c.insert_block(BlockType::Root, Compression::Gzip, "root", "bye").unwrap();
        assert_eq!(c.names().collect::<Vec<_>>(), vec!["root", "config"]);
        let again = decode(&c.encode()).unwrap();
        assert_eq!(again.get("root").unwrap().content.as_deref(), Some("bye"));
        assert_eq!(again.get("root").unwrap().compression, Compression::Gzip);
    }

    #[test]
    fn remove_keeps_order() {
        let mut c = Container::new();
        for name in ["a", "b", "c"] {
            c.insert_block(BlockType::Chat, Compression::Stored, name, name).unwrap();
        }
        assert!(c.remove("b").is_some());
        assert!(c.remove("b").is_none());
        assert_eq!(c.names().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn list_names_in_order() {
        let mut c = Container::new();
        c.insert_block(BlockType::Root, Compression::Stored, "root", "").unwrap();
        c.insert_block(BlockType::BotPreset, Compression::Gzip, "preset", "[]").unwrap();
        assert_eq!(list_block_names(&c.encode()).unwrap(), vec!["root", "preset"]);
    }
}
