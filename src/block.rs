use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use thiserror::Error;

use crate::codec::{get_codec, CodecError, Compression};

/// Fixed bytes before the name: type, compression, name length.
pub const BLOCK_PREFIX_SIZE: usize = 3;
/// Width of the little-endian payload length that follows the name.
pub const DATA_LEN_SIZE: usize = 4;
pub const MAX_NAME_LEN: usize = u8::MAX as usize;

#[derive(Error, Debug)]
pub enum BlockError {
    #[error("Block name is {len} bytes; at most {MAX_NAME_LEN} fit in a record")]
    NameTooLong { len: usize },
    #[error("Block payload of {len} bytes exceeds the 32-bit length field")]
    PayloadTooLarge { len: usize },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Kind tag stored in the first byte of every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlockType {
    Config            = 0,
    Root              = 1,
    CharacterWithChat = 2,
    Chat              = 3,
    BotPreset         = 4,
    Modules           = 5,
}

impl BlockType {
    pub fn name(self) -> &'static str {
        match self {
            BlockType::Config            => "config",
            BlockType::Root              => "root",
            BlockType::CharacterWithChat => "character",
            BlockType::Chat              => "chat",
            BlockType::BotPreset         => "preset",
            BlockType::Modules           => "modules",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "config"    => Some(BlockType::Config),
            "root"      => Some(BlockType::Root),
            "character" => Some(BlockType::CharacterWithChat),
            "chat"      => Some(BlockType::Chat),
            "preset"    => Some(BlockType::BotPreset),
            "modules"   => Some(BlockType::Modules),
            _           => None,
        }
    }
}

impl TryFrom<u8> for BlockType {
    type Error = u8;
    fn try_from(tag: u8) -> Result<Self, u8> {
        Ok(match tag {
            0 => BlockType::Config,
            1 => BlockType::Root,
            2 => BlockType::CharacterWithChat,
            3 => BlockType::Chat,
            4 => BlockType::BotPreset,
            5 => BlockType::Modules,
            other => return Err(other),
        })
    }
}

/// Everything in a record that precedes the payload.
///
/// Layout (little-endian):
/// `[type u8][compression u8][name_len u8][name][data_len u32]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Raw tag byte; unknown kinds are kept as-is.
    pub block_type:  u8,
    pub compression: Compression,
    pub name:        String,
    pub data_len:    u32,
}

impl BlockHeader {
    /// Bytes this header occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        BLOCK_PREFIX_SIZE + self.name.len() + DATA_LEN_SIZE
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<(), BlockError> {
        let name = self.name.as_bytes();
        if name.len() > MAX_NAME_LEN {
            return Err(BlockError::NameTooLong { len: name.len() });
        }
        writer.write_u8(self.block_type)?;
        writer.write_u8(self.compression.flag())?;
        writer.write_u8(name.len() as u8)?;
        writer.write_all(name)?;
        writer.write_u32::<LittleEndian>(self.data_len)?;
        Ok(())
    }

    /// Read a header from a stream.  The caller is responsible for bounds;
    /// a short stream surfaces as `UnexpectedEof`.
    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let block_type  = reader.read_u8()?;
        let compression = Compression::from_flag(reader.read_u8()?);
        let name_len    = reader.read_u8()? as usize;
        let mut name    = vec![0u8; name_len];
        reader.read_exact(&mut name)?;
        let data_len    = reader.read_u32::<LittleEndian>()?;
        Ok(Self {
            block_type,
            compression,
            name: String::from_utf8_lossy(&name).into_owned(),
            data_len,
        })
    }
}

/// One decoded block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub name:        String,
    pub block_type:  u8,
    pub compression: Compression,
    /// Decoded text.  `None` when the record was substituted verbatim
    /// (merge) and never parsed.
    pub content:     Option<String>,
    /// The full on-wire record, header included.
    pub raw:         Vec<u8>,
}

impl Block {
    /// Typed kind, if the tag is one this build knows.
    pub fn kind(&self) -> Option<BlockType> {
        BlockType::try_from(self.block_type).ok()
    }

    /// Build a block by encoding `content` into a fresh record.
    pub fn new(
        block_type:  BlockType,
        compression: Compression,
        name:        &str,
        content:     &str,
    ) -> Result<Self, BlockError> {
        let raw = encode_block(block_type, compression, name, content)?;
        Ok(Self {
            name:        name.to_owned(),
            block_type:  block_type as u8,
            compression,
            content:     Some(content.to_owned()),
            raw,
        })
    }

    /// Wrap an already-encoded record without inspecting its payload.
    /// Only the leading type and compression bytes are read.
    pub fn from_raw(name: &str, raw: Vec<u8>) -> Self {
        let block_type  = raw.first().copied().unwrap_or_default();
        let compression = Compression::from_flag(raw.get(1).copied().unwrap_or_default());
        Self { name: name.to_owned(), block_type, compression, content: None, raw }
    }
}

/// Encode one record: header followed by the (optionally gzipped) UTF-8
/// bytes of `content`.
pub fn encode_block(
    block_type:  BlockType,
    compression: Compression,
    name:        &str,
    content:     &str,
) -> Result<Vec<u8>, BlockError> {
    if name.len() > MAX_NAME_LEN {
        return Err(BlockError::NameTooLong { len: name.len() });
    }
    let payload  = get_codec(compression).compress(content.as_bytes())?;
    let data_len = u32::try_from(payload.len())
        .map_err(|_| BlockError::PayloadTooLarge { len: payload.len() })?;
    let header = BlockHeader {
        block_type: block_type as u8,
        compression,
        name: name.to_owned(),
        data_len,
    };
    let mut out = Vec::with_capacity(header.encoded_len() + payload.len());
    header.write(&mut out)?;
    out.extend_from_slice(&payload);
    Ok(out)
}
