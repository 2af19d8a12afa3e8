//! Payload compression for block records.
//!
//! # Identity rules
//! Every block record carries a single compression byte directly after its
//! type tag.  Only two values are defined:
//!   - `0` — payload stored verbatim.
//!   - `1` — payload is a complete gzip member (RFC 1952).
//!
//! Any non-zero byte other than `1` is not produced by this crate.  Readers
//! treat exactly `1` as gzip and every other value as stored, so records
//! written by newer tools still round-trip through `raw` untouched.

use std::io::{self, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use thiserror::Error;

// ── Compression flag ─────────────────────────────────────────────────────────

/// On-wire compression discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Compression {
    #[default]
    Stored,
    Gzip,
}

impl Compression {
    /// The byte written into the record header.
    #[inline]
    pub fn flag(self) -> u8 {
        match self {
            Compression::Stored => 0,
            Compression::Gzip   => 1,
        }
    }

    #[inline]
    pub fn from_flag(flag: u8) -> Self {
        if flag == 1 { Compression::Gzip } else { Compression::Stored }
    }

    /// Human-readable name (diagnostics and CLI).
    pub fn name(self) -> &'static str {
        match self {
            Compression::Stored => "stored",
            Compression::Gzip   => "gzip",
        }
    }

    /// Parse from a CLI string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "stored" | "none" => Some(Compression::Stored),
            "gzip" | "gz"     => Some(Compression::Gzip),
            _                 => None,
        }
    }
}

impl From<bool> for Compression {
    fn from(compressed: bool) -> Self {
        if compressed { Compression::Gzip } else { Compression::Stored }
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Decompression error: {0}")]
    Decompression(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Codec trait ──────────────────────────────────────────────────────────────

pub trait Codec: Send + Sync {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
}

// ── Built-in codec implementations ──────────────────────────────────────────

pub struct StoredCodec;
impl Codec for StoredCodec {
    fn compress(&self, data: &[u8])   -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
}

pub struct GzipCodec;
impl Codec for GzipCodec {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut enc = GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(data).map_err(|e| CodecError::Compression(e.to_string()))?;
        enc.finish().map_err(|e| CodecError::Compression(e.to_string()))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        GzDecoder::new(data)
            .read_to_end(&mut out)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        Ok(out)
    }
}

// ── Factory ──────────────────────────────────────────────────────────────────

/// Resolve a compression flag to its codec.
pub fn get_codec(compression: Compression) -> Box<dyn Codec> {
    match compression {
        Compression::Stored => Box::new(StoredCodec),
        Compression::Gzip   => Box::new(GzipCodec),
    }
}
