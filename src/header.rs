use std::io::{self, Read};
use thiserror::Error;

/// Container signature.  Exactly 9 bytes, NUL terminated.
pub const MAGIC: &[u8; 9] = b"RISUSAVE\0";
pub const MAGIC_LEN: usize = MAGIC.len();

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("Invalid RISUSAVE header")]
    InvalidMagic,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Consume and verify the signature.  A short stream is treated as a bad
/// signature, not as an IO failure.
pub fn read_magic<R: Read>(mut reader: R) -> Result<(), HeaderError> {
    let mut magic = [0u8; MAGIC_LEN];
    match reader.read_exact(&mut magic) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(HeaderError::InvalidMagic),
        Err(e) => return Err(HeaderError::Io(e)),
    }
    if &magic != MAGIC {
        return Err(HeaderError::InvalidMagic);
    }
    Ok(())
}
