pub mod header;
pub mod codec;
pub mod block;
pub mod container;
pub mod merge;
pub mod dirty;
pub mod sync;

pub use header::MAGIC;
pub use codec::{Compression, get_codec};
pub use block::{Block, BlockType, BlockHeader, encode_block};
pub use container::{Container, ContainerError, decode, encode_container, list_block_names};
pub use merge::{Delta, MergeError, merge, merge_delta};
pub use dirty::DirtyTracker;
pub use sync::{SyncClient, SyncConfig, SyncError};
