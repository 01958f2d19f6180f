#![cfg_attr(docsrs, feature(doc_cfg))]

//! Table of contents of a chunk container
//! 块容器目录表

mod block;
mod consts;
mod flags;
mod header;
mod packed;
mod resource;
mod settings;
mod sign;

pub use consts::*;
pub use flags::{ContainerFlags, MetaFlags, TocReadOptions};
pub use header::{TocHeader, TocVersion};
pub use packed::{CompressedBlockEntry, OffsetAndLength};
pub use resource::{ChunkInfo, TocMeta, TocResource};
pub use settings::{ContainerSettings, WriterSettings};
pub use sign::{BlockHash, KeyedSha1, Signer, TocSignatures, block_hashes_digest};
