#![cfg_attr(docsrs, feature(doc_cfg))]

//! Shared primitives of the chunk container store
//! 块容器存储的公共原语

pub mod aes;
mod error;
pub mod hash;
mod id;

pub use aes::{AES_BLOCK, AesKey, align_up};
pub use error::{Code, Error, Result};
pub use hash::{SHA1_SIZE, name_hash, sha1};
pub use id::{ChunkId, ChunkType, ContainerId, Guid};
