#![cfg_attr(docsrs, feature(doc_cfg))]

//! I/O buffers and pooled read buffers
//! I/O 缓冲区与池化读缓冲区

mod buffer;
mod pool;
mod raw;

pub use buffer::IoBuffer;
pub use pool::{BufferAllocator, PoolBuf};
pub use raw::{BUF_ALIGN, RawBuf};
