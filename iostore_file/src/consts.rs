//! Engine defaults / 引擎默认值

/// Raw read unit (64KB) / 原始读取单元
pub const DEFAULT_READ_BLOCK_SIZE: usize = 64 * 1024;

/// Pooled read buffers / 池化读缓冲区数量
pub const DEFAULT_BUFFER_COUNT: usize = 32;

/// Cached raw blocks (16MB at the default read size) / 缓存的原始块数
pub const DEFAULT_CACHE_BLOCKS: usize = 256;

/// Decompression threads, 0 decodes on the worker / 解压线程数，0 表示在工作线程内解压
pub const DEFAULT_DECOMPRESS_THREADS: usize = 2;

/// Retries of a failed platform read / 平台读取失败的重试次数
pub const DEFAULT_READ_RETRIES: u32 = 3;

/// Open partition handles / 打开的分区句柄数
pub const DEFAULT_FILE_CAP: usize = 64;

pub(crate) const MIN_FILE_CAP: usize = 4;

/// Smallest raw read unit / 最小原始读取单元
pub(crate) const MIN_READ_BLOCK_SIZE: usize = 4 * 1024;
