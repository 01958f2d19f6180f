//! On-disk constants / 磁盘格式常量

/// TOC magic / TOC 魔数
pub const MAGIC: [u8; 16] = *b"-==--==--==--==-";

/// Header size / 头大小
pub const HEADER_SIZE: usize = 144;

/// Chunk id entry / 块标识条目
pub const CHUNK_ID_SIZE: usize = 12;

/// Packed offset + length / 打包的偏移与长度
pub const OFFSET_LEN_SIZE: usize = 10;

/// Packed compressed block entry / 打包的压缩块条目
pub const BLOCK_ENTRY_SIZE: usize = 12;

/// Fixed width of a compression method name / 压缩方法名定长
pub const METHOD_NAME_LEN: usize = 32;

/// Largest 40-bit value / 40 位最大值
pub const MAX_40: u64 = (1 << 40) - 1;

/// Largest 24-bit value / 24 位最大值
pub const MAX_24: u32 = (1 << 24) - 1;

/// Default compression block size (64KB) / 默认压缩块大小
pub const DEFAULT_BLOCK_SIZE: u32 = 64 * 1024;

/// Unbounded partition / 不限分区大小
pub const NO_PARTITION_LIMIT: u64 = u64::MAX;
