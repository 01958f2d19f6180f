//! Engine configuration / 引擎配置

use crate::consts::{
  DEFAULT_BUFFER_COUNT, DEFAULT_CACHE_BLOCKS, DEFAULT_DECOMPRESS_THREADS, DEFAULT_FILE_CAP,
  DEFAULT_READ_BLOCK_SIZE, DEFAULT_READ_RETRIES, MIN_FILE_CAP, MIN_READ_BLOCK_SIZE,
};

/// Engine configuration options / 引擎配置选项
#[derive(Debug, Clone, Copy)]
pub enum Conf {
  /// Bytes per raw partition read / 每次分区原始读取的字节数
  ReadBlockSize(usize),
  /// Pooled read buffers / 池化读缓冲区数量
  BufferCount(usize),
  /// Raw block cache capacity in blocks, 0 disables it
  /// 原始块缓存容量（块），0 表示禁用
  CacheBlocks(usize),
  /// Decompression threads, 0 decodes inline / 解压线程数，0 表示内联解压
  DecompressThreads(usize),
  /// Platform read retries / 平台读取重试次数
  ReadRetries(u32),
  /// File handle cache capacity / 文件句柄缓存容量
  FileCap(usize),
}

/// Parsed config / 解析后的配置
#[derive(Debug, Clone)]
pub struct ParsedConf {
  pub read_block_size: usize,
  pub buffer_count: usize,
  pub cache_blocks: usize,
  pub decompress_threads: usize,
  pub read_retries: u32,
  pub file_cap: usize,
}

impl ParsedConf {
  pub fn parse(conf: &[Conf]) -> Self {
    let mut c = Self {
      read_block_size: DEFAULT_READ_BLOCK_SIZE,
      buffer_count: DEFAULT_BUFFER_COUNT,
      cache_blocks: DEFAULT_CACHE_BLOCKS,
      decompress_threads: DEFAULT_DECOMPRESS_THREADS,
      read_retries: DEFAULT_READ_RETRIES,
      file_cap: DEFAULT_FILE_CAP,
    };
    for item in conf {
      match *item {
        Conf::ReadBlockSize(v) => c.read_block_size = v,
        Conf::BufferCount(v) => c.buffer_count = v,
        Conf::CacheBlocks(v) => c.cache_blocks = v,
        Conf::DecompressThreads(v) => c.decompress_threads = v,
        Conf::ReadRetries(v) => c.read_retries = v,
        Conf::FileCap(v) => c.file_cap = v,
      }
    }
    c.read_block_size = c.read_block_size.max(MIN_READ_BLOCK_SIZE);
    c.file_cap = c.file_cap.max(MIN_FILE_CAP);
    c
  }
}
