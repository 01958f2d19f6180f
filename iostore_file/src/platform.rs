//! Platform file access / 平台文件访问

use std::{future::Future, io, path::Path};

use compio::{
  buf::{BufResult, IntoInner, IoBuf},
  io::AsyncReadAtExt,
};
use compio_fs::File;
use log::warn;

/// Open and positional read, driven on the engine worker thread
/// 打开与定位读取，在引擎工作线程上驱动
pub trait Platform: Send + 'static {
  type File;

  fn open(&self, path: &Path) -> impl Future<Output = io::Result<Self::File>>;

  /// Fill `buf[..len]` from `offset`, the buffer is handed back either way
  /// 从 `offset` 读满 `buf[..len]`，无论成败都归还缓冲区
  fn read_at(
    &self,
    file: &Self::File,
    buf: Vec<u8>,
    len: usize,
    offset: u64,
  ) -> impl Future<Output = BufResult<(), Vec<u8>>>;
}

/// compio backed platform with transparent retries
/// 基于 compio 的平台实现，透明重试
#[derive(Debug, Clone, Copy)]
pub struct CompioPlatform {
  retries: u32,
}

impl CompioPlatform {
  pub fn new(retries: u32) -> Self {
    Self { retries }
  }
}

impl Platform for CompioPlatform {
  type File = File;

  async fn open(&self, path: &Path) -> io::Result<File> {
    compio_fs::OpenOptions::new().read(true).open(path).await
  }

  async fn read_at(
    &self,
    file: &File,
    mut buf: Vec<u8>,
    len: usize,
    offset: u64,
  ) -> BufResult<(), Vec<u8>> {
    let mut attempt = 0;
    loop {
      let res = file.read_exact_at(buf.slice(0..len), offset).await;
      buf = res.1.into_inner();
      match res.0 {
        Ok(()) => return BufResult(Ok(()), buf),
        // Short files do not heal / 文件过短无法通过重试恢复
        Err(e) if attempt < self.retries && e.kind() != io::ErrorKind::UnexpectedEof => {
          attempt += 1;
          warn!("read {len}@{offset} retry {attempt}: {e}");
        }
        Err(e) => return BufResult(Err(e), buf),
      }
    }
  }
}
