//! Open partition handles of the worker
//! 工作线程持有的分区句柄

use std::{io, path::Path};

use compio::buf::BufResult;
use hashlink::{LruCache, lru_cache::Entry};

use crate::Platform;

pub(crate) struct Handles<P: Platform> {
  platform: P,
  files: LruCache<u32, P::File>,
}

impl<P: Platform> Handles<P> {
  pub fn new(platform: P, cap: usize) -> Self {
    Self {
      platform,
      files: LruCache::new(cap),
    }
  }

  /// Read from global file `file`, opening `path` on a miss
  /// 从全局文件 `file` 读取，未打开时打开 `path`
  pub async fn read(
    &mut self,
    file: u32,
    path: Option<&Path>,
    buf: Vec<u8>,
    len: usize,
    offset: u64,
  ) -> BufResult<(), Vec<u8>> {
    let handle = match self.files.entry(file) {
      Entry::Occupied(e) => e.into_mut(),
      Entry::Vacant(e) => {
        let Some(path) = path else {
          return BufResult(
            Err(io::Error::new(
              io::ErrorKind::NotFound,
              format!("file {file} is not mounted"),
            )),
            buf,
          );
        };
        match self.platform.open(path).await {
          Ok(f) => e.insert(f),
          Err(err) => return BufResult(Err(err), buf),
        }
      }
    };
    self.platform.read_at(handle, buf, len, offset).await
  }

  #[inline]
  pub fn evict(&mut self, file: u32) {
    self.files.remove(&file);
  }
}
