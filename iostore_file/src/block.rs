//! In-flight raw reads and compressed blocks
//! 在途的原始读取与压缩块

use std::sync::{
  Arc,
  atomic::{AtomicI32, AtomicUsize, Ordering},
};

use iostore_base::{Error, Result};
use iostore_queue::Queued;
use parking_lot::Mutex;

use crate::{Mounted, Request};

/// Waiter list that refuses new entries once drained
/// 取走后拒绝新条目的等待列表
pub(crate) struct Waiters<T> {
  inner: Mutex<Option<Vec<T>>>,
}

impl<T> Waiters<T> {
  fn new() -> Self {
    Self {
      inner: Mutex::new(Some(Vec::new())),
    }
  }

  /// Hands the item back when already drained / 已取走时退回条目
  pub fn push(&self, item: T) -> std::result::Result<(), T> {
    match self.inner.lock().as_mut() {
      Some(v) => {
        v.push(item);
        Ok(())
      }
      None => Err(item),
    }
  }

  pub fn for_each(&self, mut f: impl FnMut(&T)) {
    if let Some(v) = self.inner.lock().as_ref() {
      v.iter().for_each(&mut f);
    }
  }

  pub fn drain(&self) -> Vec<T> {
    self.inner.lock().take().unwrap_or_default()
  }
}

/// One aligned read of a partition file / 分区文件的一次对齐读取
pub(crate) struct RawBlock {
  pub key: u64,
  pub file: u32,
  pub offset: u64,
  pub len: usize,
  pub priority: AtomicI32,
  pub waiters: Waiters<Arc<CompressedBlock>>,
}

impl RawBlock {
  pub fn new(key: u64, file: u32, offset: u64, len: usize, priority: i32) -> Self {
    Self {
      key,
      file,
      offset,
      len,
      priority: AtomicI32::new(priority),
      waiters: Waiters::new(),
    }
  }

  /// `true` when raised / 被提升时返回 `true`
  #[inline]
  pub fn boost(&self, priority: i32) -> bool {
    self.priority.fetch_max(priority, Ordering::Relaxed) < priority
  }
}

impl Queued for RawBlock {
  #[inline]
  fn priority(&self) -> i32 {
    self.priority.load(Ordering::Relaxed)
  }
}

/// Where decoded bytes of a block go / 块解码后数据的去向
pub(crate) struct Scatter {
  pub req: Arc<Request>,
  /// Offset in the uncompressed block / 未压缩块内偏移
  pub src: usize,
  /// Offset in the request buffer / 请求缓冲区内偏移
  pub dst: usize,
  pub len: usize,
}

/// One compression block being gathered from raw reads
/// 正在从原始读取中汇集的压缩块
pub(crate) struct CompressedBlock {
  pub key: u64,
  pub container: Arc<Mounted>,
  pub index: usize,
  /// Partition local offset of the stored bytes / 存储字节在分区内的偏移
  pub offset: u64,
  pub stored: Mutex<Vec<u8>>,
  pub pending: AtomicUsize,
  pub error: Mutex<Option<Error>>,
  pub scatters: Waiters<Scatter>,
  pub raws: Mutex<Vec<Arc<RawBlock>>>,
}

impl CompressedBlock {
  pub fn new(key: u64, container: Arc<Mounted>, index: usize, offset: u64, stored: usize) -> Self {
    Self {
      key,
      container,
      index,
      offset,
      stored: Mutex::new(vec![0; stored]),
      pending: AtomicUsize::new(0),
      error: Mutex::new(None),
      scatters: Waiters::new(),
      raws: Mutex::new(Vec::new()),
    }
  }

  /// Copy the overlap of a finished raw read, `true` once all arrived
  /// 拷贝已完成原始读取的重叠部分，全部到达时返回 `true`
  pub fn deliver(&self, raw_offset: u64, data: std::result::Result<&[u8], &Error>) -> bool {
    match data {
      Ok(data) => {
        let mut stored = self.stored.lock();
        let start = self.offset.max(raw_offset);
        let end = (self.offset + stored.len() as u64).min(raw_offset + data.len() as u64);
        if start < end {
          let (s, e) = ((start - self.offset) as usize, (end - self.offset) as usize);
          let (rs, re) = ((start - raw_offset) as usize, (end - raw_offset) as usize);
          stored[s..e].copy_from_slice(&data[rs..re]);
        }
      }
      Err(e) => self.fail(e.clone()),
    }
    self.pending.fetch_sub(1, Ordering::AcqRel) == 1
  }

  pub fn fail(&self, err: Error) {
    let mut slot = self.error.lock();
    if slot.is_none() {
      *slot = Some(err);
    }
  }

  /// Verify, decrypt and decompress the gathered bytes
  /// 校验、解密并解压汇集的字节
  pub fn decode(&self) -> Result<Vec<u8>> {
    if let Some(e) = self.error.lock().clone() {
      return Err(e);
    }
    let toc = self.container.toc();
    let size = toc.compression_blocks[self.index].uncompressed_size() as usize;
    let mut out = vec![0u8; size];
    let mut stored = std::mem::take(&mut *self.stored.lock());
    toc.decode_block(self.index, &mut stored, self.container.key(), &mut out)?;
    Ok(out)
  }
}
