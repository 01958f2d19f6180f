#![cfg_attr(docsrs, feature(doc_cfg))]

//! LRU cache of raw blocks keyed by (file, block)
//! 以（文件，块）为键的原始块 LRU 缓存

use hashlink::LruCache;
use log::debug;
use parking_lot::Mutex;

/// Composite key of a block / 块的组合键
#[inline(always)]
pub const fn key(file_index: u32, block_index: u32) -> u64 {
  ((file_index as u64) << 32) | block_index as u64
}

enum Slot {
  /// Reserved by a pending fill / 等待填充的预留槽
  Locked,
  Ready(Box<[u8]>),
}

struct Inner {
  lru: LruCache<u64, Slot>,
  cap: usize,
}

impl Inner {
  /// Make room for one entry, `false` if the tail is locked
  /// 腾出一个槽位，尾部被锁时返回 `false`
  fn evict(&mut self) -> bool {
    if self.lru.len() < self.cap {
      return true;
    }
    match self.lru.iter().next() {
      Some((_, Slot::Locked)) | None => false,
      Some((&k, Slot::Ready(_))) => {
        self.lru.remove(&k);
        debug!("block cache evict {k:#x}");
        true
      }
    }
  }
}

/// Capacity is counted in blocks. A capacity of 0 disables caching.
/// 容量以块计，为 0 时禁用缓存。
pub struct BlockCache {
  inner: Mutex<Inner>,
}

impl BlockCache {
  pub fn new(cap: usize) -> Self {
    Self {
      inner: Mutex::new(Inner {
        lru: LruCache::new_unbounded(),
        cap,
      }),
    }
  }

  /// Copy a cached block into `dst` and promote it. Locked slots miss.
  /// 将缓存块拷入 `dst` 并提升，锁定槽视为未命中。
  pub fn read(&self, key: u64, dst: &mut [u8]) -> bool {
    let mut inner = self.inner.lock();
    if !matches!(inner.lru.peek(&key), Some(Slot::Ready(_))) {
      return false;
    }
    match inner.lru.get(&key) {
      Some(Slot::Ready(data)) if data.len() == dst.len() => {
        dst.copy_from_slice(data);
        true
      }
      _ => false,
    }
  }

  /// Reserve a slot for a block about to be read
  /// 为即将读取的块预留槽位
  pub fn lock(&self, key: u64) -> bool {
    let mut inner = self.inner.lock();
    if inner.cap == 0 || inner.lru.contains_key(&key) || !inner.evict() {
      return false;
    }
    inner.lru.insert(key, Slot::Locked);
    true
  }

  /// Drop a reservation whose fill failed / 丢弃填充失败的预留
  pub fn unlock(&self, key: u64) {
    let mut inner = self.inner.lock();
    if matches!(inner.lru.peek(&key), Some(Slot::Locked)) {
      inner.lru.remove(&key);
    }
  }

  /// Fill a reserved slot or insert at the head, `false` if not stored
  /// 填充预留槽或插入头部，未存入时返回 `false`
  pub fn store(&self, key: u64, data: &[u8]) -> bool {
    let mut inner = self.inner.lock();
    if inner.cap == 0 {
      return false;
    }
    if !inner.lru.contains_key(&key) && !inner.evict() {
      return false;
    }
    inner.lru.insert(key, Slot::Ready(data.into()));
    true
  }

  pub fn len(&self) -> usize {
    self.inner.lock().lru.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  #[inline]
  pub fn cap(&self) -> usize {
    self.inner.lock().cap
  }
}
