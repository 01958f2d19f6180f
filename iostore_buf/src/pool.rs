//! Fixed-size buffer pool
//! 定长缓冲池

use std::{
  ops::{Deref, DerefMut},
  sync::Arc,
};

use parking_lot::Mutex;

struct Pool {
  size: usize,
  count: usize,
  free: Mutex<Vec<Vec<u8>>>,
}

/// Pool of `count` buffers of `size` bytes, owned by its user
/// `count` 个 `size` 字节缓冲区组成的池，由使用者持有
#[derive(Clone)]
pub struct BufferAllocator {
  pool: Arc<Pool>,
}

impl BufferAllocator {
  pub fn new(count: usize, size: usize) -> Self {
    let free = (0..count).map(|_| vec![0u8; size]).collect();
    Self {
      pool: Arc::new(Pool {
        size,
        count,
        free: Mutex::new(free),
      }),
    }
  }

  /// Take a buffer, `None` when exhausted / 取缓冲区，耗尽时返回 `None`
  pub fn alloc(&self) -> Option<PoolBuf> {
    let buf = self.pool.free.lock().pop()?;
    Some(PoolBuf {
      buf,
      pool: self.pool.clone(),
    })
  }

  /// Free buffer count / 空闲缓冲区数
  #[inline]
  pub fn free(&self) -> usize {
    self.pool.free.lock().len()
  }

  #[inline(always)]
  pub fn count(&self) -> usize {
    self.pool.count
  }

  #[inline(always)]
  pub fn buf_size(&self) -> usize {
    self.pool.size
  }
}

/// Pooled buffer, returns to its pool on drop
/// 池化缓冲区，Drop 时归还
pub struct PoolBuf {
  buf: Vec<u8>,
  pool: Arc<Pool>,
}

impl PoolBuf {
  /// Move the storage out for an owned-buffer I/O call
  /// 移出存储用于所有权式 I/O 调用
  #[inline]
  pub fn take(&mut self) -> Vec<u8> {
    std::mem::take(&mut self.buf)
  }

  /// Put storage back after `take` / `take` 之后放回存储
  #[inline]
  pub fn restore(&mut self, buf: Vec<u8>) {
    self.buf = buf;
  }
}

impl Deref for PoolBuf {
  type Target = [u8];

  #[inline(always)]
  fn deref(&self) -> &[u8] {
    &self.buf
  }
}

impl DerefMut for PoolBuf {
  #[inline(always)]
  fn deref_mut(&mut self) -> &mut [u8] {
    &mut self.buf
  }
}

impl Drop for PoolBuf {
  fn drop(&mut self) {
    let buf = std::mem::take(&mut self.buf);
    // A buffer lost by a failed I/O call is not returned
    if buf.len() == self.pool.size {
      self.pool.free.lock().push(buf);
    }
  }
}
