//! Owning aligned allocation
//! 拥有所有权的对齐内存

use std::{
  alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error},
  fmt::{Debug, Formatter, Result as FmtResult},
  mem::ManuallyDrop,
  ops::{Deref, DerefMut},
  ptr::{NonNull, copy_nonoverlapping},
  slice::{from_raw_parts, from_raw_parts_mut},
};

/// Allocation alignment, one AES block / 分配对齐，一个 AES 分组
pub const BUF_ALIGN: usize = 16;

#[inline(always)]
fn layout(cap: usize) -> Layout {
  match Layout::from_size_align(cap, BUF_ALIGN) {
    Ok(lo) => lo,
    Err(_) => panic!("buffer capacity {cap} overflows"),
  }
}

/// Raw owned buffer, frees on drop
/// 原始拥有型缓冲区，Drop 时释放
pub struct RawBuf {
  ptr: NonNull<u8>,
  len: usize,
  cap: usize,
}

unsafe impl Send for RawBuf {}
unsafe impl Sync for RawBuf {}

impl RawBuf {
  /// Zeroed allocation of `size` bytes / 分配 `size` 字节零初始化内存
  pub fn zeroed(size: usize) -> Self {
    if size == 0 {
      return Self {
        ptr: NonNull::dangling(),
        len: 0,
        cap: 0,
      };
    }
    let lo = layout(size);
    let ptr = unsafe { alloc_zeroed(lo) };
    let Some(ptr) = NonNull::new(ptr) else {
      handle_alloc_error(lo)
    };
    Self {
      ptr,
      len: size,
      cap: size,
    }
  }

  /// Owned copy of `data` / 复制 `data`
  pub fn copy_of(data: &[u8]) -> Self {
    let buf = Self::zeroed(data.len());
    if !data.is_empty() {
      unsafe { copy_nonoverlapping(data.as_ptr(), buf.ptr.as_ptr(), data.len()) };
    }
    buf
  }

  /// Deconstruct into raw parts, memory is leaked to the caller
  /// 解构为原始部分，内存交给调用者
  #[inline(always)]
  pub fn into_raw_parts(self) -> (NonNull<u8>, usize, usize) {
    let me = ManuallyDrop::new(self);
    (me.ptr, me.len, me.cap)
  }

  /// # Safety
  /// Parts must come from `into_raw_parts`
  /// 必须来自 `into_raw_parts`
  #[inline(always)]
  pub unsafe fn from_raw_parts(ptr: NonNull<u8>, len: usize, cap: usize) -> Self {
    Self { ptr, len, cap }
  }

  #[inline(always)]
  pub(crate) fn with_len(mut self, len: usize) -> Self {
    debug_assert!(len <= self.cap);
    self.len = len;
    self
  }

  #[inline(always)]
  pub fn len(&self) -> usize {
    self.len
  }

  #[inline(always)]
  pub fn cap(&self) -> usize {
    self.cap
  }

  #[inline(always)]
  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  #[inline(always)]
  pub fn as_ptr(&self) -> *const u8 {
    self.ptr.as_ptr()
  }
}

impl Drop for RawBuf {
  fn drop(&mut self) {
    if self.cap != 0 {
      unsafe { dealloc(self.ptr.as_ptr(), layout(self.cap)) };
    }
  }
}

impl Deref for RawBuf {
  type Target = [u8];

  #[inline(always)]
  fn deref(&self) -> &[u8] {
    unsafe { from_raw_parts(self.ptr.as_ptr(), self.len) }
  }
}

impl DerefMut for RawBuf {
  #[inline(always)]
  fn deref_mut(&mut self) -> &mut [u8] {
    unsafe { from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
  }
}

impl Debug for RawBuf {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("RawBuf")
      .field("ptr", &self.ptr)
      .field("len", &self.len)
      .field("cap", &self.cap)
      .finish()
  }
}
