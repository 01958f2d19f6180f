//! Shared I/O buffer with owned, wrapped and view modes
//! 共享 I/O 缓冲区：拥有、包装、视图三种模式
//!
//! `BufCore` holds the allocation and frees it exactly once when the last
//! `Arc` goes away and it owns the memory. `IoBuffer` is a window
//! `(off, len)` into a core. Views share the outer core and never own.
//! `BufCore` 持有内存，仅在拥有且最后一个 `Arc` 释放时释放一次。
//! `IoBuffer` 是核心上的窗口，视图共享外层核心，不拥有内存。

use std::{
  fmt::{Debug, Formatter, Result as FmtResult},
  mem::ManuallyDrop,
  ptr::NonNull,
  slice::{from_raw_parts, from_raw_parts_mut},
  sync::Arc,
};

use iostore_base::{Error, Result};

use crate::RawBuf;

pub(crate) struct BufCore {
  ptr: NonNull<u8>,
  cap: usize,
  owned: bool,
}

// Wrapped memory is read-only, owned memory is only written through a
// unique `Arc`.
// 包装内存只读，拥有内存只通过唯一 `Arc` 写入。
unsafe impl Send for BufCore {}
unsafe impl Sync for BufCore {}

impl BufCore {
  fn empty() -> Self {
    Self {
      ptr: NonNull::dangling(),
      cap: 0,
      owned: false,
    }
  }

  fn owned(raw: RawBuf) -> Self {
    let (ptr, _, cap) = raw.into_raw_parts();
    Self {
      ptr,
      cap,
      owned: true,
    }
  }

  fn into_raw(self, len: usize) -> RawBuf {
    debug_assert!(self.owned);
    let me = ManuallyDrop::new(self);
    unsafe { RawBuf::from_raw_parts(me.ptr, me.cap, me.cap) }.with_len(len)
  }
}

impl Drop for BufCore {
  fn drop(&mut self) {
    if self.owned {
      drop(unsafe { RawBuf::from_raw_parts(self.ptr, self.cap, self.cap) });
    }
  }
}

/// Reference counted I/O buffer / 引用计数 I/O 缓冲区
#[derive(Clone)]
pub struct IoBuffer {
  core: Arc<BufCore>,
  off: usize,
  len: usize,
  /// Largest size `set_size` accepts / `set_size` 可接受的最大大小
  room: usize,
  view: bool,
}

impl IoBuffer {
  /// Empty buffer / 空缓冲区
  pub fn new() -> Self {
    Self::from_core(BufCore::empty(), 0)
  }

  /// Owned zeroed buffer of `size` bytes / 拥有的零初始化缓冲区
  pub fn with_size(size: usize) -> Self {
    Self::from_raw(RawBuf::zeroed(size))
  }

  /// Take ownership of a raw allocation / 接管原始内存
  pub fn from_raw(raw: RawBuf) -> Self {
    let len = raw.len();
    Self::from_core(BufCore::owned(raw), len)
  }

  /// Owned copy of external memory / 复制外部内存
  pub fn clone_of(data: &[u8]) -> Self {
    Self::from_raw(RawBuf::copy_of(data))
  }

  /// Read-only wrap of external memory, never freed
  /// 只读包装外部内存，不释放
  ///
  /// # Safety
  /// `ptr..ptr+len` must stay valid and unmodified while any clone or view
  /// of the returned buffer is alive.
  /// 返回的缓冲区及其克隆、视图存活期间，内存必须有效且不被修改。
  pub unsafe fn wrap(ptr: *const u8, len: usize) -> Self {
    let ptr = NonNull::new(ptr as *mut u8).unwrap_or(NonNull::dangling());
    Self::from_core(
      BufCore {
        ptr,
        cap: len,
        owned: false,
      },
      len,
    )
  }

  /// Wrap static memory / 包装静态内存
  pub fn wrap_static(data: &'static [u8]) -> Self {
    unsafe { Self::wrap(data.as_ptr(), data.len()) }
  }

  /// Sub-view sharing `outer`'s memory, keeps it alive
  /// 共享 `outer` 内存的子视图，延长其生命周期
  pub fn view(outer: &IoBuffer, off: usize, len: usize) -> Result<Self> {
    match off.checked_add(len) {
      Some(end) if end <= outer.len => Ok(Self {
        core: outer.core.clone(),
        off: outer.off + off,
        len,
        room: len,
        view: true,
      }),
      _ => Err(Error::invalid_param(format!(
        "view {off}+{len} out of buffer len {}",
        outer.len
      ))),
    }
  }

  #[inline]
  fn from_core(core: BufCore, len: usize) -> Self {
    Self {
      room: core.cap,
      core: Arc::new(core),
      off: 0,
      len,
      view: false,
    }
  }

  #[inline]
  pub fn data(&self) -> &[u8] {
    unsafe { from_raw_parts(self.core.ptr.as_ptr().add(self.off), self.len) }
  }

  /// Mutable data, copies first unless this is the sole owner
  /// 可变数据，非唯一拥有者时先复制
  pub fn data_mut(&mut self) -> &mut [u8] {
    if !self.is_owned() || Arc::get_mut(&mut self.core).is_none() {
      self.detach();
    }
    unsafe { from_raw_parts_mut(self.core.ptr.as_ptr().add(self.off), self.len) }
  }

  #[inline(always)]
  pub fn len(&self) -> usize {
    self.len
  }

  #[inline(always)]
  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Owns its backing memory / 拥有底层内存
  #[inline(always)]
  pub fn is_owned(&self) -> bool {
    self.core.owned && !self.view
  }

  #[inline(always)]
  pub fn is_view(&self) -> bool {
    self.view
  }

  /// Copy into a fresh owned allocation if not owned, no-op otherwise
  /// 未拥有时复制到新分配的内存，否则无操作
  pub fn make_owned(&mut self) {
    if !self.is_owned() {
      self.detach();
    }
  }

  /// Change logical size, never reallocates. A view stays inside its window.
  /// 修改逻辑大小，不重新分配；视图不超出其窗口。
  pub fn set_size(&mut self, size: usize) -> Result<()> {
    let room = self.room;
    if size > room {
      return Err(Error::invalid_param(format!(
        "size {size} exceeds allocation {room}"
      )));
    }
    self.len = size;
    Ok(())
  }

  /// Hand the allocation to the caller, leaves this buffer empty
  /// 将内存交给调用者，本缓冲区置空
  pub fn release(&mut self) -> Result<RawBuf> {
    if !self.is_owned() {
      return Err(Error::invalid_param("release of a buffer that does not own its memory"));
    }
    let core = std::mem::replace(&mut self.core, Arc::new(BufCore::empty()));
    match Arc::try_unwrap(core) {
      Ok(core) => {
        let len = self.len;
        self.off = 0;
        self.len = 0;
        self.room = 0;
        Ok(core.into_raw(len))
      }
      Err(core) => {
        self.core = core;
        Err(Error::invalid_param("release of a shared buffer"))
      }
    }
  }

  #[inline]
  pub fn to_vec(&self) -> Vec<u8> {
    self.data().to_vec()
  }

  fn detach(&mut self) {
    let raw = RawBuf::copy_of(self.data());
    let core = BufCore::owned(raw);
    self.room = core.cap;
    self.core = Arc::new(core);
    self.off = 0;
    self.view = false;
  }
}

impl Default for IoBuffer {
  fn default() -> Self {
    Self::new()
  }
}

impl AsRef<[u8]> for IoBuffer {
  #[inline(always)]
  fn as_ref(&self) -> &[u8] {
    self.data()
  }
}

impl From<Vec<u8>> for IoBuffer {
  fn from(v: Vec<u8>) -> Self {
    Self::clone_of(&v)
  }
}

impl Debug for IoBuffer {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("IoBuffer")
      .field("len", &self.len)
      .field("owned", &self.is_owned())
      .field("view", &self.view)
      .field("refs", &Arc::strong_count(&self.core))
      .finish()
  }
}
