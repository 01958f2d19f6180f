//! Resolved read request / 已解析的读请求

use std::sync::{
  Arc,
  atomic::{AtomicBool, AtomicI32, AtomicU8, AtomicUsize, Ordering},
};

use iostore_base::{Code, Error, Result};
use iostore_buf::IoBuffer;
use parking_lot::Mutex;

use crate::{Mounted, block::CompressedBlock};

/// Progress of a request / 请求进度
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum State {
  Resolved = 0,
  BlocksQueued = 1,
  Reading = 2,
  Decompressing = 3,
  Scattered = 4,
  Completed = 5,
  Failed = 6,
  Cancelled = 7,
}

impl State {
  fn from_u8(v: u8) -> Self {
    match v {
      0 => Self::Resolved,
      1 => Self::BlocksQueued,
      2 => Self::Reading,
      3 => Self::Decompressing,
      4 => Self::Scattered,
      5 => Self::Completed,
      6 => Self::Failed,
      _ => Self::Cancelled,
    }
  }

  #[inline]
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
  }
}

/// Receives every request once it reaches a terminal state
/// 接收每个到达终态的请求
pub trait Complete: Send + Sync + 'static {
  fn complete(&self, req: Arc<Request>);
}

/// A byte range of one container, resolved from a chunk
/// 由块解析得到的容器字节区间
pub struct Request {
  id: u64,
  container: Arc<Mounted>,
  offset: u64,
  size: u64,
  priority: AtomicI32,
  state: AtomicU8,
  cancelled: AtomicBool,
  remaining: AtomicUsize,
  error: Mutex<Option<Error>>,
  buf: Mutex<IoBuffer>,
  pub(crate) blocks: Mutex<Vec<Arc<CompressedBlock>>>,
}

impl Request {
  /// `offset` is in the container's uncompressed space. A `target` must be
  /// owned and hold at least `size` bytes.
  /// `offset` 位于容器未压缩空间；`target` 须为自有且不小于 `size` 字节。
  pub fn new(
    id: u64,
    container: Arc<Mounted>,
    offset: u64,
    size: u64,
    priority: i32,
    target: Option<IoBuffer>,
  ) -> Result<Arc<Self>> {
    let buf = match target {
      Some(mut t) => {
        if !t.is_owned() || (t.len() as u64) < size {
          return Err(Error::invalid_param(format!(
            "target of {} bytes for a {size} byte read",
            t.len()
          )));
        }
        t.set_size(size as usize)?;
        t
      }
      None => IoBuffer::with_size(size as usize),
    };
    Ok(Arc::new(Self {
      id,
      container,
      offset,
      size,
      priority: AtomicI32::new(priority),
      state: AtomicU8::new(State::Resolved as u8),
      cancelled: AtomicBool::new(false),
      remaining: AtomicUsize::new(0),
      error: Mutex::new(None),
      buf: Mutex::new(buf),
      blocks: Mutex::new(Vec::new()),
    }))
  }

  #[inline(always)]
  pub fn id(&self) -> u64 {
    self.id
  }

  #[inline(always)]
  pub fn container(&self) -> &Arc<Mounted> {
    &self.container
  }

  #[inline(always)]
  pub fn offset(&self) -> u64 {
    self.offset
  }

  #[inline(always)]
  pub fn size(&self) -> u64 {
    self.size
  }

  #[inline]
  pub fn priority(&self) -> i32 {
    self.priority.load(Ordering::Relaxed)
  }

  #[inline]
  pub fn state(&self) -> State {
    State::from_u8(self.state.load(Ordering::Acquire))
  }

  #[inline]
  pub fn is_cancelled(&self) -> bool {
    self.cancelled.load(Ordering::Acquire)
  }

  /// Status code, `Unknown` while in flight / 状态码，进行中为 `Unknown`
  pub fn code(&self) -> Code {
    match self.state() {
      State::Completed => Code::Ok,
      State::Cancelled => Code::Cancelled,
      State::Failed => self
        .error
        .lock()
        .as_ref()
        .map_or(Code::Unknown, |e| e.code()),
      _ => Code::Unknown,
    }
  }

  /// Data of a completed request, the error otherwise
  /// 已完成请求的数据，否则返回错误
  pub fn result(&self) -> Result<IoBuffer> {
    match self.state() {
      State::Completed => Ok(self.buf.lock().clone()),
      State::Cancelled => Err(Error::new(Code::Cancelled, "request cancelled")),
      State::Failed => Err(
        self
          .error
          .lock()
          .clone()
          .unwrap_or_else(|| Error::from(Code::Unknown)),
      ),
      _ => Err(Error::from(Code::Unknown)),
    }
  }

  pub(crate) fn set_priority(&self, priority: i32) {
    self.priority.store(priority, Ordering::Relaxed);
  }

  /// Best effort, in-flight reads still finish / 尽力而为，在途读取仍会完成
  pub(crate) fn cancel(&self) -> bool {
    if self.state().is_terminal() {
      return false;
    }
    !self.cancelled.swap(true, Ordering::AcqRel)
  }

  /// Move forward, never out of a terminal state / 前移状态，终态不再改变
  pub(crate) fn advance(&self, to: State) {
    let _ = self
      .state
      .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
        (!State::from_u8(cur).is_terminal() && cur < to as u8).then_some(to as u8)
      });
  }

  pub(crate) fn start(&self, blocks: usize) {
    self.remaining.store(blocks, Ordering::Release);
    self.advance(State::BlocksQueued);
  }

  pub(crate) fn write(&self, at: usize, data: &[u8]) {
    let mut buf = self.buf.lock();
    if let Some(dst) = buf.data_mut().get_mut(at..at + data.len()) {
      dst.copy_from_slice(data);
    }
  }

  /// First failure wins / 以第一个失败为准
  pub(crate) fn fail(&self, err: Error) {
    let mut slot = self.error.lock();
    if slot.is_none() {
      *slot = Some(err);
    }
  }

  /// One compressed block done, completes the request after the last one
  /// 完成一个压缩块，最后一个完成时结束请求
  pub(crate) fn block_done(self: &Arc<Self>, sink: &dyn Complete) {
    if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
      self.advance(State::Scattered);
      self.finish(sink);
    }
  }

  pub(crate) fn finish(self: &Arc<Self>, sink: &dyn Complete) {
    self.blocks.lock().clear();
    let err = self.error.lock().as_ref().map(|e| e.code());
    let end = match err {
      _ if self.is_cancelled() => State::Cancelled,
      Some(Code::Cancelled) => State::Cancelled,
      Some(_) => State::Failed,
      None => State::Completed,
    };
    self.state.store(end as u8, Ordering::Release);
    sink.complete(self.clone());
  }
}
