//! Batch builder and batch level notification / 批次构建与批次级通知

use std::sync::{
  Arc,
  atomic::{AtomicUsize, Ordering},
};

use iostore_base::{ChunkId, Result};
use iostore_buf::IoBuffer;
use parking_lot::Mutex;

use crate::{
  IoEvent, IoRequest, ReadOptions, TaskEvent,
  dispatcher::{Core, ReadCallback},
  request::ReqState,
};

pub(crate) enum Notify {
  Callback(Box<dyn FnOnce() + Send>),
  Event(Arc<IoEvent>),
  Task(Arc<TaskEvent>),
}

/// Fires once every request of the batch completed
/// 批次内每个请求完成后触发一次
pub(crate) struct BatchState {
  remaining: AtomicUsize,
  notify: Mutex<Option<Notify>>,
}

impl BatchState {
  fn new(count: usize, notify: Notify) -> Arc<Self> {
    Arc::new(Self {
      remaining: AtomicUsize::new(count),
      notify: Mutex::new(Some(notify)),
    })
  }

  pub fn done_one(&self) {
    if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
      self.fire();
    }
  }

  fn fire(&self) {
    let notify = self.notify.lock().take();
    match notify {
      Some(Notify::Callback(f)) => f(),
      Some(Notify::Event(e)) => e.trigger(),
      Some(Notify::Task(t)) => t.dispatch(),
      None => {}
    }
  }
}

/// Requests collected before one atomic issue / 一次性发出前收集的请求
pub struct IoBatch {
  core: Arc<Core>,
  reqs: Vec<(Arc<ReqState>, Option<ReadCallback>)>,
}

impl IoBatch {
  pub(crate) fn new(core: Arc<Core>) -> Self {
    Self {
      core,
      reqs: Vec::new(),
    }
  }

  /// Resolved now, submitted on issue. An unknown chunk yields a request that
  /// completes with `UnknownChunkId`.
  /// 立即解析，发出时提交；未知块得到以 `UnknownChunkId` 完成的请求。
  pub fn read(&mut self, chunk: &ChunkId, options: ReadOptions, priority: i32) -> IoRequest {
    self.push(chunk, options, priority, None)
  }

  /// `callback` runs on the dispatcher thread, never for cancelled requests
  /// `callback` 在调度线程上执行，已取消的请求不执行
  pub fn read_with_callback(
    &mut self,
    chunk: &ChunkId,
    options: ReadOptions,
    priority: i32,
    callback: impl FnOnce(Result<IoBuffer>) + Send + 'static,
  ) -> IoRequest {
    self.push(chunk, options, priority, Some(Box::new(callback)))
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.reqs.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.reqs.is_empty()
  }

  pub fn issue(self) {
    self.submit(None);
  }

  /// `callback` runs once the whole batch completed / 整个批次完成后执行 `callback`
  pub fn issue_with_callback(self, callback: impl FnOnce() + Send + 'static) {
    self.submit(Some(Notify::Callback(Box::new(callback))));
  }

  pub fn issue_and_trigger_event(self, event: Arc<IoEvent>) {
    self.submit(Some(Notify::Event(event)));
  }

  pub fn issue_and_dispatch_subsequents(self, event: Arc<TaskEvent>) {
    self.submit(Some(Notify::Task(event)));
  }

  fn push(
    &mut self,
    chunk: &ChunkId,
    options: ReadOptions,
    priority: i32,
    callback: Option<ReadCallback>,
  ) -> IoRequest {
    let state = self.core.new_request(chunk, options, priority);
    self.reqs.push((state.clone(), callback));
    IoRequest(state)
  }

  fn submit(self, notify: Option<Notify>) {
    let batch = notify.map(|n| BatchState::new(self.reqs.len(), n));
    if self.reqs.is_empty() {
      if let Some(b) = batch {
        b.fire();
      }
      return;
    }
    self.core.submit(self.reqs, batch);
  }
}
