//! Caller side handle of one read / 单个读取在调用方的句柄

use std::sync::{Arc, Weak};

use iostore_base::{Code, Error, Result};
use iostore_buf::IoBuffer;
use iostore_file::Request;
use parking_lot::{Condvar, Mutex};

use crate::dispatcher::Core;

/// Byte range of a chunk, `size: None` reads to the end
/// 块内字节区间，`size` 为 `None` 时读到末尾
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
  pub offset: u64,
  pub size: Option<u64>,
}

impl ReadOptions {
  pub fn range(offset: u64, size: u64) -> Self {
    Self {
      offset,
      size: Some(size),
    }
  }
}

pub(crate) struct ReqState {
  pub id: u64,
  /// `None` when resolution failed / 解析失败时为 `None`
  pub engine: Option<Arc<Request>>,
  pub early: Option<Error>,
  done: Mutex<Option<Result<IoBuffer>>>,
  cv: Condvar,
  core: Weak<Core>,
}

impl ReqState {
  pub fn new(id: u64, engine: Result<Arc<Request>>, core: Weak<Core>) -> Arc<Self> {
    let (engine, early) = match engine {
      Ok(r) => (Some(r), None),
      Err(e) => (None, Some(e)),
    };
    Arc::new(Self {
      id,
      engine,
      early,
      done: Mutex::new(None),
      cv: Condvar::new(),
      core,
    })
  }

  pub fn set(&self, res: Result<IoBuffer>) {
    *self.done.lock() = Some(res);
    self.cv.notify_all();
  }
}

/// Read request, polled or waited on / 读请求，可轮询或等待
#[derive(Clone)]
pub struct IoRequest(pub(crate) Arc<ReqState>);

impl IoRequest {
  #[inline]
  pub fn id(&self) -> u64 {
    self.0.id
  }

  /// `Unknown` until completed / 完成前为 `Unknown`
  pub fn status(&self) -> Code {
    match self.0.done.lock().as_ref() {
      Some(Ok(_)) => Code::Ok,
      Some(Err(e)) => e.code(),
      None => Code::Unknown,
    }
  }

  #[inline]
  pub fn is_ok(&self) -> bool {
    self.status().is_ok()
  }

  /// Non blocking, `Unknown` while in flight / 非阻塞，进行中返回 `Unknown`
  pub fn result(&self) -> Result<IoBuffer> {
    self
      .0
      .done
      .lock()
      .clone()
      .unwrap_or_else(|| Err(Error::from(Code::Unknown)))
  }

  /// Block until completed / 阻塞直到完成
  pub fn wait(&self) -> Result<IoBuffer> {
    let mut done = self.0.done.lock();
    loop {
      if let Some(res) = done.as_ref() {
        return res.clone();
      }
      self.0.cv.wait(&mut done);
    }
  }

  /// Best effort: the read may still finish, callbacks are skipped
  /// 尽力而为：读取可能仍会完成，但回调会被跳过
  pub fn cancel(&self) -> bool {
    match (&self.0.engine, self.0.core.upgrade()) {
      (Some(req), Some(core)) => core.store.cancel(req),
      _ => false,
    }
  }

  pub fn update_priority(&self, priority: i32) {
    if let (Some(req), Some(core)) = (&self.0.engine, self.0.core.upgrade()) {
      core.store.update_priority(req, priority);
    }
  }
}
