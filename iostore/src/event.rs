//! Batch completion notifications / 批次完成通知

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Manual reset event / 手动重置事件
#[derive(Default)]
pub struct IoEvent {
  set: Mutex<bool>,
  cv: Condvar,
}

impl IoEvent {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn trigger(&self) {
    *self.set.lock() = true;
    self.cv.notify_all();
  }

  #[inline]
  pub fn is_triggered(&self) -> bool {
    *self.set.lock()
  }

  pub fn reset(&self) {
    *self.set.lock() = false;
  }

  pub fn wait(&self) {
    let mut set = self.set.lock();
    while !*set {
      self.cv.wait(&mut set);
    }
  }

  /// `false` on timeout / 超时返回 `false`
  pub fn wait_timeout(&self, timeout: Duration) -> bool {
    let mut set = self.set.lock();
    if !*set {
      self.cv.wait_while_for(&mut set, |set| !*set, timeout);
    }
    *set
  }
}

pub type Task = Box<dyn FnOnce() + Send>;

/// Event whose subsequent tasks run once it is dispatched
/// 分发后执行后续任务的事件
pub struct TaskEvent {
  /// `None` once dispatched / 分发后为 `None`
  subsequents: Mutex<Option<Vec<Task>>>,
  done: IoEvent,
}

impl Default for TaskEvent {
  fn default() -> Self {
    Self::new()
  }
}

impl TaskEvent {
  pub fn new() -> Self {
    Self {
      subsequents: Mutex::new(Some(Vec::new())),
      done: IoEvent::new(),
    }
  }

  /// Runs right away when already dispatched / 已分发时立即执行
  pub fn add_subsequent(&self, task: impl FnOnce() + Send + 'static) {
    let task: Task = Box::new(task);
    let task = match self.subsequents.lock().as_mut() {
      Some(list) => {
        list.push(task);
        return;
      }
      None => task,
    };
    task();
  }

  /// Run every subsequent once, later calls do nothing
  /// 执行每个后续任务一次，之后的调用无效
  pub fn dispatch(&self) {
    let Some(tasks) = self.subsequents.lock().take() else {
      return;
    };
    for task in tasks {
      task();
    }
    self.done.trigger();
  }

  #[inline]
  pub fn is_dispatched(&self) -> bool {
    self.done.is_triggered()
  }

  pub fn wait(&self) {
    self.done.wait();
  }
}
