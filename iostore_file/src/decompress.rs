//! Decompression thread pool / 解压线程池

use std::{
  sync::{
    Arc,
    mpsc::{Receiver, Sender, channel},
  },
  thread::JoinHandle,
};

use log::debug;
use parking_lot::Mutex;

pub(crate) type Job = Box<dyn FnOnce() + Send>;

/// Runs jobs on `threads` threads, or inline when there are none
/// 在 `threads` 个线程上执行任务，无线程时内联执行
pub(crate) struct DecompressPool {
  tx: Mutex<Option<Sender<Job>>>,
  handles: Mutex<Vec<JoinHandle<()>>>,
}

impl DecompressPool {
  pub fn new(threads: usize) -> Self {
    if threads == 0 {
      return Self {
        tx: Mutex::new(None),
        handles: Mutex::new(Vec::new()),
      };
    }
    let (tx, rx) = channel::<Job>();
    let rx = Arc::new(Mutex::new(rx));
    let handles = (0..threads)
      .map(|i| {
        let rx = rx.clone();
        std::thread::spawn(move || run(i, rx))
      })
      .collect();
    Self {
      tx: Mutex::new(Some(tx)),
      handles: Mutex::new(handles),
    }
  }

  pub fn spawn(&self, job: Job) {
    let job = match self.tx.lock().as_ref() {
      Some(tx) => match tx.send(job) {
        Ok(()) => return,
        Err(e) => e.0,
      },
      None => job,
    };
    job();
  }

  /// Finish queued jobs and join / 执行完队列中的任务后回收线程
  pub fn shutdown(&self) {
    drop(self.tx.lock().take());
    for h in self.handles.lock().drain(..) {
      let _ = h.join();
    }
  }
}

fn run(id: usize, rx: Arc<Mutex<Receiver<Job>>>) {
  loop {
    let job = rx.lock().recv();
    match job {
      Ok(job) => job(),
      Err(_) => break,
    }
  }
  debug!("decompress thread {id} exit");
}
