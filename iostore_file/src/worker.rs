//! Worker thread issuing raw partition reads / 发起分区原始读取的工作线程

use std::{
  sync::{
    Arc,
    mpsc::{Receiver, Sender, channel},
  },
  thread::JoinHandle,
};

use compio::{buf::BufResult, runtime::Runtime};
use iostore_base::{Code, Error, Result};
use log::{error, info};
use parking_lot::Mutex;

use crate::{Platform, State, block::RawBlock, handles::Handles, store::Shared};

pub(crate) enum Msg {
  /// New raw blocks were queued / 有新的原始块入队
  Wake,
  /// Drop handles of unmounted files / 关闭已卸载文件的句柄
  Close(Vec<u32>),
  Shutdown,
}

pub(crate) struct Worker {
  tx: Sender<Msg>,
  handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
  pub fn spawn<P: Platform>(shared: Arc<Shared>, platform: P) -> Result<Self> {
    let (tx, rx) = channel::<Msg>();
    let (ready_tx, ready_rx) = channel::<std::io::Result<()>>();
    let file_cap = shared.conf.file_cap;

    let handle = std::thread::Builder::new()
      .name("iostore".into())
      .spawn(move || {
        let rt = match Runtime::new() {
          Ok(rt) => {
            let _ = ready_tx.send(Ok(()));
            rt
          }
          Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
          }
        };
        rt.block_on(worker_loop(shared, Handles::new(platform, file_cap), rx));
      })
      .map_err(|e| Error::new(Code::Unknown, format!("spawn worker: {e}")))?;

    match ready_rx.recv() {
      Ok(Ok(())) => Ok(Self {
        tx,
        handle: Mutex::new(Some(handle)),
      }),
      Ok(Err(e)) => {
        let _ = handle.join();
        Err(Error::new(Code::Unknown, format!("worker runtime: {e}")))
      }
      Err(_) => {
        let _ = handle.join();
        Err(Error::new(Code::Unknown, "worker exited early"))
      }
    }
  }

  #[inline]
  pub fn send(&self, msg: Msg) {
    let _ = self.tx.send(msg);
  }

  /// Queued reads finish before the thread exits / 线程退出前完成队列中的读取
  pub fn shutdown(&self) {
    if let Some(h) = self.handle.lock().take() {
      let _ = self.tx.send(Msg::Shutdown);
      let _ = h.join();
    }
  }
}

/// `true` once shutdown was asked / 收到关闭请求时返回 `true`
fn handle_msg<P: Platform>(msg: Msg, handles: &mut Handles<P>) -> bool {
  match msg {
    Msg::Wake => false,
    Msg::Close(files) => {
      for f in files {
        handles.evict(f);
      }
      false
    }
    Msg::Shutdown => true,
  }
}

async fn worker_loop<P: Platform>(shared: Arc<Shared>, mut handles: Handles<P>, rx: Receiver<Msg>) {
  info!("iostore worker start");
  let mut stop = false;
  loop {
    while let Ok(msg) = rx.try_recv() {
      stop |= handle_msg(msg, &mut handles);
    }
    match shared.queue.pop() {
      Some(raw) => read_raw(&shared, &mut handles, raw).await,
      None if stop => break,
      None => match rx.recv() {
        Ok(msg) => stop |= handle_msg(msg, &mut handles),
        Err(_) => break,
      },
    }
  }
  shared.cancel_queued();
  info!("iostore worker stop");
}

/// Serve one raw block from the cache or the platform, then hand the bytes to
/// every compressed block waiting on it
/// 从缓存或平台读取一个原始块，再交给所有等待它的压缩块
async fn read_raw<P: Platform>(shared: &Shared, handles: &mut Handles<P>, raw: Arc<RawBlock>) {
  raw
    .waiters
    .for_each(|cb| cb.scatters.for_each(|s| s.req.advance(State::Reading)));

  let mut pooled = shared.pool.alloc();
  let mut buf = match pooled.as_mut() {
    Some(p) => p.take(),
    None => vec![0; shared.conf.read_block_size],
  };
  if buf.len() < raw.len {
    buf.resize(raw.len, 0);
  }
  let len = raw.len;

  let res = if shared.cache.read(raw.key, &mut buf[..len]) {
    Ok(())
  } else {
    let locked = shared.cache.lock(raw.key);
    let path = shared.registry.path(raw.file);
    let BufResult(res, back) = handles
      .read(raw.file, path.as_deref(), buf, len, raw.offset)
      .await;
    buf = back;
    let res = match res {
      Ok(()) if buf.len() < len => Err(Error::new(Code::ReadError, "short platform buffer")),
      Ok(()) => Ok(()),
      Err(e) => {
        error!("read file {} {len}@{}: {e}", raw.file, raw.offset);
        Err(Error::read(e))
      }
    };
    if locked {
      match &res {
        Ok(()) => {
          shared.cache.store(raw.key, &buf[..len]);
        }
        Err(_) => shared.cache.unlock(raw.key),
      }
    }
    res
  };

  shared.raw.remove(&raw.key);
  for cb in raw.waiters.drain() {
    let data = match &res {
      Ok(()) => Ok(&buf[..len]),
      Err(e) => Err(e),
    };
    if cb.deliver(raw.offset, data) {
      shared.finish_block(cb);
    }
  }

  if let Some(p) = pooled.as_mut() {
    p.restore(buf);
  }
}
