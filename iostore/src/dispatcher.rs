//! Mount table, request resolution and the completion thread
//! 挂载表、请求解析与完成线程

use std::{
  collections::HashMap,
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
    mpsc::{Receiver, Sender, channel},
  },
  thread::JoinHandle,
};

use iostore_base::{AesKey, ChunkId, Code, ContainerId, Error, Guid, Result};
use iostore_buf::IoBuffer;
use iostore_container::toc_path;
use iostore_file::{
  CompioPlatform, Complete, Conf, FileIoStore, Mounted, ParsedConf, Platform, Request,
};
use iostore_toc::{TocReadOptions, TocResource};
use log::{info, warn};
use parking_lot::{Mutex, RwLock};

use crate::{
  IoBatch, IoStoreEnvironment, ReadOptions,
  batch::BatchState,
  request::ReqState,
};

pub(crate) type ReadCallback = Box<dyn FnOnce(Result<IoBuffer>) + Send>;
type MountedCallback = Arc<dyn Fn(ContainerId) + Send + Sync>;

pub(crate) enum Event {
  Done(Arc<Request>),
  /// Resolution failed before submit / 提交前解析失败
  Failed(u64),
  Stop,
}

/// Engine sink forwarding to the dispatcher thread / 转发到调度线程的引擎接收器
struct Completions(Sender<Event>);

impl Complete for Completions {
  fn complete(&self, req: Arc<Request>) {
    let _ = self.0.send(Event::Done(req));
  }
}

struct Entry {
  state: Arc<ReqState>,
  callback: Option<ReadCallback>,
  batch: Option<Arc<BatchState>>,
}

/// Issued requests awaiting completion / 已发出、等待完成的请求
#[derive(Default)]
struct Pending {
  entries: Mutex<HashMap<u64, Entry>>,
}

impl Pending {
  fn finish(&self, id: u64, result: impl FnOnce(&ReqState) -> Result<IoBuffer>) {
    let Some(entry) = self.entries.lock().remove(&id) else {
      warn!("completion of unknown request {id}");
      return;
    };
    let res = result(&entry.state);
    let cancelled = matches!(&res, Err(e) if e.code() == Code::Cancelled);
    entry.state.set(res.clone());
    if let Some(cb) = entry.callback.filter(|_| !cancelled) {
      cb(res);
    }
    if let Some(batch) = entry.batch {
      batch.done_one();
    }
  }
}

fn run(pending: Arc<Pending>, rx: Receiver<Event>) {
  info!("iostore dispatcher start");
  while let Ok(event) = rx.recv() {
    match event {
      Event::Done(req) => pending.finish(req.id(), |_| req.result()),
      Event::Failed(id) => pending.finish(id, |s| {
        Err(s.early.clone().unwrap_or_else(|| Error::from(Code::Unknown)))
      }),
      Event::Stop => break,
    }
  }
  info!("iostore dispatcher stop");
}

struct Container {
  order: i32,
  seq: u64,
  mounted: Arc<Mounted>,
  chunks: HashMap<ChunkId, u32>,
}

pub(crate) struct Core {
  pub store: FileIoStore,
  /// Lookup precedence: higher order, then later mount
  /// 查找优先级：顺序值高者，其次后挂载者
  containers: RwLock<Vec<Container>>,
  on_mounted: RwLock<Vec<MountedCallback>>,
  pending: Arc<Pending>,
  tx: Sender<Event>,
  next_id: AtomicU64,
  next_seq: AtomicU64,
}

impl Core {
  /// Container, uncompressed offset and size of a chunk
  /// 块所在容器、未压缩偏移与大小
  fn locate(&self, chunk: &ChunkId) -> Result<(Arc<Mounted>, u64, u64)> {
    let list = self.containers.read();
    for c in list.iter() {
      if let Some(&index) = c.chunks.get(chunk) {
        let info = c
          .mounted
          .toc()
          .chunk_info(index as usize)
          .ok_or_else(|| Error::corrupt_toc(format!("chunk index {index}")))?;
        return Ok((c.mounted.clone(), info.offset, info.size));
      }
    }
    Err(Error::new(Code::UnknownChunkId, format!("chunk {chunk}")))
  }

  pub fn new_request(
    self: &Arc<Self>,
    chunk: &ChunkId,
    options: ReadOptions,
    priority: i32,
  ) -> Arc<ReqState> {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let engine = self.locate(chunk).and_then(|(mounted, offset, size)| {
      if options.offset > size {
        return Err(Error::invalid_param(format!(
          "offset {} past chunk {chunk} of {size} bytes",
          options.offset
        )));
      }
      let left = size - options.offset;
      let len = options.size.map_or(left, |s| s.min(left));
      Request::new(id, mounted, offset + options.offset, len, priority, None)
    });
    ReqState::new(id, engine, Arc::downgrade(self))
  }

  pub fn submit(
    &self,
    reqs: Vec<(Arc<ReqState>, Option<ReadCallback>)>,
    batch: Option<Arc<BatchState>>,
  ) {
    let mut engine = Vec::with_capacity(reqs.len());
    let mut failed = Vec::new();
    {
      let mut entries = self.pending.entries.lock();
      for (state, callback) in reqs {
        match &state.engine {
          Some(r) => engine.push(r.clone()),
          None => failed.push(state.id),
        }
        entries.insert(
          state.id,
          Entry {
            state,
            callback,
            batch: batch.clone(),
          },
        );
      }
    }
    for id in failed {
      let _ = self.tx.send(Event::Failed(id));
    }
    self.store.submit(engine);
  }
}

/// Public entry point: mount containers, build batches, read chunks
/// 公共入口：挂载容器、构建批次、读取块
pub struct IoDispatcher {
  core: Arc<Core>,
  thread: Option<JoinHandle<()>>,
}

impl IoDispatcher {
  /// Dispatcher over the compio platform / 基于 compio 平台的调度器
  pub fn new(conf: &[Conf]) -> Result<Self> {
    let retries = ParsedConf::parse(conf).read_retries;
    Self::with_platform(CompioPlatform::new(retries), conf)
  }

  pub fn with_platform<P: Platform>(platform: P, conf: &[Conf]) -> Result<Self> {
    let (tx, rx) = channel();
    let store = FileIoStore::new(platform, Arc::new(Completions(tx.clone())), conf)?;
    let pending = Arc::new(Pending::default());
    let p = pending.clone();
    let thread = std::thread::Builder::new()
      .name("iostore-dispatch".into())
      .spawn(move || run(p, rx))
      .map_err(|e| Error::new(Code::Unknown, format!("spawn dispatcher: {e}")))?;
    Ok(Self {
      core: Arc::new(Core {
        store,
        containers: RwLock::new(Vec::new()),
        on_mounted: RwLock::new(Vec::new()),
        pending,
        tx,
        next_id: AtomicU64::new(0),
        next_seq: AtomicU64::new(0),
      }),
      thread: Some(thread),
    })
  }

  /// Read the TOC of `env` and make its chunks visible. An encrypted
  /// container needs `key` and a matching `key_guid`.
  /// 读取 `env` 的目录表并使其块可见；加密容器需要 `key` 与匹配的 `key_guid`。
  pub fn mount(
    &self,
    env: IoStoreEnvironment,
    key_guid: Guid,
    key: Option<AesKey>,
  ) -> Result<ContainerId> {
    let toc = TocResource::read(toc_path(env.base()), TocReadOptions::READ_TOC_META, None)?;
    if toc.is_encrypted() && (key.is_none() || toc.header.encryption_key_guid != key_guid) {
      return Err(Error::new(
        Code::InvalidEncryptionKey,
        format!("{}: key {key_guid:?} does not open it", env.base().display()),
      ));
    }
    let id = toc.header.container_id;
    let chunks = toc.chunk_map()?;
    let key = key.filter(|_| toc.is_encrypted());
    {
      // Check and insert under one guard / 检查与插入在同一把锁下完成
      let mut list = self.core.containers.write();
      if list.iter().any(|c| c.mounted.container_id() == id) {
        return Err(Error::invalid_param(format!("container {id} already mounted")));
      }
      let mounted = self.core.store.mount(env.base(), Arc::new(toc), key)?;
      list.push(Container {
        order: env.order(),
        seq: self.core.next_seq.fetch_add(1, Ordering::Relaxed),
        mounted,
        chunks,
      });
      list.sort_by(|a, b| b.order.cmp(&a.order).then(b.seq.cmp(&a.seq)));
    }
    info!("mounted container {id} order {}", env.order());

    let callbacks = self.core.on_mounted.read().clone();
    for cb in callbacks {
      cb(id);
    }
    Ok(id)
  }

  /// In-flight reads of the container still complete / 该容器的在途读取仍会完成
  pub fn unmount(&self, id: ContainerId) -> bool {
    let removed = {
      let mut list = self.core.containers.write();
      list
        .iter()
        .position(|c| c.mounted.container_id() == id)
        .map(|i| list.remove(i))
    };
    match removed {
      Some(c) => self.core.store.unmount(c.mounted.index()),
      None => false,
    }
  }

  /// Called after each successful mount / 每次挂载成功后调用
  pub fn on_mounted(&self, callback: impl Fn(ContainerId) + Send + Sync + 'static) {
    self.core.on_mounted.write().push(Arc::new(callback));
  }

  pub fn does_chunk_exist(&self, chunk: &ChunkId) -> bool {
    self
      .core
      .containers
      .read()
      .iter()
      .any(|c| c.chunks.contains_key(chunk))
  }

  /// Uncompressed size / 未压缩大小
  pub fn size_for_chunk(&self, chunk: &ChunkId) -> Result<u64> {
    self.core.locate(chunk).map(|(_, _, size)| size)
  }

  #[inline]
  pub fn new_batch(&self) -> IoBatch {
    IoBatch::new(self.core.clone())
  }

  #[inline]
  pub fn containers(&self) -> usize {
    self.core.containers.read().len()
  }
}

impl Drop for IoDispatcher {
  fn drop(&mut self) {
    // Every completion is sent before the stop marker / 所有完成事件都先于停止标记发送
    self.core.store.shutdown();
    let _ = self.core.tx.send(Event::Stop);
    if let Some(h) = self.thread.take() {
      let _ = h.join();
    }
  }
}
