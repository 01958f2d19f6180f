//! File backed I/O store / 基于文件的 I/O 存储

use std::{
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

use iostore_base::{AesKey, Code, Error};
use iostore_buf::BufferAllocator;
use iostore_cache::{BlockCache, key};
use iostore_queue::{RequestQueue, RequestTracker};
use iostore_toc::TocResource;
use log::{debug, info, warn};

use crate::{
  CompioPlatform, Complete, Conf, Mounted, ParsedConf, Platform, Request, State,
  block::{CompressedBlock, RawBlock, Scatter},
  decompress::DecompressPool,
  mount::Registry,
  worker::{Msg, Worker},
};

/// State shared by callers, the worker and decompression threads
/// 调用方、工作线程与解压线程共享的状态
pub(crate) struct Shared {
  pub conf: ParsedConf,
  pub registry: Registry,
  pub queue: RequestQueue<Arc<RawBlock>>,
  pub raw: RequestTracker<u64, RawBlock>,
  pub compressed: RequestTracker<u64, CompressedBlock>,
  pub cache: BlockCache,
  pub pool: BufferAllocator,
  pub decompress: DecompressPool,
  pub sink: Arc<dyn Complete>,
}

impl Shared {
  /// All raw reads of `cb` arrived: decode once, scatter to every request
  /// `cb` 的原始读取全部到达：解码一次，分发给每个请求
  pub fn finish_block(&self, cb: Arc<CompressedBlock>) {
    self.compressed.remove(&cb.key);
    let scatters = cb.scatters.drain();
    let live = scatters.iter().any(|s| !s.req.is_cancelled());
    for s in &scatters {
      s.req.advance(State::Decompressing);
    }
    let sink = self.sink.clone();
    let job = move || {
      let out = live.then(|| cb.decode());
      if let Some(Err(e)) = &out {
        warn!("decode block {} of {}: {e}", cb.index, cb.container.container_id());
      }
      scatter(out, scatters, &*sink);
    };
    if live {
      self.decompress.spawn(Box::new(job));
    } else {
      job();
    }
  }
}

impl Shared {
  /// Cancel every raw read still queued, completing the requests behind them
  /// 取消所有仍在排队的原始读取，并完成其背后的请求
  pub fn cancel_queued(&self) {
    let mut n = 0;
    while let Some(raw) = self.queue.pop() {
      n += 1;
      self.raw.remove(&raw.key);
      let err = Error::new(Code::Cancelled, "engine shut down");
      for cb in raw.waiters.drain() {
        cb.scatters.for_each(|s| {
          s.req.cancel();
        });
        if cb.deliver(raw.offset, Err(&err)) {
          self.finish_block(cb);
        }
      }
    }
    if n > 0 {
      warn!("cancelled {n} raw reads left after shutdown");
    }
  }
}

fn scatter(out: Option<iostore_base::Result<Vec<u8>>>, scatters: Vec<Scatter>, sink: &dyn Complete) {
  for s in scatters {
    if !s.req.is_cancelled() {
      match &out {
        Some(Ok(data)) => match data.get(s.src..s.src + s.len) {
          Some(src) => s.req.write(s.dst, src),
          None => s
            .req
            .fail(Error::corrupt_toc("block shorter than its recorded size")),
        },
        Some(Err(e)) => s.req.fail(e.clone()),
        None => {}
      }
    }
    s.req.block_done(sink);
  }
}

/// Raw reads created by one submit / 一次提交新建的原始读取
#[derive(Default)]
struct Batch {
  fresh: Vec<Arc<RawBlock>>,
  /// A queued raw read was raised / 有已入队的原始读取被提升
  reorder: bool,
}

/// Asynchronous read engine over mounted containers.
/// Requests are split into compression blocks, blocks into aligned raw reads,
/// both deduplicated across requests. Every request reaches the sink exactly once.
/// 挂载容器之上的异步读取引擎。
/// 请求拆分为压缩块，压缩块拆分为对齐的原始读取，两者都跨请求去重；
/// 每个请求恰好一次到达完成接收器。
pub struct FileIoStore {
  shared: Arc<Shared>,
  worker: Worker,
  closed: AtomicBool,
}

impl FileIoStore {
  pub fn new<P: Platform>(
    platform: P,
    sink: Arc<dyn Complete>,
    conf: &[Conf],
  ) -> iostore_base::Result<Self> {
    let conf = ParsedConf::parse(conf);
    let shared = Arc::new(Shared {
      registry: Registry::default(),
      queue: RequestQueue::new(),
      raw: RequestTracker::new(),
      compressed: RequestTracker::new(),
      cache: BlockCache::new(conf.cache_blocks),
      pool: BufferAllocator::new(conf.buffer_count, conf.read_block_size),
      decompress: DecompressPool::new(conf.decompress_threads),
      sink,
      conf,
    });
    let worker = Worker::spawn(shared.clone(), platform)?;
    info!(
      "iostore engine: read block {} cache {} threads {}",
      shared.conf.read_block_size, shared.conf.cache_blocks, shared.conf.decompress_threads
    );
    Ok(Self {
      shared,
      worker,
      closed: AtomicBool::new(false),
    })
  }

  /// Engine on the compio platform / 使用 compio 平台的引擎
  pub fn compio(sink: Arc<dyn Complete>, conf: &[Conf]) -> iostore_base::Result<Self> {
    let retries = ParsedConf::parse(conf).read_retries;
    Self::new(CompioPlatform::new(retries), sink, conf)
  }

  #[inline]
  pub fn conf(&self) -> &ParsedConf {
    &self.shared.conf
  }

  /// Register the partitions of `base` / 注册 `base` 的分区
  pub fn mount(
    &self,
    base: impl AsRef<Path>,
    toc: Arc<TocResource>,
    key: Option<AesKey>,
  ) -> iostore_base::Result<Arc<Mounted>> {
    let base = base.as_ref();
    let mounted = self.shared.registry.mount(base, toc, key)?;
    info!(
      "mount {} as {} ({} partitions)",
      base.display(),
      mounted.index(),
      mounted.files().len()
    );
    Ok(mounted)
  }

  /// In-flight requests of the container still finish / 该容器的在途请求仍会完成
  pub fn unmount(&self, index: u32) -> bool {
    match self.shared.registry.unmount(index) {
      Some(m) => {
        self.worker.send(Msg::Close(m.files().collect()));
        info!("unmount {index}");
        true
      }
      None => false,
    }
  }

  #[inline]
  pub fn mounted(&self) -> usize {
    self.shared.registry.len()
  }

  /// Resolve requests into blocks and queue the missing raw reads
  /// 将请求解析为块并为缺失的原始读取排队
  pub fn submit(&self, reqs: impl IntoIterator<Item = Arc<Request>>) {
    if self.closed.load(Ordering::SeqCst) {
      for req in reqs {
        req.cancel();
        req.finish(&*self.shared.sink);
      }
      return;
    }
    let mut batch = Batch::default();
    for req in reqs {
      self.resolve(&req, &mut batch);
    }
    if batch.reorder {
      self.shared.queue.update_order();
    }
    if !batch.fresh.is_empty() {
      debug!("queue {} raw reads", batch.fresh.len());
      self.shared.queue.push_all(batch.fresh);
      self.worker.send(Msg::Wake);
      // Shut down meanwhile, the worker may be gone / 期间已关闭，工作线程可能已退出
      if self.closed.load(Ordering::SeqCst) {
        self.shared.cancel_queued();
      }
    }
  }

  /// Best effort, the request still completes once / 尽力而为，请求仍会完成一次
  pub fn cancel(&self, req: &Request) -> bool {
    req.cancel()
  }

  /// Raise the raw reads behind `req` and reorder the queue
  /// 提升 `req` 背后的原始读取并重排队列
  pub fn update_priority(&self, req: &Request, priority: i32) {
    req.set_priority(priority);
    for cb in req.blocks.lock().iter() {
      for raw in cb.raws.lock().iter() {
        raw.boost(priority);
      }
    }
    self.shared.queue.update_order();
  }

  /// Raw reads waiting for the worker / 等待工作线程的原始读取
  #[inline]
  pub fn queued(&self) -> usize {
    self.shared.queue.len()
  }

  /// Compressed blocks still gathering / 仍在汇集中的压缩块
  #[inline]
  pub fn in_flight(&self) -> usize {
    self.shared.compressed.len()
  }

  #[inline]
  pub fn cached_blocks(&self) -> usize {
    self.shared.cache.len()
  }

  #[inline]
  pub fn free_buffers(&self) -> usize {
    self.shared.pool.free()
  }

  /// Drain queued reads, then stop every thread. Later submits are cancelled.
  /// 完成已排队读取后停止所有线程，之后的提交将被取消。
  pub fn shutdown(&self) {
    if self.closed.swap(true, Ordering::SeqCst) {
      return;
    }
    self.worker.shutdown();
    self.shared.decompress.shutdown();
  }

  fn resolve(&self, req: &Arc<Request>, batch: &mut Batch) {
    let sink = &*self.shared.sink;
    let toc = req.container().toc();
    let range = toc.block_range(req.offset(), req.size());
    if range.end > toc.compression_blocks.len() {
      req.fail(Error::corrupt_toc(format!(
        "range {}+{} past the last block",
        req.offset(),
        req.size()
      )));
      req.finish(sink);
      return;
    }
    if range.is_empty() {
      req.finish(sink);
      return;
    }

    req.start(range.len());
    let bs = toc.header.compression_block_size as u64;
    let end = req.offset() + req.size();
    for b in range {
      let start = b as u64 * bs;
      let from = req.offset().max(start);
      let to = end.min(start + bs);
      let s = Scatter {
        req: req.clone(),
        src: (from - start) as usize,
        dst: (from - req.offset()) as usize,
        len: (to - from) as usize,
      };
      let cb = self.attach_block(req.container(), b, s, req.priority(), batch);
      let mut blocks = req.blocks.lock();
      if !req.state().is_terminal() {
        blocks.push(cb);
      }
    }
  }

  /// Attach a scatter to compressed block `index`, creating it when absent
  /// 将分发目标附加到压缩块 `index`，不存在时创建
  fn attach_block(
    &self,
    container: &Arc<Mounted>,
    index: usize,
    mut s: Scatter,
    priority: i32,
    batch: &mut Batch,
  ) -> Arc<CompressedBlock> {
    let toc = container.toc();
    let entry = &toc.compression_blocks[index];
    let (partition, local) = toc.partition_of(entry.offset());
    let stored = toc.stored_size(entry) as usize;
    let k = key(container.index(), index as u32);
    loop {
      let (cb, created) = self.shared.compressed.find_or_add(k, || {
        CompressedBlock::new(k, container.clone(), index, local, stored)
      });
      match cb.scatters.push(s) {
        Ok(()) => {
          if created {
            self.start_block(&cb, partition, priority, batch);
          } else {
            for raw in cb.raws.lock().iter() {
              batch.reorder |= raw.boost(priority);
            }
          }
          return cb;
        }
        // Finished meanwhile / 期间已完成
        Err(back) => s = back,
      }
    }
  }

  /// Split a new compressed block into aligned raw reads
  /// 将新的压缩块拆分为对齐的原始读取
  fn start_block(
    &self,
    cb: &Arc<CompressedBlock>,
    partition: u32,
    priority: i32,
    batch: &mut Batch,
  ) {
    let stored = cb.stored.lock().len() as u64;
    let (file, file_size) = match cb.container.file(partition) {
      Some((file, size)) if cb.offset + stored <= size => (file, size),
      Some((file, size)) => {
        cb.fail(Error::corrupt_toc(format!(
          "block {} ends at {} past file {file} of {size} bytes",
          cb.index,
          cb.offset + stored
        )));
        self.shared.finish_block(cb.clone());
        return;
      }
      None => {
        cb.fail(Error::corrupt_toc(format!(
          "block {} in missing partition {partition}",
          cb.index
        )));
        self.shared.finish_block(cb.clone());
        return;
      }
    };
    if stored == 0 {
      self.shared.finish_block(cb.clone());
      return;
    }

    let rbs = self.shared.conf.read_block_size as u64;
    let first = cb.offset / rbs;
    let last = (cb.offset + stored - 1) / rbs;
    cb.pending
      .store((last - first + 1) as usize, Ordering::Release);
    for r in first..=last {
      let k = key(file, r as u32);
      let offset = r * rbs;
      loop {
        let (raw, created) = self.shared.raw.find_or_add(k, || {
          RawBlock::new(k, file, offset, rbs.min(file_size - offset) as usize, priority)
        });
        if raw.waiters.push(cb.clone()).is_ok() {
          batch.reorder |= raw.boost(priority) && !created;
          cb.raws.lock().push(raw.clone());
          if created {
            batch.fresh.push(raw);
          }
          break;
        }
      }
    }
  }
}

impl Drop for FileIoStore {
  fn drop(&mut self) {
    self.shutdown();
  }
}
