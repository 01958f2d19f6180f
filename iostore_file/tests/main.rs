use std::{
  fs::File,
  io,
  os::unix::fs::FileExt,
  path::{Path, PathBuf},
  sync::{
    Arc, Condvar, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::{Duration, Instant},
};

use aok::{OK, Void};
use iostore_base::{AesKey, ChunkId, ChunkType, Code, Guid};
use iostore_buf::IoBuffer;
use iostore_compress::Codec;
use iostore_container::{IoStoreWriter, partition_path, toc_path};
use iostore_file::{
  BufResult, Complete, Conf, FileIoStore, Mounted, ParsedConf, Platform, Request, State,
};
use iostore_toc::{ContainerSettings, KeyedSha1, TocReadOptions, TocResource, WriterSettings};
use log::info;

#[static_init::constructor(0)]
extern "C" fn _log_init() {
  log_init::init();
}

fn id(n: u64) -> ChunkId {
  ChunkId::new(n, 0, ChunkType::BulkData)
}

/// Deterministic bytes, half repetitive so it compresses
/// 确定性数据，一半重复以便可压缩
fn data(seed: u64, len: usize) -> Vec<u8> {
  let mut x = seed.wrapping_mul(0x9e37_79b9_7f4a_7c15) | 1;
  (0..len)
    .map(|i| {
      if (i / 512) % 2 == 0 {
        (i % 7) as u8
      } else {
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        x as u8
      }
    })
    .collect()
}

const CHUNKS: &[(u64, usize)] = &[(1, 4096), (2, 1), (3, 3000), (4, 0), (5, 10_000)];

fn small_blocks() -> WriterSettings {
  WriterSettings {
    compression_block_size: 1024,
    ..Default::default()
  }
}

fn build(
  dir: &Path,
  name: &str,
  container: ContainerSettings,
  settings: WriterSettings,
) -> std::io::Result<PathBuf> {
  let base = dir.join(name);
  let mut w = IoStoreWriter::new(&base, container, settings).map_err(io::Error::other)?;
  for &(n, len) in CHUNKS {
    w.append(id(n), &data(n, len), None)
      .map_err(io::Error::other)?;
  }
  let res = w.finish().map_err(io::Error::other)?;
  info!("{name}: {res:?}");
  Ok(base)
}

fn mount(store: &FileIoStore, base: &Path, key: Option<AesKey>) -> iostore_base::Result<Arc<Mounted>> {
  let toc = TocResource::read(toc_path(base), TocReadOptions::READ_ALL, key.as_ref())?;
  store.mount(base, Arc::new(toc), key)
}

/// Uncompressed offset and size of chunk `n` / 块 `n` 的未压缩偏移与大小
fn locate(m: &Mounted, n: u64) -> (u64, u64) {
  let toc = m.toc();
  let index = toc.chunk_ids.iter().position(|c| *c == id(n)).unwrap();
  let info = toc.chunk_info(index).unwrap();
  (info.offset, info.size)
}

fn req(m: &Arc<Mounted>, rid: u64, n: u64, off: u64, size: Option<u64>, priority: i32) -> Arc<Request> {
  let (start, len) = locate(m, n);
  let size = size.unwrap_or(len - off);
  Request::new(rid, m.clone(), start + off, size, priority, None).unwrap()
}

/// Partition-local raw block holding byte `off` of chunk `n`
/// 块 `n` 第 `off` 字节所在的分区内原始块
fn raw_of(m: &Mounted, n: u64, off: u64, rbs: u64) -> u64 {
  let toc = m.toc();
  let (start, _) = locate(m, n);
  let bs = toc.header.compression_block_size as u64;
  let entry = &toc.compression_blocks[((start + off) / bs) as usize];
  let (_, local) = toc.partition_of(entry.offset());
  (local + (start + off) % bs) / rbs * rbs
}

#[derive(Default)]
struct Sink {
  done: Mutex<Vec<Arc<Request>>>,
  cv: Condvar,
}

impl Complete for Sink {
  fn complete(&self, req: Arc<Request>) {
    self.done.lock().unwrap().push(req);
    self.cv.notify_all();
  }
}

impl Sink {
  fn wait(&self, n: usize) -> Vec<Arc<Request>> {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut done = self.done.lock().unwrap();
    while done.len() < n {
      let left = deadline.saturating_duration_since(Instant::now());
      assert!(!left.is_zero(), "only {} of {n} requests completed", done.len());
      done = self.cv.wait_timeout(done, left).unwrap().0;
    }
    done.clone()
  }
}

#[derive(Default)]
struct Gate {
  open: Mutex<bool>,
  cv: Condvar,
}

impl Gate {
  fn closed() -> Arc<Self> {
    Arc::new(Self::default())
  }

  fn pass(&self) {
    let mut open = self.open.lock().unwrap();
    while !*open {
      open = self.cv.wait(open).unwrap();
    }
  }

  fn open(&self) {
    *self.open.lock().unwrap() = true;
    self.cv.notify_all();
  }
}

/// Blocking std reads with counters, a gate and injected failures
/// 带计数、闸门与故障注入的阻塞式标准库读取
#[derive(Clone, Default)]
struct StdPlatform {
  reads: Arc<AtomicUsize>,
  offsets: Arc<Mutex<Vec<u64>>>,
  gate: Option<Arc<Gate>>,
  fail: bool,
}

impl Platform for StdPlatform {
  type File = File;

  async fn open(&self, path: &Path) -> io::Result<File> {
    File::open(path)
  }

  async fn read_at(
    &self,
    file: &File,
    mut buf: Vec<u8>,
    len: usize,
    offset: u64,
  ) -> BufResult<(), Vec<u8>> {
    if let Some(gate) = &self.gate {
      gate.pass();
    }
    self.reads.fetch_add(1, Ordering::SeqCst);
    self.offsets.lock().unwrap().push(offset);
    if self.fail {
      return BufResult(Err(io::Error::other("injected")), buf);
    }
    let res = file.read_exact_at(&mut buf[..len], offset);
    BufResult(res, buf)
  }
}

fn wait_idle(store: &FileIoStore) {
  let deadline = Instant::now() + Duration::from_secs(10);
  while store.queued() > 0 {
    assert!(Instant::now() < deadline, "worker never picked up the queue");
    std::thread::sleep(Duration::from_millis(1));
  }
}

#[test]
fn test_conf_defaults_and_floor() {
  let c = ParsedConf::parse(&[]);
  assert_eq!(c.read_block_size, iostore_file::consts::DEFAULT_READ_BLOCK_SIZE);
  assert_eq!(c.cache_blocks, iostore_file::consts::DEFAULT_CACHE_BLOCKS);
  let c = ParsedConf::parse(&[Conf::ReadBlockSize(1), Conf::FileCap(0), Conf::CacheBlocks(0)]);
  assert_eq!(c.read_block_size, 4096);
  assert!(c.file_cap > 0);
  assert_eq!(c.cache_blocks, 0);
}

#[test]
fn test_read_every_chunk() -> Void {
  let dir = tempfile::tempdir()?;
  let base = build(dir.path(), "plain", ContainerSettings::new("plain"), small_blocks())?;
  let sink = Arc::new(Sink::default());
  let store = FileIoStore::compio(sink.clone(), &[])?;
  let m = mount(&store, &base, None)?;
  assert_eq!(store.mounted(), 1);

  let reqs: Vec<_> = CHUNKS
    .iter()
    .map(|&(n, _)| req(&m, n, n, 0, None, 0))
    .collect();
  store.submit(reqs);
  let done = sink.wait(CHUNKS.len());
  for r in done {
    let n = r.id();
    let len = CHUNKS.iter().find(|c| c.0 == n).unwrap().1;
    assert_eq!(r.state(), State::Completed);
    assert_eq!(r.code(), Code::Ok);
    assert_eq!(r.result()?.data(), &data(n, len)[..], "chunk {n}");
  }
  OK
}

#[test]
fn test_ranges_and_target_buffer() -> Void {
  let dir = tempfile::tempdir()?;
  let base = build(dir.path(), "range", ContainerSettings::new("range"), small_blocks())?;
  let sink = Arc::new(Sink::default());
  let store = FileIoStore::new(StdPlatform::default(), sink.clone(), &[Conf::ReadBlockSize(4096)])?;
  let m = mount(&store, &base, None)?;
  let full = data(5, 10_000);

  let (start, _) = locate(&m, 5);
  let target = IoBuffer::with_size(4096);
  let with_target = Request::new(3, m.clone(), start + 1020, 2000, 0, Some(target))?;
  store.submit([
    req(&m, 1, 5, 1000, Some(50), 0),
    req(&m, 2, 5, 9_999, None, 0),
    with_target,
  ]);
  let mut done = sink.wait(3);
  done.sort_by_key(|r| r.id());
  assert_eq!(done[0].result()?.data(), &full[1000..1050]);
  assert_eq!(done[1].result()?.data(), &full[9_999..]);
  assert_eq!(done[2].result()?.data(), &full[1020..3020]);

  let view = IoBuffer::wrap_static(&[0; 8]);
  assert_eq!(
    Request::new(4, m.clone(), start, 8, 0, Some(view)).err().map(|e| e.code()),
    Some(Code::InvalidParameter)
  );
  OK
}

#[test]
fn test_empty_request_completes() -> Void {
  let dir = tempfile::tempdir()?;
  let base = build(dir.path(), "empty", ContainerSettings::new("empty"), small_blocks())?;
  let sink = Arc::new(Sink::default());
  let platform = StdPlatform::default();
  let store = FileIoStore::new(platform.clone(), sink.clone(), &[])?;
  let m = mount(&store, &base, None)?;
  store.submit([req(&m, 4, 4, 0, None, 0)]);
  let done = sink.wait(1);
  assert_eq!(done[0].state(), State::Completed);
  assert!(done[0].result()?.is_empty());
  assert_eq!(platform.reads.load(Ordering::SeqCst), 0);
  OK
}

#[test]
fn test_overlapping_reads_share_one_raw_read() -> Void {
  let dir = tempfile::tempdir()?;
  let base = build(dir.path(), "dedup", ContainerSettings::new("dedup"), small_blocks())?;
  let sink = Arc::new(Sink::default());
  let gate = Gate::closed();
  let platform = StdPlatform {
    gate: Some(gate.clone()),
    ..Default::default()
  };
  let conf = [Conf::ReadBlockSize(4096), Conf::CacheBlocks(0)];
  let store = FileIoStore::new(platform.clone(), sink.clone(), &conf)?;
  let m = mount(&store, &base, None)?;

  store.submit([req(&m, 1, 1, 0, None, 0)]);
  store.submit([req(&m, 2, 1, 100, Some(2000), 0)]);
  assert!(store.queued() <= 1);
  gate.open();

  let done = sink.wait(2);
  let full = data(1, 4096);
  for r in &done {
    let want = if r.id() == 1 { &full[..] } else { &full[100..2100] };
    assert_eq!(r.result()?.data(), want);
  }
  assert_eq!(platform.reads.load(Ordering::SeqCst), 1);

  // Completion retires the shared block, a later read starts over
  // 完成后共享块即退役，之后的读取重新开始
  assert_eq!(store.in_flight(), 0);
  store.submit([req(&m, 3, 1, 0, None, 0)]);
  let done = sink.wait(3);
  assert_eq!(done[2].result()?.data(), &full[..]);
  assert_eq!(platform.reads.load(Ordering::SeqCst), 2);
  OK
}

#[test]
fn test_cache_serves_repeat_reads() -> Void {
  let dir = tempfile::tempdir()?;
  let base = build(dir.path(), "cache", ContainerSettings::new("cache"), small_blocks())?;
  let sink = Arc::new(Sink::default());
  let platform = StdPlatform::default();
  let store = FileIoStore::new(platform.clone(), sink.clone(), &[Conf::ReadBlockSize(4096)])?;
  let m = mount(&store, &base, None)?;

  store.submit([req(&m, 1, 1, 0, None, 0)]);
  sink.wait(1);
  let first = platform.reads.load(Ordering::SeqCst);
  assert!(store.cached_blocks() > 0);

  store.submit([req(&m, 2, 1, 0, None, 0)]);
  let done = sink.wait(2);
  assert_eq!(done[1].result()?.data(), &data(1, 4096)[..]);
  assert_eq!(platform.reads.load(Ordering::SeqCst), first);
  OK
}

#[test]
fn test_cancel() -> Void {
  let dir = tempfile::tempdir()?;
  let base = build(dir.path(), "cancel", ContainerSettings::new("cancel"), small_blocks())?;
  let sink = Arc::new(Sink::default());
  let gate = Gate::closed();
  let platform = StdPlatform {
    gate: Some(gate.clone()),
    ..Default::default()
  };
  let store = FileIoStore::new(platform, sink.clone(), &[])?;
  let m = mount(&store, &base, None)?;

  let r = req(&m, 1, 5, 0, None, 0);
  store.submit([r.clone()]);
  assert!(store.cancel(&r));
  assert!(!store.cancel(&r));
  gate.open();

  let done = sink.wait(1);
  assert_eq!(done.len(), 1);
  assert_eq!(r.state(), State::Cancelled);
  assert_eq!(r.code(), Code::Cancelled);
  assert_eq!(r.result().unwrap_err().code(), Code::Cancelled);
  assert!(!store.cancel(&r));
  OK
}

#[test]
fn test_read_failure() -> Void {
  let dir = tempfile::tempdir()?;
  let base = build(dir.path(), "fail", ContainerSettings::new("fail"), small_blocks())?;
  let sink = Arc::new(Sink::default());
  let platform = StdPlatform {
    fail: true,
    ..Default::default()
  };
  let store = FileIoStore::new(platform, sink.clone(), &[Conf::CacheBlocks(4)])?;
  let m = mount(&store, &base, None)?;

  store.submit([req(&m, 1, 3, 0, None, 0), req(&m, 2, 5, 0, None, 0)]);
  for r in sink.wait(2) {
    assert_eq!(r.state(), State::Failed);
    assert_eq!(r.code(), Code::ReadError);
  }
  assert_eq!(store.cached_blocks(), 0);
  OK
}

#[test]
fn test_compressed() -> Void {
  for codec in [Codec::Lz4, Codec::Zstd] {
    for threads in [0, 2] {
      let dir = tempfile::tempdir()?;
      let settings = WriterSettings {
        compression: codec,
        ..small_blocks()
      };
      let base = build(dir.path(), "z", ContainerSettings::new("z"), settings)?;
      let sink = Arc::new(Sink::default());
      let store = FileIoStore::compio(sink.clone(), &[Conf::DecompressThreads(threads)])?;
      let m = mount(&store, &base, None)?;

      store.submit([req(&m, 5, 5, 0, None, 0), req(&m, 3, 3, 700, Some(900), 0)]);
      let mut done = sink.wait(2);
      done.sort_by_key(|r| r.id());
      assert_eq!(done[0].result()?.data(), &data(3, 3000)[700..1600]);
      assert_eq!(done[1].result()?.data(), &data(5, 10_000)[..]);
    }
  }
  OK
}

#[test]
fn test_encrypted() -> Void {
  let dir = tempfile::tempdir()?;
  let key = AesKey::new(&[7u8; 32]);
  let container = ContainerSettings::new("enc").encrypt(Guid::new(9, 8, 7, 6), key.clone());
  let settings = WriterSettings {
    compression: Codec::Lz4,
    ..small_blocks()
  };
  let base = build(dir.path(), "enc", container, settings)?;
  let sink = Arc::new(Sink::default());
  let store = FileIoStore::compio(sink.clone(), &[])?;
  let m = mount(&store, &base, Some(key))?;

  store.submit(
    CHUNKS
      .iter()
      .map(|&(n, _)| req(&m, n, n, 0, None, 0))
      .collect::<Vec<_>>(),
  );
  for r in sink.wait(CHUNKS.len()) {
    let len = CHUNKS.iter().find(|c| c.0 == r.id()).unwrap().1;
    assert_eq!(r.result()?.data(), &data(r.id(), len)[..]);
  }
  OK
}

#[test]
fn test_signed_tamper_fails_one_block() -> Void {
  let dir = tempfile::tempdir()?;
  let container = ContainerSettings::new("signed").sign(Arc::new(KeyedSha1::new("k")));
  let base = build(dir.path(), "signed", container, small_blocks())?;
  let cas = partition_path(&base, 0);
  let mut bytes = std::fs::read(&cas)?;
  bytes[10] ^= 0xff;
  std::fs::write(&cas, bytes)?;

  let sink = Arc::new(Sink::default());
  let store = FileIoStore::compio(sink.clone(), &[])?;
  let m = mount(&store, &base, None)?;
  store.submit([req(&m, 1, 1, 0, None, 0), req(&m, 3, 3, 0, None, 0)]);
  let mut done = sink.wait(2);
  done.sort_by_key(|r| r.id());
  assert_eq!(done[0].code(), Code::SignatureError);
  assert_eq!(done[1].result()?.data(), &data(3, 3000)[..]);
  OK
}

#[test]
fn test_partitions_and_unmount() -> Void {
  let dir = tempfile::tempdir()?;
  let settings = WriterSettings {
    max_partition_size: 4096,
    ..small_blocks()
  };
  let base = build(dir.path(), "part", ContainerSettings::new("part"), settings)?;
  assert!(partition_path(&base, 1).exists());

  let sink = Arc::new(Sink::default());
  let store = FileIoStore::compio(sink.clone(), &[Conf::ReadBlockSize(4096)])?;
  let m = mount(&store, &base, None)?;
  assert!(m.toc().header.partition_count > 1);

  store.submit(
    CHUNKS
      .iter()
      .map(|&(n, _)| req(&m, n, n, 0, None, 0))
      .collect::<Vec<_>>(),
  );
  for r in sink.wait(CHUNKS.len()) {
    let len = CHUNKS.iter().find(|c| c.0 == r.id()).unwrap().1;
    assert_eq!(r.result()?.data(), &data(r.id(), len)[..]);
  }

  assert!(store.unmount(m.index()));
  assert!(!store.unmount(m.index()));
  assert_eq!(store.mounted(), 0);
  OK
}

#[test]
fn test_truncated_partition_is_corrupt() -> Void {
  let dir = tempfile::tempdir()?;
  let base = build(dir.path(), "short", ContainerSettings::new("short"), small_blocks())?;
  let cas = partition_path(&base, 0);
  let len = std::fs::metadata(&cas)?.len();
  std::fs::OpenOptions::new().write(true).open(&cas)?.set_len(len - 100)?;

  let sink = Arc::new(Sink::default());
  let store = FileIoStore::compio(sink.clone(), &[])?;
  let m = mount(&store, &base, None)?;
  store.submit([req(&m, 5, 5, 0, None, 0), req(&m, 1, 1, 0, None, 0)]);
  let mut done = sink.wait(2);
  done.sort_by_key(|r| r.id());
  assert_eq!(done[0].result()?.data(), &data(1, 4096)[..]);
  assert_eq!(done[1].code(), Code::CorruptToc);
  OK
}

#[test]
fn test_priority_orders_raw_reads() -> Void {
  let dir = tempfile::tempdir()?;
  let base = build(dir.path(), "prio", ContainerSettings::new("prio"), small_blocks())?;
  let sink = Arc::new(Sink::default());
  let gate = Gate::closed();
  let platform = StdPlatform {
    gate: Some(gate.clone()),
    ..Default::default()
  };
  let rbs = 4096;
  let store = FileIoStore::new(platform.clone(), sink.clone(), &[Conf::ReadBlockSize(rbs)])?;
  let m = mount(&store, &base, None)?;

  // Park the worker on the first chunk / 让工作线程停在第一个块上
  store.submit([req(&m, 1, 1, 0, Some(10), 0)]);
  wait_idle(&store);

  let low = req(&m, 2, 5, 4000, Some(10), 0);
  let late = req(&m, 3, 5, 8000, Some(10), 0);
  let high = req(&m, 4, 5, 9500, Some(10), 5);
  store.submit([low, late.clone(), high]);
  store.update_priority(&late, 10);
  gate.open();
  sink.wait(4);

  let rbs = rbs as u64;
  let offsets = platform.offsets.lock().unwrap().clone();
  let pos = |off: u64| offsets.iter().position(|&o| o == off).unwrap();
  assert!(pos(raw_of(&m, 5, 8000, rbs)) < pos(raw_of(&m, 5, 9500, rbs)));
  assert!(pos(raw_of(&m, 5, 9500, rbs)) < pos(raw_of(&m, 5, 4000, rbs)));
  assert_eq!(late.priority(), 10);
  OK
}

#[test]
fn test_submit_after_shutdown_is_cancelled() -> Void {
  let dir = tempfile::tempdir()?;
  let base = build(dir.path(), "closed", ContainerSettings::new("closed"), small_blocks())?;
  let sink = Arc::new(Sink::default());
  let store = FileIoStore::new(StdPlatform::default(), sink.clone(), &[])?;
  let m = mount(&store, &base, None)?;
  store.shutdown();
  store.shutdown();

  store.submit([req(&m, 1, 1, 0, None, 0)]);
  let done = sink.wait(1);
  assert_eq!(done[0].state(), State::Cancelled);
  assert_eq!(store.free_buffers(), store.conf().buffer_count);
  OK
}

#[test]
fn test_submit_racing_shutdown_always_completes() -> Void {
  let dir = tempfile::tempdir()?;
  let base = build(dir.path(), "race", ContainerSettings::new("race"), small_blocks())?;
  for round in 0..20u64 {
    let sink = Arc::new(Sink::default());
    let store = FileIoStore::new(StdPlatform::default(), sink.clone(), &[Conf::CacheBlocks(0)])?;
    let m = mount(&store, &base, None)?;
    let total = 64u64;
    std::thread::scope(|s| {
      s.spawn(|| {
        for i in 0..total {
          store.submit([req(&m, i, 5, 0, None, 0)]);
        }
      });
      std::thread::sleep(Duration::from_micros(50 * round));
      store.shutdown();
    });

    let done = sink.wait(total as usize);
    assert_eq!(done.len(), total as usize);
    for r in &done {
      assert!(
        matches!(r.state(), State::Completed | State::Cancelled),
        "request {} ended {:?}",
        r.id(),
        r.state()
      );
    }
    assert_eq!(store.queued(), 0);
  }
  OK
}
