//! Mounted containers and their partition files
//! 已挂载容器及其分区文件

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
  },
};

use iostore_base::{AesKey, ContainerId, Error, Result};
use iostore_container::partition_path;
use iostore_toc::TocResource;
use parking_lot::RwLock;

/// A container registered with the engine / 注册到引擎的容器
#[derive(Debug)]
pub struct Mounted {
  index: u32,
  toc: Arc<TocResource>,
  key: Option<AesKey>,
  first_file: u32,
  file_sizes: Vec<u64>,
}

impl Mounted {
  /// Engine wide mount index / 引擎内唯一的挂载序号
  #[inline(always)]
  pub fn index(&self) -> u32 {
    self.index
  }

  #[inline(always)]
  pub fn container_id(&self) -> ContainerId {
    self.toc.header.container_id
  }

  #[inline(always)]
  pub fn toc(&self) -> &TocResource {
    &self.toc
  }

  #[inline(always)]
  pub fn key(&self) -> Option<&AesKey> {
    self.key.as_ref()
  }

  /// Global file index and size of a partition / 分区的全局文件索引与大小
  #[inline]
  pub(crate) fn file(&self, partition: u32) -> Option<(u32, u64)> {
    self
      .file_sizes
      .get(partition as usize)
      .map(|&size| (self.first_file + partition, size))
  }

  #[inline]
  pub(crate) fn files(&self) -> std::ops::Range<u32> {
    self.first_file..self.first_file + self.file_sizes.len() as u32
  }
}

#[derive(Default)]
pub(crate) struct Registry {
  paths: RwLock<HashMap<u32, PathBuf>>,
  mounts: RwLock<HashMap<u32, Arc<Mounted>>>,
  next_file: AtomicU32,
  next_mount: AtomicU32,
}

impl Registry {
  /// Stat every partition and assign global file indices
  /// 检查每个分区并分配全局文件索引
  pub fn mount(
    &self,
    base: &Path,
    toc: Arc<TocResource>,
    key: Option<AesKey>,
  ) -> Result<Arc<Mounted>> {
    let count = toc.header.partition_count.max(1);
    let mut paths = Vec::with_capacity(count as usize);
    let mut file_sizes = Vec::with_capacity(count as usize);
    for i in 0..count {
      let path = partition_path(base, i);
      let meta = std::fs::metadata(&path).map_err(Error::open)?;
      file_sizes.push(meta.len());
      paths.push(path);
    }

    let first_file = self.next_file.fetch_add(count, Ordering::Relaxed);
    let mounted = Arc::new(Mounted {
      index: self.next_mount.fetch_add(1, Ordering::Relaxed),
      toc,
      key,
      first_file,
      file_sizes,
    });
    {
      let mut map = self.paths.write();
      for (i, path) in paths.into_iter().enumerate() {
        map.insert(first_file + i as u32, path);
      }
    }
    self.mounts.write().insert(mounted.index, mounted.clone());
    Ok(mounted)
  }

  pub fn unmount(&self, index: u32) -> Option<Arc<Mounted>> {
    let mounted = self.mounts.write().remove(&index)?;
    let mut map = self.paths.write();
    for f in mounted.files() {
      map.remove(&f);
    }
    Some(mounted)
  }

  #[inline]
  pub fn path(&self, file: u32) -> Option<PathBuf> {
    self.paths.read().get(&file).cloned()
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.mounts.read().len()
  }
}
