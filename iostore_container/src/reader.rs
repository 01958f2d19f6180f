//! Synchronous container reader / 同步容器读取

use std::{
  collections::HashMap,
  fs::File,
  io::{Read, Seek, SeekFrom},
  path::Path,
};

use iostore_base::{AesKey, ChunkId, Code, ContainerId, Error, Result};
use iostore_dir::DirIndexReader;
use iostore_toc::{ChunkInfo, Signer, TocReadOptions, TocResource};
use log::debug;
use parking_lot::Mutex;

use crate::{partition_path, toc_path};

pub struct IoStoreReader {
  toc: TocResource,
  map: HashMap<ChunkId, u32>,
  key: Option<AesKey>,
  partitions: Vec<Mutex<File>>,
  dir: DirIndexReader,
}

impl IoStoreReader {
  pub fn open(base: impl AsRef<Path>, key: Option<AesKey>) -> Result<Self> {
    let base = base.as_ref();
    let toc = TocResource::read(toc_path(base), TocReadOptions::READ_ALL, key.as_ref())?;
    if toc.is_encrypted() && key.is_none() {
      return Err(Error::new(
        Code::InvalidEncryptionKey,
        format!("{} is encrypted", base.display()),
      ));
    }
    let map = toc.chunk_map()?;
    let partitions = (0..toc.header.partition_count)
      .map(|i| {
        File::open(partition_path(base, i))
          .map(Mutex::new)
          .map_err(Error::open)
      })
      .collect::<Result<Vec<_>>>()?;
    let dir = if toc.directory_index.is_empty() {
      DirIndexReader::default()
    } else {
      DirIndexReader::open(&toc.directory_index)?
    };
    debug!(
      "open {}: {} chunks",
      base.display(),
      toc.chunk_ids.len()
    );
    Ok(Self {
      toc,
      map,
      key,
      partitions,
      dir,
    })
  }

  #[inline]
  pub fn container_id(&self) -> ContainerId {
    self.toc.header.container_id
  }

  #[inline]
  pub fn toc(&self) -> &TocResource {
    &self.toc
  }

  #[inline]
  pub fn chunk_ids(&self) -> &[ChunkId] {
    &self.toc.chunk_ids
  }

  pub fn chunk_info(&self, id: &ChunkId) -> Option<ChunkInfo> {
    self
      .map
      .get(id)
      .and_then(|&i| self.toc.chunk_info(i as usize))
  }

  /// Check TOC and block signatures / 校验 TOC 与块签名
  pub fn verify(&self, signer: &dyn Signer) -> Result<()> {
    self.toc.verify_signatures(signer)
  }

  /// All `(path, toc index)` of the directory index / 目录索引中所有（路径，TOC 索引）
  pub fn files(&self) -> Vec<(String, u32)> {
    self.dir.files()
  }

  #[inline]
  pub fn directory_index(&self) -> &DirIndexReader {
    &self.dir
  }

  fn read_raw(&self, partition: u32, offset: u64, buf: &mut [u8]) -> Result<()> {
    let file = self
      .partitions
      .get(partition as usize)
      .ok_or_else(|| Error::corrupt_toc(format!("partition {partition} missing")))?;
    let mut file = file.lock();
    file.seek(SeekFrom::Start(offset)).map_err(Error::read)?;
    file.read_exact(buf).map_err(Error::read)
  }

  /// Read `size` bytes (to the end when `None`) from `offset` of a chunk
  /// 从块的 `offset` 处读取 `size` 字节（`None` 表示读到末尾）
  pub fn read(&self, id: &ChunkId, offset: u64, size: Option<u64>) -> Result<Vec<u8>> {
    let info = self
      .chunk_info(id)
      .ok_or_else(|| Error::new(Code::UnknownChunkId, format!("{id}")))?;
    if offset > info.size {
      return Err(Error::invalid_param(format!(
        "offset {offset} past chunk size {}",
        info.size
      )));
    }
    let len = size.map_or(info.size - offset, |s| s.min(info.size - offset));
    let start = info.offset + offset;
    let end = start + len;
    let bs = self.toc.header.compression_block_size as u64;

    let mut out = Vec::with_capacity(len as usize);
    let mut block = Vec::new();
    for b in self.toc.block_range(start, len) {
      let entry = self.toc.compression_blocks[b];
      let mut raw = vec![0u8; self.toc.stored_size(&entry) as usize];
      let (partition, at) = self.toc.partition_of(entry.offset());
      self.read_raw(partition, at, &mut raw)?;

      block.resize(entry.uncompressed_size() as usize, 0);
      self
        .toc
        .decode_block(b, &mut raw, self.key.as_ref(), &mut block)?;

      let block_start = b as u64 * bs;
      let from = start.max(block_start);
      let to = end.min(block_start + bs);
      if to > block_start + block.len() as u64 {
        return Err(Error::corrupt_toc(format!("block {b} is short")));
      }
      let (from, to) = ((from - block_start) as usize, (to - block_start) as usize);
      out.extend_from_slice(&block[from..to]);
    }
    Ok(out)
  }
}
