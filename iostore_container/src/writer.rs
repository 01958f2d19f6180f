//! Container builder / 容器构建

use std::{
  collections::HashSet,
  fs::File,
  io::{BufWriter, Write},
  path::PathBuf,
};

use iostore_base::{
  AES_BLOCK, ChunkId, Code, ContainerId, Error, Result, aes::pad_repeat, align_up, sha1,
};
use iostore_compress::Codec;
use iostore_dir::{DirIndexWriter, common_mount_point};
use iostore_toc::{
  BlockHash, CompressedBlockEntry, ContainerSettings, MAX_24, MetaFlags, OffsetAndLength,
  TocMeta, TocResource, TocSignatures, WriterSettings,
};
use log::{debug, info};

use crate::{partition_path, toc_path};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriterResult {
  pub container_id: ContainerId,
  pub toc_size: u64,
  pub partition_sizes: Vec<u64>,
  pub entry_count: u32,
  pub uncompressed_size: u64,
  /// Bytes written to partitions / 写入分区的字节数
  pub compressed_size: u64,
}

/// A written block not yet in the TOC / 已写入但尚未进入 TOC 的块
struct Staged {
  entry: CompressedBlockEntry,
  hash: Option<BlockHash>,
  stored: u64,
}

pub struct IoStoreWriter {
  base: PathBuf,
  container: ContainerSettings,
  settings: WriterSettings,
  toc: TocResource,
  hashes: Vec<BlockHash>,
  ids: HashSet<ChunkId>,
  files: Vec<(String, u32)>,
  out: BufWriter<File>,
  partitions: Vec<u64>,
  next_offset: u64,
  compressed: bool,
  uncompressed_size: u64,
  compressed_size: u64,
}

fn create(path: PathBuf) -> Result<BufWriter<File>> {
  File::create(&path)
    .map(BufWriter::new)
    .map_err(|e| Error::new(Code::FileOpenFailed, format!("{}: {e}", path.display())))
}

impl IoStoreWriter {
  pub fn new(
    base: impl Into<PathBuf>,
    container: ContainerSettings,
    settings: WriterSettings,
  ) -> Result<Self> {
    let base = base.into();
    let bs = settings.compression_block_size;
    if bs == 0 || bs > MAX_24 {
      return Err(Error::invalid_param(format!("compression block size {bs}")));
    }
    if settings.max_partition_size == 0 {
      return Err(Error::invalid_param("zero partition size"));
    }
    if container.is_encrypted() && container.encryption_key.is_none() {
      return Err(Error::new(
        Code::InvalidEncryptionKey,
        "encrypted container without key",
      ));
    }
    if container.is_signed() && container.signer.is_none() {
      return Err(Error::invalid_param("signed container without signer"));
    }
    let out = create(partition_path(&base, 0))?;
    Ok(Self {
      base,
      container,
      settings,
      toc: TocResource::default(),
      hashes: Vec::new(),
      ids: HashSet::new(),
      files: Vec::new(),
      out,
      partitions: vec![0],
      next_offset: 0,
      compressed: false,
      uncompressed_size: 0,
      compressed_size: 0,
    })
  }

  /// Append a chunk, optionally named in the directory index. On error
  /// nothing of the chunk enters the TOC; bytes already written stay as
  /// unreferenced padding in the partition.
  /// 追加一个块，可选地在目录索引中命名。出错时该块不进入 TOC，
  /// 已写入的字节作为未引用的填充留在分区中。
  pub fn append(&mut self, id: ChunkId, data: &[u8], file_name: Option<&str>) -> Result<()> {
    if !id.is_valid() {
      return Err(Error::invalid_param("invalid chunk id"));
    }
    if self.ids.contains(&id) {
      return Err(Error::invalid_param(format!("duplicate chunk id {id}")));
    }
    let index = self.toc.chunk_ids.len() as u32;
    let bs = self.settings.compression_block_size as u64;
    let offset_len = OffsetAndLength::new(self.next_offset, data.len() as u64)?;

    let mut staged = Vec::with_capacity(data.len().div_ceil(bs as usize));
    for block in data.chunks(bs as usize) {
      staged.push(self.put_block(block)?);
    }

    let mut flags = MetaFlags::empty();
    for b in staged {
      if b.entry.method() != 0 {
        flags |= MetaFlags::COMPRESSED;
        self.compressed = true;
      }
      self.toc.compression_blocks.push(b.entry);
      if let Some(hash) = b.hash {
        self.hashes.push(hash);
      }
      self.uncompressed_size += b.entry.uncompressed_size() as u64;
      self.compressed_size += b.stored;
    }
    self.next_offset += align_up(data.len() as u64, bs);
    self.ids.insert(id);
    self.toc.chunk_ids.push(id);
    self.toc.chunk_offset_lengths.push(offset_len);
    self.toc.chunk_metas.push(TocMeta::new(&sha1(data), flags));
    if let Some(name) = file_name {
      self.files.push((name.to_owned(), index));
    }
    Ok(())
  }

  /// Compress, encrypt and write one block / 压缩、加密并写入一个块
  fn put_block(&mut self, raw: &[u8]) -> Result<Staged> {
    let (mut stored, method) = match self.settings.compression {
      Codec::None => (raw.to_vec(), 0),
      codec => {
        let c = iostore_compress::enc(codec, raw)?;
        if c.len() + self.settings.min_savings as usize <= raw.len() {
          (c, 1)
        } else {
          (raw.to_vec(), 0)
        }
      }
    };
    let compressed_size = stored.len() as u32;
    let key = self
      .container
      .encryption_key
      .as_ref()
      .filter(|_| self.container.is_encrypted());
    if let Some(key) = key {
      pad_repeat(&mut stored, AES_BLOCK);
      key.encrypt(&mut stored);
    }

    let at = self.place(stored.len() as u64)?;
    let entry = CompressedBlockEntry::new(at, compressed_size, raw.len() as u32, method)?;
    self.out.write_all(&stored).map_err(Error::write)?;
    if let Some(used) = self.partitions.last_mut() {
      *used += stored.len() as u64;
    }
    Ok(Staged {
      entry,
      hash: self.container.is_signed().then(|| sha1(&stored)),
      stored: stored.len() as u64,
    })
  }

  /// Raw offset of the next block, rolling to a new partition when full
  /// 下一块的原始偏移，分区已满时切换到新分区
  fn place(&mut self, len: u64) -> Result<u64> {
    let limit = self.settings.max_partition_size;
    if len > limit {
      return Err(Error::invalid_param(format!(
        "block of {len} bytes exceeds partition size {limit}"
      )));
    }
    let used = self.partitions.last().copied().unwrap_or(0);
    if used.saturating_add(len) > limit {
      self.out.flush().map_err(Error::write)?;
      let next = self.partitions.len() as u32;
      self.out = create(partition_path(&self.base, next))?;
      self.partitions.push(0);
      debug!("{}: partition {next}", self.base.display());
    }
    let index = self.partitions.len() as u64 - 1;
    let used = self.partitions.last().copied().unwrap_or(0);
    Ok(index * limit + used)
  }

  /// Write the TOC and close all partitions / 写入 TOC 并关闭所有分区
  pub fn finish(mut self) -> Result<WriterResult> {
    self.out.flush().map_err(Error::write)?;

    if !self.files.is_empty() {
      let mut dir = DirIndexWriter::new();
      dir.set_mount_point(common_mount_point(
        self.files.iter().map(|(p, _)| p.as_str()),
      ));
      for (path, index) in &self.files {
        dir.add_file(path, *index)?;
      }
      // TOC encoding encrypts it / 由 TOC 编码负责加密
      self.toc.directory_index = dir.flush(None);
    }
    if self.compressed {
      self.toc.compression_methods = vec![self.settings.compression];
    }
    if self.container.is_signed() {
      self.toc.signatures = Some(TocSignatures {
        block_hashes: std::mem::take(&mut self.hashes),
        ..Default::default()
      });
    }
    self.toc.header.partition_count = self.partitions.len() as u32;

    let toc_size = self
      .toc
      .write(toc_path(&self.base), &self.container, &self.settings)?;
    info!(
      "{}: {} chunks, {} partitions, {} -> {} bytes",
      self.base.display(),
      self.toc.chunk_ids.len(),
      self.partitions.len(),
      self.uncompressed_size,
      self.compressed_size
    );
    Ok(WriterResult {
      container_id: self.container.container_id,
      toc_size,
      partition_sizes: self.partitions,
      entry_count: self.toc.chunk_ids.len() as u32,
      uncompressed_size: self.uncompressed_size,
      compressed_size: self.compressed_size,
    })
  }
}
