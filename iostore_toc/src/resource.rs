//! TOC resource read / write
//! TOC 资源读写
//!
//! Section order: header, chunk ids, offsets, perfect hash seeds, chunks
//! without perfect hash, compressed blocks, method names, signatures (signed
//! only), chunk meta, directory index.
//! 段顺序：头、块标识、偏移、完美哈希种子、无完美哈希块、压缩块、方法名、
//! 签名（仅签名容器）、块元数据、目录索引。

use std::{collections::HashMap, ops::Range, path::Path};

use iostore_base::{
  AES_BLOCK, AesKey, ChunkId, Code, Error, Result, SHA1_SIZE, aes::pad_repeat, align_up, sha1,
};
use iostore_compress::Codec;
use log::{debug, warn};

use crate::{
  BLOCK_ENTRY_SIZE, BlockHash, CHUNK_ID_SIZE, CompressedBlockEntry, ContainerFlags,
  ContainerSettings, HEADER_SIZE, METHOD_NAME_LEN, MetaFlags, OFFSET_LEN_SIZE, OffsetAndLength,
  Signer, TocHeader, TocReadOptions, TocSignatures, TocVersion, WriterSettings,
  block_hashes_digest,
};

/// Per chunk hash and flags / 单块哈希与标志
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TocMeta {
  pub hash: [u8; 32],
  pub flags: MetaFlags,
}

impl TocMeta {
  /// Meta from a SHA-1 of the chunk data / 由块数据 SHA-1 构造
  pub fn new(data_hash: &[u8; SHA1_SIZE], flags: MetaFlags) -> Self {
    let mut hash = [0u8; 32];
    hash[..SHA1_SIZE].copy_from_slice(data_hash);
    Self { hash, flags }
  }
}

/// Resolved placement of one chunk / 单块的定位信息
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkInfo {
  pub id: ChunkId,
  pub index: u32,
  pub offset: u64,
  pub size: u64,
  pub compressed_size: u64,
  pub first_block: u32,
  pub block_count: u32,
  pub partition_index: u32,
  pub flags: MetaFlags,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TocResource {
  pub header: TocHeader,
  pub chunk_ids: Vec<ChunkId>,
  pub chunk_offset_lengths: Vec<OffsetAndLength>,
  pub chunk_perfect_hash_seeds: Vec<i32>,
  pub chunk_indices_without_perfect_hash: Vec<i32>,
  pub compression_blocks: Vec<CompressedBlockEntry>,
  /// Method `i + 1` of block entries, method 0 is uncompressed
  /// 块条目方法 `i + 1`，方法 0 为未压缩
  pub compression_methods: Vec<Codec>,
  pub signatures: Option<TocSignatures>,
  /// Decrypted directory index / 解密后的目录索引
  pub directory_index: Vec<u8>,
  pub chunk_metas: Vec<TocMeta>,
}

struct Cursor<'a> {
  buf: &'a [u8],
  pos: usize,
}

impl<'a> Cursor<'a> {
  fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
    match self.pos.checked_add(n) {
      Some(end) if end <= self.buf.len() => {
        let s = &self.buf[self.pos..end];
        self.pos = end;
        Ok(s)
      }
      _ => Err(Error::corrupt_toc(format!(
        "{what}: {n} bytes at {} past end {}",
        self.pos,
        self.buf.len()
      ))),
    }
  }

  fn array(&mut self, count: u32, size: usize, what: &str) -> Result<&'a [u8]> {
    let n = (count as usize)
      .checked_mul(size)
      .ok_or_else(|| Error::corrupt_toc(format!("{what}: count {count} overflows")))?;
    self.take(n, what)
  }

  fn u32(&mut self, what: &str) -> Result<u32> {
    let b = self.take(4, what)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
  }
}

fn i32s(raw: &[u8]) -> Vec<i32> {
  raw
    .chunks_exact(4)
    .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
    .collect()
}

fn blocks_bytes(blocks: &[CompressedBlockEntry]) -> Vec<u8> {
  blocks.iter().flat_map(|b| b.as_bytes()).copied().collect()
}

impl TocResource {
  /// Read and validate a TOC file / 读取并校验 TOC 文件
  pub fn read(
    path: impl AsRef<Path>,
    options: TocReadOptions,
    key: Option<&AesKey>,
  ) -> Result<Self> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(Error::open)?;
    let toc = Self::decode(&data, options, key)?;
    debug!(
      "toc {}: {} chunks, {} blocks, {} partitions",
      path.display(),
      toc.chunk_ids.len(),
      toc.compression_blocks.len(),
      toc.header.partition_count
    );
    Ok(toc)
  }

  pub fn decode(data: &[u8], options: TocReadOptions, key: Option<&AesKey>) -> Result<Self> {
    let header = TocHeader::decode(data)?;
    let flags = header.container_flags;
    let mut cur = Cursor {
      buf: data,
      pos: HEADER_SIZE,
    };

    let chunk_ids = cur
      .array(header.entry_count, CHUNK_ID_SIZE, "chunk ids")?
      .chunks_exact(CHUNK_ID_SIZE)
      .map(|c| {
        let mut b = [0u8; CHUNK_ID_SIZE];
        b.copy_from_slice(c);
        ChunkId::from_bytes(b)
      })
      .collect();

    let chunk_offset_lengths = cur
      .array(header.entry_count, OFFSET_LEN_SIZE, "chunk offsets")?
      .chunks_exact(OFFSET_LEN_SIZE)
      .map(|c| {
        let mut b = [0u8; OFFSET_LEN_SIZE];
        b.copy_from_slice(c);
        OffsetAndLength::from_bytes(b)
      })
      .collect();

    let chunk_perfect_hash_seeds =
      i32s(cur.array(header.perfect_hash_seeds_count, 4, "perfect hash seeds")?);
    let chunk_indices_without_perfect_hash = i32s(cur.array(
      header.chunks_without_perfect_hash_count,
      4,
      "chunks without perfect hash",
    )?);

    let compression_blocks: Vec<CompressedBlockEntry> = cur
      .array(
        header.compressed_block_entry_count,
        BLOCK_ENTRY_SIZE,
        "compressed blocks",
      )?
      .chunks_exact(BLOCK_ENTRY_SIZE)
      .map(|c| {
        let mut b = [0u8; BLOCK_ENTRY_SIZE];
        b.copy_from_slice(c);
        CompressedBlockEntry::from_bytes(b)
      })
      .collect();

    let names = cur.array(
      header.compression_method_name_count,
      header.compression_method_name_length as usize,
      "compression methods",
    )?;
    let mut compression_methods = Vec::with_capacity(header.compression_method_name_count as usize);
    if !names.is_empty() {
      for raw in names.chunks_exact(header.compression_method_name_length as usize) {
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let name = std::str::from_utf8(&raw[..end])
          .map_err(|_| Error::corrupt_toc("method name is not utf-8"))?;
        compression_methods.push(Codec::from_name(name)?);
      }
    }

    let signatures = if flags.contains(ContainerFlags::SIGNED) {
      let size = cur.u32("signature size")? as usize;
      let toc_signature = cur.take(size, "toc signature")?.to_vec();
      let block_signature = cur.take(size, "block signature")?.to_vec();
      let block_hashes = cur
        .array(
          header.compressed_block_entry_count,
          SHA1_SIZE,
          "block hashes",
        )?
        .chunks_exact(SHA1_SIZE)
        .map(|c| {
          let mut h: BlockHash = [0; SHA1_SIZE];
          h.copy_from_slice(c);
          h
        })
        .collect();
      Some(TocSignatures {
        toc_signature,
        block_signature,
        block_hashes,
      })
    } else {
      None
    };

    let meta_size = header.version.meta_size();
    let meta_raw = cur.array(header.entry_count, meta_size, "chunk meta")?;
    let mut chunk_metas = Vec::new();
    if options.contains(TocReadOptions::READ_TOC_META) {
      let hash_len = if meta_size == 24 { SHA1_SIZE } else { 32 };
      chunk_metas = meta_raw
        .chunks_exact(meta_size)
        .map(|c| {
          let mut hash = [0u8; 32];
          hash[..hash_len].copy_from_slice(&c[..hash_len]);
          TocMeta {
            hash,
            flags: MetaFlags::from_bits_retain(c[hash_len]),
          }
        })
        .collect();
    }

    let encrypted = flags.contains(ContainerFlags::ENCRYPTED);
    let dir_size = header.directory_index_size as usize;
    let stored = if encrypted {
      align_up(dir_size as u64, AES_BLOCK as u64) as usize
    } else {
      dir_size
    };
    let dir_raw = cur.take(stored, "directory index")?;
    let mut directory_index = Vec::new();
    if options.contains(TocReadOptions::READ_DIRECTORY_INDEX) && dir_size > 0 {
      directory_index = dir_raw.to_vec();
      if encrypted {
        let key = key.ok_or_else(|| {
          Error::new(
            Code::InvalidEncryptionKey,
            "encrypted directory index without key",
          )
        })?;
        key.decrypt(&mut directory_index);
        directory_index.truncate(dir_size);
      }
    }

    let toc = Self {
      header,
      chunk_ids,
      chunk_offset_lengths,
      chunk_perfect_hash_seeds,
      chunk_indices_without_perfect_hash,
      compression_blocks,
      compression_methods,
      signatures,
      directory_index,
      chunk_metas,
    };
    toc.validate()?;
    Ok(toc)
  }

  /// Every chunk maps into the block array, every block names a known method
  /// 每个块都落在块数组内，每个压缩块的方法都已知
  fn validate(&self) -> Result<()> {
    let blocks = self.compression_blocks.len();
    for (i, ol) in self.chunk_offset_lengths.iter().enumerate() {
      let range = self.block_range(ol.offset(), ol.length());
      if range.end > blocks {
        return Err(Error::corrupt_toc(format!(
          "chunk {i} needs block {} of {blocks}",
          range.end - 1
        )));
      }
    }
    let methods = self.compression_methods.len();
    if let Some(b) = self
      .compression_blocks
      .iter()
      .find(|b| b.method() as usize > methods)
    {
      return Err(Error::corrupt_toc(format!(
        "block method {} of {methods}",
        b.method()
      )));
    }
    Ok(())
  }

  /// Write to `path`, returns bytes written / 写入 `path`，返回写入字节数
  pub fn write(
    &self,
    path: impl AsRef<Path>,
    container: &ContainerSettings,
    writer: &WriterSettings,
  ) -> Result<u64> {
    let buf = self.encode(container, writer)?;
    std::fs::write(path, &buf).map_err(Error::write)?;
    Ok(buf.len() as u64)
  }

  pub fn encode(&self, container: &ContainerSettings, writer: &WriterSettings) -> Result<Vec<u8>> {
    let n = self.chunk_ids.len();
    if self.chunk_offset_lengths.len() != n || self.chunk_metas.len() != n {
      return Err(Error::invalid_param(format!(
        "parallel arrays differ: {n} ids, {} offsets, {} metas",
        self.chunk_offset_lengths.len(),
        self.chunk_metas.len()
      )));
    }
    if self.compression_methods.len() > u8::MAX as usize {
      return Err(Error::invalid_param("too many compression methods"));
    }
    if writer.compression_block_size == 0 {
      return Err(Error::invalid_param("zero compression block size"));
    }
    if writer.max_partition_size == 0 {
      return Err(Error::invalid_param("zero partition size"));
    }

    let mut flags = container.flags;
    if !self.directory_index.is_empty() {
      flags |= ContainerFlags::INDEXED;
    }
    if self.compression_blocks.iter().any(|b| b.method() != 0) {
      flags |= ContainerFlags::COMPRESSED;
    }
    let key = if flags.contains(ContainerFlags::ENCRYPTED) {
      Some(container.encryption_key.as_ref().ok_or_else(|| {
        Error::new(Code::InvalidEncryptionKey, "encrypted container without key")
      })?)
    } else {
      None
    };

    let header = TocHeader {
      entry_count: n as u32,
      compressed_block_entry_count: self.compression_blocks.len() as u32,
      compression_method_name_count: self.compression_methods.len() as u32,
      compression_block_size: writer.compression_block_size,
      directory_index_size: self.directory_index.len() as u32,
      partition_count: self.header.partition_count.max(1),
      container_id: container.container_id,
      encryption_key_guid: container.encryption_key_guid,
      container_flags: flags,
      perfect_hash_seeds_count: self.chunk_perfect_hash_seeds.len() as u32,
      partition_size: writer.max_partition_size,
      chunks_without_perfect_hash_count: self.chunk_indices_without_perfect_hash.len() as u32,
      ..TocHeader::latest()
    };

    let mut buf = Vec::with_capacity(HEADER_SIZE + n * 64);
    buf.extend_from_slice(&header.encode());
    for id in &self.chunk_ids {
      buf.extend_from_slice(id.as_bytes());
    }
    for ol in &self.chunk_offset_lengths {
      buf.extend_from_slice(ol.as_bytes());
    }
    for v in self
      .chunk_perfect_hash_seeds
      .iter()
      .chain(&self.chunk_indices_without_perfect_hash)
    {
      buf.extend_from_slice(&v.to_le_bytes());
    }
    let blocks = blocks_bytes(&self.compression_blocks);
    buf.extend_from_slice(&blocks);
    for codec in &self.compression_methods {
      let mut name = [0u8; METHOD_NAME_LEN];
      let raw = codec.name().as_bytes();
      name[..raw.len()].copy_from_slice(raw);
      buf.extend_from_slice(&name);
    }

    if flags.contains(ContainerFlags::SIGNED) {
      let signer = container
        .signer
        .as_ref()
        .ok_or_else(|| Error::invalid_param("signed container without signer"))?;
      let sigs = self
        .signatures
        .as_ref()
        .ok_or_else(|| Error::invalid_param("signed container without block hashes"))?;
      if sigs.block_hashes.len() != self.compression_blocks.len() {
        return Err(Error::invalid_param(format!(
          "{} block hashes for {} blocks",
          sigs.block_hashes.len(),
          self.compression_blocks.len()
        )));
      }
      let toc_signature = signer.sign(&sha1(&blocks));
      let block_signature = signer.sign(&block_hashes_digest(&sigs.block_hashes));
      if toc_signature.len() != block_signature.len() {
        return Err(Error::invalid_param("signer returned uneven signature sizes"));
      }
      buf.extend_from_slice(&(toc_signature.len() as u32).to_le_bytes());
      buf.extend_from_slice(&toc_signature);
      buf.extend_from_slice(&block_signature);
      buf.extend_from_slice(sigs.block_hashes.as_flattened());
    }

    for meta in &self.chunk_metas {
      buf.extend_from_slice(&meta.hash[..SHA1_SIZE]);
      buf.push(meta.flags.bits());
      buf.extend_from_slice(&[0; 3]);
    }

    match key {
      Some(key) if !self.directory_index.is_empty() => {
        let mut dir = self.directory_index.clone();
        pad_repeat(&mut dir, AES_BLOCK);
        key.encrypt(&mut dir);
        buf.extend_from_slice(&dir);
      }
      _ => buf.extend_from_slice(&self.directory_index),
    }
    Ok(buf)
  }

  /// Check both signatures / 校验两个签名
  pub fn verify_signatures(&self, signer: &dyn Signer) -> Result<()> {
    let sigs = self
      .signatures
      .as_ref()
      .ok_or_else(|| Error::new(Code::SignatureError, "container is not signed"))?;
    if !signer.verify(
      &sha1(&blocks_bytes(&self.compression_blocks)),
      &sigs.toc_signature,
    ) {
      warn!("toc signature mismatch {}", self.header.container_id);
      return Err(Error::new(Code::SignatureError, "toc signature mismatch"));
    }
    if !signer.verify(
      &block_hashes_digest(&sigs.block_hashes),
      &sigs.block_signature,
    ) {
      warn!("block signature mismatch {}", self.header.container_id);
      return Err(Error::new(Code::SignatureError, "block signature mismatch"));
    }
    Ok(())
  }

  /// Chunk id to TOC index / 块标识到 TOC 索引
  pub fn chunk_map(&self) -> Result<HashMap<ChunkId, u32>> {
    let mut map = HashMap::with_capacity(self.chunk_ids.len());
    for (i, id) in self.chunk_ids.iter().enumerate() {
      if map.insert(*id, i as u32).is_some() {
        return Err(Error::corrupt_toc(format!("duplicate chunk id {id}")));
      }
    }
    Ok(map)
  }

  /// Blocks covering `[offset, offset + size)` of the uncompressed space
  /// 覆盖未压缩空间 `[offset, offset + size)` 的块
  pub fn block_range(&self, offset: u64, size: u64) -> Range<usize> {
    let bs = self.header.compression_block_size.max(1) as u64;
    let first = (offset / bs) as usize;
    if size == 0 {
      return first..first;
    }
    first..(offset + size).div_ceil(bs) as usize
  }

  /// Partition index and offset inside it / 分区索引与分区内偏移
  #[inline]
  pub fn partition_of(&self, raw_offset: u64) -> (u32, u64) {
    match self.header.partition_size {
      // Unset on a resource never encoded / 未编码的资源尚未设置
      0 => (0, raw_offset),
      size => ((raw_offset / size) as u32, raw_offset % size),
    }
  }

  #[inline]
  pub fn is_encrypted(&self) -> bool {
    self
      .header
      .container_flags
      .contains(ContainerFlags::ENCRYPTED)
  }

  #[inline]
  pub fn is_signed(&self) -> bool {
    self.header.container_flags.contains(ContainerFlags::SIGNED)
  }

  /// Codec of a block method index / 块方法索引对应的压缩算法
  #[inline]
  pub fn codec(&self, method: u8) -> Option<Codec> {
    match method {
      0 => Some(Codec::None),
      m => self.compression_methods.get(m as usize - 1).copied(),
    }
  }

  pub fn chunk_info(&self, index: usize) -> Option<ChunkInfo> {
    let id = *self.chunk_ids.get(index)?;
    let ol = self.chunk_offset_lengths.get(index)?;
    let range = self.block_range(ol.offset(), ol.length());
    let blocks = self.compression_blocks.get(range.clone())?;
    let compressed_size = blocks.iter().map(|b| b.compressed_size() as u64).sum();
    let partition_index = blocks
      .first()
      .map(|b| self.partition_of(b.offset()).0)
      .unwrap_or(0);
    Some(ChunkInfo {
      id,
      index: index as u32,
      offset: ol.offset(),
      size: ol.length(),
      compressed_size,
      first_block: range.start as u32,
      block_count: range.len() as u32,
      partition_index,
      flags: self
        .chunk_metas
        .get(index)
        .map(|m| m.flags)
        .unwrap_or_default(),
    })
  }

  /// Format version / 格式版本
  #[inline(always)]
  pub fn version(&self) -> TocVersion {
    self.header.version
  }
}
