//! Bit-packed TOC entries
//! 位打包的 TOC 条目
//!
//! Fields are written byte by byte, never through language bit-fields.
//! `OffsetAndLength` stores two 40-bit big-endian integers,
//! `CompressedBlockEntry` stores a 40-bit offset and two 24-bit sizes
//! little-endian followed by the method index.
//! 字段逐字节写入。`OffsetAndLength` 为两个 40 位大端整数，
//! `CompressedBlockEntry` 为小端 40 位偏移、两个 24 位大小和方法索引。

use std::fmt::{Debug, Formatter, Result as FmtResult};

use iostore_base::{Error, Result};

use crate::{BLOCK_ENTRY_SIZE, MAX_24, MAX_40, OFFSET_LEN_SIZE};

#[inline]
fn check_40(v: u64, what: &str) -> Result<()> {
  if v > MAX_40 {
    return Err(Error::invalid_param(format!("{what} {v} exceeds 40 bits")));
  }
  Ok(())
}

#[inline]
fn check_24(v: u32, what: &str) -> Result<()> {
  if v > MAX_24 {
    return Err(Error::invalid_param(format!("{what} {v} exceeds 24 bits")));
  }
  Ok(())
}

/// Chunk offset (uncompressed space) and length
/// 块偏移（未压缩空间）与长度
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct OffsetAndLength([u8; OFFSET_LEN_SIZE]);

impl OffsetAndLength {
  pub fn new(offset: u64, length: u64) -> Result<Self> {
    let mut v = Self::default();
    v.set_offset(offset)?;
    v.set_length(length)?;
    Ok(v)
  }

  #[inline(always)]
  pub const fn from_bytes(b: [u8; OFFSET_LEN_SIZE]) -> Self {
    Self(b)
  }

  #[inline(always)]
  pub const fn as_bytes(&self) -> &[u8; OFFSET_LEN_SIZE] {
    &self.0
  }

  #[inline]
  pub fn offset(&self) -> u64 {
    let d = &self.0;
    u64::from_be_bytes([0, 0, 0, d[0], d[1], d[2], d[3], d[4]])
  }

  #[inline]
  pub fn length(&self) -> u64 {
    let d = &self.0;
    u64::from_be_bytes([0, 0, 0, d[5], d[6], d[7], d[8], d[9]])
  }

  pub fn set_offset(&mut self, offset: u64) -> Result<()> {
    check_40(offset, "offset")?;
    self.0[0..5].copy_from_slice(&offset.to_be_bytes()[3..]);
    Ok(())
  }

  pub fn set_length(&mut self, length: u64) -> Result<()> {
    check_40(length, "length")?;
    self.0[5..10].copy_from_slice(&length.to_be_bytes()[3..]);
    Ok(())
  }
}

impl Debug for OffsetAndLength {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("OffsetAndLength")
      .field("offset", &self.offset())
      .field("length", &self.length())
      .finish()
  }
}

/// One compression block / 单个压缩块
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct CompressedBlockEntry([u8; BLOCK_ENTRY_SIZE]);

impl CompressedBlockEntry {
  /// `method` 0 is uncompressed, otherwise it selects method name `method - 1`
  /// `method` 为 0 表示未压缩，否则对应第 `method - 1` 个方法名
  pub fn new(offset: u64, compressed_size: u32, uncompressed_size: u32, method: u8) -> Result<Self> {
    let mut v = Self::default();
    v.set_offset(offset)?;
    v.set_compressed_size(compressed_size)?;
    v.set_uncompressed_size(uncompressed_size)?;
    v.set_method(method);
    Ok(v)
  }

  #[inline(always)]
  pub const fn from_bytes(b: [u8; BLOCK_ENTRY_SIZE]) -> Self {
    Self(b)
  }

  #[inline(always)]
  pub const fn as_bytes(&self) -> &[u8; BLOCK_ENTRY_SIZE] {
    &self.0
  }

  /// Raw offset across all partitions / 跨分区的原始偏移
  #[inline]
  pub fn offset(&self) -> u64 {
    let d = &self.0;
    u64::from_le_bytes([d[0], d[1], d[2], d[3], d[4], 0, 0, 0])
  }

  #[inline]
  pub fn compressed_size(&self) -> u32 {
    let d = &self.0;
    u32::from_le_bytes([d[5], d[6], d[7], 0])
  }

  #[inline]
  pub fn uncompressed_size(&self) -> u32 {
    let d = &self.0;
    u32::from_le_bytes([d[8], d[9], d[10], 0])
  }

  #[inline(always)]
  pub fn method(&self) -> u8 {
    self.0[11]
  }

  pub fn set_offset(&mut self, offset: u64) -> Result<()> {
    check_40(offset, "block offset")?;
    self.0[0..5].copy_from_slice(&offset.to_le_bytes()[0..5]);
    Ok(())
  }

  pub fn set_compressed_size(&mut self, size: u32) -> Result<()> {
    check_24(size, "compressed size")?;
    self.0[5..8].copy_from_slice(&size.to_le_bytes()[0..3]);
    Ok(())
  }

  pub fn set_uncompressed_size(&mut self, size: u32) -> Result<()> {
    check_24(size, "uncompressed size")?;
    self.0[8..11].copy_from_slice(&size.to_le_bytes()[0..3]);
    Ok(())
  }

  #[inline(always)]
  pub fn set_method(&mut self, method: u8) {
    self.0[11] = method;
  }
}

impl Debug for CompressedBlockEntry {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("CompressedBlockEntry")
      .field("offset", &self.offset())
      .field("compressed_size", &self.compressed_size())
      .field("uncompressed_size", &self.uncompressed_size())
      .field("method", &self.method())
      .finish()
  }
}
