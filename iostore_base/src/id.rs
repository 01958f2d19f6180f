//! Chunk and container identifiers
//! 块与容器标识

use std::fmt::{Debug, Display, Formatter, Result as FmtResult};

use crate::hash::name_hash;

/// Chunk content type, stored in the last byte of a chunk id
/// 块内容类型，存于块标识最后一个字节
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ChunkType {
  #[default]
  Invalid = 0,
  ExportBundleData = 1,
  BulkData = 2,
  OptionalBulkData = 3,
  MemoryMappedBulkData = 4,
  ScriptObjects = 5,
  ContainerHeader = 6,
  ExternalFile = 7,
  ShaderCodeLibrary = 8,
  ShaderCode = 9,
  PackageStoreEntry = 10,
  DerivedData = 11,
  EditorDerivedData = 12,
  PackageResource = 13,
}

impl ChunkType {
  #[inline]
  pub fn from_u8(v: u8) -> Option<Self> {
    Some(match v {
      0 => Self::Invalid,
      1 => Self::ExportBundleData,
      2 => Self::BulkData,
      3 => Self::OptionalBulkData,
      4 => Self::MemoryMappedBulkData,
      5 => Self::ScriptObjects,
      6 => Self::ContainerHeader,
      7 => Self::ExternalFile,
      8 => Self::ShaderCodeLibrary,
      9 => Self::ShaderCode,
      10 => Self::PackageStoreEntry,
      11 => Self::DerivedData,
      12 => Self::EditorDerivedData,
      13 => Self::PackageResource,
      _ => return None,
    })
  }
}

/// 12 byte chunk id: [id u64 LE][index u16 LE][0][type u8]
/// 12 字节块标识
///
/// Equality and hash are plain byte comparison, callers keep
/// (id, index, type) combinations unique.
/// 相等与哈希仅按字节比较，调用者需保证 (id, index, type) 组合唯一。
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct ChunkId([u8; ChunkId::SIZE]);

impl ChunkId {
  pub const SIZE: usize = 12;
  pub const INVALID: Self = Self([0; Self::SIZE]);

  #[inline]
  pub fn new(id: u64, index: u16, kind: ChunkType) -> Self {
    let mut b = [0u8; Self::SIZE];
    b[0..8].copy_from_slice(&id.to_le_bytes());
    b[8..10].copy_from_slice(&index.to_le_bytes());
    b[11] = kind as u8;
    Self(b)
  }

  /// Chunk id of a named resource / 按名称生成块标识
  #[inline]
  pub fn from_name(name: &str, index: u16, kind: ChunkType) -> Self {
    Self::new(name_hash(name), index, kind)
  }

  #[inline(always)]
  pub const fn from_bytes(b: [u8; Self::SIZE]) -> Self {
    Self(b)
  }

  #[inline(always)]
  pub const fn as_bytes(&self) -> &[u8; Self::SIZE] {
    &self.0
  }

  #[inline]
  pub fn id(&self) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&self.0[0..8]);
    u64::from_le_bytes(b)
  }

  #[inline]
  pub fn index(&self) -> u16 {
    u16::from_le_bytes([self.0[8], self.0[9]])
  }

  /// Raw type byte / 原始类型字节
  #[inline(always)]
  pub fn kind_u8(&self) -> u8 {
    self.0[11]
  }

  #[inline]
  pub fn kind(&self) -> Option<ChunkType> {
    ChunkType::from_u8(self.0[11])
  }

  #[inline]
  pub fn is_valid(&self) -> bool {
    *self != Self::INVALID
  }
}

impl Display for ChunkId {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.write_str(&hex::encode(self.0))
  }
}

impl Debug for ChunkId {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    write!(f, "ChunkId({self})")
  }
}

/// Container id, hash of the lower-cased container name
/// 容器标识，容器名小写后的哈希
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ContainerId(u64);

impl ContainerId {
  pub const INVALID: Self = Self(u64::MAX);

  /// # Panics
  /// If the name hashes to the invalid sentinel.
  /// 名称哈希等于无效哨兵值时 panic。
  pub fn from_name(name: &str) -> Self {
    let hash = name_hash(name);
    assert!(
      hash != Self::INVALID.0,
      "container name {name:?} hashes to the invalid container id"
    );
    Self(hash)
  }

  #[inline(always)]
  pub const fn from_u64(v: u64) -> Self {
    Self(v)
  }

  #[inline(always)]
  pub const fn value(self) -> u64 {
    self.0
  }

  #[inline(always)]
  pub fn is_valid(self) -> bool {
    self != Self::INVALID
  }
}

impl Default for ContainerId {
  fn default() -> Self {
    Self::INVALID
  }
}

impl Display for ContainerId {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    write!(f, "{:016x}", self.0)
  }
}

impl Debug for ContainerId {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    write!(f, "ContainerId({self})")
  }
}

/// 128-bit guid, four little-endian u32 on disk
/// 128 位 GUID，磁盘上为 4 个小端 u32
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Guid {
  pub a: u32,
  pub b: u32,
  pub c: u32,
  pub d: u32,
}

impl Guid {
  pub const SIZE: usize = 16;

  #[inline(always)]
  pub const fn new(a: u32, b: u32, c: u32, d: u32) -> Self {
    Self { a, b, c, d }
  }

  #[inline]
  pub fn is_valid(&self) -> bool {
    (self.a | self.b | self.c | self.d) != 0
  }

  pub fn to_bytes(&self) -> [u8; Self::SIZE] {
    let mut b = [0u8; Self::SIZE];
    b[0..4].copy_from_slice(&self.a.to_le_bytes());
    b[4..8].copy_from_slice(&self.b.to_le_bytes());
    b[8..12].copy_from_slice(&self.c.to_le_bytes());
    b[12..16].copy_from_slice(&self.d.to_le_bytes());
    b
  }

  pub fn from_bytes(b: &[u8; Self::SIZE]) -> Self {
    let word = |i: usize| u32::from_le_bytes([b[i], b[i + 1], b[i + 2], b[i + 3]]);
    Self {
      a: word(0),
      b: word(4),
      c: word(8),
      d: word(12),
    }
  }
}

impl Display for Guid {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    write!(f, "{:08X}{:08X}{:08X}{:08X}", self.a, self.b, self.c, self.d)
  }
}
