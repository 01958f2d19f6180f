//! Fixed 144 byte TOC header
//! 定长 144 字节 TOC 头

use iostore_base::{ContainerId, Error, Guid, Result};

use crate::{
  BLOCK_ENTRY_SIZE, ContainerFlags, HEADER_SIZE, MAGIC, METHOD_NAME_LEN, NO_PARTITION_LIMIT,
};

/// TOC format version / TOC 格式版本
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum TocVersion {
  #[default]
  Invalid = 0,
  Initial = 1,
  DirectoryIndex = 2,
  PartitionSize = 3,
  PerfectHash = 4,
  PerfectHashWithOverflow = 5,
  OnDemandMetaData = 6,
  RemovedOnDemandMetaData = 7,
  ReplaceIoChunkHashWithIoHash = 8,
}

impl TocVersion {
  pub const LATEST: Self = Self::ReplaceIoChunkHashWithIoHash;

  pub fn from_u8(v: u8) -> Option<Self> {
    Some(match v {
      0 => Self::Invalid,
      1 => Self::Initial,
      2 => Self::DirectoryIndex,
      3 => Self::PartitionSize,
      4 => Self::PerfectHash,
      5 => Self::PerfectHashWithOverflow,
      6 => Self::OnDemandMetaData,
      7 => Self::RemovedOnDemandMetaData,
      8 => Self::ReplaceIoChunkHashWithIoHash,
      _ => return None,
    })
  }

  /// Bytes per meta entry / 每个元数据条目字节数
  #[inline]
  pub fn meta_size(self) -> usize {
    if self >= Self::ReplaceIoChunkHashWithIoHash {
      24
    } else {
      33
    }
  }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TocHeader {
  pub version: TocVersion,
  pub entry_count: u32,
  pub compressed_block_entry_count: u32,
  pub compressed_block_entry_size: u32,
  pub compression_method_name_count: u32,
  pub compression_method_name_length: u32,
  pub compression_block_size: u32,
  /// Unpadded size / 未填充大小
  pub directory_index_size: u32,
  pub partition_count: u32,
  pub container_id: ContainerId,
  pub encryption_key_guid: Guid,
  pub container_flags: ContainerFlags,
  pub perfect_hash_seeds_count: u32,
  pub partition_size: u64,
  pub chunks_without_perfect_hash_count: u32,
}

#[inline(always)]
fn u32_at(b: &[u8], at: usize) -> u32 {
  u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

#[inline(always)]
fn u64_at(b: &[u8], at: usize) -> u64 {
  let mut v = [0u8; 8];
  v.copy_from_slice(&b[at..at + 8]);
  u64::from_le_bytes(v)
}

impl TocHeader {
  pub fn encode(&self) -> [u8; HEADER_SIZE] {
    let mut b = [0u8; HEADER_SIZE];
    b[0..16].copy_from_slice(&MAGIC);
    b[16] = self.version as u8;
    b[20..24].copy_from_slice(&(HEADER_SIZE as u32).to_le_bytes());
    b[24..28].copy_from_slice(&self.entry_count.to_le_bytes());
    b[28..32].copy_from_slice(&self.compressed_block_entry_count.to_le_bytes());
    b[32..36].copy_from_slice(&self.compressed_block_entry_size.to_le_bytes());
    b[36..40].copy_from_slice(&self.compression_method_name_count.to_le_bytes());
    b[40..44].copy_from_slice(&self.compression_method_name_length.to_le_bytes());
    b[44..48].copy_from_slice(&self.compression_block_size.to_le_bytes());
    b[48..52].copy_from_slice(&self.directory_index_size.to_le_bytes());
    b[52..56].copy_from_slice(&self.partition_count.to_le_bytes());
    b[56..64].copy_from_slice(&self.container_id.value().to_le_bytes());
    b[64..80].copy_from_slice(&self.encryption_key_guid.to_bytes());
    b[80] = self.container_flags.bits();
    b[84..88].copy_from_slice(&self.perfect_hash_seeds_count.to_le_bytes());
    b[88..96].copy_from_slice(&self.partition_size.to_le_bytes());
    b[96..100].copy_from_slice(&self.chunks_without_perfect_hash_count.to_le_bytes());
    b
  }

  /// Parse and validate magic, version, header and entry sizes
  /// 解析并校验魔数、版本、头与条目大小
  pub fn decode(b: &[u8]) -> Result<Self> {
    if b.len() < HEADER_SIZE {
      return Err(Error::corrupt_toc(format!("header truncated: {} bytes", b.len())));
    }
    if b[0..16] != MAGIC {
      return Err(Error::corrupt_toc("bad magic"));
    }
    let version = match TocVersion::from_u8(b[16]) {
      Some(TocVersion::Invalid) | None => {
        return Err(Error::corrupt_toc(format!("invalid version {}", b[16])));
      }
      Some(v) => v,
    };
    let header_size = u32_at(b, 20);
    if header_size as usize != HEADER_SIZE {
      return Err(Error::corrupt_toc(format!("header size {header_size}")));
    }
    let compressed_block_entry_size = u32_at(b, 32);
    if compressed_block_entry_size as usize != BLOCK_ENTRY_SIZE {
      return Err(Error::corrupt_toc(format!(
        "block entry size {compressed_block_entry_size}"
      )));
    }
    let compression_method_name_count = u32_at(b, 36);
    let compression_method_name_length = u32_at(b, 40);
    if compression_method_name_count > 0 && compression_method_name_length == 0 {
      return Err(Error::corrupt_toc("zero method name length"));
    }
    let compression_block_size = u32_at(b, 44);
    if compression_block_size == 0 {
      return Err(Error::corrupt_toc("zero compression block size"));
    }
    let container_flags = ContainerFlags::from_bits(b[80])
      .ok_or_else(|| Error::corrupt_toc(format!("container flags {:#x}", b[80])))?;

    let mut guid = [0u8; 16];
    guid.copy_from_slice(&b[64..80]);

    let (mut partition_count, mut partition_size) = (u32_at(b, 52), u64_at(b, 88));
    if version < TocVersion::PartitionSize {
      partition_count = 1;
      partition_size = NO_PARTITION_LIMIT;
    }
    if partition_size == 0 {
      return Err(Error::corrupt_toc("zero partition size"));
    }

    let perfect_hash_seeds_count = if version >= TocVersion::PerfectHash {
      u32_at(b, 84)
    } else {
      0
    };
    let chunks_without_perfect_hash_count = if version >= TocVersion::PerfectHashWithOverflow {
      u32_at(b, 96)
    } else {
      0
    };

    Ok(Self {
      version,
      entry_count: u32_at(b, 24),
      compressed_block_entry_count: u32_at(b, 28),
      compressed_block_entry_size,
      compression_method_name_count,
      compression_method_name_length,
      compression_block_size,
      directory_index_size: u32_at(b, 48),
      partition_count,
      container_id: ContainerId::from_u64(u64_at(b, 56)),
      encryption_key_guid: Guid::from_bytes(&guid),
      container_flags,
      perfect_hash_seeds_count,
      partition_size,
      chunks_without_perfect_hash_count,
    })
  }

  /// Header with layout constants filled in / 填好布局常量的头
  pub fn latest() -> Self {
    Self {
      version: TocVersion::LATEST,
      compressed_block_entry_size: BLOCK_ENTRY_SIZE as u32,
      compression_method_name_length: METHOD_NAME_LEN as u32,
      partition_count: 1,
      partition_size: NO_PARTITION_LIMIT,
      ..Default::default()
    }
  }
}
