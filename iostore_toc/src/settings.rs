//! Container and writer settings / 容器与写入设置

use std::sync::Arc;

use iostore_base::{AesKey, ContainerId, Guid};
use iostore_compress::Codec;

use crate::{ContainerFlags, DEFAULT_BLOCK_SIZE, NO_PARTITION_LIMIT, Signer};

/// Identity and protection of a container / 容器身份与保护
#[derive(Clone, Default)]
pub struct ContainerSettings {
  pub container_id: ContainerId,
  pub flags: ContainerFlags,
  pub encryption_key_guid: Guid,
  pub encryption_key: Option<AesKey>,
  pub signer: Option<Arc<dyn Signer>>,
}

impl ContainerSettings {
  pub fn new(name: &str) -> Self {
    Self {
      container_id: ContainerId::from_name(name),
      ..Default::default()
    }
  }

  /// Enable encryption / 启用加密
  pub fn encrypt(mut self, guid: Guid, key: AesKey) -> Self {
    self.flags |= ContainerFlags::ENCRYPTED;
    self.encryption_key_guid = guid;
    self.encryption_key = Some(key);
    self
  }

  /// Enable signing / 启用签名
  pub fn sign(mut self, signer: Arc<dyn Signer>) -> Self {
    self.flags |= ContainerFlags::SIGNED;
    self.signer = Some(signer);
    self
  }

  #[inline(always)]
  pub fn is_encrypted(&self) -> bool {
    self.flags.contains(ContainerFlags::ENCRYPTED)
  }

  #[inline(always)]
  pub fn is_signed(&self) -> bool {
    self.flags.contains(ContainerFlags::SIGNED)
  }
}

/// Layout choices of the writer / 写入布局选项
#[derive(Clone, Debug)]
pub struct WriterSettings {
  pub compression_block_size: u32,
  /// Partition size limit, `u64::MAX` for a single partition
  /// 分区大小上限，`u64::MAX` 表示单分区
  pub max_partition_size: u64,
  pub compression: Codec,
  /// Store a block compressed only if it saves at least this many bytes
  /// 压缩至少节省这么多字节才存压缩块
  pub min_savings: u32,
}

impl Default for WriterSettings {
  fn default() -> Self {
    Self {
      compression_block_size: DEFAULT_BLOCK_SIZE,
      max_partition_size: NO_PARTITION_LIMIT,
      compression: Codec::None,
      min_savings: 1,
    }
  }
}
