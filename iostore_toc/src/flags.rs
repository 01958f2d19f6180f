//! Container, meta and read-option flags
//! 容器、元数据与读取选项标志

use bitflags::bitflags;

bitflags! {
  /// Container flags / 容器标志
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
  pub struct ContainerFlags: u8 {
    const COMPRESSED = 1;
    const ENCRYPTED = 1 << 1;
    const SIGNED = 1 << 2;
    const INDEXED = 1 << 3;
  }

  /// Per chunk flags / 单块标志
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
  pub struct MetaFlags: u8 {
    const COMPRESSED = 1;
    const MEMORY_MAPPED = 1 << 1;
  }

  /// Optional sections to load / 需加载的可选段
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
  pub struct TocReadOptions: u8 {
    const READ_DIRECTORY_INDEX = 1;
    const READ_TOC_META = 1 << 1;
    const READ_ALL = Self::READ_DIRECTORY_INDEX.bits() | Self::READ_TOC_META.bits();
  }
}
