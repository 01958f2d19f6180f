use std::path::{Path, PathBuf};

/// Where a container lives and how it ranks against others
/// 容器位置及其与其他容器的优先次序
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoStoreEnvironment {
  base: PathBuf,
  order: i32,
}

impl IoStoreEnvironment {
  /// `base` without extension, `<base>.utoc` is the TOC
  /// `base` 不含扩展名，`<base>.utoc` 为目录表
  pub fn new(base: impl Into<PathBuf>) -> Self {
    Self {
      base: base.into(),
      order: 0,
    }
  }

  /// Higher order wins chunk lookups / 顺序值高者在块查找中优先
  pub fn with_order(mut self, order: i32) -> Self {
    self.order = order;
    self
  }

  #[inline(always)]
  pub fn base(&self) -> &Path {
    &self.base
  }

  #[inline(always)]
  pub fn order(&self) -> i32 {
    self.order
  }
}
