#![cfg_attr(docsrs, feature(doc_cfg))]

//! Directory index: a flat-array tree of directories and files mapping
//! mount-relative paths to TOC entries
//! 目录索引：以扁平数组表示的目录与文件树，映射挂载相对路径到 TOC 条目
//!
//! Handles are `u32` indices, `INVALID` (`!0`) means none at every level.
//! 句柄为 `u32` 索引，`INVALID`（`!0`）在各层都表示无。

mod fstring;
mod reader;
mod writer;

pub use reader::DirIndexReader;
pub use writer::{DirIndexWriter, common_mount_point};

/// Null handle / 空句柄
pub const INVALID: u32 = u32::MAX;

/// Root directory handle / 根目录句柄
pub const ROOT: u32 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirEntry {
  pub name: u32,
  pub first_child: u32,
  pub next_sibling: u32,
  pub first_file: u32,
}

impl Default for DirEntry {
  fn default() -> Self {
    Self {
      name: INVALID,
      first_child: INVALID,
      next_sibling: INVALID,
      first_file: INVALID,
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileEntry {
  pub name: u32,
  pub next_file: u32,
  /// TOC entry index / TOC 条目索引
  pub user_data: u32,
}

/// Join a mount point and a relative path / 拼接挂载点与相对路径
pub(crate) fn join(mount: &str, rel: &str) -> String {
  if mount.is_empty() || mount.ends_with('/') {
    format!("{mount}{rel}")
  } else {
    format!("{mount}/{rel}")
  }
}
