use std::{
  ffi::OsString,
  path::{Path, PathBuf},
};

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
  let mut s = OsString::from(base.as_os_str());
  s.push(suffix);
  s.into()
}

#[inline]
pub fn toc_path(base: impl AsRef<Path>) -> PathBuf {
  with_suffix(base.as_ref(), ".utoc")
}

/// Partition 0 has no index suffix / 分区 0 无序号后缀
pub fn partition_path(base: impl AsRef<Path>, index: u32) -> PathBuf {
  if index == 0 {
    with_suffix(base.as_ref(), ".ucas")
  } else {
    with_suffix(base.as_ref(), &format!("_s{index}.ucas"))
  }
}
