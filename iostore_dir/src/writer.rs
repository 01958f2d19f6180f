//! Directory index builder / 目录索引构建

use std::collections::HashMap;

use iostore_base::{AES_BLOCK, AesKey, Error, Result, aes::pad_repeat};

use crate::{DirEntry, FileEntry, INVALID, ROOT, fstring};

/// Builds the tree, new siblings are prepended to their chain
/// 构建目录树，新兄弟节点插入链表头部
#[derive(Debug)]
pub struct DirIndexWriter {
  mount_point: String,
  dirs: Vec<DirEntry>,
  files: Vec<FileEntry>,
  strings: Vec<String>,
  // Exact match, no case folding / 精确匹配，不折叠大小写
  string_map: HashMap<String, u32>,
}

impl Default for DirIndexWriter {
  fn default() -> Self {
    Self::new()
  }
}

impl DirIndexWriter {
  pub fn new() -> Self {
    Self {
      mount_point: String::new(),
      dirs: vec![DirEntry::default()],
      files: Vec::new(),
      strings: Vec::new(),
      string_map: HashMap::new(),
    }
  }

  pub fn set_mount_point(&mut self, mount_point: impl Into<String>) {
    self.mount_point = mount_point.into();
  }

  #[inline]
  pub fn mount_point(&self) -> &str {
    &self.mount_point
  }

  #[inline]
  pub fn file_count(&self) -> usize {
    self.files.len()
  }

  fn intern(&mut self, s: &str) -> u32 {
    if let Some(&i) = self.string_map.get(s) {
      return i;
    }
    let i = self.strings.len() as u32;
    self.strings.push(s.to_owned());
    self.string_map.insert(s.to_owned(), i);
    i
  }

  fn child_dir(&mut self, parent: u32, name: &str) -> u32 {
    let mut cur = self.dirs[parent as usize].first_child;
    while cur != INVALID {
      let d = self.dirs[cur as usize];
      if self.strings[d.name as usize] == name {
        return cur;
      }
      cur = d.next_sibling;
    }
    let name = self.intern(name);
    let idx = self.dirs.len() as u32;
    self.dirs.push(DirEntry {
      name,
      next_sibling: self.dirs[parent as usize].first_child,
      ..Default::default()
    });
    self.dirs[parent as usize].first_child = idx;
    idx
  }

  /// Add a file under the mount point, returns its file entry index
  /// 在挂载点下添加文件，返回文件条目索引
  pub fn add_file(&mut self, full_path: &str, toc_index: u32) -> Result<u32> {
    let mount = self.mount_point.as_str();
    let rel = full_path
      .strip_prefix(mount)
      // The mount point must end on a path component / 挂载点须止于路径分量边界
      .filter(|rel| {
        mount.is_empty() || mount.ends_with('/') || rel.is_empty() || rel.starts_with('/')
      })
      .ok_or_else(|| {
        Error::invalid_param(format!("{full_path} is outside mount point {mount}"))
      })?;
    let mut parts: Vec<&str> = rel.split('/').filter(|p| !p.is_empty()).collect();
    let Some(file_name) = parts.pop() else {
      return Err(Error::invalid_param(format!("{full_path} has no file name")));
    };

    let mut dir = ROOT;
    for part in parts {
      dir = self.child_dir(dir, part);
    }

    let name = self.intern(file_name);
    let idx = self.files.len() as u32;
    self.files.push(FileEntry {
      name,
      next_file: self.dirs[dir as usize].first_file,
      user_data: toc_index,
    });
    self.dirs[dir as usize].first_file = idx;
    Ok(idx)
  }

  /// Serialize, encrypting with repeat padding when a key is given
  /// 序列化，给定密钥时循环填充并加密
  pub fn flush(&self, key: Option<&AesKey>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64 + self.dirs.len() * 16 + self.files.len() * 12);
    fstring::put(&mut buf, &self.mount_point);

    buf.extend_from_slice(&(self.dirs.len() as u32).to_le_bytes());
    for d in &self.dirs {
      for v in [d.name, d.first_child, d.next_sibling, d.first_file] {
        buf.extend_from_slice(&v.to_le_bytes());
      }
    }

    buf.extend_from_slice(&(self.files.len() as u32).to_le_bytes());
    for f in &self.files {
      for v in [f.name, f.next_file, f.user_data] {
        buf.extend_from_slice(&v.to_le_bytes());
      }
    }

    buf.extend_from_slice(&(self.strings.len() as u32).to_le_bytes());
    for s in &self.strings {
      fstring::put(&mut buf, s);
    }

    if let Some(key) = key {
      pad_repeat(&mut buf, AES_BLOCK);
      key.encrypt(&mut buf);
    }
    buf
  }
}

/// Longest directory prefix shared by all paths, ending with `/`
/// 所有路径共享的最长目录前缀，以 `/` 结尾
pub fn common_mount_point<'a>(paths: impl IntoIterator<Item = &'a str>) -> String {
  let mut iter = paths.into_iter();
  let Some(first) = iter.next() else {
    return String::new();
  };
  let mut prefix = match first.rfind('/') {
    Some(i) => &first[..=i],
    None => "",
  };
  for p in iter {
    while !p.starts_with(prefix) {
      prefix = match prefix[..prefix.len() - 1].rfind('/') {
        Some(i) => &prefix[..=i],
        None => "",
      };
    }
    if prefix.is_empty() {
      break;
    }
  }
  prefix.to_owned()
}
