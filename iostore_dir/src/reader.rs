//! Directory index reader / 目录索引读取

use iostore_base::{Error, Result};

use crate::{DirEntry, FileEntry, INVALID, ROOT, fstring::Input, join};

#[derive(Clone, Debug, Default)]
pub struct DirIndexReader {
  mount_point: String,
  dirs: Vec<DirEntry>,
  files: Vec<FileEntry>,
  strings: Vec<String>,
}

impl DirIndexReader {
  /// Parse a decrypted directory index / 解析已解密的目录索引
  pub fn open(bytes: &[u8]) -> Result<Self> {
    let mut input = Input { buf: bytes, pos: 0 };
    let mount_point = input.string()?;

    let n = input.count(16)?;
    let mut dirs = Vec::with_capacity(n);
    for _ in 0..n {
      dirs.push(DirEntry {
        name: input.u32()?,
        first_child: input.u32()?,
        next_sibling: input.u32()?,
        first_file: input.u32()?,
      });
    }

    let n = input.count(12)?;
    let mut files = Vec::with_capacity(n);
    for _ in 0..n {
      files.push(FileEntry {
        name: input.u32()?,
        next_file: input.u32()?,
        user_data: input.u32()?,
      });
    }

    let n = input.count(4)?;
    let mut strings = Vec::with_capacity(n);
    for _ in 0..n {
      strings.push(input.string()?);
    }

    let reader = Self {
      mount_point,
      dirs,
      files,
      strings,
    };
    reader.check()?;
    Ok(reader)
  }

  /// Handles in range and the tree acyclic / 句柄在范围内且树无环
  fn check(&self) -> Result<()> {
    let bad = |what: &str, v: u32| Error::corrupt_toc(format!("directory index {what} {v}"));
    let in_range = |v: u32, len: usize| v == INVALID || (v as usize) < len;

    for d in &self.dirs {
      if !in_range(d.name, self.strings.len()) {
        return Err(bad("dir name", d.name));
      }
      if !in_range(d.first_child, self.dirs.len()) || !in_range(d.next_sibling, self.dirs.len()) {
        return Err(bad("dir link", d.first_child));
      }
      if !in_range(d.first_file, self.files.len()) {
        return Err(bad("file link", d.first_file));
      }
    }
    for f in &self.files {
      if (f.name as usize) >= self.strings.len() {
        return Err(bad("file name", f.name));
      }
      if !in_range(f.next_file, self.files.len()) {
        return Err(bad("file link", f.next_file));
      }
    }

    if self.dirs.is_empty() {
      return Ok(());
    }
    let mut seen_dirs = vec![false; self.dirs.len()];
    let mut seen_files = vec![false; self.files.len()];
    let mut stack = vec![ROOT];
    while let Some(d) = stack.pop() {
      if std::mem::replace(&mut seen_dirs[d as usize], true) {
        return Err(bad("cycle at dir", d));
      }
      let mut f = self.dirs[d as usize].first_file;
      while f != INVALID {
        if std::mem::replace(&mut seen_files[f as usize], true) {
          return Err(bad("cycle at file", f));
        }
        f = self.files[f as usize].next_file;
      }
      let mut c = self.dirs[d as usize].first_child;
      while c != INVALID {
        if seen_dirs[c as usize] {
          return Err(bad("cycle at dir", c));
        }
        stack.push(c);
        c = self.dirs[c as usize].next_sibling;
      }
    }
    Ok(())
  }

  #[inline]
  pub fn mount_point(&self) -> &str {
    &self.mount_point
  }

  /// Root handle, `INVALID` when empty / 根句柄，空时为 `INVALID`
  #[inline]
  pub fn root(&self) -> u32 {
    if self.dirs.is_empty() { INVALID } else { ROOT }
  }

  #[inline]
  fn dir(&self, d: u32) -> Option<&DirEntry> {
    self.dirs.get(d as usize)
  }

  #[inline]
  fn file_entry(&self, f: u32) -> Option<&FileEntry> {
    self.files.get(f as usize)
  }

  #[inline]
  fn string(&self, i: u32) -> Option<&str> {
    self.strings.get(i as usize).map(String::as_str)
  }

  pub fn child_directory(&self, d: u32) -> u32 {
    self.dir(d).map_or(INVALID, |e| e.first_child)
  }

  pub fn next_directory(&self, d: u32) -> u32 {
    self.dir(d).map_or(INVALID, |e| e.next_sibling)
  }

  /// First file of a directory / 目录的第一个文件
  pub fn file(&self, d: u32) -> u32 {
    self.dir(d).map_or(INVALID, |e| e.first_file)
  }

  pub fn next_file(&self, f: u32) -> u32 {
    self.file_entry(f).map_or(INVALID, |e| e.next_file)
  }

  /// `None` for the root and invalid handles / 根目录与无效句柄返回 `None`
  pub fn directory_name(&self, d: u32) -> Option<&str> {
    self.dir(d).and_then(|e| self.string(e.name))
  }

  pub fn file_name(&self, f: u32) -> Option<&str> {
    self.file_entry(f).and_then(|e| self.string(e.name))
  }

  /// TOC index of a file / 文件的 TOC 索引
  pub fn file_data(&self, f: u32) -> Option<u32> {
    self.file_entry(f).map(|e| e.user_data)
  }

  /// Pre-order walk from `d`: files first, then child directories. Stops
  /// and returns `false` as soon as the visitor does.
  /// 从 `d` 先序遍历：先文件后子目录，访问者返回 `false` 时立即停止并返回 `false`。
  pub fn iterate(&self, d: u32, mut visitor: impl FnMut(&str, u32) -> bool) -> bool {
    match self.directory_path(d) {
      Some(base) => self.walk(d, &base, &mut visitor),
      None => true,
    }
  }

  /// Full path of a directory / 目录的完整路径
  pub fn directory_path(&self, d: u32) -> Option<String> {
    if d == ROOT {
      return (!self.dirs.is_empty()).then(|| self.mount_point.clone());
    }
    self.dir(d)?;
    let mut stack = vec![(ROOT, self.mount_point.clone())];
    while let Some((cur, path)) = stack.pop() {
      let mut c = self.child_directory(cur);
      while let Some(ce) = self.dir(c) {
        let child = join(&path, self.string(ce.name).unwrap_or_default());
        if c == d {
          return Some(child);
        }
        stack.push((c, child));
        c = ce.next_sibling;
      }
    }
    None
  }

  fn walk(&self, d: u32, path: &str, visitor: &mut impl FnMut(&str, u32) -> bool) -> bool {
    let Some(entry) = self.dir(d) else {
      return true;
    };

    let mut f = entry.first_file;
    while let Some(fe) = self.file_entry(f) {
      let name = self.string(fe.name).unwrap_or_default();
      if !visitor(&join(path, name), fe.user_data) {
        return false;
      }
      f = fe.next_file;
    }

    let mut c = entry.first_child;
    while let Some(ce) = self.dir(c) {
      let name = self.string(ce.name).unwrap_or_default();
      if !self.walk(c, &join(path, name), visitor) {
        return false;
      }
      c = ce.next_sibling;
    }
    true
  }

  /// All `(full path, toc index)` pairs / 所有（完整路径，TOC 索引）
  pub fn files(&self) -> Vec<(String, u32)> {
    let mut out = Vec::with_capacity(self.files.len());
    self.iterate(self.root(), |path, idx| {
      out.push((path.to_owned(), idx));
      true
    });
    out
  }
}
