//! Length-prefixed strings
//! 长度前缀字符串
//!
//! i32 length counting the terminator. Positive: single-byte characters.
//! Negative: UTF-16LE code units. Zero: empty.
//! i32 长度含结束符。正数为单字节字符，负数为 UTF-16LE，零为空串。

use iostore_base::{Error, Result};

pub(crate) fn put(buf: &mut Vec<u8>, s: &str) {
  if s.is_empty() {
    buf.extend_from_slice(&0i32.to_le_bytes());
  } else if s.is_ascii() {
    buf.extend_from_slice(&(s.len() as i32 + 1).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
  } else {
    let units: Vec<u16> = s.encode_utf16().collect();
    buf.extend_from_slice(&(-(units.len() as i32 + 1)).to_le_bytes());
    for u in units {
      buf.extend_from_slice(&u.to_le_bytes());
    }
    buf.extend_from_slice(&[0, 0]);
  }
}

pub(crate) struct Input<'a> {
  pub buf: &'a [u8],
  pub pos: usize,
}

impl<'a> Input<'a> {
  pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
    match self.pos.checked_add(n) {
      Some(end) if end <= self.buf.len() => {
        let s = &self.buf[self.pos..end];
        self.pos = end;
        Ok(s)
      }
      _ => Err(Error::corrupt_toc(format!(
        "directory index truncated at {}",
        self.pos
      ))),
    }
  }

  pub fn u32(&mut self) -> Result<u32> {
    let b = self.take(4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
  }

  /// Array count, bounded by the bytes left / 数组长度，受剩余字节约束
  pub fn count(&mut self, elem: usize) -> Result<usize> {
    let n = self.u32()? as i32;
    let left = self.buf.len() - self.pos;
    if n < 0 || (n as usize).saturating_mul(elem) > left {
      return Err(Error::corrupt_toc(format!("directory index count {n}")));
    }
    Ok(n as usize)
  }

  pub fn string(&mut self) -> Result<String> {
    let len = self.u32()? as i32;
    if len == 0 {
      return Ok(String::new());
    }
    if len > 0 {
      let raw = self.take(len as usize)?;
      // Latin-1 / 单字节字符
      Ok(raw[..raw.len() - 1].iter().map(|&b| b as char).collect())
    } else {
      let units = len.unsigned_abs() as usize;
      let raw = self.take(units.checked_mul(2).ok_or_else(|| Error::corrupt_toc("string length"))?)?;
      let v: Vec<u16> = raw
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take(units - 1)
        .collect();
      String::from_utf16(&v).map_err(|_| Error::corrupt_toc("invalid utf-16 name"))
    }
  }
}
