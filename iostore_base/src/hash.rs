//! Hash wrapper / 哈希封装

use sha1::{Digest, Sha1};

/// SHA-1 digest size / SHA-1 摘要长度
pub const SHA1_SIZE: usize = 20;

/// CityHash64 of the lower-cased UTF-16LE name
/// 名称小写后按 UTF-16LE 编码的 CityHash64
#[inline]
pub fn name_hash(name: &str) -> u64 {
  let bytes = name
    .to_lowercase()
    .encode_utf16()
    .flat_map(u16::to_le_bytes)
    .collect::<Vec<u8>>();
  cityhasher::hash(bytes)
}

/// SHA-1 of data / 数据的 SHA-1
#[inline]
pub fn sha1(data: &[u8]) -> [u8; SHA1_SIZE] {
  let mut out = [0u8; SHA1_SIZE];
  out.copy_from_slice(&Sha1::digest(data));
  out
}
