//! AES-256 block cipher wrapper
//! AES-256 分组加密封装
//!
//! Buffers are encrypted in place, 16 bytes at a time (ECB). Data that is not
//! a multiple of the block size is padded by repeating its own bytes from the
//! start, never with zeros.
//! 原地按 16 字节分组加密（ECB）。非整块数据用自身字节从头循环填充，不用零填充。

use std::{
  fmt::{Debug, Formatter, Result as FmtResult},
  str::FromStr,
};

use aes::{
  Aes256,
  cipher::{BlockDecrypt, BlockEncrypt, KeyInit, generic_array::GenericArray},
};

use crate::{Code, Error, Result};

/// Cipher block size / 分组大小
pub const AES_BLOCK: usize = 16;

/// Key length in bytes / 密钥长度
pub const AES_KEY_SIZE: usize = 32;

/// Round up to alignment (power of 2) / 向上对齐（2 的幂）
#[inline(always)]
pub const fn align_up(v: u64, align: u64) -> u64 {
  (v + align - 1) & !(align - 1)
}

/// Pad to a multiple of `align` by repeating the data from the start
/// 循环复制数据自身填充到 `align` 的整数倍
pub fn pad_repeat(buf: &mut Vec<u8>, align: usize) {
  let len = buf.len();
  let target = align_up(len as u64, align as u64) as usize;
  if len == 0 {
    return;
  }
  buf.reserve(target - len);
  for i in len..target {
    let b = buf[(i - len) % len];
    buf.push(b);
  }
}

/// AES-256 key / AES-256 密钥
#[derive(Clone)]
pub struct AesKey(Aes256);

impl AesKey {
  #[inline]
  pub fn new(key: &[u8; AES_KEY_SIZE]) -> Self {
    Self(Aes256::new(GenericArray::from_slice(key)))
  }

  #[inline]
  pub fn from_slice(key: &[u8]) -> Result<Self> {
    Aes256::new_from_slice(key)
      .map(Self)
      .map_err(|_| Error::new(Code::InvalidEncryptionKey, format!("key length {}", key.len())))
  }

  /// Encrypt in place, `buf.len()` must be a multiple of 16
  /// 原地加密，长度须为 16 的倍数
  pub fn encrypt(&self, buf: &mut [u8]) {
    debug_assert!(buf.len() % AES_BLOCK == 0, "unaligned encrypt");
    for block in buf.chunks_exact_mut(AES_BLOCK) {
      self.0.encrypt_block(GenericArray::from_mut_slice(block));
    }
  }

  /// Decrypt in place, `buf.len()` must be a multiple of 16
  /// 原地解密，长度须为 16 的倍数
  pub fn decrypt(&self, buf: &mut [u8]) {
    debug_assert!(buf.len() % AES_BLOCK == 0, "unaligned decrypt");
    for block in buf.chunks_exact_mut(AES_BLOCK) {
      self.0.decrypt_block(GenericArray::from_mut_slice(block));
    }
  }

  /// Pad then encrypt / 填充后加密
  pub fn encrypt_padded(&self, buf: &mut Vec<u8>) {
    pad_repeat(buf, AES_BLOCK);
    self.encrypt(buf);
  }
}

impl FromStr for AesKey {
  type Err = Error;

  /// Hex key, optional `0x` prefix / 十六进制密钥，可带 `0x` 前缀
  fn from_str(s: &str) -> Result<Self> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes =
      hex::decode(s).map_err(|e| Error::new(Code::InvalidEncryptionKey, e.to_string()))?;
    Self::from_slice(&bytes)
  }
}

impl Debug for AesKey {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.write_str("AesKey(..)")
  }
}
