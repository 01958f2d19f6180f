//! Container signatures
//! 容器签名
//!
//! The TOC signature covers the compressed block array, the block signature
//! covers the concatenated per-block SHA-1 hashes. The signing algorithm is
//! supplied by the caller.
//! TOC 签名覆盖压缩块数组，块签名覆盖逐块 SHA-1 的拼接。签名算法由调用者提供。

use iostore_base::{SHA1_SIZE, sha1};

pub type BlockHash = [u8; SHA1_SIZE];

/// Signs and verifies SHA-1 digests / 对 SHA-1 摘要签名与验签
pub trait Signer: Send + Sync {
  fn sign(&self, digest: &BlockHash) -> Vec<u8>;
  fn verify(&self, digest: &BlockHash, signature: &[u8]) -> bool;
}

/// Keyed SHA-1 over `secret || digest`, symmetric
/// 以 `secret || digest` 计算的带密钥 SHA-1，对称算法
#[derive(Clone, Debug)]
pub struct KeyedSha1 {
  secret: Vec<u8>,
}

impl KeyedSha1 {
  pub fn new(secret: impl Into<Vec<u8>>) -> Self {
    Self {
      secret: secret.into(),
    }
  }
}

impl Signer for KeyedSha1 {
  fn sign(&self, digest: &BlockHash) -> Vec<u8> {
    let mut buf = Vec::with_capacity(self.secret.len() + SHA1_SIZE);
    buf.extend_from_slice(&self.secret);
    buf.extend_from_slice(digest);
    sha1(&buf).to_vec()
  }

  fn verify(&self, digest: &BlockHash, signature: &[u8]) -> bool {
    self.sign(digest) == signature
  }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TocSignatures {
  pub toc_signature: Vec<u8>,
  pub block_signature: Vec<u8>,
  /// SHA-1 of every stored (compressed, encrypted) block
  /// 每个落盘块（压缩、加密后）的 SHA-1
  pub block_hashes: Vec<BlockHash>,
}

/// Digest of the concatenated block hashes / 块哈希拼接后的摘要
pub fn block_hashes_digest(hashes: &[BlockHash]) -> BlockHash {
  sha1(hashes.as_flattened())
}
