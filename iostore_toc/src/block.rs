//! Decoding of one stored compression block / 单个存储压缩块的解码

use iostore_base::{AES_BLOCK, AesKey, Code, Error, Result, align_up, sha1};
use log::warn;

use crate::{CompressedBlockEntry, TocResource};

impl TocResource {
  /// Bytes a block occupies in its partition, AES padding included
  /// 块在分区中占用的字节数，含 AES 填充
  #[inline]
  pub fn stored_size(&self, entry: &CompressedBlockEntry) -> u64 {
    let size = entry.compressed_size() as u64;
    if self.is_encrypted() {
      align_up(size, AES_BLOCK as u64)
    } else {
      size
    }
  }

  /// Verify, decrypt in place and decompress block `index` into `dst`.
  /// `raw` holds exactly `stored_size` bytes, `dst` exactly the uncompressed size.
  /// 校验、原地解密并解压块 `index` 到 `dst`；`raw` 为存储大小，`dst` 为解压大小。
  pub fn decode_block(
    &self,
    index: usize,
    raw: &mut [u8],
    key: Option<&AesKey>,
    dst: &mut [u8],
  ) -> Result<()> {
    let entry = self
      .compression_blocks
      .get(index)
      .ok_or_else(|| Error::invalid_param(format!("block {index} out of range")))?;
    if raw.len() as u64 != self.stored_size(entry) || dst.len() != entry.uncompressed_size() as usize
    {
      return Err(Error::invalid_param(format!(
        "block {index}: {} raw / {} dst bytes for {entry:?}",
        raw.len(),
        dst.len()
      )));
    }

    let want = self
      .signatures
      .as_ref()
      .filter(|_| self.is_signed())
      .map(|s| s.block_hashes.get(index));
    if want.is_some_and(|h| h != Some(&sha1(raw))) {
      warn!("block {index} hash mismatch {}", self.header.container_id);
      return Err(Error::new(
        Code::SignatureError,
        format!("block {index} hash mismatch"),
      ));
    }

    if self.is_encrypted() {
      let key = key.ok_or_else(|| {
        Error::new(Code::InvalidEncryptionKey, "encrypted block without key")
      })?;
      key.decrypt(raw);
    }

    let codec = self
      .codec(entry.method())
      .ok_or_else(|| Error::corrupt_toc(format!("block {index} method {}", entry.method())))?;
    iostore_compress::dec_into(codec, &raw[..entry.compressed_size() as usize], dst)?;
    Ok(())
  }
}
