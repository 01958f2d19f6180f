#![cfg_attr(docsrs, feature(doc_cfg))]

//! Block compression methods
//! 块压缩方法
//!
//! Raw block formats without size prefix, the uncompressed size is kept in
//! the TOC block entry.
//! 原始块格式，不带长度前缀，解压长度记录在 TOC 块条目中。

use thiserror::Error;

/// 压缩错误 Compression error
#[derive(Error, Debug)]
pub enum Error {
  #[error("lz4: {0}")]
  Lz4(#[from] lz4_flex::block::DecompressError),

  #[error("zstd: {0}")]
  Zstd(#[from] std::io::Error),

  #[error("unknown method: {0}")]
  UnknownMethod(String),

  #[error("decoded {got} bytes, expected {want}")]
  SizeMismatch { got: usize, want: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for iostore_base::Error {
  fn from(e: Error) -> Self {
    let code = match e {
      Error::UnknownMethod(_) => iostore_base::Code::CorruptToc,
      _ => iostore_base::Code::DecompressionError,
    };
    iostore_base::Error::new(code, e.to_string())
  }
}

/// Zstd level used by writers / 写入使用的 zstd 级别
pub const ZSTD_LEVEL: i32 = 3;

/// 压缩算法 Compression codec
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Codec {
  #[default]
  None = 0,
  Lz4 = 1,
  Zstd = 2,
}

impl Codec {
  /// Name stored in the TOC method table / TOC 方法表中的名称
  pub fn name(self) -> &'static str {
    match self {
      Self::None => "None",
      Self::Lz4 => "LZ4",
      Self::Zstd => "Zstd",
    }
  }

  /// Case-insensitive lookup / 不区分大小写查找
  pub fn from_name(name: &str) -> Result<Self> {
    [Self::None, Self::Lz4, Self::Zstd]
      .into_iter()
      .find(|c| c.name().eq_ignore_ascii_case(name))
      .ok_or_else(|| Error::UnknownMethod(name.to_owned()))
  }
}

/// 压缩 Compress
#[inline]
pub fn enc(codec: Codec, src: &[u8]) -> Result<Vec<u8>> {
  Ok(match codec {
    Codec::None => src.to_vec(),
    Codec::Lz4 => lz4_flex::block::compress(src),
    Codec::Zstd => zstd::bulk::compress(src, ZSTD_LEVEL)?,
  })
}

/// Decompress filling exactly `dst.len()` bytes
/// 解压，必须恰好填满 `dst`
pub fn dec_into(codec: Codec, src: &[u8], dst: &mut [u8]) -> Result<()> {
  let want = dst.len();
  let got = match codec {
    Codec::None => {
      if src.len() < want {
        src.len()
      } else {
        dst.copy_from_slice(&src[..want]);
        want
      }
    }
    Codec::Lz4 => lz4_flex::block::decompress_into(src, dst)?,
    Codec::Zstd => zstd::bulk::decompress_to_buffer(src, dst)?,
  };
  if got != want {
    return Err(Error::SizeMismatch { got, want });
  }
  Ok(())
}

/// 解压 Decompress into a new Vec of `size` bytes
#[inline]
pub fn dec(codec: Codec, src: &[u8], size: usize) -> Result<Vec<u8>> {
  let mut out = vec![0u8; size];
  dec_into(codec, src, &mut out)?;
  Ok(out)
}
