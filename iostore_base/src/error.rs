//! Status codes and error type shared by every iostore crate
//! 所有 iostore crate 共用的状态码与错误类型

use std::fmt::{Display, Formatter, Result as FmtResult};

use thiserror::Error;

/// Status code / 状态码
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Code {
  Ok = 0,
  /// Not yet completed / 尚未完成
  #[default]
  Unknown = 1,
  InvalidCode = 2,
  Cancelled = 3,
  FileOpenFailed = 4,
  FileNotOpen = 5,
  ReadError = 6,
  WriteError = 7,
  NotFound = 8,
  CorruptToc = 9,
  UnknownChunkId = 10,
  InvalidParameter = 11,
  SignatureError = 12,
  InvalidEncryptionKey = 13,
  DecompressionError = 14,
}

impl Code {
  /// Convert from u8, unknown values map to `InvalidCode`
  /// 从 u8 转换，未知值映射为 `InvalidCode`
  #[inline]
  pub fn from_u8(v: u8) -> Self {
    match v {
      0 => Self::Ok,
      1 => Self::Unknown,
      3 => Self::Cancelled,
      4 => Self::FileOpenFailed,
      5 => Self::FileNotOpen,
      6 => Self::ReadError,
      7 => Self::WriteError,
      8 => Self::NotFound,
      9 => Self::CorruptToc,
      10 => Self::UnknownChunkId,
      11 => Self::InvalidParameter,
      12 => Self::SignatureError,
      13 => Self::InvalidEncryptionKey,
      14 => Self::DecompressionError,
      _ => Self::InvalidCode,
    }
  }

  #[inline(always)]
  pub fn is_ok(self) -> bool {
    self == Self::Ok
  }

  /// Final state (anything but `Unknown`) / 终态（`Unknown` 以外）
  #[inline(always)]
  pub fn is_done(self) -> bool {
    self != Self::Unknown
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Ok => "OK",
      Self::Unknown => "Unknown Status",
      Self::InvalidCode => "Invalid Code",
      Self::Cancelled => "Cancelled",
      Self::FileOpenFailed => "FileOpen Failed",
      Self::FileNotOpen => "File Not Open",
      Self::ReadError => "Read Error",
      Self::WriteError => "Write Error",
      Self::NotFound => "Not Found",
      Self::CorruptToc => "Corrupt Toc",
      Self::UnknownChunkId => "Unknown ChunkID",
      Self::InvalidParameter => "Invalid Parameter",
      Self::SignatureError => "Signature Error",
      Self::InvalidEncryptionKey => "Invalid Encryption Key",
      Self::DecompressionError => "Decompression Error",
    }
  }
}

impl Display for Code {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.write_str(self.as_str())
  }
}

/// Error with status code / 带状态码的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {msg}")]
pub struct Error {
  pub code: Code,
  pub msg: Box<str>,
}

impl Error {
  #[inline]
  pub fn new(code: Code, msg: impl Into<Box<str>>) -> Self {
    Self {
      code,
      msg: msg.into(),
    }
  }

  #[inline(always)]
  pub fn code(&self) -> Code {
    self.code
  }

  #[inline]
  pub fn corrupt_toc(msg: impl Into<Box<str>>) -> Self {
    Self::new(Code::CorruptToc, msg)
  }

  #[inline]
  pub fn invalid_param(msg: impl Into<Box<str>>) -> Self {
    Self::new(Code::InvalidParameter, msg)
  }

  #[inline]
  pub fn read(e: std::io::Error) -> Self {
    Self::new(Code::ReadError, e.to_string())
  }

  #[inline]
  pub fn write(e: std::io::Error) -> Self {
    Self::new(Code::WriteError, e.to_string())
  }

  /// Open failure, `NotFound` kept distinct / 打开失败，区分 `NotFound`
  #[inline]
  pub fn open(e: std::io::Error) -> Self {
    let code = if e.kind() == std::io::ErrorKind::NotFound {
      Code::NotFound
    } else {
      Code::FileOpenFailed
    };
    Self::new(code, e.to_string())
  }
}

impl From<Code> for Error {
  #[inline]
  fn from(code: Code) -> Self {
    Self::new(code, "")
  }
}

pub type Result<T> = std::result::Result<T, Error>;
