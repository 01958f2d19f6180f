use aok::{OK, Void};
use iostore_compress::{Codec, Error, dec, dec_into, enc};
use log::info;

#[static_init::constructor(0)]
extern "C" fn _log_init() {
  log_init::init();
}

#[test]
fn test_none_codec() -> Void {
  let data = b"hello world";
  let compressed = enc(Codec::None, data)?;
  assert_eq!(compressed, data);
  assert_eq!(dec(Codec::None, &compressed, data.len())?, data);
  OK
}

#[test]
fn test_roundtrip() -> Void {
  let data = b"hello world hello world hello world hello world";
  for codec in [Codec::Lz4, Codec::Zstd] {
    let compressed = enc(codec, data)?;
    info!("{codec:?} {} -> {}", data.len(), compressed.len());
    assert!(compressed.len() < data.len(), "{codec:?} did not shrink");
    assert_eq!(dec(codec, &compressed, data.len())?, data);
  }
  OK
}

#[test]
fn test_large_block() -> Void {
  let data: Vec<u8> = (0..65536u32).map(|i| (i % 251) as u8).collect();
  for codec in [Codec::None, Codec::Lz4, Codec::Zstd] {
    let compressed = enc(codec, &data)?;
    let mut out = vec![0u8; data.len()];
    dec_into(codec, &compressed, &mut out)?;
    assert_eq!(out, data, "failed for {codec:?}");
  }
  OK
}

#[test]
fn test_wrong_size_rejected() -> Void {
  let data = vec![7u8; 1000];
  for codec in [Codec::None, Codec::Lz4, Codec::Zstd] {
    let compressed = enc(codec, &data)?;
    let mut short = vec![0u8; 2000];
    assert!(dec_into(codec, &compressed, &mut short).is_err(), "{codec:?}");
  }
  OK
}

#[test]
fn test_garbage_lz4() {
  let mut out = vec![0u8; 64];
  let err = dec_into(Codec::Lz4, &[0xff, 0xff, 0xff], &mut out).unwrap_err();
  let base: iostore_base::Error = err.into();
  assert_eq!(base.code(), iostore_base::Code::DecompressionError);
}

#[test]
fn test_names() -> Void {
  assert_eq!(Codec::from_name("lz4")?, Codec::Lz4);
  assert_eq!(Codec::from_name("ZSTD")?, Codec::Zstd);
  assert_eq!(Codec::from_name(Codec::None.name())?, Codec::None);
  assert!(matches!(
    Codec::from_name("Oodle"),
    Err(Error::UnknownMethod(_))
  ));
  OK
}
