use std::{path::Path, sync::Arc};

use aok::{OK, Void};
use iostore_base::{AesKey, ChunkId, ChunkType, Code, Guid};
use iostore_compress::Codec;
use iostore_container::{IoStoreReader, IoStoreWriter, partition_path, toc_path};
use iostore_toc::{ContainerFlags, ContainerSettings, KeyedSha1, MetaFlags, WriterSettings};
use log::info;

#[static_init::constructor(0)]
extern "C" fn _log_init() {
  log_init::init();
}

fn id(n: u64) -> ChunkId {
  ChunkId::new(n, 0, ChunkType::BulkData)
}

/// Deterministic bytes, half repetitive so it compresses
/// 确定性数据，一半重复以便可压缩
fn data(seed: u64, len: usize) -> Vec<u8> {
  let mut x = seed.wrapping_mul(0x9e37_79b9_7f4a_7c15) | 1;
  (0..len)
    .map(|i| {
      if (i / 512) % 2 == 0 {
        (i % 7) as u8
      } else {
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        x as u8
      }
    })
    .collect()
}

fn small_blocks() -> WriterSettings {
  WriterSettings {
    compression_block_size: 1024,
    ..Default::default()
  }
}

fn build(
  base: &Path,
  container: ContainerSettings,
  settings: WriterSettings,
  chunks: &[(u64, usize)],
) -> Void {
  let mut w = IoStoreWriter::new(base, container, settings)?;
  for &(n, len) in chunks {
    w.append(id(n), &data(n, len), Some(&format!("/game/c/{n}.bin")))?;
  }
  let r = w.finish()?;
  info!("{r:?}");
  OK
}

fn check_all(r: &IoStoreReader, chunks: &[(u64, usize)]) -> Void {
  for &(n, len) in chunks {
    assert_eq!(r.read(&id(n), 0, None)?, data(n, len), "chunk {n}");
  }
  OK
}

const CHUNKS: &[(u64, usize)] = &[(1, 4096), (2, 1), (3, 3000), (4, 0), (5, 10_000)];

#[test]
fn test_plain_roundtrip() -> Void {
  let dir = tempfile::tempdir()?;
  let base = dir.path().join("plain");
  build(&base, ContainerSettings::new("plain"), small_blocks(), CHUNKS)?;
  assert!(toc_path(&base).exists());
  assert!(partition_path(&base, 0).exists());

  let r = IoStoreReader::open(&base, None)?;
  assert_eq!(r.container_id(), ContainerSettings::new("plain").container_id);
  assert_eq!(r.chunk_ids().len(), CHUNKS.len());
  check_all(&r, CHUNKS)?;

  let info = r.chunk_info(&id(5)).unwrap();
  assert_eq!(info.size, 10_000);
  assert_eq!(info.block_count, 10);
  assert_eq!(info.compressed_size, 10_000);
  OK
}

#[test]
fn test_range_reads() -> Void {
  let dir = tempfile::tempdir()?;
  let base = dir.path().join("range");
  build(&base, ContainerSettings::new("range"), small_blocks(), CHUNKS)?;
  let r = IoStoreReader::open(&base, None)?;
  let full = data(5, 10_000);

  assert_eq!(r.read(&id(5), 1000, Some(50))?, &full[1000..1050]);
  assert_eq!(r.read(&id(5), 1020, Some(2000))?, &full[1020..3020]);
  assert_eq!(r.read(&id(5), 9_999, None)?, &full[9_999..]);
  assert_eq!(r.read(&id(5), 9_000, Some(5_000))?, &full[9_000..]);
  assert!(r.read(&id(5), 10_000, None)?.is_empty());
  assert_eq!(
    r.read(&id(5), 10_001, None).unwrap_err().code(),
    Code::InvalidParameter
  );
  assert_eq!(
    r.read(&id(99), 0, None).unwrap_err().code(),
    Code::UnknownChunkId
  );
  OK
}

#[test]
fn test_compressed() -> Void {
  for codec in [Codec::Lz4, Codec::Zstd] {
    let dir = tempfile::tempdir()?;
    let base = dir.path().join("z");
    let settings = WriterSettings {
      compression: codec,
      ..small_blocks()
    };
    build(&base, ContainerSettings::new("z"), settings, CHUNKS)?;
    let r = IoStoreReader::open(&base, None)?;
    assert!(r.toc().header.container_flags.contains(ContainerFlags::COMPRESSED));
    assert_eq!(r.toc().compression_methods, [codec]);
    check_all(&r, CHUNKS)?;

    let info = r.chunk_info(&id(5)).unwrap();
    assert!(info.flags.contains(MetaFlags::COMPRESSED));
    assert!(info.compressed_size < info.size);
    assert_eq!(
      r.read(&id(3), 700, Some(900))?,
      &data(3, 3000)[700..1600]
    );
  }
  OK
}

#[test]
fn test_encrypted() -> Void {
  let dir = tempfile::tempdir()?;
  let base = dir.path().join("enc");
  let key = AesKey::new(&[3u8; 32]);
  let container =
    ContainerSettings::new("enc").encrypt(Guid::new(1, 2, 3, 4), key.clone());
  let settings = WriterSettings {
    compression: Codec::Lz4,
    ..small_blocks()
  };
  build(&base, container, settings, CHUNKS)?;

  let r = IoStoreReader::open(&base, Some(key))?;
  assert_eq!(r.toc().header.encryption_key_guid, Guid::new(1, 2, 3, 4));
  check_all(&r, CHUNKS)?;
  assert_eq!(r.files().len(), CHUNKS.len());

  assert_eq!(
    IoStoreReader::open(&base, None).err().map(|e| e.code()),
    Some(Code::InvalidEncryptionKey)
  );
  OK
}

#[test]
fn test_signed_detects_tamper() -> Void {
  let dir = tempfile::tempdir()?;
  let base = dir.path().join("signed");
  let signer = Arc::new(KeyedSha1::new("secret"));
  let container = ContainerSettings::new("signed").sign(signer.clone());
  build(&base, container, small_blocks(), CHUNKS)?;

  let r = IoStoreReader::open(&base, None)?;
  r.verify(signer.as_ref())?;
  check_all(&r, CHUNKS)?;
  assert_eq!(
    r.verify(&KeyedSha1::new("other")).unwrap_err().code(),
    Code::SignatureError
  );
  drop(r);

  let cas = partition_path(&base, 0);
  let mut bytes = std::fs::read(&cas)?;
  bytes[10] ^= 0xff;
  std::fs::write(&cas, bytes)?;
  let r = IoStoreReader::open(&base, None)?;
  assert_eq!(
    r.read(&id(1), 0, None).unwrap_err().code(),
    Code::SignatureError
  );
  assert_eq!(r.read(&id(3), 0, None)?, data(3, 3000));
  OK
}

#[test]
fn test_partitions() -> Void {
  let dir = tempfile::tempdir()?;
  let base = dir.path().join("part");
  let settings = WriterSettings {
    max_partition_size: 4096,
    ..small_blocks()
  };
  let mut w = IoStoreWriter::new(&base, ContainerSettings::new("part"), settings)?;
  for &(n, len) in CHUNKS {
    w.append(id(n), &data(n, len), None)?;
  }
  let res = w.finish()?;
  info!("{res:?}");
  assert!(res.partition_sizes.len() > 1);
  assert!(res.partition_sizes.iter().all(|&s| s <= 4096));
  for i in 0..res.partition_sizes.len() as u32 {
    assert!(partition_path(&base, i).exists());
  }

  let r = IoStoreReader::open(&base, None)?;
  assert_eq!(
    r.toc().header.partition_count as usize,
    res.partition_sizes.len()
  );
  check_all(&r, CHUNKS)?;
  assert!(r.chunk_info(&id(5)).unwrap().partition_index > 0);
  OK
}

#[test]
fn test_directory_files() -> Void {
  let dir = tempfile::tempdir()?;
  let base = dir.path().join("dir");
  build(&base, ContainerSettings::new("dir"), small_blocks(), CHUNKS)?;
  let r = IoStoreReader::open(&base, None)?;
  assert_eq!(r.directory_index().mount_point(), "/game/c/");
  let mut files = r.files();
  files.sort();
  for (path, index) in files {
    let n = r.chunk_ids()[index as usize].id();
    assert_eq!(path, format!("/game/c/{n}.bin"));
  }
  OK
}

#[test]
fn test_writer_rejects() -> Void {
  let dir = tempfile::tempdir()?;
  let base = dir.path().join("bad");
  let mut w = IoStoreWriter::new(&base, ContainerSettings::new("bad"), small_blocks())?;
  w.append(id(1), b"x", None)?;
  assert_eq!(
    w.append(id(1), b"y", None).unwrap_err().code(),
    Code::InvalidParameter
  );
  assert_eq!(
    w.append(ChunkId::INVALID, b"y", None).unwrap_err().code(),
    Code::InvalidParameter
  );

  let zero = WriterSettings {
    compression_block_size: 0,
    ..Default::default()
  };
  assert!(IoStoreWriter::new(dir.path().join("z"), ContainerSettings::new("z"), zero).is_err());

  let mut enc = ContainerSettings::new("e");
  enc.flags |= ContainerFlags::ENCRYPTED;
  assert_eq!(
    IoStoreWriter::new(dir.path().join("e"), enc, small_blocks())
      .err()
      .map(|e| e.code()),
    Some(Code::InvalidEncryptionKey)
  );
  OK
}

#[test]
fn test_missing_container() {
  let dir = tempfile::tempdir().unwrap();
  assert_eq!(
    IoStoreReader::open(dir.path().join("none"), None)
      .err()
      .map(|e| e.code()),
    Some(Code::NotFound)
  );
}

#[test]
fn test_failed_append_leaves_no_trace() -> Void {
  let dir = tempfile::tempdir()?;
  let base = dir.path().join("failed");
  let settings = WriterSettings {
    compression_block_size: 1024,
    compression: Codec::Lz4,
    max_partition_size: 700,
    ..Default::default()
  };
  let mut w = IoStoreWriter::new(&base, ContainerSettings::new("failed"), settings)?;
  w.append(id(1), &data(1, 600), Some("/game/1.bin"))?;

  // First block compresses, the second cannot fit any partition
  // 第一块可压缩，第二块放不进任何分区
  let mut x = 0x2545_f491_4f6c_dd1du64;
  let mut bad = vec![0u8; 1024];
  bad.extend((0..1024).map(|_| {
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x as u8
  }));
  let err = w.append(id(2), &bad, Some("/game/2.bin")).unwrap_err();
  assert_eq!(err.code(), Code::InvalidParameter);

  w.append(id(2), &data(2, 600), Some("/game/2.bin"))?;
  w.append(id(3), &data(3, 300), None)?;
  let res = w.finish()?;
  assert_eq!(res.entry_count, 3);

  let r = IoStoreReader::open(&base, None)?;
  assert_eq!(r.chunk_ids(), &[id(1), id(2), id(3)]);
  check_all(&r, &[(1, 600), (2, 600), (3, 300)])?;
  let mut files = r.files();
  files.sort();
  assert_eq!(
    files,
    vec![("/game/1.bin".to_owned(), 0), ("/game/2.bin".to_owned(), 1)]
  );
  OK
}
