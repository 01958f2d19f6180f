use iostore_cache::{BlockCache, key};

#[static_init::constructor(0)]
extern "C" fn _log_init() {
  log_init::init();
}

fn block(v: u8) -> [u8; 8] {
  [v; 8]
}

#[test]
fn test_key_layout() {
  assert_eq!(key(1, 2), 0x1_0000_0002);
  assert_eq!(key(u32::MAX, 0), 0xffff_ffff_0000_0000);
}

#[test]
fn test_evicts_least_recent() {
  let cache = BlockCache::new(3);
  for k in 0..3 {
    assert!(cache.store(k, &block(k as u8)));
  }
  assert!(cache.store(3, &block(3)));
  assert_eq!(cache.len(), 3);

  let mut dst = [0u8; 8];
  assert!(!cache.read(0, &mut dst));
  for k in 1..4 {
    assert!(cache.read(k, &mut dst));
    assert_eq!(dst, block(k as u8));
  }
}

#[test]
fn test_read_promotes() {
  let cache = BlockCache::new(2);
  cache.store(1, &block(1));
  cache.store(2, &block(2));
  let mut dst = [0u8; 8];
  assert!(cache.read(1, &mut dst));
  cache.store(3, &block(3));
  assert!(cache.read(1, &mut dst));
  assert!(!cache.read(2, &mut dst));
}

#[test]
fn test_locked_is_miss() {
  let cache = BlockCache::new(2);
  assert!(cache.lock(7));
  assert!(!cache.lock(7));
  let mut dst = [0u8; 8];
  assert!(!cache.read(7, &mut dst));
  assert!(cache.store(7, &block(7)));
  assert!(cache.read(7, &mut dst));
  assert_eq!(dst, block(7));
}

#[test]
fn test_locked_tail_blocks_store() {
  let cache = BlockCache::new(2);
  assert!(cache.lock(1));
  assert!(cache.lock(2));
  assert!(!cache.store(3, &block(3)));
  assert!(!cache.lock(3));
  cache.unlock(1);
  assert_eq!(cache.len(), 1);
  assert!(cache.store(3, &block(3)));
}

#[test]
fn test_size_mismatch_is_miss() {
  let cache = BlockCache::new(1);
  cache.store(1, &block(1));
  let mut short = [0u8; 4];
  assert!(!cache.read(1, &mut short));
}

#[test]
fn test_disabled() {
  let cache = BlockCache::new(0);
  assert!(!cache.lock(1));
  assert!(!cache.store(1, &block(1)));
  assert!(cache.is_empty());
  assert_eq!(cache.cap(), 0);
}

mod lru_prop {
  use iostore_cache::BlockCache;
  use proptest::prelude::*;

  proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Storing cap + 1 keys after a promoting read drops exactly the oldest
    /// 提升读后存入 cap + 1 个键，恰好淘汰最旧的一个
    #[test]
    fn prop_lru_victim(cap in 1usize..16, touch in 0usize..16) {
      let touch = (touch % cap) as u64;
      let cache = BlockCache::new(cap);
      for k in 0..cap as u64 {
        cache.store(k, &[k as u8]);
      }
      let mut dst = [0u8; 1];
      prop_assert!(cache.read(touch, &mut dst));
      cache.store(1000, &[0]);

      let victim = if cap == 1 { touch } else if touch == 0 { 1 } else { 0 };
      for k in 0..cap as u64 {
        prop_assert_eq!(cache.read(k, &mut dst), k != victim);
      }
      prop_assert!(cache.read(1000, &mut dst));
    }
  }
}
