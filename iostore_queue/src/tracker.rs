use std::{collections::HashMap, hash::Hash, sync::Arc};

use parking_lot::Mutex;

/// Registry of in-flight work, one live entry per key. An entry is retired
/// with [`RequestTracker::remove`] when its work completes, which serves
/// every consumer attached to it; later arrivals create a fresh entry.
/// 在途工作登记表，每键仅一个存活条目。工作完成时以 [`RequestTracker::remove`]
/// 退役条目，此时所有附加者均已得到服务；之后到来者新建条目。
pub struct RequestTracker<K, V> {
  map: Mutex<HashMap<K, Arc<V>>>,
}

impl<K: Hash + Eq, V> Default for RequestTracker<K, V> {
  fn default() -> Self {
    Self::new()
  }
}

impl<K: Hash + Eq, V> RequestTracker<K, V> {
  pub fn new() -> Self {
    Self {
      map: Mutex::new(HashMap::new()),
    }
  }

  /// Attach to the live entry or create one, `true` when created
  /// 附加到已有条目或新建，新建时返回 `true`
  pub fn find_or_add(&self, key: K, make: impl FnOnce() -> V) -> (Arc<V>, bool) {
    let mut map = self.map.lock();
    match map.get(&key) {
      Some(v) => (v.clone(), false),
      None => {
        let val = Arc::new(make());
        map.insert(key, val.clone());
        (val, true)
      }
    }
  }

  /// Retire the entry of `key` / 退役 `key` 的条目
  pub fn remove(&self, key: &K) -> Option<Arc<V>> {
    self.map.lock().remove(key)
  }

  pub fn len(&self) -> usize {
    self.map.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.map.lock().is_empty()
  }
}
