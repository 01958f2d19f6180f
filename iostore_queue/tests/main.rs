use std::{
  sync::{
    Arc,
    atomic::{AtomicI32, AtomicUsize, Ordering},
  },
  thread,
};

use aok::{OK, Void};
use iostore_queue::{Queued, RequestQueue, RequestTracker};
use log::info;

#[static_init::constructor(0)]
extern "C" fn _log_init() {
  log_init::init();
}

#[derive(Debug)]
struct Read {
  name: &'static str,
  priority: AtomicI32,
}

impl Read {
  fn new(name: &'static str, priority: i32) -> Arc<Self> {
    Arc::new(Self {
      name,
      priority: AtomicI32::new(priority),
    })
  }
}

impl Queued for Read {
  fn priority(&self) -> i32 {
    self.priority.load(Ordering::Relaxed)
  }
}

fn drain(q: &RequestQueue<Arc<Read>>) -> Vec<&'static str> {
  std::iter::from_fn(|| q.pop()).map(|r| r.name).collect()
}

#[test]
fn test_fifo_among_equal() -> Void {
  let q = RequestQueue::new();
  for (name, p) in [("a", 5), ("b", 5), ("c", 3), ("d", 5)] {
    q.push(Read::new(name, p));
  }
  assert_eq!(q.len(), 4);
  assert_eq!(q.peek().map(|r| r.name), Some("a"));
  let order = drain(&q);
  info!("{order:?}");
  assert_eq!(order, ["a", "b", "d", "c"]);
  assert!(q.is_empty());
  OK
}

#[test]
fn test_update_order() -> Void {
  let q = RequestQueue::new();
  let low = Read::new("low", 1);
  q.push_all([Read::new("x", 4), low.clone(), Read::new("y", 4)]);

  // Raised without reorder keeps the old position / 未重排时保持旧位置
  low.priority.store(9, Ordering::Relaxed);
  assert_eq!(q.peek().map(|r| r.name), Some("x"));

  q.update_order();
  assert_eq!(drain(&q), ["low", "x", "y"]);
  OK
}

#[test]
fn test_update_keeps_fifo() -> Void {
  let q = RequestQueue::new();
  let a = Read::new("a", 1);
  let b = Read::new("b", 1);
  q.push(a.clone());
  q.push(b.clone());
  b.priority.store(2, Ordering::Relaxed);
  a.priority.store(2, Ordering::Relaxed);
  q.update_order();
  assert_eq!(drain(&q), ["a", "b"]);
  OK
}

#[test]
fn test_tracker_retire() {
  let t: RequestTracker<u64, String> = RequestTracker::new();
  let (v, created) = t.find_or_add(1, || "one".into());
  assert!(created);
  let (w, created) = t.find_or_add(1, || unreachable!());
  assert!(!created);
  assert!(Arc::ptr_eq(&v, &w));
  assert_eq!(t.len(), 1);

  assert_eq!(t.remove(&1).as_deref().map(String::as_str), Some("one"));
  assert!(t.is_empty());
  assert!(t.remove(&1).is_none());

  // A retired key starts over / 退役的键重新开始
  let (x, created) = t.find_or_add(1, || "again".into());
  assert!(created);
  assert!(!Arc::ptr_eq(&v, &x));
}

#[test]
fn test_tracker_one_creator() {
  let t = Arc::new(RequestTracker::<u64, usize>::new());
  let made = Arc::new(AtomicUsize::new(0));
  let handles: Vec<_> = (0..8)
    .map(|_| {
      let t = t.clone();
      let made = made.clone();
      thread::spawn(move || {
        for k in 0..100u64 {
          t.find_or_add(k, || made.fetch_add(1, Ordering::Relaxed));
        }
      })
    })
    .collect();
  for h in handles {
    h.join().unwrap();
  }
  assert_eq!(made.load(Ordering::Relaxed), 100);
  assert_eq!(t.len(), 100);
}

mod order_prop {
  use std::sync::{Arc, atomic::AtomicI32};

  use iostore_queue::RequestQueue;
  use proptest::prelude::*;

  use super::Read;

  proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Pop order is a stable sort by descending priority
    /// 出队顺序等于按优先级降序的稳定排序
    #[test]
    fn prop_stable_priority(prios in prop::collection::vec(-3i32..4, 0..64)) {
      let q = RequestQueue::new();
      let names: Vec<&'static str> = (0..prios.len())
        .map(|i| &*Box::leak(i.to_string().into_boxed_str()))
        .collect();
      for (name, p) in names.iter().zip(&prios) {
        q.push(Arc::new(Read { name: *name, priority: AtomicI32::new(*p) }));
      }
      let mut want: Vec<usize> = (0..prios.len()).collect();
      want.sort_by_key(|&i| std::cmp::Reverse(prios[i]));
      let got: Vec<&str> = std::iter::from_fn(|| q.pop()).map(|r| r.name).collect();
      let want: Vec<&str> = want.into_iter().map(|i| names[i]).collect();
      prop_assert_eq!(got, want);
    }
  }
}
