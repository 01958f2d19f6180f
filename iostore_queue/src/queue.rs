use std::{cmp::Ordering, collections::BinaryHeap};

use parking_lot::Mutex;

/// Item whose priority may change while queued
/// 入队后优先级可变的条目
pub trait Queued {
  fn priority(&self) -> i32;
}

impl<T: Queued + ?Sized> Queued for std::sync::Arc<T> {
  #[inline]
  fn priority(&self) -> i32 {
    (**self).priority()
  }
}

struct Entry<T> {
  priority: i32,
  seq: u64,
  item: T,
}

impl<T> PartialEq for Entry<T> {
  fn eq(&self, other: &Self) -> bool {
    self.priority == other.priority && self.seq == other.seq
  }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl<T> Ord for Entry<T> {
  // Max-heap: larger priority, then smaller seq / 大顶堆：优先级大者、序号小者在前
  fn cmp(&self, other: &Self) -> Ordering {
    self
      .priority
      .cmp(&other.priority)
      .then_with(|| other.seq.cmp(&self.seq))
  }
}

struct Heap<T> {
  heap: BinaryHeap<Entry<T>>,
  seq: u64,
}

pub struct RequestQueue<T> {
  inner: Mutex<Heap<T>>,
}

impl<T: Queued> Default for RequestQueue<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Queued> RequestQueue<T> {
  pub fn new() -> Self {
    Self {
      inner: Mutex::new(Heap {
        heap: BinaryHeap::new(),
        seq: 0,
      }),
    }
  }

  /// Enqueue, returns the sequence number / 入队，返回序号
  pub fn push(&self, item: T) -> u64 {
    let mut h = self.inner.lock();
    let seq = h.seq;
    h.seq += 1;
    h.heap.push(Entry {
      priority: item.priority(),
      seq,
      item,
    });
    seq
  }

  pub fn push_all(&self, items: impl IntoIterator<Item = T>) {
    let mut h = self.inner.lock();
    for item in items {
      let seq = h.seq;
      h.seq += 1;
      h.heap.push(Entry {
        priority: item.priority(),
        seq,
        item,
      });
    }
  }

  pub fn pop(&self) -> Option<T> {
    self.inner.lock().heap.pop().map(|e| e.item)
  }

  pub fn peek(&self) -> Option<T>
  where
    T: Clone,
  {
    self.inner.lock().heap.peek().map(|e| e.item.clone())
  }

  /// Re-read every queued priority and rebuild the heap, sequence kept
  /// 重新读取已入队条目的优先级并重建堆，保留序号
  pub fn update_order(&self) {
    let mut h = self.inner.lock();
    let mut entries = std::mem::take(&mut h.heap).into_vec();
    for e in &mut entries {
      e.priority = e.item.priority();
    }
    h.heap = BinaryHeap::from(entries);
  }

  pub fn len(&self) -> usize {
    self.inner.lock().heap.len()
  }

  pub fn is_empty(&self) -> bool {
    self.inner.lock().heap.is_empty()
  }
}
