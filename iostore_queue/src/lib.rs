#![cfg_attr(docsrs, feature(doc_cfg))]

//! Read scheduling primitives / 读调度原语
//!
//! - [`RequestQueue`]: higher priority first, FIFO among equals
//!   高优先级优先，同级先进先出
//! - [`RequestTracker`]: one live entry per key / 每键仅一个在途条目

mod queue;
mod tracker;

pub use queue::{Queued, RequestQueue};
pub use tracker::RequestTracker;
