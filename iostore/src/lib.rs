#![cfg_attr(docsrs, feature(doc_cfg))]

//! Mount chunk containers and read chunks in prioritized batches
//! 挂载块容器并按优先级批量读取块
//!
//! ```ignore
//! let d = IoDispatcher::new(&[])?;
//! d.mount(IoStoreEnvironment::new("pak/base"), Guid::default(), None)?;
//! let mut batch = d.new_batch();
//! let req = batch.read(&chunk, ReadOptions::default(), 0);
//! batch.issue();
//! let data = req.wait()?;
//! ```

mod batch;
mod dispatcher;
mod env;
mod event;
mod request;

pub use batch::IoBatch;
pub use dispatcher::IoDispatcher;
pub use env::IoStoreEnvironment;
pub use event::{IoEvent, Task, TaskEvent};
pub use iostore_file::{CompioPlatform, Conf, Platform};
pub use request::{IoRequest, ReadOptions};
