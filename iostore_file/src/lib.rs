#![cfg_attr(docsrs, feature(doc_cfg))]

//! Asynchronous read engine over mounted chunk containers
//! 已挂载块容器之上的异步读取引擎
//!
//! Callers submit [`Request`]s, a worker thread reads aligned raw blocks
//! through a [`Platform`], decompression threads decode and scatter them, and
//! each request is handed to the [`Complete`] sink once.
//! 调用方提交 [`Request`]，工作线程通过 [`Platform`] 读取对齐的原始块，
//! 解压线程解码并分发，每个请求只交给 [`Complete`] 一次。

mod block;
mod conf;
pub mod consts;
mod decompress;
mod handles;
mod mount;
mod platform;
mod request;
mod store;
mod worker;

pub use conf::{Conf, ParsedConf};
pub use mount::Mounted;
pub use platform::{CompioPlatform, Platform};
pub use request::{Complete, Request, State};
pub use store::FileIoStore;
pub use compio::buf::BufResult;
