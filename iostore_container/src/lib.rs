#![cfg_attr(docsrs, feature(doc_cfg))]

//! Build chunk containers and read them back synchronously
//! 构建块容器并同步读回
//!
//! A container at base path `b` is `b.utoc` plus partitions `b.ucas`,
//! `b_s1.ucas`, `b_s2.ucas` ...
//! 基础路径 `b` 的容器由 `b.utoc` 与分区 `b.ucas`、`b_s1.ucas`、`b_s2.ucas` … 组成

mod path;
mod reader;
mod writer;

pub use path::{partition_path, toc_path};
pub use reader::IoStoreReader;
pub use writer::{IoStoreWriter, WriterResult};
