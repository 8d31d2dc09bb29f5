//! 面向运行时的引擎封装
#[cfg(feature = "async-engine")]
mod async_;

#[cfg(feature = "async-engine")]
pub use async_::*;
