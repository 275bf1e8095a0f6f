//! # POSIX 线程接口模块
//!
//! ## Overview
//! 以 POSIX 的形式对外提供线程与同步服务，风格与系统调用层一致：
//! 每个接口返回整数，0 表示成功，否则为 `Errno` 对应的错误码。
//!
//! - `thread`：线程属性、创建、join、detach、`sched_*`
//! - `sync`：互斥锁、条件变量、一次性初始化
//! - `time`：单调时钟
//!
//! ## Assumptions
//! - 除属性对象操作外，所有接口只能在内核线程中调用

mod sync;
mod thread;
mod time;

/// 线程句柄
pub type PthreadT = crate::task::Tid;

pub use self::sync::*;
pub use self::thread::*;
pub use self::time::*;
