//! # upthread
//!
//! 单核实时内核的 POSIX 线程同步层：可递归的互斥锁、支持超时的条件变量、
//! 一次性初始化，以及它们所依赖的线程调度服务。
//!
//! 内核在宿主机上以模拟单核的方式运行：每个内核线程由一个 OS 线程承载，
//! 但同一时刻只有一个在执行；时钟是内核实例自己的虚拟单调时钟。
//!
//! ```no_run
//! use upthread::sync::{Condvar, Mutex, MutexKind};
//! use upthread::task;
//!
//! static M: Mutex = Mutex::new(MutexKind::Default);
//! static C: Condvar = Condvar::new();
//!
//! let value = task::boot(|| {
//!     M.lock();
//!     let deadline = task::now() + 1_000_000;
//!     let timed_out = C.wait_until(&M, deadline).is_err();
//!     M.unlock().unwrap();
//!     timed_out as usize
//! });
//! assert_eq!(value, Ok(1));
//! ```

#![warn(unsafe_op_in_unsafe_fn)]

pub mod config;
pub mod console;
pub mod errno;
pub mod hal;
pub mod posix;
pub mod sync;
pub mod task;
pub mod timer;

pub use errno::Errno;
