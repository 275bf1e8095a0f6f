//! # 线程同步原语模块（sync）
//!
//! ## Overview
//! 本模块是同步层的统一入口：
//! - `mutex`：可选递归的阻塞型互斥锁
//! - `condvar`：条件变量，支持带绝对超时的等待
//! - `once`：一次性初始化
//! - `list`：等待队列与睡眠链表共用的侵入式链表
//! - `up`：只能在关中断期间访问的内部可变性封装
//!
//! ## Assumptions
//! - 单核，关中断是唯一的互斥手段，且不可嵌套
//! - 等待路径上不做堆分配：等待节点都分配在阻塞调用的栈上
//!
//! ## Invariants
//! - 在阻塞当前线程前，内部状态与等待队列必然已经更新
//! - 被加入等待队列的线程一定处于不可运行状态
//!
//! ## Behavior
//! - 唤醒决策在临界区内完成，线程切换推迟到离开临界区之后

mod condvar;
pub(crate) mod list;
mod mutex;
mod once;
mod up;

pub use condvar::Condvar;
pub use mutex::{Mutex, MutexKind};
pub use once::{Once, OnceState};
pub use up::IrqCell;
