//! # 线程控制块模块
//!
//! ## Overview
//! 定义内核线程控制块 `Thread` 及其状态：
//! - `ThreadFlags`：阻塞原因等标志位，任何阻塞标志置位时线程不可运行
//! - `ThreadStatus`：线程在调度器中的位置（就绪队列 / CPU / 阻塞 / 已退出）
//! - `Priority`：内核优先级，0 为最高
//!
//! ## Invariants
//! - `status == Ready` ⇔ 线程位于就绪队列中
//! - `status == Running` ⇔ 线程是所属内核的当前线程
//! - 线程退出后 `exit_value` 保存返回值，直到被 join 取走

use super::context::ThreadContext;
use super::kernel::Kernel;
use super::tid::TidHandle;
use crate::config::{MAIN_PRIORITY, PRIORITY_MAX};
use crate::sync::IrqCell;
use bitflags::bitflags;
use std::sync::Arc;

/// 线程 ID
pub type Tid = usize;

bitflags! {
    /// 线程标志位
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ThreadFlags: u32 {
        /// 等待互斥锁
        const WAIT = 1 << 0;
        /// 位于睡眠链表中
        const SLEEP = 1 << 1;
        /// 等待条件变量
        const COND_WAIT = 1 << 2;
        /// 等待其它线程退出
        const WAIT_JOIN = 1 << 3;
        /// 已分离，退出后立即回收
        const DETACHED = 1 << 4;
        /// 已退出
        const EXITED = 1 << 5;
        /// 所有阻塞原因
        const BLOCKING = Self::WAIT.bits()
            | Self::SLEEP.bits()
            | Self::COND_WAIT.bits()
            | Self::WAIT_JOIN.bits();
    }
}

/// 线程调度状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    Ready,
    Running,
    Blocked,
    Exited,
}

/// 内核优先级，数值越小优先级越高
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u8);

impl Priority {
    pub const HIGHEST: Priority = Priority(0);
    pub const LOWEST: Priority = Priority((PRIORITY_MAX - 1) as u8);
    pub const MAIN: Priority = Priority(MAIN_PRIORITY);

    /// 超出范围时返回 `None`
    pub fn new(level: u8) -> Option<Self> {
        ((level as usize) < PRIORITY_MAX).then_some(Priority(level))
    }

    pub fn level(self) -> u8 {
        self.0
    }

    /// 是否比 `other` 优先级更高
    pub fn outranks(self, other: Priority) -> bool {
        self.0 < other.0
    }

    /// 由 POSIX 优先级（升序，0 最低）得到内核优先级，越界值被截断
    pub fn from_posix(prio: i32) -> Self {
        let top = (PRIORITY_MAX - 1) as i32;
        Priority((top - prio.clamp(0, top)) as u8)
    }

    /// 转换回 POSIX 优先级
    pub fn to_posix(self) -> i32 {
        (PRIORITY_MAX - 1) as i32 - self.0 as i32
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::MAIN
    }
}

/// 创建线程时的参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadOptions {
    pub priority: Priority,
    pub stack_size: usize,
    pub detached: bool,
}

impl Default for ThreadOptions {
    fn default() -> Self {
        Self {
            priority: Priority::MAIN,
            stack_size: crate::config::STACK_DEFAULT_FOR_PTHREAD,
            detached: false,
        }
    }
}

/// 线程控制块
pub struct Thread {
    tid: TidHandle,
    priority: Priority,
    stack_size: usize,
    pub(crate) kernel: Arc<Kernel>,
    pub(crate) context: ThreadContext,
    pub(crate) inner: IrqCell<ThreadInner>,
}

/// 线程控制块中可变的部分，只能在临界区内访问
pub(crate) struct ThreadInner {
    pub flags: ThreadFlags,
    pub status: ThreadStatus,
    pub exit_value: Option<usize>,
    /// 正在 join 本线程的线程
    pub joiner: Option<Arc<Thread>>,
}

impl ThreadInner {
    /// 没有任何阻塞原因且尚未退出
    pub fn is_runnable(&self) -> bool {
        !self.flags.intersects(ThreadFlags::BLOCKING) && !self.flags.contains(ThreadFlags::EXITED)
    }
}

impl Thread {
    pub(crate) fn new(
        tid: TidHandle,
        options: ThreadOptions,
        kernel: Arc<Kernel>,
        context: ThreadContext,
    ) -> Self {
        let mut flags = ThreadFlags::empty();
        if options.detached {
            flags.insert(ThreadFlags::DETACHED);
        }
        Self {
            tid,
            priority: options.priority,
            stack_size: options.stack_size,
            kernel,
            context,
            inner: IrqCell::new(ThreadInner {
                flags,
                status: ThreadStatus::Blocked,
                exit_value: None,
                joiner: None,
            }),
        }
    }

    pub fn tid(&self) -> Tid {
        self.tid.0
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// 当前标志位的快照
    pub fn flags(&self) -> ThreadFlags {
        self.inner.exclusive_session(|inner| inner.flags)
    }

    pub fn status(&self) -> ThreadStatus {
        self.inner.exclusive_session(|inner| inner.status)
    }

    pub fn is_detached(&self) -> bool {
        self.flags().contains(ThreadFlags::DETACHED)
    }
}

impl core::fmt::Debug for Thread {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Thread")
            .field("tid", &self.tid())
            .field("priority", &self.priority)
            .finish()
    }
}
