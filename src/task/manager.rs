//! # 线程管理器（调度器状态）模块
//!
//! ## Overview
//! `ThreadManager` 是每个内核实例的调度状态，包括：
//! - 每个优先级一条 FIFO 就绪队列
//! - 当前正在运行的线程
//! - 睡眠链表与虚拟单调时钟
//! - tid → 线程控制块的注册表（用于 join / detach / exists）
//!
//! 所有方法都要求调用者出示中断屏蔽守卫，这也是唤醒决策必须在
//! 临界区内完成的体现。
//!
//! ## Invariants
//! - 就绪队列中的线程状态一定为 `Ready`
//! - 正在运行的线程不在就绪队列中
//! - 时钟单调不减，到达 `i64::MAX` 后停在该值
//!
//! ## Behavior
//! - 选择下一个线程前，先唤醒所有到期的睡眠线程
//! - 没有可运行线程但存在睡眠线程时，时钟直接跳到最早的唤醒时间（空闲）
//! - 两者都没有时，调度器返回 `None`，由内核停机

use super::sleep::SleepingList;
use super::thread::{Priority, Thread, ThreadFlags, ThreadStatus, Tid};
use crate::config::PRIORITY_MAX;
use crate::hal::InterruptDisableLock;
use log::trace;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

/// 内核停机原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Halt {
    /// 所有线程都已退出
    Idle,
    /// 仍有线程阻塞，但没有线程可以唤醒它们
    Deadlock(Vec<Tid>),
    Panicked { tid: Tid, message: String },
}

pub(crate) struct ThreadManager {
    ready_queues: [VecDeque<Arc<Thread>>; PRIORITY_MAX],
    pub current: Option<Arc<Thread>>,
    pub sleeping: SleepingList,
    pub threads: BTreeMap<Tid, Arc<Thread>>,
    /// 虚拟单调时钟（纳秒）
    pub clock_ns: i64,
    pub main: Option<Tid>,
    pub main_exit: Option<usize>,
    pub halt: Option<Halt>,
}

impl ThreadManager {
    pub fn new() -> Self {
        Self {
            ready_queues: core::array::from_fn(|_| VecDeque::new()),
            current: None,
            sleeping: SleepingList::new(),
            threads: BTreeMap::new(),
            clock_ns: 0,
            main: None,
            main_exit: None,
            halt: None,
        }
    }

    /// 将线程加入其优先级的就绪队列尾部，状态由调用者设置
    pub fn add(&mut self, thread: Arc<Thread>) {
        let level = thread.priority().level() as usize;
        self.ready_queues[level].push_back(thread);
    }

    /// 取出优先级最高的就绪线程
    pub fn fetch(&mut self) -> Option<Arc<Thread>> {
        self.ready_queues
            .iter_mut()
            .find_map(|queue| queue.pop_front())
    }

    /// 是否存在优先级高于 `priority` 的就绪线程
    pub fn has_ready_above(&self, priority: Priority) -> bool {
        self.ready_queues[..priority.level() as usize]
            .iter()
            .any(|queue| !queue.is_empty())
    }

    /// 清除线程的 `clear` 标志，若因此变为可运行则放入就绪队列
    ///
    /// ## Returns
    /// - `true`：线程从阻塞变为就绪
    pub fn wakeup(
        &mut self,
        lock: &InterruptDisableLock,
        thread: &Arc<Thread>,
        clear: ThreadFlags,
    ) -> bool {
        let mut inner = thread.inner.borrow_mut(lock);
        inner.flags.remove(clear);
        if inner.status != ThreadStatus::Blocked || !inner.is_runnable() {
            return false;
        }
        inner.status = ThreadStatus::Ready;
        drop(inner);
        trace!("thread {} woken ({:?})", thread.tid(), clear);
        self.add(Arc::clone(thread));
        true
    }

    /// 唤醒所有到期的睡眠线程
    pub fn wake_expired(&mut self, lock: &InterruptDisableLock) {
        while let Some(thread) = self.sleeping.pop_expired(self.clock_ns) {
            self.wakeup(lock, &thread, ThreadFlags::SLEEP | ThreadFlags::COND_WAIT);
        }
    }

    /// 选择下一个要运行的线程
    pub fn find_next_thread(&mut self, lock: &InterruptDisableLock) -> Option<Arc<Thread>> {
        loop {
            self.wake_expired(lock);
            if let Some(thread) = self.fetch() {
                return Some(thread);
            }
            let next = self.sleeping.next_wakeup()?;
            trace!("idle until {} ns", next);
            self.clock_ns = self.clock_ns.max(next);
        }
    }

    /// 将 CPU 交给 `next`，真正的唤醒在离开临界区之后进行
    pub fn dispatch(&mut self, lock: &InterruptDisableLock, next: Arc<Thread>) {
        next.inner.borrow_mut(lock).status = ThreadStatus::Running;
        next.context.switch_in();
        self.current = Some(next);
    }

    /// 没有线程可以运行时的停机原因
    pub fn halt_reason(&self, lock: &InterruptDisableLock) -> Halt {
        let blocked: Vec<Tid> = self
            .threads
            .values()
            .filter(|thread| thread.inner.borrow(lock).status != ThreadStatus::Exited)
            .map(|thread| thread.tid())
            .collect();
        if blocked.is_empty() {
            Halt::Idle
        } else {
            Halt::Deadlock(blocked)
        }
    }
}
