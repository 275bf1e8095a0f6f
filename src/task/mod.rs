//! # 线程与调度模块（task）
//!
//! ## Overview
//! 本模块实现同步原语所依赖的线程服务：
//! - 线程的创建、join、detach 与查询
//! - 优先级调度：每个优先级一条 FIFO 就绪队列，高优先级就绪即抢占
//! - 睡眠链表与虚拟单调时钟
//! - 内核实例的引导与停机
//!
//! 同步原语只通过本模块的 `irq_*` 接口操作调度器，这些接口要求调用者
//! 处于临界区内；真正的线程切换（`yield_now`）总是在离开临界区之后进行。
//!
//! ## Assumptions
//! - 单核：同一内核实例同一时刻只有一个线程在执行
//! - 除 `boot` 之外的接口只能在内核线程中调用
//!
//! ## Behavior
//! - 阻塞 = 设置阻塞标志 + 让出 CPU
//! - 唤醒 = 清除阻塞标志，标志全部清除后放入就绪队列

mod context;
mod join;
mod kernel;
mod manager;
mod processor;
mod sleep;
mod thread;
mod tid;

pub use kernel::{boot, boot_with, Kernel, KernelConfig, KernelError};
pub use processor::{current_tid, try_current};
pub use thread::{Priority, Thread, ThreadFlags, ThreadOptions, ThreadStatus, Tid};

pub(crate) use sleep::{SleepData, SleepNode};

use crate::errno::Errno;
use crate::hal::{InterruptDisableLock, InterruptEnableLock};
use core::pin::{pin, Pin};
use kernel::Switch;
use log::trace;
use std::sync::Arc;

/// 当前内核线程
///
/// ## Panics
/// - 不在内核线程中调用
pub fn current_thread() -> Arc<Thread> {
    try_current().unwrap_or_else(|| panic!("not running in a kernel thread"))
}

/// 创建线程
///
/// ## Behavior
/// - 新线程优先级高于调用者时，调用者立即让出 CPU
///
/// ## Errors
/// - `EAGAIN`：无法创建承载线程
pub fn create<F>(options: ThreadOptions, entry: F) -> Result<Arc<Thread>, Errno>
where
    F: FnOnce() -> usize + Send + 'static,
{
    let me = current_thread();
    let thread = me.kernel.spawn(options, Box::new(entry))?;
    if thread.priority().outranks(me.priority()) {
        yield_now();
    }
    Ok(thread)
}

/// 线程是否存在（未退出，或已退出但尚未被回收）
pub fn exists(tid: Tid) -> bool {
    lookup(tid).is_some()
}

/// 在当前内核中按 tid 查找线程
pub fn lookup(tid: Tid) -> Option<Arc<Thread>> {
    let me = current_thread();
    let lock = InterruptDisableLock::new();
    let thread = me.kernel.manager(&lock).threads.get(&tid).cloned();
    thread
}

/// 让出 CPU
///
/// ## Behavior
/// - 调用者仍可运行时排到同优先级线程之后，并推进一个调度时间片
/// - 调用者已被阻塞时，直到被唤醒并重新调度才返回
pub fn yield_now() {
    let me = current_thread();
    let switch = {
        let lock = InterruptDisableLock::new();
        me.kernel.irq_reschedule(&lock, &me)
    };
    match switch {
        Switch::Stay => {}
        Switch::To(next) => {
            next.context.resume();
            processor::park_until_scheduled();
        }
        Switch::Halt => {
            me.kernel.wake_boot();
            processor::park_until_scheduled();
        }
    }
}

/// 当前虚拟时间（纳秒）
pub fn now() -> i64 {
    let me = current_thread();
    let lock = InterruptDisableLock::new();
    let now = me.kernel.manager(&lock).clock_ns;
    now
}

/// 睡眠 `ns` 纳秒
pub fn sleep(ns: i64) {
    sleep_until(now().saturating_add(ns.max(0)));
}

/// 睡眠到绝对时间 `abs_ns`，该时间已过去时仅重新调度
pub fn sleep_until(abs_ns: i64) {
    let me = current_thread();
    let entry = pin!(SleepNode::new(SleepData {
        thread: Arc::clone(&me),
        wake_at: abs_ns,
    }));
    let entry = entry.into_ref();
    let mut lock = InterruptDisableLock::new();
    // SAFETY: 返回前一定会将条目移出睡眠链表
    unsafe { irq_add_to_sleeping_list(&lock, entry) };
    {
        let _enable = InterruptEnableLock::new(&mut lock);
        yield_now();
    }
    irq_remove_from_sleeping_list(&lock, entry);
}

/// 当前内核睡眠链表中的线程，按唤醒时间排列
pub fn sleeping_threads() -> Vec<Tid> {
    let me = current_thread();
    let lock = InterruptDisableLock::new();
    let tids = me.kernel.manager(&lock).sleeping.tids();
    tids
}

/// 模拟定时器中断：推进时钟、唤醒到期线程，必要时抢占当前线程
pub(crate) fn tick(delta_ns: i64) {
    let me = current_thread();
    let preempt = {
        let lock = InterruptDisableLock::new();
        let mut manager = me.kernel.manager(&lock);
        manager.clock_ns = manager.clock_ns.saturating_add(delta_ns.max(0));
        manager.wake_expired(&lock);
        manager.has_ready_above(me.priority())
    };
    if preempt {
        yield_now();
    }
}

/// 将当前线程标记为阻塞，之后必须让出 CPU
pub(crate) fn irq_block_current(lock: &InterruptDisableLock, flags: ThreadFlags) {
    let me = current_thread();
    let mut inner = me.inner.borrow_mut(lock);
    inner.flags.insert(flags);
    inner.status = ThreadStatus::Blocked;
    trace!("thread {} blocked ({:?})", me.tid(), flags);
}

/// 清除线程的 `clear` 标志并在可运行时放入就绪队列
///
/// ## Returns
/// - `true`：被唤醒的线程优先级高于当前线程，调用者应在离开临界区后让出 CPU
pub(crate) fn irq_wakeup(
    lock: &InterruptDisableLock,
    thread: &Arc<Thread>,
    clear: ThreadFlags,
) -> bool {
    let mut manager = thread.kernel.manager(lock);
    let ready = manager.wakeup(lock, thread, clear);
    ready
        && manager
            .current
            .as_ref()
            .is_some_and(|current| thread.priority().outranks(current.priority()))
}

/// 将条目加入睡眠链表，并将其线程标记为 `SLEEP`
///
/// # Safety
/// 条目在被移出睡眠链表之前必须保持有效
pub(crate) unsafe fn irq_add_to_sleeping_list(lock: &InterruptDisableLock, entry: Pin<&SleepNode>) {
    let thread = &entry.value().thread;
    {
        let mut inner = thread.inner.borrow_mut(lock);
        inner.flags.insert(ThreadFlags::SLEEP);
        inner.status = ThreadStatus::Blocked;
    }
    // SAFETY: 由调用者保证
    unsafe { thread.kernel.manager(lock).sleeping.add(entry) };
}

/// 将条目移出睡眠链表
///
/// ## Returns
/// - `true`：条目此前仍在链表中（尚未到期）
pub(crate) fn irq_remove_from_sleeping_list(lock: &InterruptDisableLock, entry: Pin<&SleepNode>) -> bool {
    let thread = &entry.value().thread;
    let removed = thread.kernel.manager(lock).sleeping.remove(entry);
    removed
}
