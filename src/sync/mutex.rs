//! # 互斥锁（Mutex）同步原语模块
//!
//! ## Overview
//! 本模块实现内核的阻塞型互斥锁，可选支持递归加锁：
//! - 非递归锁：持有者再次加锁会永久阻塞（不检测，记录警告）
//! - 递归锁：持有者再次加锁只增加递归深度
//!
//! 等待者使用分配在 `lock` 调用栈上的侵入式节点排队，按 FIFO 顺序唤醒。
//! 唤醒并不直接转移所有权，被唤醒的线程需要重新竞争。
//!
//! ## Assumptions
//! - 单核，所有共享状态只在关中断期间访问
//! - 只有内核线程可以调用加锁/解锁接口
//!
//! ## Safety
//! - 等待节点在 `lock` 返回前一定被移出等待队列
//! - 线程切换发生在临时开中断的作用域内，此时不持有任何借用
//!
//! ## Invariants
//! - `owner == None` ⇔ 互斥锁空闲
//! - 等待队列中的线程一定处于阻塞状态，且不是持有者
//!   （非递归锁的自死锁除外）
//! - `recursive == Some(depth)` 时，`depth` 为首次加锁之外的加锁次数
//!
//! ## Behavior
//! - `unlock` 唤醒的线程优先级高于调用者时，调用者在离开临界区后立即让出 CPU

use super::list::{IntrusiveList, Node};
use super::up::IrqCell;
use crate::errno::Errno;
use crate::hal::{InterruptDisableLock, InterruptEnableLock};
use crate::task::{self, Thread, ThreadFlags, Tid};
use core::pin::pin;
use log::{trace, warn};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::sync::Arc;

/// 阻塞在互斥锁或条件变量上的线程记录
pub(crate) type WaiterRecord = Node<Arc<Thread>>;
/// 等待队列
pub(crate) type WaiterQueue = IntrusiveList<Arc<Thread>>;

/// 互斥锁类型，数值与 `PTHREAD_MUTEX_*` 一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum MutexKind {
    Default = 0,
    Recursive = 1,
}

impl Default for MutexKind {
    fn default() -> Self {
        MutexKind::Default
    }
}

/// 阻塞型互斥锁
pub struct Mutex {
    inner: IrqCell<MutexInner>,
}

struct MutexInner {
    owner: Option<Arc<Thread>>,
    waiters: WaiterQueue,
    recursive: Option<u32>,
}

impl MutexInner {
    fn is_owned_by(&self, thread: &Arc<Thread>) -> bool {
        self.owner
            .as_ref()
            .is_some_and(|owner| Arc::ptr_eq(owner, thread))
    }
}

impl Mutex {
    pub const fn new(kind: MutexKind) -> Self {
        Self {
            inner: IrqCell::new(MutexInner {
                owner: None,
                waiters: IntrusiveList::new(),
                recursive: match kind {
                    MutexKind::Default => None,
                    MutexKind::Recursive => Some(0),
                },
            }),
        }
    }

    pub const fn recursive() -> Self {
        Self::new(MutexKind::Recursive)
    }

    /// 重新初始化。独占借用保证没有线程持有或等待该锁
    pub fn init(&mut self, kind: MutexKind) {
        *self = Self::new(kind);
    }

    pub fn kind(&self) -> MutexKind {
        self.inner.exclusive_session(|inner| match inner.recursive {
            Some(_) => MutexKind::Recursive,
            None => MutexKind::Default,
        })
    }

    /// 加锁，必要时阻塞
    pub fn lock(&self) {
        let mut lock = InterruptDisableLock::new();
        self.irq_lock(&mut lock);
    }

    /// 尝试加锁，不阻塞
    ///
    /// ## Errors
    /// - `EBUSY`：锁被其它线程持有，或非递归锁已被调用者持有
    pub fn try_lock(&self) -> Result<(), Errno> {
        let me = task::current_thread();
        let lock = InterruptDisableLock::new();
        let mut inner = self.inner.borrow_mut(&lock);
        if inner.owner.is_none() {
            inner.owner = Some(me);
            return Ok(());
        }
        if inner.is_owned_by(&me) {
            if let Some(depth) = inner.recursive.as_mut() {
                *depth += 1;
                return Ok(());
            }
        }
        Err(Errno::EBUSY)
    }

    /// 解锁
    ///
    /// ## Errors
    /// - `EPERM`：调用者不是持有者
    pub fn unlock(&self) -> Result<(), Errno> {
        let preempt = {
            let lock = InterruptDisableLock::new();
            self.irq_unlock(&lock)?
        };
        if preempt {
            task::yield_now();
        }
        Ok(())
    }

    /// 销毁前检查
    ///
    /// ## Errors
    /// - `EBUSY`：锁被持有或仍有等待者
    pub fn destroy(&self) -> Result<(), Errno> {
        self.inner.exclusive_session(|inner| {
            if inner.owner.is_some() || !inner.waiters.is_empty() {
                Err(Errno::EBUSY)
            } else {
                Ok(())
            }
        })
    }

    pub fn is_locked(&self) -> bool {
        self.inner.exclusive_session(|inner| inner.owner.is_some())
    }

    /// 持有者的 tid
    pub fn owner(&self) -> Option<Tid> {
        self.inner
            .exclusive_session(|inner| inner.owner.as_ref().map(|owner| owner.tid()))
    }

    /// 递归锁的当前递归深度
    pub fn depth(&self) -> Option<u32> {
        self.inner.exclusive_session(|inner| inner.recursive)
    }

    pub fn waiter_count(&self) -> usize {
        self.inner.exclusive_session(|inner| inner.waiters.len())
    }

    /// 在临界区内加锁，阻塞时临时开中断
    pub(crate) fn irq_lock(&self, lock: &mut InterruptDisableLock) {
        let me = task::current_thread();
        loop {
            let waiter = pin!(WaiterRecord::new(Arc::clone(&me)));
            let waiter = waiter.into_ref();
            {
                let mut inner = self.inner.borrow_mut(lock);
                if inner.owner.is_none() {
                    inner.owner = Some(me);
                    return;
                }
                if inner.is_owned_by(&me) {
                    if let Some(depth) = inner.recursive.as_mut() {
                        *depth += 1;
                        return;
                    }
                    warn!("thread {} relocks a non-recursive mutex", me.tid());
                }
                // SAFETY: 返回前一定会将节点移出等待队列
                unsafe { inner.waiters.push_back(waiter) };
            }
            trace!("thread {} waits for mutex", me.tid());
            task::irq_block_current(lock, ThreadFlags::WAIT);
            {
                let _enable = InterruptEnableLock::new(lock);
                task::yield_now();
            }
            self.inner.borrow_mut(lock).waiters.remove(waiter);
        }
    }

    /// 在临界区内解锁
    ///
    /// ## Returns
    /// - `Ok(true)`：被唤醒的线程优先级更高，调用者应让出 CPU
    pub(crate) fn irq_unlock(&self, lock: &InterruptDisableLock) -> Result<bool, Errno> {
        let me = task::current_thread();
        let mut inner = self.inner.borrow_mut(lock);
        if !inner.is_owned_by(&me) {
            return Err(Errno::EPERM);
        }
        if let Some(depth) = inner.recursive.as_mut() {
            if *depth > 0 {
                *depth -= 1;
                return Ok(false);
            }
        }
        inner.owner = None;
        let next = inner.waiters.pop_front();
        drop(inner);
        Ok(next.is_some_and(|next| task::irq_wakeup(lock, &next, ThreadFlags::WAIT)))
    }

    /// 无论递归深度为多少都完全释放，返回释放前的递归深度。
    /// 调用者必须是持有者
    pub(crate) fn irq_unlock_all_depth_levels(&self, lock: &InterruptDisableLock) -> u32 {
        let mut inner = self.inner.borrow_mut(lock);
        let depth = inner.recursive.as_mut().map_or(0, core::mem::take);
        inner.owner = None;
        let next = inner.waiters.pop_front();
        drop(inner);
        if let Some(next) = next {
            task::irq_wakeup(lock, &next, ThreadFlags::WAIT);
        }
        depth
    }

    /// 重新加锁并恢复递归深度
    pub(crate) fn irq_lock_to_depth(&self, lock: &mut InterruptDisableLock, depth: u32) {
        self.irq_lock(lock);
        if let Some(current) = self.inner.borrow_mut(lock).recursive.as_mut() {
            *current = depth;
        }
    }

    pub(crate) fn irq_is_owned_by_current(&self, lock: &InterruptDisableLock) -> bool {
        let me = task::current_thread();
        let owned = self.inner.borrow(lock).is_owned_by(&me);
        owned
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new(MutexKind::Default)
    }
}
