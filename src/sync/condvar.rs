//! # 条件变量（Condvar）同步原语模块
//!
//! ## Overview
//! 条件变量只维护一个等待队列，本身不保存条件状态，也不记录与之配合的
//! 互斥锁。等待时完整释放互斥锁（包括全部递归深度），被唤醒后重新加锁
//! 并恢复原来的递归深度。
//!
//! 带超时的等待同时位于两个链表中：条件变量的等待队列与睡眠链表。
//! 信号与超时都可能唤醒同一个线程，竞争由线程自己在恢复运行后裁决：
//! 先尝试从两个链表中移出自己，若等待节点仍在条件变量队列中，
//! 说明是超时唤醒，否则是被信号唤醒。
//!
//! ## Assumptions
//! - 调用 `wait` 的线程持有对应的互斥锁
//! - 虚假唤醒不会发生，但调用者仍应在循环中检查条件
//!
//! ## Safety
//! - 等待节点与睡眠节点都分配在等待调用的栈上，返回前一定被移出
//!
//! ## Invariants
//! - 等待队列中的线程一定带有 `COND_WAIT` 标志
//! - 新等待者压入队首，唤醒也从队首取出，唤醒顺序为 LIFO
//!
//! ## Behavior
//! - `signal` / `broadcast` 唤醒的线程优先级高于调用者时，
//!   调用者在离开临界区后立即让出 CPU

use super::list::IntrusiveList;
use super::mutex::{Mutex, WaiterQueue, WaiterRecord};
use super::up::IrqCell;
use crate::config::MIN_ABS_SLEEP_NS;
use crate::errno::Errno;
use crate::hal::{InterruptDisableLock, InterruptEnableLock};
use crate::task::{self, SleepData, SleepNode, ThreadFlags};
use core::pin::pin;
use log::{debug, trace};
use std::sync::Arc;

/// 条件变量
pub struct Condvar {
    waiters: IrqCell<WaiterQueue>,
}

impl Condvar {
    pub const fn new() -> Self {
        Self {
            waiters: IrqCell::new(IntrusiveList::new()),
        }
    }

    /// 释放 `mutex` 并等待信号，返回时重新持有 `mutex`
    ///
    /// ## Errors
    /// - `EPERM`：调用者未持有 `mutex`
    pub fn wait(&self, mutex: &Mutex) -> Result<(), Errno> {
        let me = task::current_thread();
        let waiter = pin!(WaiterRecord::new(Arc::clone(&me)));
        let waiter = waiter.into_ref();

        let mut lock = InterruptDisableLock::new();
        if !mutex.irq_is_owned_by_current(&lock) {
            return Err(Errno::EPERM);
        }
        // SAFETY: 返回前一定会将节点移出等待队列
        unsafe { self.waiters.borrow_mut(&lock).push_front(waiter) };
        task::irq_block_current(&lock, ThreadFlags::COND_WAIT);
        let depth = mutex.irq_unlock_all_depth_levels(&lock);
        trace!("thread {} waits on condvar", me.tid());
        {
            let _enable = InterruptEnableLock::new(&mut lock);
            task::yield_now();
        }
        self.waiters.borrow_mut(&lock).remove(waiter);
        mutex.irq_lock_to_depth(&mut lock, depth);
        Ok(())
    }

    /// 带绝对超时的等待，`abs_ns` 不小于 `MIN_ABS_SLEEP_NS`
    ///
    /// ## Errors
    /// - `ETIMEDOUT`：超时前没有收到信号，返回时仍重新持有 `mutex`
    /// - `EPERM`：调用者未持有 `mutex`
    pub fn wait_until(&self, mutex: &Mutex, abs_ns: i64) -> Result<(), Errno> {
        let me = task::current_thread();
        let deadline = abs_ns.max(MIN_ABS_SLEEP_NS);
        let waiter = pin!(WaiterRecord::new(Arc::clone(&me)));
        let waiter = waiter.into_ref();
        let sleeper = pin!(SleepNode::new(SleepData {
            thread: Arc::clone(&me),
            wake_at: deadline,
        }));
        let sleeper = sleeper.into_ref();

        let mut lock = InterruptDisableLock::new();
        if !mutex.irq_is_owned_by_current(&lock) {
            return Err(Errno::EPERM);
        }
        // SAFETY: 返回前一定会将两个节点分别移出等待队列与睡眠链表
        unsafe {
            self.waiters.borrow_mut(&lock).push_front(waiter);
            task::irq_add_to_sleeping_list(&lock, sleeper);
        }
        task::irq_block_current(&lock, ThreadFlags::COND_WAIT);
        let depth = mutex.irq_unlock_all_depth_levels(&lock);
        trace!("thread {} waits on condvar until {} ns", me.tid(), deadline);
        {
            let _enable = InterruptEnableLock::new(&mut lock);
            task::yield_now();
        }
        let timed_out = self.waiters.borrow_mut(&lock).remove(waiter);
        task::irq_remove_from_sleeping_list(&lock, sleeper);
        mutex.irq_lock_to_depth(&mut lock, depth);
        if timed_out {
            debug!("thread {} timed out on condvar", me.tid());
            Err(Errno::ETIMEDOUT)
        } else {
            Ok(())
        }
    }

    /// 唤醒一个等待者
    pub fn signal(&self) {
        let preempt = {
            let lock = InterruptDisableLock::new();
            let next = self.waiters.borrow_mut(&lock).pop_front();
            next.is_some_and(|next| {
                task::irq_wakeup(&lock, &next, ThreadFlags::COND_WAIT | ThreadFlags::SLEEP)
            })
        };
        if preempt {
            task::yield_now();
        }
    }

    /// 唤醒所有等待者
    pub fn broadcast(&self) {
        let preempt = {
            let lock = InterruptDisableLock::new();
            let mut preempt = false;
            loop {
                let next = self.waiters.borrow_mut(&lock).pop_front();
                let Some(next) = next else {
                    break;
                };
                preempt |=
                    task::irq_wakeup(&lock, &next, ThreadFlags::COND_WAIT | ThreadFlags::SLEEP);
            }
            preempt
        };
        if preempt {
            task::yield_now();
        }
    }

    /// 销毁前检查
    ///
    /// ## Errors
    /// - `EBUSY`：仍有等待者
    pub fn destroy(&self) -> Result<(), Errno> {
        self.waiters.exclusive_session(|waiters| {
            if waiters.is_empty() {
                Ok(())
            } else {
                Err(Errno::EBUSY)
            }
        })
    }

    pub fn waiter_count(&self) -> usize {
        self.waiters.exclusive_session(|waiters| waiters.len())
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}
