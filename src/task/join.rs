//! 线程的 join 与 detach

use super::processor;
use super::thread::{Thread, ThreadFlags, ThreadStatus};
use super::{current_thread, irq_block_current, irq_wakeup};
use crate::errno::Errno;
use crate::hal::{InterruptDisableLock, InterruptEnableLock};
use log::debug;
use std::sync::Arc;

impl Thread {
    /// 等待线程退出并取回其返回值，随后回收该线程
    ///
    /// ## Errors
    /// - `ESRCH`：线程已被回收，或不属于当前内核
    /// - `EDEADLK`：join 自己
    /// - `EINVAL`：线程已分离，已有其它线程在 join 它，
    ///   或在等待期间被分离
    pub fn join(self: &Arc<Self>) -> Result<usize, Errno> {
        let me = current_thread();
        if !Arc::ptr_eq(&self.kernel, &me.kernel) {
            return Err(Errno::ESRCH);
        }
        let mut lock = InterruptDisableLock::new();
        if !self.kernel.manager(&lock).threads.contains_key(&self.tid()) {
            return Err(Errno::ESRCH);
        }
        if Arc::ptr_eq(self, &me) {
            return Err(Errno::EDEADLK);
        }
        let must_wait = {
            let mut inner = self.inner.borrow_mut(&lock);
            if inner.flags.contains(ThreadFlags::DETACHED) || inner.joiner.is_some() {
                return Err(Errno::EINVAL);
            }
            let must_wait = inner.status != ThreadStatus::Exited;
            if must_wait {
                inner.joiner = Some(Arc::clone(&me));
            }
            must_wait
        };
        if must_wait {
            irq_block_current(&lock, ThreadFlags::WAIT_JOIN);
            let _enable = InterruptEnableLock::new(&mut lock);
            super::yield_now();
        }

        let value = {
            let mut inner = self.inner.borrow_mut(&lock);
            inner.joiner = None;
            if inner.status != ThreadStatus::Exited || inner.flags.contains(ThreadFlags::DETACHED) {
                // 等待期间被分离
                return Err(Errno::EINVAL);
            }
            inner.exit_value.take().unwrap_or_default()
        };
        let reaped = self.kernel.manager(&lock).threads.remove(&self.tid());
        drop(lock);
        drop(reaped);
        debug!("thread {} joined thread {}", me.tid(), self.tid());
        Ok(value)
    }

    /// 分离线程：退出后立即回收，不能再被 join
    ///
    /// ## Behavior
    /// - 线程已退出时立即回收
    /// - 正在 join 该线程的线程被唤醒，并得到 `EINVAL`
    ///
    /// ## Errors
    /// - `ESRCH`：线程已被回收，或不属于当前内核
    pub fn detach(self: &Arc<Self>) -> Result<(), Errno> {
        let me = processor::try_current();
        if me.as_ref().is_some_and(|me| !Arc::ptr_eq(&self.kernel, &me.kernel)) {
            return Err(Errno::ESRCH);
        }
        let preempt = {
            let lock = InterruptDisableLock::new();
            let mut manager = self.kernel.manager(&lock);
            if !manager.threads.contains_key(&self.tid()) {
                return Err(Errno::ESRCH);
            }
            let (exited, joiner) = {
                let mut inner = self.inner.borrow_mut(&lock);
                inner.flags.insert(ThreadFlags::DETACHED);
                (inner.status == ThreadStatus::Exited, inner.joiner.take())
            };
            let reaped = if exited {
                manager.threads.remove(&self.tid())
            } else {
                None
            };
            drop(manager);
            drop(reaped);
            match joiner {
                Some(joiner) => irq_wakeup(&lock, &joiner, ThreadFlags::WAIT_JOIN),
                None => false,
            }
        };
        if preempt {
            super::yield_now();
        }
        Ok(())
    }
}
