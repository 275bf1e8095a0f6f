//! # 内核实例模块
//!
//! ## Overview
//! `Kernel` 把线程管理器、配置和引导线程的唤醒句柄组合在一起。
//! 一个进程中可以同时运行多个内核实例，它们只共享中断屏蔽锁。
//!
//! 引导流程：
//! 1. `boot_with` 在调用者的 OS 线程上创建内核与主线程
//! 2. 把 CPU 交给主线程，随后调用者停在引导 `Parker` 上
//! 3. 没有线程可以运行时内核停机，唤醒调用者并报告结果
//!
//! ## Invariants
//! - 运行权在内核线程之间交接，同一内核同一时刻只有一个线程执行
//! - 内核停机后不再调度任何线程；因死锁或 panic 停机时，
//!   仍然阻塞的线程被永久挂起

use super::context::ThreadContext;
use super::manager::{Halt, ThreadManager};
use super::processor;
use super::thread::{Priority, Thread, ThreadFlags, ThreadOptions, ThreadStatus, Tid};
use super::tid::tid_alloc;
use crate::config::{MAIN_STACK_SIZE, YIELD_QUANTUM_NS};
use crate::errno::Errno;
use crate::hal::{spawn_hart, InterruptDisableLock};
use crate::sync::IrqCell;
use core::cell::RefMut;
use core::fmt;
use crossbeam_utils::sync::{Parker, Unparker};
use log::{debug, error, info, warn};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

pub(crate) type Entry = Box<dyn FnOnce() -> usize + Send + 'static>;

/// 内核配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    /// 主线程优先级
    pub main_priority: Priority,
    /// 主线程栈大小
    pub main_stack_size: usize,
    /// 每次主动让出 CPU 时推进的虚拟时间
    pub yield_quantum_ns: i64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            main_priority: Priority::MAIN,
            main_stack_size: MAIN_STACK_SIZE,
            yield_quantum_ns: YIELD_QUANTUM_NS,
        }
    }
}

/// 内核异常停机的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// 仍有线程阻塞，但没有可运行或睡眠中的线程
    Deadlock { blocked: Vec<Tid> },
    /// 某个线程 panic
    ThreadPanicked { tid: Tid, message: String },
    /// 无法创建主线程
    Spawn(Errno),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::Deadlock { blocked } => {
                write!(f, "deadlock: threads {:?} blocked forever", blocked)
            }
            KernelError::ThreadPanicked { tid, message } => {
                write!(f, "thread {} panicked: {}", tid, message)
            }
            KernelError::Spawn(err) => write!(f, "cannot create main thread: {}", err),
        }
    }
}

impl std::error::Error for KernelError {}

/// 调度结果
pub(crate) enum Switch {
    /// 继续运行当前线程
    Stay,
    /// 切换到另一个线程
    To(Arc<Thread>),
    /// 内核停机
    Halt,
}

pub struct Kernel {
    config: KernelConfig,
    manager: IrqCell<ThreadManager>,
    boot: Unparker,
}

impl Kernel {
    fn new(config: KernelConfig, boot: Unparker) -> Self {
        Self {
            config,
            manager: IrqCell::new(ThreadManager::new()),
            boot,
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub(crate) fn manager<'a>(&'a self, lock: &'a InterruptDisableLock) -> RefMut<'a, ThreadManager> {
        self.manager.borrow_mut(lock)
    }

    /// 创建线程并放入就绪队列，不做抢占判断
    pub(crate) fn spawn(
        self: &Arc<Self>,
        options: ThreadOptions,
        entry: Entry,
    ) -> Result<Arc<Thread>, Errno> {
        let parker = Parker::new();
        let context = ThreadContext::new(parker.unparker().clone());
        let thread = Arc::new(Thread::new(tid_alloc(), options, Arc::clone(self), context));
        let hosted = Arc::clone(&thread);
        spawn_hart(
            format!("kthread-{}", thread.tid()),
            options.stack_size,
            move || run_thread(hosted, parker, entry),
        )
        .map_err(|err| {
            warn!("cannot create thread {}: {}", thread.tid(), err);
            Errno::EAGAIN
        })?;

        let lock = InterruptDisableLock::new();
        let mut manager = self.manager(&lock);
        thread.inner.borrow_mut(&lock).status = ThreadStatus::Ready;
        manager.threads.insert(thread.tid(), Arc::clone(&thread));
        manager.add(Arc::clone(&thread));
        debug!(
            "thread {} created, priority {}, stack {}",
            thread.tid(),
            thread.priority().level(),
            thread.stack_size()
        );
        Ok(thread)
    }

    /// 重新调度。`me` 仍处于运行状态时视为主动让出 CPU
    pub(crate) fn irq_reschedule(&self, lock: &InterruptDisableLock, me: &Arc<Thread>) -> Switch {
        let mut manager = self.manager(lock);
        {
            let mut inner = me.inner.borrow_mut(lock);
            if inner.status == ThreadStatus::Running {
                inner.status = ThreadStatus::Ready;
                drop(inner);
                manager.clock_ns = manager
                    .clock_ns
                    .saturating_add(self.config.yield_quantum_ns);
                manager.add(Arc::clone(me));
            }
        }
        match manager.find_next_thread(lock) {
            Some(next) if Arc::ptr_eq(&next, me) => {
                me.inner.borrow_mut(lock).status = ThreadStatus::Running;
                Switch::Stay
            }
            Some(next) => {
                me.context.switch_out();
                manager.dispatch(lock, Arc::clone(&next));
                Switch::To(next)
            }
            None => {
                me.context.switch_out();
                Self::irq_halt(&mut manager, lock);
                Switch::Halt
            }
        }
    }

    /// 当前线程退出，返回下一个运行的线程，内核停机时返回 `None`
    pub(crate) fn irq_exit(
        &self,
        lock: &InterruptDisableLock,
        me: &Arc<Thread>,
        value: usize,
    ) -> Option<Arc<Thread>> {
        let mut manager = self.manager(lock);
        let (joiner, detached) = {
            let mut inner = me.inner.borrow_mut(lock);
            inner.status = ThreadStatus::Exited;
            inner.flags.insert(ThreadFlags::EXITED);
            inner.exit_value = Some(value);
            (inner.joiner.clone(), inner.flags.contains(ThreadFlags::DETACHED))
        };
        debug!("thread {} exited with {}", me.tid(), value);
        if manager.main == Some(me.tid()) {
            manager.main_exit = Some(value);
        }
        if let Some(joiner) = joiner {
            manager.wakeup(lock, &joiner, ThreadFlags::WAIT_JOIN);
        }
        if detached {
            manager.threads.remove(&me.tid());
        }
        me.context.switch_out();
        match manager.find_next_thread(lock) {
            Some(next) => {
                manager.dispatch(lock, Arc::clone(&next));
                Some(next)
            }
            None => {
                Self::irq_halt(&mut manager, lock);
                None
            }
        }
    }

    fn irq_halt(manager: &mut ThreadManager, lock: &InterruptDisableLock) {
        manager.current = None;
        let halt = manager.halt_reason(lock);
        match &halt {
            Halt::Deadlock(blocked) => warn!("deadlock, blocked threads {:?}", blocked),
            _ => info!("all threads exited at {} ns", manager.clock_ns),
        }
        manager.halt = Some(halt);
    }

    fn halt_on_panic(&self, tid: Tid, message: String) {
        error!("thread {} panicked: {}", tid, message);
        {
            let lock = InterruptDisableLock::new();
            let mut manager = self.manager(&lock);
            manager.current = None;
            manager.halt = Some(Halt::Panicked { tid, message });
        }
        self.wake_boot();
    }

    pub(crate) fn wake_boot(&self) {
        self.boot.unpark();
    }
}

/// 承载内核线程的 OS 线程入口
fn run_thread(thread: Arc<Thread>, parker: Parker, entry: Entry) {
    processor::install(Arc::clone(&thread), parker);
    processor::park_until_scheduled();
    match panic::catch_unwind(AssertUnwindSafe(entry)) {
        Ok(value) => {
            let next = {
                let lock = InterruptDisableLock::new();
                thread.kernel.irq_exit(&lock, &thread, value)
            };
            match next {
                Some(next) => next.context.resume(),
                None => thread.kernel.wake_boot(),
            }
        }
        Err(payload) => thread
            .kernel
            .halt_on_panic(thread.tid(), panic_message(payload.as_ref())),
    }
    processor::uninstall();
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// 使用默认配置引导一个内核实例，`main` 作为主线程运行
pub fn boot<F>(main: F) -> Result<usize, KernelError>
where
    F: FnOnce() -> usize + Send + 'static,
{
    boot_with(KernelConfig::default(), main)
}

/// 引导一个内核实例并运行到停机
///
/// ## Returns
/// - `Ok(value)`：所有线程都已退出，`value` 为主线程返回值
/// - `Err(KernelError)`：死锁、线程 panic 或主线程创建失败
pub fn boot_with<F>(config: KernelConfig, main: F) -> Result<usize, KernelError>
where
    F: FnOnce() -> usize + Send + 'static,
{
    let parker = Parker::new();
    let kernel = Arc::new(Kernel::new(config.clone(), parker.unparker().clone()));
    let options = ThreadOptions {
        priority: config.main_priority,
        stack_size: config.main_stack_size,
        detached: false,
    };
    let main_thread = kernel
        .spawn(options, Box::new(main))
        .map_err(KernelError::Spawn)?;
    info!("kernel boot, main thread {}", main_thread.tid());

    let first = {
        let lock = InterruptDisableLock::new();
        let mut manager = kernel.manager(&lock);
        manager.main = Some(main_thread.tid());
        let first = manager.find_next_thread(&lock);
        if let Some(first) = &first {
            manager.dispatch(&lock, Arc::clone(first));
        }
        first
    };
    drop(main_thread);
    if let Some(first) = first {
        first.context.resume();
    }

    let halt = loop {
        let halt = {
            let lock = InterruptDisableLock::new();
            let halt = kernel.manager(&lock).halt.take();
            halt
        };
        if let Some(halt) = halt {
            break halt;
        }
        parker.park();
    };

    match halt {
        Halt::Idle => {
            let (exit, threads) = {
                let lock = InterruptDisableLock::new();
                let mut manager = kernel.manager(&lock);
                let threads = core::mem::take(&mut manager.threads);
                (manager.main_exit.unwrap_or(0), threads)
            };
            drop(threads);
            Ok(exit)
        }
        Halt::Deadlock(blocked) => Err(KernelError::Deadlock { blocked }),
        Halt::Panicked { tid, message } => Err(KernelError::ThreadPanicked { tid, message }),
    }
}
