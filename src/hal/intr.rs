//! # 中断屏蔽（临界区）模块
//!
//! ## Overview
//! 在单核目标上，关闭中断是内核唯一的互斥手段。宿主机上使用一把全进程的
//! 自旋锁模拟“关中断”，并用线程局部标志记录当前 OS 线程是否已处于临界区。
//!
//! - `InterruptDisableLock`：RAII 守卫，构造即关中断，析构即开中断
//! - `InterruptEnableLock`：在已关中断的作用域内临时开中断，析构时重新关闭
//!
//! ## Invariants
//! - 同一线程不允许嵌套关中断，嵌套即 panic，而不是静默死锁
//! - `InterruptEnableLock` 存活期间，对应的 `InterruptDisableLock` 被可变借用，
//!   因此无法借出任何受临界区保护的数据
//!
//! ## Safety
//! - 守卫不可跨线程移动（`!Send`），保证开/关中断发生在同一线程

use core::cell::Cell;
use core::marker::PhantomData;
use spin::{Mutex, MutexGuard};

static INTR_LOCK: Mutex<()> = Mutex::new(());

thread_local! {
    static MASKED: Cell<bool> = const { Cell::new(false) };
}

fn mask() -> MutexGuard<'static, ()> {
    MASKED.with(|masked| {
        assert!(
            !masked.get(),
            "interrupts disabled twice on the same thread"
        );
        masked.set(true);
    });
    INTR_LOCK.lock()
}

fn unmask(guard: MutexGuard<'static, ()>) {
    drop(guard);
    MASKED.with(|masked| masked.set(false));
}

/// 当前线程是否处于关中断状态
pub fn interrupts_disabled() -> bool {
    MASKED.with(Cell::get)
}

/// 关中断守卫
///
/// ## Behavior
/// - `new` 关闭中断，drop 时恢复
/// - 受临界区保护的数据（`IrqCell`）只能在持有该守卫时借出
pub struct InterruptDisableLock {
    guard: Option<MutexGuard<'static, ()>>,
    _not_send: PhantomData<*const ()>,
}

impl InterruptDisableLock {
    pub fn new() -> Self {
        Self {
            guard: Some(mask()),
            _not_send: PhantomData,
        }
    }
}

impl Default for InterruptDisableLock {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InterruptDisableLock {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            unmask(guard);
        }
    }
}

/// 临时开中断守卫
///
/// ## Behavior
/// - 构造时打开由 `InterruptDisableLock` 关闭的中断
/// - drop 时重新关闭中断，外层守卫恢复有效
pub struct InterruptEnableLock<'a> {
    lock: &'a mut InterruptDisableLock,
}

impl<'a> InterruptEnableLock<'a> {
    pub fn new(lock: &'a mut InterruptDisableLock) -> Self {
        if let Some(guard) = lock.guard.take() {
            unmask(guard);
        }
        Self { lock }
    }
}

impl Drop for InterruptEnableLock<'_> {
    fn drop(&mut self) {
        self.lock.guard = Some(mask());
    }
}
