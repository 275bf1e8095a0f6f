//! # 临界区保护的内部可变性封装模块
//!
//! ## Overview
//! 本模块提供 `IrqCell`：一个只能在关中断期间借出的 `RefCell`。
//! 借用接口要求调用者出示一个存活的 `InterruptDisableLock`，
//! 借用的生命周期与该守卫绑定，从而在编译期保证：
//! - 借出的数据不会在开中断之后继续被使用
//! - 在 `InterruptEnableLock` 存活期间无法借出任何数据
//!
//! ## Assumptions
//! - 所有内核线程共享同一把“中断屏蔽”锁（见 `hal::intr`）
//! - 关中断期间只有一个线程能访问受保护的数据
//!
//! ## Safety
//! - `unsafe impl Sync` 的正确性依赖“关中断 = 互斥”这一前提
//! - 借用冲突仍由 `RefCell` 动态检查，冲突直接 panic
//!
//! ## Invariants
//! - 若某个 `IrqCell` 处于借用状态，则当前线程一定处于关中断状态

use crate::hal::InterruptDisableLock;
use core::cell::{Ref, RefCell, RefMut};

/// 只能在临界区内访问的内部可变性封装
pub struct IrqCell<T> {
    inner: RefCell<T>,
}

/// 所有访问都要求持有中断屏蔽守卫
unsafe impl<T: Send> Sync for IrqCell<T> {}

impl<T> IrqCell<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: RefCell::new(value),
        }
    }

    /// 在临界区内获取独占访问
    ///
    /// ## Behavior
    /// - 借用的生命周期不超过 `lock`
    /// - 借用冲突将 panic
    pub fn borrow_mut<'a>(&'a self, _lock: &'a InterruptDisableLock) -> RefMut<'a, T> {
        self.inner.borrow_mut()
    }

    /// 在临界区内获取共享访问
    pub fn borrow<'a>(&'a self, _lock: &'a InterruptDisableLock) -> Ref<'a, T> {
        self.inner.borrow()
    }

    /// 关中断并在独占访问会话中执行闭包
    ///
    /// ## Behavior
    /// - 自动管理中断屏蔽与恢复
    /// - 调用者不能已处于临界区内
    pub fn exclusive_session<F, V>(&self, f: F) -> V
    where
        F: FnOnce(&mut T) -> V,
    {
        let lock = InterruptDisableLock::new();
        let mut inner = self.borrow_mut(&lock);
        f(&mut inner)
    }
}

impl<T: Default> Default for IrqCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
