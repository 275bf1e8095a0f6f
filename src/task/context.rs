//! # 线程上下文模块
//!
//! ## Overview
//! 在真实硬件上，上下文切换保存并恢复寄存器。宿主机上每个内核线程都由
//! 一个 OS 线程承载，“切换”变成交接运行权：
//! - 被切出的线程将 `on_cpu` 清零并停在自己的 `Parker` 上
//! - 切入方将目标线程的 `on_cpu` 置位并 `unpark` 它
//!
//! ## Invariants
//! - 任意时刻，同一内核中至多一个线程的 `on_cpu` 为真
//! - `on_cpu` 只在临界区内修改，唤醒（`resume`）在离开临界区之后进行

use crossbeam_utils::sync::Unparker;
use std::sync::atomic::{AtomicBool, Ordering};

/// 线程上下文
pub struct ThreadContext {
    on_cpu: AtomicBool,
    unparker: Unparker,
}

impl ThreadContext {
    pub fn new(unparker: Unparker) -> Self {
        Self {
            on_cpu: AtomicBool::new(false),
            unparker,
        }
    }

    pub fn is_on_cpu(&self) -> bool {
        self.on_cpu.load(Ordering::Acquire)
    }

    /// 标记为即将获得 CPU
    pub fn switch_in(&self) {
        self.on_cpu.store(true, Ordering::Release);
    }

    /// 标记为失去 CPU
    pub fn switch_out(&self) {
        self.on_cpu.store(false, Ordering::Release);
    }

    /// 唤醒承载该线程的 OS 线程
    pub fn resume(&self) {
        self.unparker.unpark();
    }
}
