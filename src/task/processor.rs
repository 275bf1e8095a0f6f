//! # 处理器模块
//!
//! ## Overview
//! 每个承载内核线程的 OS 线程都有一份 `Processor`，记录它正在承载的
//! 内核线程以及用于等待运行权的 `Parker`。`current_thread` 由此得到。

use super::thread::{Thread, Tid};
use crossbeam_utils::sync::Parker;
use std::cell::RefCell;
use std::sync::Arc;

struct Processor {
    current: Arc<Thread>,
    parker: Parker,
}

thread_local! {
    static PROCESSOR: RefCell<Option<Processor>> = const { RefCell::new(None) };
}

/// 将当前 OS 线程绑定到内核线程
pub(crate) fn install(thread: Arc<Thread>, parker: Parker) {
    PROCESSOR.with(|p| {
        *p.borrow_mut() = Some(Processor {
            current: thread,
            parker,
        })
    });
}

pub(crate) fn uninstall() {
    let processor = PROCESSOR.with(|p| p.borrow_mut().take());
    drop(processor);
}

/// 当前 OS 线程承载的内核线程
pub fn try_current() -> Option<Arc<Thread>> {
    PROCESSOR.with(|p| p.borrow().as_ref().map(|p| Arc::clone(&p.current)))
}

/// 当前内核线程的 tid，不在内核线程中时为 `None`。
/// 日志在任意位置都可能调用它，因此不能 panic
pub fn current_tid() -> Option<Tid> {
    PROCESSOR
        .try_with(|p| {
            p.try_borrow()
                .ok()
                .and_then(|p| p.as_ref().map(|p| p.current.tid()))
        })
        .ok()
        .flatten()
}

/// 停在 `Parker` 上，直到当前线程重新获得 CPU
pub(crate) fn park_until_scheduled() {
    PROCESSOR.with(|p| {
        let p = p.borrow();
        let processor = p
            .as_ref()
            .unwrap_or_else(|| panic!("park outside of a kernel thread"));
        while !processor.current.context.is_on_cpu() {
            processor.parker.park();
        }
    });
}
