//! # 睡眠链表模块
//!
//! ## Overview
//! 按唤醒时间升序排列的侵入式链表。条目（`SleepNode`）分配在睡眠调用或
//! 带超时等待调用的栈上，一个线程可以同时位于睡眠链表和某个等待队列中。
//!
//! ## Invariants
//! - 链表按 `wake_at` 非降序排列，相同唤醒时间按插入顺序排列
//! - 条目在调用返回前一定被移出

use super::thread::{Thread, Tid};
use crate::sync::list::{IntrusiveList, Node};
use core::pin::Pin;
use std::sync::Arc;

/// 睡眠条目的内容
#[derive(Clone)]
pub struct SleepData {
    pub thread: Arc<Thread>,
    /// 绝对唤醒时间（纳秒）
    pub wake_at: i64,
}

pub type SleepNode = Node<SleepData>;

#[derive(Default)]
pub struct SleepingList {
    list: IntrusiveList<SleepData>,
}

impl SleepingList {
    pub const fn new() -> Self {
        Self {
            list: IntrusiveList::new(),
        }
    }

    /// # Safety
    /// 节点在被移出之前必须保持有效
    pub unsafe fn add(&mut self, node: Pin<&SleepNode>) {
        // SAFETY: 由调用者保证
        unsafe {
            self.list
                .insert_before(node, |new, old| new.wake_at < old.wake_at)
        };
    }

    pub fn remove(&mut self, node: Pin<&SleepNode>) -> bool {
        self.list.remove(node)
    }

    /// 最早的唤醒时间
    pub fn next_wakeup(&self) -> Option<i64> {
        self.list.front().map(|data| data.wake_at)
    }

    /// 移出一个唤醒时间不晚于 `now` 的条目
    pub fn pop_expired(&mut self, now: i64) -> Option<Arc<Thread>> {
        if self.next_wakeup()? > now {
            return None;
        }
        self.list.pop_front().map(|data| data.thread)
    }

    pub fn tids(&self) -> Vec<Tid> {
        self.list.iter().map(|data| data.thread.tid()).collect()
    }}
