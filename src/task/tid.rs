//! 线程 ID 分配器
//!
//! 顺序分配新 ID，回收的 ID 压入 recycled 栈中优先复用。
//! `TidHandle` 与线程控制块同生命周期，被 drop 时自动归还 ID。

use lazy_static::lazy_static;
use log::trace;
use spin::Mutex;

/// 基于栈的 ID 分配器
pub struct RecycleAllocator {
    /// 下一个从未分配过的 ID
    current: usize,
    /// 已回收、可再次分配的 ID
    recycled: Vec<usize>,
}

impl RecycleAllocator {
    pub const fn new(first: usize) -> Self {
        Self {
            current: first,
            recycled: Vec::new(),
        }
    }

    pub fn alloc(&mut self) -> usize {
        if let Some(id) = self.recycled.pop() {
            id
        } else {
            self.current += 1;
            self.current - 1
        }
    }

    /// 会进行合法性检查，防止重复回收或非法回收
    pub fn dealloc(&mut self, id: usize) {
        if id >= self.current || self.recycled.iter().any(|&v| v == id) {
            panic!("tid {} has not been allocated!", id);
        }
        self.recycled.push(id);
    }
}

lazy_static! {
    /// 全局线程 ID 分配器。ID 0 保留给“无线程”
    static ref TID_ALLOCATOR: Mutex<RecycleAllocator> = Mutex::new(RecycleAllocator::new(1));
}

/// 线程 ID 的 RAII 封装
pub struct TidHandle(pub usize);

impl Drop for TidHandle {
    fn drop(&mut self) {
        trace!("tid {} recycled", self.0);
        TID_ALLOCATOR.lock().dealloc(self.0);
    }
}

pub fn tid_alloc() -> TidHandle {
    TidHandle(TID_ALLOCATOR.lock().alloc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recycled_ids_are_reused_first() {
        let mut allocator = RecycleAllocator::new(1);
        assert_eq!(allocator.alloc(), 1);
        assert_eq!(allocator.alloc(), 2);
        allocator.dealloc(1);
        assert_eq!(allocator.alloc(), 1);
        assert_eq!(allocator.alloc(), 3);
    }

    #[test]
    #[should_panic(expected = "has not been allocated")]
    fn double_free_is_rejected() {
        let mut allocator = RecycleAllocator::new(1);
        let id = allocator.alloc();
        allocator.dealloc(id);
        allocator.dealloc(id);
    }
}
