//! # 侵入式链表模块
//!
//! ## Overview
//! 等待队列与睡眠链表都由本模块的 `IntrusiveList` 实现。链表节点
//! （`Node`）由阻塞调用分配在自己的栈上并固定（pin），链表只保存指向节点的
//! 裸指针，因此入队和出队都不需要堆分配。
//!
//! ## Safety
//! - 节点在被链入期间不能移动，也不能被释放：入队接口为 `unsafe`，
//!   调用者必须保证在节点离开作用域前将其移出（`remove` 或 `pop_front`）
//! - 节点被释放时若仍处于链入状态，直接 panic，不允许留下悬垂指针
//! - 所有链表操作都在临界区内完成，节点字段使用 `Cell` 以便通过共享引用修改
//!
//! ## Invariants
//! - `len` 等于从 `head` 出发可达的节点数
//! - `tail` 指向最后一个节点，链表为空时 `head` 与 `tail` 均为 `None`
//! - 节点的 `linked` 标志为真，当且仅当它位于某个链表中

use core::cell::Cell;
use core::marker::PhantomPinned;
use core::pin::Pin;
use core::ptr::NonNull;

/// 侵入式链表节点
pub struct Node<T> {
    value: T,
    next: Cell<Option<NonNull<Node<T>>>>,
    linked: Cell<bool>,
    _pin: PhantomPinned,
}

impl<T> Node<T> {
    pub const fn new(value: T) -> Self {
        Self {
            value,
            next: Cell::new(None),
            linked: Cell::new(false),
            _pin: PhantomPinned,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// 节点当前是否位于某个链表中
    pub fn is_linked(&self) -> bool {
        self.linked.get()
    }
}

impl<T> Drop for Node<T> {
    fn drop(&mut self) {
        assert!(!self.linked.get(), "intrusive node dropped while linked");
    }
}

/// 单向侵入式链表
pub struct IntrusiveList<T> {
    head: Option<NonNull<Node<T>>>,
    tail: Option<NonNull<Node<T>>>,
    len: usize,
}

// 节点只在临界区内被访问
unsafe impl<T: Send + Sync> Send for IntrusiveList<T> {}

impl<T> IntrusiveList<T> {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// 队首元素
    pub fn front(&self) -> Option<&T> {
        // SAFETY: 链入的节点在移出前一直有效
        self.head.map(|node| unsafe { &node.as_ref().value })
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            next: self.head,
            _list: self,
        }
    }

    /// 链接到链表尾部
    ///
    /// # Safety
    /// 节点必须未链入任何链表，且在被移出本链表之前保持有效
    pub unsafe fn push_back(&mut self, node: Pin<&Node<T>>) {
        let ptr = Self::link(node);
        match self.tail {
            // SAFETY: tail 是链入的有效节点
            Some(tail) => unsafe { tail.as_ref().next.set(Some(ptr)) },
            None => self.head = Some(ptr),
        }
        self.tail = Some(ptr);
        self.len += 1;
    }

    /// 链接到链表头部
    ///
    /// # Safety
    /// 同 `push_back`
    pub unsafe fn push_front(&mut self, node: Pin<&Node<T>>) {
        let ptr = Self::link(node);
        node.next.set(self.head);
        if self.head.is_none() {
            self.tail = Some(ptr);
        }
        self.head = Some(ptr);
        self.len += 1;
    }

    /// 插入到第一个满足 `goes_before(新值, 已有值)` 的元素之前，
    /// 没有这样的元素时插入到尾部
    ///
    /// # Safety
    /// 同 `push_back`
    pub unsafe fn insert_before<F>(&mut self, node: Pin<&Node<T>>, mut goes_before: F)
    where
        F: FnMut(&T, &T) -> bool,
    {
        let mut prev: Option<NonNull<Node<T>>> = None;
        let mut cur = self.head;
        while let Some(c) = cur {
            // SAFETY: 链入的节点有效
            let c_ref = unsafe { c.as_ref() };
            if goes_before(&node.value, &c_ref.value) {
                break;
            }
            prev = cur;
            cur = c_ref.next.get();
        }
        let ptr = Self::link(node);
        node.next.set(cur);
        match prev {
            // SAFETY: 同上
            Some(p) => unsafe { p.as_ref().next.set(Some(ptr)) },
            None => self.head = Some(ptr),
        }
        if cur.is_none() {
            self.tail = Some(ptr);
        }
        self.len += 1;
    }

    /// 移出队首节点，返回其值的拷贝
    pub fn pop_front(&mut self) -> Option<T>
    where
        T: Clone,
    {
        let head = self.head?;
        // SAFETY: head 是链入的有效节点
        let node = unsafe { head.as_ref() };
        self.head = node.next.get();
        if self.head.is_none() {
            self.tail = None;
        }
        Self::unlink(node);
        self.len -= 1;
        Some(node.value.clone())
    }

    /// 若节点位于本链表中则将其移出
    ///
    /// ## Returns
    /// - `true`：节点此前在链表中，现已移出
    /// - `false`：节点不在本链表中，链表不变
    pub fn remove(&mut self, node: Pin<&Node<T>>) -> bool {
        if !node.is_linked() {
            return false;
        }
        let target = NonNull::from(node.get_ref());
        let mut prev: Option<NonNull<Node<T>>> = None;
        let mut cur = self.head;
        while let Some(c) = cur {
            // SAFETY: 链入的节点有效
            let next = unsafe { c.as_ref() }.next.get();
            if c == target {
                match prev {
                    // SAFETY: 同上
                    Some(p) => unsafe { p.as_ref().next.set(next) },
                    None => self.head = next,
                }
                if self.tail == Some(c) {
                    self.tail = prev;
                }
                Self::unlink(node.get_ref());
                self.len -= 1;
                return true;
            }
            prev = cur;
            cur = next;
        }
        false
    }

    fn link(node: Pin<&Node<T>>) -> NonNull<Node<T>> {
        assert!(!node.is_linked(), "intrusive node linked twice");
        node.linked.set(true);
        node.next.set(None);
        NonNull::from(node.get_ref())
    }

    fn unlink(node: &Node<T>) {
        node.next.set(None);
        node.linked.set(false);
    }
}

impl<T> Default for IntrusiveList<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Iter<'a, T> {
    next: Option<NonNull<Node<T>>>,
    _list: &'a IntrusiveList<T>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let cur = self.next?;
        // SAFETY: 链表被共享借用期间节点不会被移出
        let node = unsafe { &*cur.as_ptr() };
        self.next = node.next.get();
        Some(&node.value)
    }
}
