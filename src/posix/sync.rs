//! # 同步原语的 POSIX 接口
//!
//! ## Overview
//! 互斥锁、条件变量与一次性初始化的 `pthread_*` 接口，直接转发到 `sync`
//! 模块中的实现。所有接口成功返回 0，失败返回错误码。
//!
//! ## Invariants
//! - 属性对象只在初始化时被读取，之后修改属性不影响已初始化的对象

use super::time::{Timespec, CLOCK_MONOTONIC};
use crate::errno::{to_code, Errno};
use crate::sync::{Condvar, Mutex, MutexKind, Once};
use core::convert::Infallible;

pub const PTHREAD_MUTEX_DEFAULT: i32 = 0;
pub const PTHREAD_MUTEX_RECURSIVE: i32 = 1;

pub type PthreadMutex = Mutex;
pub type PthreadCond = Condvar;

#[allow(clippy::declare_interior_mutable_const)]
pub const PTHREAD_MUTEX_INITIALIZER: PthreadMutex = Mutex::new(MutexKind::Default);
#[allow(clippy::declare_interior_mutable_const)]
pub const PTHREAD_MUTEX_RECURSIVE_INITIALIZER_NP: PthreadMutex = Mutex::new(MutexKind::Recursive);
#[allow(clippy::declare_interior_mutable_const)]
pub const PTHREAD_COND_INITIALIZER: PthreadCond = Condvar::new();

/// 互斥锁属性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PthreadMutexAttr {
    kind: MutexKind,
}

pub fn pthread_mutexattr_init(attr: &mut PthreadMutexAttr) -> i32 {
    *attr = PthreadMutexAttr::default();
    0
}

pub fn pthread_mutexattr_destroy(_attr: &mut PthreadMutexAttr) -> i32 {
    0
}

pub fn pthread_mutexattr_gettype(attr: &PthreadMutexAttr, kind: &mut i32) -> i32 {
    *kind = attr.kind.into();
    0
}

/// ## Errors
/// - `EINVAL`：未知的互斥锁类型
pub fn pthread_mutexattr_settype(attr: &mut PthreadMutexAttr, kind: i32) -> i32 {
    match MutexKind::try_from(kind) {
        Ok(kind) => {
            attr.kind = kind;
            0
        }
        Err(_) => Errno::EINVAL.code(),
    }
}

pub fn pthread_mutex_init(mutex: &mut PthreadMutex, attr: Option<&PthreadMutexAttr>) -> i32 {
    mutex.init(attr.copied().unwrap_or_default().kind);
    0
}

/// ## Errors
/// - `EBUSY`：互斥锁被持有或有线程在等待
pub fn pthread_mutex_destroy(mutex: &PthreadMutex) -> i32 {
    to_code(mutex.destroy())
}

pub fn pthread_mutex_lock(mutex: &PthreadMutex) -> i32 {
    mutex.lock();
    0
}

/// ## Errors
/// - `EBUSY`：互斥锁被其它线程持有
pub fn pthread_mutex_trylock(mutex: &PthreadMutex) -> i32 {
    to_code(mutex.try_lock())
}

/// ## Errors
/// - `EPERM`：调用者不是持有者
pub fn pthread_mutex_unlock(mutex: &PthreadMutex) -> i32 {
    to_code(mutex.unlock())
}

/// 条件变量属性，只记录时钟
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PthreadCondAttr {
    clock: i32,
}

impl Default for PthreadCondAttr {
    fn default() -> Self {
        Self {
            clock: CLOCK_MONOTONIC,
        }
    }
}

pub fn pthread_condattr_init(attr: &mut PthreadCondAttr) -> i32 {
    *attr = PthreadCondAttr::default();
    0
}

pub fn pthread_condattr_destroy(_attr: &mut PthreadCondAttr) -> i32 {
    0
}

pub fn pthread_condattr_getclock(attr: &PthreadCondAttr, clock_id: &mut i32) -> i32 {
    *clock_id = attr.clock;
    0
}

/// ## Errors
/// - `EINVAL`：不是 `CLOCK_MONOTONIC`
pub fn pthread_condattr_setclock(attr: &mut PthreadCondAttr, clock_id: i32) -> i32 {
    if clock_id != CLOCK_MONOTONIC {
        return Errno::EINVAL.code();
    }
    attr.clock = clock_id;
    0
}

pub fn pthread_cond_init(cond: &mut PthreadCond, _attr: Option<&PthreadCondAttr>) -> i32 {
    *cond = Condvar::new();
    0
}

/// ## Errors
/// - `EBUSY`：仍有线程在等待
pub fn pthread_cond_destroy(cond: &PthreadCond) -> i32 {
    to_code(cond.destroy())
}

pub fn pthread_cond_wait(cond: &PthreadCond, mutex: &PthreadMutex) -> i32 {
    to_code(cond.wait(mutex))
}

/// `abstime` 是单调时钟上的绝对时间
///
/// ## Errors
/// - `ETIMEDOUT`：超时，返回时仍持有互斥锁
pub fn pthread_cond_timedwait(cond: &PthreadCond, mutex: &PthreadMutex, abstime: &Timespec) -> i32 {
    to_code(cond.wait_until(mutex, abstime.as_nanos()))
}

pub fn pthread_cond_signal(cond: &PthreadCond) -> i32 {
    cond.signal();
    0
}

pub fn pthread_cond_broadcast(cond: &PthreadCond) -> i32 {
    cond.broadcast();
    0
}

/// `pthread_once` 的控制对象
pub struct PthreadOnce {
    is_initialized: i32,
    once: Once,
}

impl PthreadOnce {
    /// 等价于 `PTHREAD_ONCE_INIT`
    pub const fn new() -> Self {
        Self {
            is_initialized: 1,
            once: Once::new(),
        }
    }

    /// 未经 `PTHREAD_ONCE_INIT` 初始化的控制对象
    pub const fn zeroed() -> Self {
        Self {
            is_initialized: 0,
            once: Once::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.once.is_completed()
    }
}

impl Default for PthreadOnce {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::declare_interior_mutable_const)]
pub const PTHREAD_ONCE_INIT: PthreadOnce = PthreadOnce::new();

/// 保证 `init_routine` 只执行一次
///
/// ## Errors
/// - `EINVAL`：控制对象或初始化函数缺失，或控制对象未经 `PTHREAD_ONCE_INIT` 初始化
pub fn pthread_once(once_control: Option<&PthreadOnce>, init_routine: Option<fn()>) -> i32 {
    let (Some(control), Some(init)) = (once_control, init_routine) else {
        return Errno::EINVAL.code();
    };
    if control.is_initialized != 1 {
        return Errno::EINVAL.code();
    }
    let result = control.once.call_once(|| {
        init();
        Ok::<(), Infallible>(())
    });
    match result {
        Ok(()) => 0,
        Err(never) => match never {},
    }
}
