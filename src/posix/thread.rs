//! # 线程相关 POSIX 接口
//!
//! ## Overview
//! 线程属性对象、`pthread_create/join/detach/self/equal` 以及 `sched_*`。
//! 所有接口成功返回 0，失败返回错误码。
//!
//! POSIX 优先级升序（0 最低），内核优先级降序（0 最高），转换规则：
//! `kernel = (PRIORITY_MAX - 1) - clamp(posix, 0, PRIORITY_MAX - 1)`

use super::PthreadT;
use crate::config::{PRIORITY_MAX, STACK_DEFAULT_FOR_PTHREAD, STACK_MIN};
use crate::errno::Errno;
use crate::task::{self, Priority, ThreadOptions};
use log::debug;
use num_enum::{IntoPrimitive, TryFromPrimitive};

pub const PTHREAD_CREATE_JOINABLE: i32 = 0;
pub const PTHREAD_CREATE_DETACHED: i32 = 1;

pub const PTHREAD_CANCEL_ENABLE: i32 = 0;
pub const PTHREAD_CANCEL_DISABLE: i32 = 1;

/// 线程分离状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum DetachState {
    Joinable = 0,
    Detached = 1,
}

/// 调度参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedParam {
    pub sched_priority: i32,
}

/// 线程属性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PthreadAttr {
    detachstate: DetachState,
    stacksize: usize,
    schedparam: SchedParam,
}

impl Default for PthreadAttr {
    fn default() -> Self {
        Self {
            detachstate: DetachState::Joinable,
            stacksize: STACK_DEFAULT_FOR_PTHREAD,
            schedparam: SchedParam {
                sched_priority: Priority::MAIN.to_posix(),
            },
        }
    }
}

impl PthreadAttr {
    fn options(&self) -> ThreadOptions {
        ThreadOptions {
            priority: Priority::from_posix(self.schedparam.sched_priority),
            stack_size: self.stacksize,
            detached: self.detachstate == DetachState::Detached,
        }
    }
}

pub fn pthread_attr_init(attr: &mut PthreadAttr) -> i32 {
    *attr = PthreadAttr::default();
    0
}

pub fn pthread_attr_destroy(_attr: &mut PthreadAttr) -> i32 {
    0
}

pub fn pthread_attr_getdetachstate(attr: &PthreadAttr, detachstate: &mut i32) -> i32 {
    *detachstate = attr.detachstate.into();
    0
}

pub fn pthread_attr_setdetachstate(attr: &mut PthreadAttr, detachstate: i32) -> i32 {
    match DetachState::try_from(detachstate) {
        Ok(state) => {
            attr.detachstate = state;
            0
        }
        Err(_) => Errno::EINVAL.code(),
    }
}

pub fn pthread_attr_getstacksize(attr: &PthreadAttr, stacksize: &mut usize) -> i32 {
    *stacksize = attr.stacksize;
    0
}

/// ## Errors
/// - `EINVAL`：小于 `STACK_MIN`
pub fn pthread_attr_setstacksize(attr: &mut PthreadAttr, stacksize: usize) -> i32 {
    if stacksize < STACK_MIN {
        return Errno::EINVAL.code();
    }
    attr.stacksize = stacksize;
    0
}

pub fn pthread_attr_getschedparam(attr: &PthreadAttr, param: &mut SchedParam) -> i32 {
    *param = attr.schedparam;
    0
}

/// 越界的优先级在创建线程时被截断
pub fn pthread_attr_setschedparam(attr: &mut PthreadAttr, param: &SchedParam) -> i32 {
    attr.schedparam = *param;
    0
}

/// 创建线程，`attr` 为 `None` 时使用默认属性
///
/// ## Errors
/// - `EAGAIN`：无法创建线程
pub fn pthread_create<F>(thread: &mut PthreadT, attr: Option<&PthreadAttr>, start: F) -> i32
where
    F: FnOnce() -> usize + Send + 'static,
{
    let options = attr.copied().unwrap_or_default().options();
    match task::create(options, start) {
        Ok(created) => {
            *thread = created.tid();
            0
        }
        Err(err) => err.code(),
    }
}

/// 等待线程退出，返回值写入 `value`
///
/// ## Errors
/// - `ESRCH`：线程不存在
/// - `EDEADLK`：join 自己
/// - `EINVAL`：线程不可 join
pub fn pthread_join(thread: PthreadT, value: Option<&mut usize>) -> i32 {
    let Some(target) = task::lookup(thread) else {
        return Errno::ESRCH.code();
    };
    match target.join() {
        Ok(exit) => {
            if let Some(value) = value {
                *value = exit;
            }
            0
        }
        Err(err) => err.code(),
    }
}

/// ## Errors
/// - `ESRCH`：线程不存在
pub fn pthread_detach(thread: PthreadT) -> i32 {
    let Some(target) = task::lookup(thread) else {
        return Errno::ESRCH.code();
    };
    match target.detach() {
        Ok(()) => 0,
        Err(err) => err.code(),
    }
}

pub fn pthread_self() -> PthreadT {
    task::current_thread().tid()
}

pub fn pthread_equal(t1: PthreadT, t2: PthreadT) -> bool {
    t1 == t2
}

/// 不支持线程取消，只记录调用
pub fn pthread_setcancelstate(state: i32, oldstate: Option<&mut i32>) -> i32 {
    debug!("pthread_setcancelstate({}) ignored", state);
    if let Some(oldstate) = oldstate {
        *oldstate = PTHREAD_CANCEL_ENABLE;
    }
    0
}

pub fn sched_get_priority_max(_policy: i32) -> i32 {
    (PRIORITY_MAX - 1) as i32
}

pub fn sched_get_priority_min(_policy: i32) -> i32 {
    0
}

pub fn sched_yield() -> i32 {
    task::yield_now();
    0
}
