use crate::task;
use core::time::Duration;

pub const MSEC_PER_SEC: i64 = 1000;

pub const USEC_PER_SEC: i64 = 1_000_000;
pub const USEC_PER_MSEC: i64 = 1_000;

pub const NSEC_PER_SEC: i64 = 1_000_000_000;
pub const NSEC_PER_MSEC: i64 = 1_000_000;
pub const NSEC_PER_USEC: i64 = 1_000;

/// 当前内核的单调时间（纳秒）
pub fn get_time_ns() -> i64 {
    task::now()
}

pub fn get_time_sec() -> i64 {
    get_time_ns() / NSEC_PER_SEC
}

pub fn get_time_ms() -> i64 {
    get_time_ns() / NSEC_PER_MSEC
}

pub fn get_time_us() -> i64 {
    get_time_ns() / NSEC_PER_USEC
}

pub fn current_time_duration() -> Duration {
    Duration::from_nanos(get_time_ns().max(0) as u64)
}

/// 模拟一次定时器中断：时钟前进 `delta_ns`，唤醒到期线程，
/// 有更高优先级线程就绪时抢占当前线程
pub fn tick(delta_ns: i64) {
    task::tick(delta_ns);
}
