//! 时间相关 POSIX 接口，只支持单调时钟

use crate::errno::Errno;
use crate::timer::{get_time_ns, NSEC_PER_SEC};

pub const CLOCK_REALTIME: i32 = 0;
pub const CLOCK_MONOTONIC: i32 = 1;

/// 秒 + 纳秒表示的时间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timespec {
    pub tv_sec: i64,
    pub tv_nsec: i64,
}

impl Timespec {
    pub fn from_nanos(ns: i64) -> Self {
        Self {
            tv_sec: ns.div_euclid(NSEC_PER_SEC),
            tv_nsec: ns.rem_euclid(NSEC_PER_SEC),
        }
    }

    /// 转换为纳秒，溢出时饱和
    pub fn as_nanos(&self) -> i64 {
        self.tv_sec
            .saturating_mul(NSEC_PER_SEC)
            .saturating_add(self.tv_nsec)
    }
}

/// ## Errors
/// - `EINVAL`：不是 `CLOCK_MONOTONIC`
pub fn clock_gettime(clock_id: i32, tp: &mut Timespec) -> i32 {
    if clock_id != CLOCK_MONOTONIC {
        return Errno::EINVAL.code();
    }
    *tp = Timespec::from_nanos(get_time_ns());
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timespec_conversions() {
        let ts = Timespec::from_nanos(2_500_000_123);
        assert_eq!(ts, Timespec { tv_sec: 2, tv_nsec: 500_000_123 });
        assert_eq!(ts.as_nanos(), 2_500_000_123);
        let huge = Timespec { tv_sec: i64::MAX, tv_nsec: 5 };
        assert_eq!(huge.as_nanos(), i64::MAX);
    }
}
