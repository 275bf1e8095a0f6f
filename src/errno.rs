//! # 错误码模块
//!
//! ## Overview
//! 定义线程同步层使用的 POSIX 错误码。数值与 Linux 保持一致，
//! 通过 `num_enum` 在枚举与原始整数之间转换，供 `posix` 层直接返回。

use core::fmt;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// POSIX 错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum Errno {
    /// 操作不被允许（例如非持有者解锁）
    EPERM = 1,
    /// 线程不存在
    ESRCH = 3,
    /// 资源暂时不可用（线程创建失败）
    EAGAIN = 11,
    /// 资源忙
    EBUSY = 16,
    /// 参数非法
    EINVAL = 22,
    /// 检测到死锁
    EDEADLK = 35,
    /// 等待超时
    ETIMEDOUT = 110,
}

impl Errno {
    /// 错误码的简短描述
    pub fn description(self) -> &'static str {
        match self {
            Errno::EPERM => "operation not permitted",
            Errno::ESRCH => "no such thread",
            Errno::EAGAIN => "resource temporarily unavailable",
            Errno::EBUSY => "device or resource busy",
            Errno::EINVAL => "invalid argument",
            Errno::EDEADLK => "resource deadlock avoided",
            Errno::ETIMEDOUT => "connection timed out",
        }
    }

    /// 原始错误码
    pub fn code(self) -> i32 {
        self.into()
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({}): {}", self, self.code(), self.description())
    }
}

impl std::error::Error for Errno {}

/// 将结果转换为 POSIX 风格的返回值：成功为 0，失败为错误码
pub fn to_code(result: Result<(), Errno>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => err.code(),
    }
}
