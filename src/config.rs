//! 内核配置常量

/// 优先级级数，内核优先级取值 `0..PRIORITY_MAX`，0 为最高
pub const PRIORITY_MAX: usize = 8;

/// 主线程的内核优先级（对应 POSIX 优先级 1，比最低优先级高一级）
pub const MAIN_PRIORITY: u8 = (PRIORITY_MAX - 2) as u8;

/// 线程栈的最小值（字节）
pub const STACK_MIN: usize = 256;
/// `pthread_create` 未指定属性时的默认栈大小
pub const STACK_DEFAULT_FOR_PTHREAD: usize = 2048;
/// 主线程栈大小
pub const MAIN_STACK_SIZE: usize = 4096;

/// 宿主机上承载内核线程的 OS 线程栈下限。
/// 内核栈大小只作为记录值，真实栈不会小于该值
pub const HOST_STACK_FLOOR: usize = 512 * 1024;

/// 绝对超时时间的下限（纳秒），避免过小的截止时间
pub const MIN_ABS_SLEEP_NS: i64 = 100_000;

/// 每次主动让出 CPU 时推进的虚拟时钟（纳秒）
pub const YIELD_QUANTUM_NS: i64 = 1_000;
