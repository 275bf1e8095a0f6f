//! 控制台日志
//!
//! 基于 `log` 门面的彩色日志输出，写到标准错误。每条记录带上当前内核线程的 tid。
//! 日志级别取自运行时环境变量 `LOG`，其次是编译期的 `LOG`，默认关闭。

use crate::task::current_tid;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::io::Write;

/// 安装日志器。重复调用不会失败
pub fn init() {
    static LOGGER: Logger = Logger;
    if log::set_logger(&LOGGER).is_ok() {
        let env = std::env::var("LOG").ok();
        log::set_max_level(level_filter(env.as_deref().or(option_env!("LOG"))));
    }
}

fn level_filter(name: Option<&str>) -> LevelFilter {
    match name {
        Some("error") => LevelFilter::Error,
        Some("warn") => LevelFilter::Warn,
        Some("info") => LevelFilter::Info,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}

struct Logger;
impl Log for Logger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let color = level_to_color_code(record.level());
        let mut stderr = std::io::stderr().lock();
        // 日志写失败时直接丢弃
        let _ = match current_tid() {
            Some(tid) => writeln!(
                stderr,
                "\x1b[{}m[{:>5}] tid {}: {}\x1b[0m",
                color,
                record.level(),
                tid,
                record.args()
            ),
            None => writeln!(
                stderr,
                "\x1b[{}m[{:>5}] kernel: {}\x1b[0m",
                color,
                record.level(),
                record.args()
            ),
        };
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn level_to_color_code(level: Level) -> u8 {
    match level {
        Level::Error => 31, // Red
        Level::Warn => 93,  // BrightYellow
        Level::Info => 34,  // Blue
        Level::Debug => 32, // Green
        Level::Trace => 90, // BrightBlack
    }
}
