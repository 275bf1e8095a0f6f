//! 宿主机平台：为每个内核线程创建一个承载它的 OS 线程

use crate::config::HOST_STACK_FLOOR;
use std::io;
use std::thread;

/// 创建承载内核线程的 OS 线程
///
/// 返回后新线程可能已经开始执行，调用者需要让它先等待调度
pub fn spawn_hart<F>(name: String, stack_size: usize, f: F) -> io::Result<()>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name)
        .stack_size(stack_size.max(HOST_STACK_FLOOR))
        .spawn(f)
        .map(|_| ())
}
