//! 硬件抽象层：临界区原语与承载内核线程的宿主机平台

pub mod host;
pub mod intr;

pub use host::spawn_hart;
pub use intr::{interrupts_disabled, InterruptDisableLock, InterruptEnableLock};
