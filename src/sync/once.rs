//! # 一次性初始化（Once）模块
//!
//! ## Overview
//! `Once` 保证初始化函数最多成功执行一次。状态机：
//!
//! ```text
//! NotStarted --(开始执行)--> Running --(成功)--> Done
//!      ^                        |
//!      +------(失败或 panic)-----+
//! ```
//!
//! 初始化函数在临界区之外执行。其它线程看到 `Running` 时让出 CPU 后重试，
//! 因此初始化线程优先级低于等待者时会形成活锁，调用者需自行避免。
//!
//! ## Invariants
//! - `Done` 之后状态不再改变
//! - 初始化失败时状态回到 `NotStarted`，后续调用会重新执行初始化

use super::up::IrqCell;
use crate::task;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// `Once` 的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum OnceState {
    NotStarted = 0,
    Running = 1,
    Done = 2,
}

pub struct Once {
    state: IrqCell<OnceState>,
}

/// 初始化进行中的记录，drop 时写回最终状态（包括 panic 展开时）
struct Attempt<'a> {
    once: &'a Once,
    outcome: OnceState,
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        let outcome = self.outcome;
        self.once.state.exclusive_session(|state| *state = outcome);
    }
}

impl Once {
    pub const fn new() -> Self {
        Self {
            state: IrqCell::new(OnceState::NotStarted),
        }
    }

    pub fn state(&self) -> OnceState {
        self.state.exclusive_session(|state| *state)
    }

    pub fn is_completed(&self) -> bool {
        self.state() == OnceState::Done
    }

    /// 执行初始化函数，若已完成则直接返回
    ///
    /// ## Behavior
    /// - 其它线程正在执行初始化时，让出 CPU 并重试
    /// - `init` 返回错误或 panic 时状态回滚，错误原样返回，panic 继续展开
    pub fn call_once<F, E>(&self, init: F) -> Result<(), E>
    where
        F: FnOnce() -> Result<(), E>,
    {
        loop {
            let state = self.state.exclusive_session(|state| {
                let seen = *state;
                if seen == OnceState::NotStarted {
                    *state = OnceState::Running;
                }
                seen
            });
            match state {
                OnceState::Done => return Ok(()),
                OnceState::NotStarted => break,
                OnceState::Running => task::yield_now(),
            }
        }

        let mut attempt = Attempt {
            once: self,
            outcome: OnceState::NotStarted,
        };
        let result = init();
        if result.is_ok() {
            attempt.outcome = OnceState::Done;
        }
        drop(attempt);
        result
    }
}

impl Default for Once {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_initializer_rolls_back() {
        let once = Once::new();
        assert_eq!(once.call_once(|| Err("boom")), Err("boom"));
        assert_eq!(once.state(), OnceState::NotStarted);
        assert_eq!(once.call_once(|| Ok::<(), &str>(())), Ok(()));
        assert!(once.is_completed());
        let mut ran = false;
        assert_eq!(
            once.call_once(|| {
                ran = true;
                Err("never")
            }),
            Ok(())
        );
        assert!(!ran);
    }

    #[test]
    fn panicking_initializer_rolls_back() {
        let once = Once::new();
        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            once.call_once(|| -> Result<(), ()> { panic!("initializer failed") })
        }));
        assert!(unwound.is_err());
        assert_eq!(once.state(), OnceState::NotStarted);
    }

    #[test]
    fn state_has_a_stable_encoding() {
        assert_eq!(u8::from(OnceState::Running), 1);
        assert_eq!(OnceState::try_from(2u8).ok(), Some(OnceState::Done));
    }
}
