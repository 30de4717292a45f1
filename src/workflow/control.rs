//! 运行控制标志
//!
//! 取消与致命中止共用一组只读为主的原子标志。
//! 取消是协作式的：保证不再开始新案件，在途的文书传输不强行中断。

use std::sync::atomic::{AtomicBool, Ordering};

/// 批次级共享控制标志
#[derive(Debug, Default)]
pub struct RunControl {
    cancel: AtomicBool,
    fatal: AtomicBool,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求取消整个批次
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// 会话无法续期等致命条件，未开始的案件全部中止
    pub fn mark_fatal(&self) {
        self.fatal.store(true, Ordering::Release);
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal.load(Ordering::Acquire)
    }

    /// 是否还允许开始新案件
    pub fn may_start(&self) -> bool {
        !self.is_cancelled() && !self.is_fatal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_blocks_new_starts() {
        let control = RunControl::new();
        assert!(control.may_start());
        control.request_cancel();
        assert!(control.is_cancelled());
        assert!(!control.may_start());
    }

    #[test]
    fn fatal_blocks_new_starts() {
        let control = RunControl::new();
        control.mark_fatal();
        assert!(!control.may_start());
        assert!(!control.is_cancelled());
    }
}
