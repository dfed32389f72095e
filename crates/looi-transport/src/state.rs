//! 链路状态机
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnecting -> Disconnected
//!                     |             |
//!                     v             v
//!               Disconnected      Error  (仅 disconnect() 可退出)
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// 链路状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LinkState {
    #[default]
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Disconnecting = 3,
    /// 不可恢复的 IO 故障，需要先 `disconnect()` 再 `connect()`
    Error = 4,
}

impl LinkState {
    /// 从 u8 转换
    ///
    /// 如果值无效，返回 Error。
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Disconnected,
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Disconnecting,
            _ => Self::Error,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
            LinkState::Disconnecting => "disconnecting",
            LinkState::Error => "error",
        };
        f.write_str(name)
    }
}

/// 链路状态（原子版本，用于线程间共享）
///
/// 传输实现内部持有，`state()` 无需加锁即可读取。
#[derive(Debug, Default)]
pub struct AtomicLinkState {
    inner: AtomicU8,
}

impl AtomicLinkState {
    pub fn new(state: LinkState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    pub fn get(&self) -> LinkState {
        LinkState::from_u8(self.inner.load(Ordering::Acquire))
    }

    pub fn set(&self, state: LinkState) {
        self.inner.store(state.as_u8(), Ordering::Release);
    }

    /// 比较并交换
    ///
    /// 当前值等于 `current` 时设置为 `new` 并返回 true。
    pub fn transition(&self, current: LinkState, new: LinkState) -> bool {
        self.inner
            .compare_exchange(
                current.as_u8(),
                new.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}
