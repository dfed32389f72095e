//! # Looi Transport Layer
//!
//! 物理通道抽象层，为上层提供统一的阻塞式命令/响应接口。
//!
//! ## 后端
//!
//! - `serial`: USB 串口（115200 8N1），所有平台
//! - `bluetooth`: 蓝牙 RFCOMM（SPP），仅 Linux，需要 BlueZ
//! - `mock`: 脚本化响应，用于上层测试
//!
//! ## 并发
//!
//! `Transport` 的方法都需要 `&mut self`，同一个物理连接上的请求/响应必须由调用方串行化
//! （见 `looi-driver` 中的 `RobotLink`）。

use std::time::Duration;
use thiserror::Error;

pub use looi_protocol::DEFAULT_TIMEOUT;

mod device;
pub mod reader;
pub mod scanner;
pub mod state;

#[cfg(feature = "serial")]
pub mod serial;

#[cfg(all(target_os = "linux", feature = "bluetooth"))]
pub mod bluetooth;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use device::{DeviceSelector, DiscoveredDevice};
pub use reader::{DRAIN_LIMIT, TimedRead, drain_pending, read_packet};
pub use scanner::{
    ChannelScanBackend, DEFAULT_NAME_PREFIX, DEFAULT_SCAN_WINDOW, DeviceScanner, ScanBackend,
    ScanEvent, ScanFailure, ScanResults,
};
pub use state::{AtomicLinkState, LinkState};

#[cfg(feature = "serial")]
pub use serial::{SerialConfig, SerialTransport};

#[cfg(all(target_os = "linux", feature = "bluetooth"))]
pub use bluetooth::{BluerScanBackend, BluetoothConfig, BluetoothTransport};

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockHandle, MockTransport};

/// 串口蓝牙协议（SPP）服务 UUID
pub const SPP_UUID: &str = "00001101-0000-1000-8000-00805F9B34FB";

/// 传输层统一错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// 建立连接失败：适配器不可用/未开启、找不到设备、打开失败
    #[error("Connection error: {0}")]
    Connection(String),

    /// 读写失败：IO 错误、流关闭、链路处于错误状态
    #[error("Communication error: {0}")]
    Communication(String),

    /// 等待响应超时
    #[error("Read timeout after {0:?}")]
    Timeout(Duration),
}

impl TransportError {
    /// 是否为 IO 故障（会使链路进入 `Error` 状态）
    pub fn is_io_failure(&self) -> bool {
        matches!(self, TransportError::Communication(_))
    }
}

/// 物理通道能力
///
/// 一个实例只持有一个物理连接。
pub trait Transport: Send {
    /// 建立物理连接
    ///
    /// 已连接时为空操作；处于 `Error` 状态时返回 `Connection` 错误，需先 `disconnect()`。
    fn connect(&mut self) -> Result<(), TransportError>;

    /// 释放连接（关闭时的错误只记录不返回），未连接时调用是安全的
    fn disconnect(&mut self);

    /// 写入完整命令并刷新
    fn send_command(&mut self, packet: &[u8]) -> Result<(), TransportError>;

    /// 丢弃已到达但尚未读取的入站字节，返回丢弃的字节数
    ///
    /// 不等待新数据。用于超时后清理迟到的响应，避免被下一条命令读到。
    fn discard_input(&mut self) -> Result<usize, TransportError>;

    /// 读取一个响应包，使用传输配置的超时
    fn read_response(&mut self) -> Result<Vec<u8>, TransportError> {
        let timeout = self.timeout();
        self.read_response_timeout(timeout)
    }

    /// 读取一个响应包，使用指定超时
    fn read_response_timeout(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError>;

    /// 当前链路状态
    fn state(&self) -> LinkState;

    fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// 默认读超时
    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    /// 通道描述（用于日志）
    fn describe(&self) -> String;
}

/// 连接前置检查（供各后端复用）
///
/// - `Ok(true)`: 已连接，调用方应直接返回
/// - `Ok(false)`: 可以开始连接（状态已切换为 `Connecting`）
pub(crate) fn begin_connect(state: &AtomicLinkState) -> Result<bool, TransportError> {
    match state.get() {
        LinkState::Connected => Ok(true),
        LinkState::Error => Err(TransportError::Connection(
            "Link is in error state, disconnect before reconnecting".to_string(),
        )),
        LinkState::Connecting | LinkState::Disconnecting => Err(TransportError::Connection(
            format!("Link is busy ({})", state.get()),
        )),
        LinkState::Disconnected => {
            if state.transition(LinkState::Disconnected, LinkState::Connecting) {
                Ok(false)
            } else {
                Err(TransportError::Connection(
                    "Concurrent connect attempt".to_string(),
                ))
            }
        },
    }
}

/// 读写前置检查
pub(crate) fn ensure_connected(state: &AtomicLinkState) -> Result<(), TransportError> {
    match state.get() {
        LinkState::Connected => Ok(()),
        LinkState::Error => Err(TransportError::Communication(
            "link in error state".to_string(),
        )),
        other => Err(TransportError::Communication(format!(
            "Not connected ({})",
            other
        ))),
    }
}

/// 根据错误类型更新状态：IO 故障进入 `Error`，超时不改变状态
pub(crate) fn record_failure(state: &AtomicLinkState, err: &TransportError) {
    if err.is_io_failure() && state.get() == LinkState::Connected {
        state.set(LinkState::Error);
    }
}
