//! 驱动层错误类型定义

use looi_protocol::ProtocolError;
use looi_transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HardwareError {
    /// 建立连接失败
    #[error("Connection error: {0}")]
    Connection(String),

    /// 读写失败，或设备返回了非 SUCCESS 结果码
    #[error("Communication error: {0}")]
    Communication(String),

    /// 协议解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 等待响应超时
    #[error("Response timeout after {0:?}")]
    Timeout(Duration),

    /// 未调用 `initialize()`
    #[error("Hardware not initialized")]
    NotInitialized,

    /// 无效输入
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl HardwareError {
    /// 是否值得重试（IO 故障与超时）
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HardwareError::Communication(_) | HardwareError::Timeout(_)
        )
    }
}

/// 机器人控制层错误
///
/// 底层失败按操作包装，校验失败在发送任何字节之前返回。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    #[error("Failed to initialize hardware: {0}")]
    Initialize(#[source] HardwareError),

    #[error("Failed to {operation}: {source}")]
    Motion {
        operation: &'static str,
        source: HardwareError,
    },

    #[error("Failed to get sensor data: {0}")]
    Sensor(#[source] HardwareError),

    #[error("Speed must be between 0.0 and 1.0, got {0}")]
    InvalidSpeed(f32),

    #[error("Battery level too low: {0:.2}")]
    BatteryLow(f32),
}

impl ControlError {
    /// 底层硬件错误（校验失败时为 `None`）
    pub fn hardware(&self) -> Option<&HardwareError> {
        match self {
            ControlError::Initialize(e) | ControlError::Sensor(e) => Some(e),
            ControlError::Motion { source, .. } => Some(source),
            ControlError::InvalidSpeed(_) | ControlError::BatteryLow(_) => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.hardware().is_some_and(HardwareError::is_retryable)
    }
}

impl From<TransportError> for HardwareError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Connection(msg) => HardwareError::Connection(msg),
            TransportError::Communication(msg) => HardwareError::Communication(msg),
            TransportError::Timeout(timeout) => HardwareError::Timeout(timeout),
        }
    }
}
