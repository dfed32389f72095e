//! # Looi Protocol
//!
//! 机器人底盘串口/蓝牙命令协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `constants`: 帧格式常量
//! - `command`: 命令类型与结果码
//! - `packet`: 数据包构建、解析、校验
//! - `motion`: 运动意图与电机控制数据编码
//! - `sensor`: 传感器通道与读数换算
//!
//! ## 示例
//!
//! ```rust
//! use looi_protocol::{CommandType, MotionIntent, build_command, parse_response};
//!
//! let payload = MotionIntent::MoveForward(1.0).encode().unwrap();
//! let packet = build_command(CommandType::MotorControl, &payload).unwrap();
//! assert_eq!(parse_response(&packet).unwrap(), payload);
//! ```

pub mod command;
pub mod constants;
pub mod motion;
pub mod packet;
pub mod sensor;

// 重新导出常用类型
pub use command::{CommandType, ResultCode};
pub use constants::*;
pub use motion::{MotionIntent, MovementDirection, quantize_angle, quantize_speed};
pub use packet::{Packet, build_command, checksum, packet_length, parse_response};
pub use sensor::{SensorData, SensorKind};

use thiserror::Error;

/// 协议错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("response too short: {actual} bytes")]
    TooShort { actual: usize },

    #[error("invalid start marker: 0x{found:02X}")]
    InvalidStartMarker { found: u8 },

    #[error("checksum error: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Invalid packet length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: u8 },

    #[error("Invalid parameter {field}: {value}")]
    InvalidParameter { field: String, value: f32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_messages() {
        let err = ProtocolError::TooShort { actual: 3 };
        assert_eq!(err.to_string(), "response too short: 3 bytes");

        let err = ProtocolError::InvalidStartMarker { found: 0x55 };
        assert_eq!(err.to_string(), "invalid start marker: 0x55");

        let err = ProtocolError::ChecksumMismatch {
            expected: 0xAD,
            actual: 0xB1,
        };
        assert!(err.to_string().starts_with("checksum error"));

        let err = ProtocolError::InvalidParameter {
            field: "speed".to_string(),
            value: f32::NAN,
        };
        assert!(err.to_string().contains("speed"));
    }
}
