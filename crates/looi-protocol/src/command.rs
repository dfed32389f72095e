//! 命令类型与结果码
//!
//! 包头第 1 字节为命令类型，响应数据第 0 字节为结果码。

use crate::ProtocolError;
use num_enum::{FromPrimitive, IntoPrimitive};

/// 命令类型（包头第 1 字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CommandType {
    /// 电机控制
    MotorControl = 0x01,
    /// 传感器读取（距离/温度/湿度）
    SensorRead = 0x02,
    /// 电池读取（电压/电机电流）
    BatteryRead = 0x03,
    /// 系统状态
    SystemStatus = 0x04,
}

impl CommandType {
    /// 线上编码
    pub fn as_u8(self) -> u8 {
        self.into()
    }
}

impl TryFrom<u8> for CommandType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(CommandType::MotorControl),
            0x02 => Ok(CommandType::SensorRead),
            0x03 => Ok(CommandType::BatteryRead),
            0x04 => Ok(CommandType::SystemStatus),
            _ => Err(ProtocolError::InvalidValue {
                field: "CommandType".to_string(),
                value,
            }),
        }
    }
}

/// 响应结果码（响应数据第 0 字节）
///
/// 固件只定义了 `SUCCESS`/`ERROR` 两个值，其他值原样保留在 `Other` 中，
/// 调用方一律按失败处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ResultCode {
    Success = 0x00,
    #[num_enum(catch_all)]
    Other(u8),
    Error = 0xFF,
}

impl ResultCode {
    pub fn is_success(self) -> bool {
        self == ResultCode::Success
    }
}
