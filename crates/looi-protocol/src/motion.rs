//! 运动意图与电机控制数据编码
//!
//! 每个运动意图对应一条 `MOTOR_CONTROL` 命令，数据第 0 字节为操作码，
//! 其后为意图相关的参数。
//!
//! | 意图        | 操作码 | 参数                                   |
//! |-------------|--------|----------------------------------------|
//! | Stop        | 0x00   | 无                                     |
//! | MoveForward | 0x01   | 速度字节                               |
//! | MoveBackward| 0x02   | 速度字节                               |
//! | TurnLeft    | 0x03   | 速度字节                               |
//! | TurnRight   | 0x04   | 速度字节                               |
//! | Rotate      | 0x05   | 方向字节 + 角度字节                    |
//! | SetSpeed    | 0x06   | 速度字节                               |

use crate::ProtocolError;
use crate::constants::{ROTATION_FULL_TURN_DEG, SPEED_FULL_SCALE};

pub const OPCODE_STOP: u8 = 0x00;
pub const OPCODE_FORWARD: u8 = 0x01;
pub const OPCODE_BACKWARD: u8 = 0x02;
pub const OPCODE_TURN_LEFT: u8 = 0x03;
pub const OPCODE_TURN_RIGHT: u8 = 0x04;
pub const OPCODE_ROTATE: u8 = 0x05;
pub const OPCODE_SET_SPEED: u8 = 0x06;

/// 旋转方向：正角度（逆时针）
pub const ROTATE_POSITIVE: u8 = 0x01;
/// 旋转方向：负角度（顺时针）
pub const ROTATE_NEGATIVE: u8 = 0x02;

/// 高层运动意图
///
/// 速度取值范围 `[0.0, 1.0]`，角度单位为度。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MotionIntent {
    MoveForward(f32),
    MoveBackward(f32),
    TurnLeft(f32),
    TurnRight(f32),
    /// 原地旋转（度），正值逆时针
    Rotate(f32),
    SetSpeed(f32),
    Stop,
}

impl MotionIntent {
    /// 操作码
    pub fn opcode(&self) -> u8 {
        match self {
            MotionIntent::Stop => OPCODE_STOP,
            MotionIntent::MoveForward(_) => OPCODE_FORWARD,
            MotionIntent::MoveBackward(_) => OPCODE_BACKWARD,
            MotionIntent::TurnLeft(_) => OPCODE_TURN_LEFT,
            MotionIntent::TurnRight(_) => OPCODE_TURN_RIGHT,
            MotionIntent::Rotate(_) => OPCODE_ROTATE,
            MotionIntent::SetSpeed(_) => OPCODE_SET_SPEED,
        }
    }

    /// 操作名称，用于错误信息（"Failed to {name}"）
    pub fn operation(&self) -> &'static str {
        match self {
            MotionIntent::Stop => "stop",
            MotionIntent::MoveForward(_) => "move forward",
            MotionIntent::MoveBackward(_) => "move backward",
            MotionIntent::TurnLeft(_) => "turn left",
            MotionIntent::TurnRight(_) => "turn right",
            MotionIntent::Rotate(_) => "rotate",
            MotionIntent::SetSpeed(_) => "set speed",
        }
    }

    /// 编码为 `MOTOR_CONTROL` 命令的数据部分
    ///
    /// # 错误
    ///
    /// - `ProtocolError::InvalidParameter`: 速度或角度为 NaN/无穷大
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let opcode = self.opcode();
        match *self {
            MotionIntent::Stop => Ok(vec![opcode]),
            MotionIntent::MoveForward(speed)
            | MotionIntent::MoveBackward(speed)
            | MotionIntent::TurnLeft(speed)
            | MotionIntent::TurnRight(speed)
            | MotionIntent::SetSpeed(speed) => Ok(vec![opcode, quantize_speed(speed)?]),
            MotionIntent::Rotate(angle) => {
                let direction = if angle > 0.0 {
                    ROTATE_POSITIVE
                } else {
                    ROTATE_NEGATIVE
                };
                Ok(vec![opcode, direction, quantize_angle(angle)?])
            },
        }
    }
}

/// 速度量化：`round(speed * 255)`，结果限制在 `[0, 255]`
///
/// 超出 `[0.0, 1.0]` 的有限值被钳位，NaN/无穷大被拒绝。
pub fn quantize_speed(speed: f32) -> Result<u8, ProtocolError> {
    if !speed.is_finite() {
        return Err(ProtocolError::InvalidParameter {
            field: "speed".to_string(),
            value: speed,
        });
    }
    let scaled = (speed.clamp(0.0, 1.0) * SPEED_FULL_SCALE).round();
    Ok(scaled.clamp(0.0, 255.0) as u8)
}

/// 角度量化：`round(|angle| * 255 / 360)`，超过一整圈时钳位到 255
pub fn quantize_angle(angle_deg: f32) -> Result<u8, ProtocolError> {
    if !angle_deg.is_finite() {
        return Err(ProtocolError::InvalidParameter {
            field: "angle".to_string(),
            value: angle_deg,
        });
    }
    let scaled = (angle_deg.abs() * SPEED_FULL_SCALE / ROTATION_FULL_TURN_DEG).round();
    Ok(scaled.min(255.0) as u8)
}

/// 运动方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MovementDirection {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
}

impl MovementDirection {
    /// 以 `speed` 沿该方向运动的意图
    pub fn intent(self, speed: f32) -> MotionIntent {
        match self {
            MovementDirection::Forward => MotionIntent::MoveForward(speed),
            MovementDirection::Backward => MotionIntent::MoveBackward(speed),
            MovementDirection::Left => MotionIntent::TurnLeft(speed),
            MovementDirection::Right => MotionIntent::TurnRight(speed),
            MovementDirection::Stop => MotionIntent::Stop,
        }
    }

    /// 旋转后的朝向：正角度记为 `Right`，其余为 `Left`
    pub fn of_rotation(angle_deg: f32) -> Self {
        if angle_deg > 0.0 {
            MovementDirection::Right
        } else {
            MovementDirection::Left
        }
    }
}
