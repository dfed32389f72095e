//! 协议常量定义
//!
//! 集中定义帧格式相关的常量，避免在代码中散落"魔法数"。

use std::time::Duration;

/// 帧起始标记（每个数据包的第 0 字节）
pub const START_MARKER: u8 = 0xAA;

/// 包头长度
///
/// 包头占 4 字节：起始标记、命令类型、数据长度，以及 1 个保留字节（固定为 0）。
pub const HEADER_LENGTH: usize = 4;

/// 校验和长度
pub const CHECKSUM_LENGTH: usize = 1;

/// 最短合法数据包长度（包头 + 校验和，无数据）
pub const MIN_PACKET_LENGTH: usize = HEADER_LENGTH + CHECKSUM_LENGTH;

/// 单个数据包可携带的最大数据长度（长度字段只有 1 字节）
pub const MAX_PAYLOAD_LENGTH: usize = u8::MAX as usize;

/// 包头中各字段的偏移
pub const OFFSET_START_MARKER: usize = 0;
pub const OFFSET_COMMAND_TYPE: usize = 1;
pub const OFFSET_LENGTH: usize = 2;
pub const OFFSET_RESERVED: usize = 3;

/// 读取响应的默认超时（毫秒）
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// 读取响应的默认超时
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(DEFAULT_TIMEOUT_MS);

/// 速度量化的满量程（速度 1.0 对应 0xFF）
pub const SPEED_FULL_SCALE: f32 = 255.0;

/// 旋转角度量化：360° 对应 255
pub const ROTATION_FULL_TURN_DEG: f32 = 360.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout_constants() {
        assert_eq!(START_MARKER, 0xAA);
        assert_eq!(HEADER_LENGTH, 4);
        assert_eq!(CHECKSUM_LENGTH, 1);
        assert_eq!(MIN_PACKET_LENGTH, 5);
        assert_eq!(MAX_PAYLOAD_LENGTH, 255);
        assert!(OFFSET_RESERVED < HEADER_LENGTH);
    }

    #[test]
    fn test_default_timeout() {
        assert_eq!(DEFAULT_TIMEOUT, Duration::from_millis(1000));
    }
}
