//! 数据包编解码
//!
//! 纯函数实现，无 IO、无状态。
//!
//! # 帧格式
//!
//! ```text
//! byte 0          : 起始标记 0xAA
//! byte 1          : 命令类型
//! byte 2          : 数据长度 N (0..=255)
//! byte 3          : 保留（0x00）
//! byte 4..4+N     : 数据
//! byte 4+N        : 校验和 = (byte 0 .. byte 4+N-1 之和) mod 256
//! ```
//!
//! 响应包格式相同，数据第 0 字节为结果码。

use crate::command::{CommandType, ResultCode};
use crate::constants::*;
use crate::ProtocolError;

/// 计算校验和
///
/// `data[offset..offset + length]` 中所有字节（无符号）之和，对 256 取模。
///
/// # Panics
///
/// 区间越界时 panic（与切片索引语义一致）。
pub fn checksum(data: &[u8], offset: usize, length: usize) -> u8 {
    data[offset..offset + length]
        .iter()
        .fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// 由包头计算完整数据包长度
pub fn packet_length(header: &[u8; HEADER_LENGTH]) -> usize {
    HEADER_LENGTH + header[OFFSET_LENGTH] as usize + CHECKSUM_LENGTH
}

/// 构建命令包
///
/// # 错误
///
/// - `ProtocolError::PayloadTooLarge`: 数据超过 255 字节
///
/// # 示例
///
/// ```
/// use looi_protocol::{CommandType, build_command};
///
/// let packet = build_command(CommandType::MotorControl, &[0x01, 0xFF]).unwrap();
/// assert_eq!(packet, vec![0xAA, 0x01, 0x02, 0x00, 0x01, 0xFF, 0xAD]);
/// ```
pub fn build_command(command_type: impl Into<u8>, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    if payload.len() > MAX_PAYLOAD_LENGTH {
        return Err(ProtocolError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_LENGTH,
        });
    }

    let body_len = HEADER_LENGTH + payload.len();
    let mut packet = vec![0u8; body_len + CHECKSUM_LENGTH];

    packet[OFFSET_START_MARKER] = START_MARKER;
    packet[OFFSET_COMMAND_TYPE] = command_type.into();
    packet[OFFSET_LENGTH] = payload.len() as u8;
    packet[HEADER_LENGTH..body_len].copy_from_slice(payload);
    packet[body_len] = checksum(&packet, 0, body_len);

    Ok(packet)
}

/// 解析响应包，返回数据部分
///
/// 校验顺序：长度下限 → 起始标记 → 校验和 → 长度字段。
pub fn parse_response(raw: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    Packet::parse(raw).map(|packet| packet.payload().to_vec())
}

/// 已校验数据包的只读视图
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    raw: &'a [u8],
}

impl<'a> Packet<'a> {
    /// 校验并包装原始字节
    pub fn parse(raw: &'a [u8]) -> Result<Self, ProtocolError> {
        if raw.len() < MIN_PACKET_LENGTH {
            return Err(ProtocolError::TooShort { actual: raw.len() });
        }

        if raw[OFFSET_START_MARKER] != START_MARKER {
            return Err(ProtocolError::InvalidStartMarker {
                found: raw[OFFSET_START_MARKER],
            });
        }

        let body_len = raw.len() - CHECKSUM_LENGTH;
        let expected = checksum(raw, 0, body_len);
        let actual = raw[body_len];
        if expected != actual {
            return Err(ProtocolError::ChecksumMismatch { expected, actual });
        }

        let declared = HEADER_LENGTH + raw[OFFSET_LENGTH] as usize + CHECKSUM_LENGTH;
        if declared != raw.len() {
            return Err(ProtocolError::InvalidLength {
                expected: declared,
                actual: raw.len(),
            });
        }

        Ok(Self { raw })
    }

    /// 原始字节（含包头和校验和）
    pub fn as_bytes(&self) -> &'a [u8] {
        self.raw
    }

    /// 命令类型原始值
    pub fn command_type_raw(&self) -> u8 {
        self.raw[OFFSET_COMMAND_TYPE]
    }

    /// 命令类型
    pub fn command_type(&self) -> Result<CommandType, ProtocolError> {
        CommandType::try_from(self.command_type_raw())
    }

    /// 数据部分
    pub fn payload(&self) -> &'a [u8] {
        let len = self.raw[OFFSET_LENGTH] as usize;
        &self.raw[HEADER_LENGTH..HEADER_LENGTH + len]
    }

    /// 结果码（数据第 0 字节），数据为空时返回 `None`
    pub fn result_code(&self) -> Option<ResultCode> {
        self.payload().first().map(|&b| ResultCode::from(b))
    }

    /// 结果码之后的数据
    pub fn data(&self) -> &'a [u8] {
        self.payload().get(1..).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_checksum(mut bytes: Vec<u8>) -> Vec<u8> {
        let sum = checksum(&bytes, 0, bytes.len());
        bytes.push(sum);
        bytes
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(&[0xFF, 0x01], 0, 2), 0x00);
        assert_eq!(checksum(&[0xAA, 0x01, 0x02, 0x00, 0x01, 0xFF], 0, 6), 0xAD);
        assert_eq!(checksum(&[0x10, 0x20, 0x30], 1, 2), 0x50);
        assert_eq!(checksum(&[], 0, 0), 0);
    }

    #[test]
    fn test_build_motor_forward_full_speed() {
        let packet = build_command(CommandType::MotorControl, &[0x01, 0xFF]).unwrap();
        assert_eq!(packet.len(), HEADER_LENGTH + 2 + CHECKSUM_LENGTH);
        assert_eq!(&packet[..3], &[0xAA, 0x01, 0x02]);
        assert_eq!(packet[OFFSET_RESERVED], 0x00);
        assert_eq!(&packet[4..6], &[0x01, 0xFF]);
        // (0xAA + 0x01 + 0x02 + 0x01 + 0xFF) mod 256
        assert_eq!(packet[6], 0xAD);
    }

    #[test]
    fn test_build_accepts_raw_type_byte() {
        let packet = build_command(0x04u8, &[]).unwrap();
        assert_eq!(packet, vec![0xAA, 0x04, 0x00, 0x00, 0xAE]);
    }

    #[test]
    fn test_build_rejects_oversized_payload() {
        let payload = vec![0u8; 256];
        let err = build_command(CommandType::SensorRead, &payload).unwrap_err();
        assert!(matches!(err, ProtocolError::PayloadTooLarge { len: 256, max: 255 }));
        assert!(err.to_string().contains("payload too large"));

        assert!(build_command(CommandType::SensorRead, &[0u8; 255]).is_ok());
    }

    #[test]
    fn test_parse_success_response() {
        let raw = with_checksum(vec![0xAA, 0x01, 0x01, 0x00, 0x00]);
        assert_eq!(parse_response(&raw).unwrap(), vec![0x00]);

        let packet = Packet::parse(&raw).unwrap();
        assert_eq!(packet.command_type().unwrap(), CommandType::MotorControl);
        assert_eq!(packet.result_code(), Some(ResultCode::Success));
        assert!(packet.data().is_empty());
    }

    #[test]
    fn test_parse_sensor_response_data() {
        let raw = with_checksum(vec![0xAA, 0x02, 0x02, 0x00, 0x00, 200]);
        let packet = Packet::parse(&raw).unwrap();
        assert_eq!(packet.payload(), &[0x00, 200]);
        assert_eq!(packet.data(), &[200]);
    }

    #[test]
    fn test_parse_too_short() {
        let err = parse_response(&[0xAA, 0x01, 0x00, 0x00]).unwrap_err();
        assert!(matches!(err, ProtocolError::TooShort { actual: 4 }));
        assert!(err.to_string().contains("response too short"));
    }

    #[test]
    fn test_parse_bad_start_marker() {
        let raw = with_checksum(vec![0x55, 0x01, 0x01, 0x00, 0x00]);
        let err = parse_response(&raw).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidStartMarker { found: 0x55 }));
        assert!(err.to_string().contains("invalid start marker"));
    }

    #[test]
    fn test_parse_checksum_error() {
        let mut raw = with_checksum(vec![0xAA, 0x01, 0x01, 0x00, 0x00]);
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let err = parse_response(&raw).unwrap_err();
        assert!(matches!(err, ProtocolError::ChecksumMismatch { .. }));
        assert!(err.to_string().contains("checksum error"));
    }

    #[test]
    fn test_parse_length_field_disagrees_with_buffer() {
        // 长度字段声明 3 字节数据，实际只有 1 字节
        let raw = with_checksum(vec![0xAA, 0x01, 0x03, 0x00, 0x00]);
        let err = parse_response(&raw).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidLength {
                expected: 8,
                actual: 6
            }
        ));
    }

    #[test]
    fn test_packet_length_from_header() {
        assert_eq!(packet_length(&[0xAA, 0x02, 0x00, 0x00]), 5);
        assert_eq!(packet_length(&[0xAA, 0x02, 0x02, 0x00]), 7);
        assert_eq!(packet_length(&[0xAA, 0x02, 0xFF, 0x00]), 260);
    }
}
