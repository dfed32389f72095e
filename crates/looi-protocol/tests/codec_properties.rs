//! 编解码属性测试
//!
//! 使用 proptest 覆盖往返、校验和敏感性、起始标记拒绝、长度上限。

use looi_protocol::*;
use proptest::prelude::*;

proptest! {
    /// 任意合法 (type, payload) 构建后再解析，应得到原始数据
    #[test]
    fn prop_build_parse_roundtrip(
        command_type in any::<u8>(),
        payload in proptest::collection::vec(any::<u8>(), 0..=255),
    ) {
        let packet = build_command(command_type, &payload).unwrap();
        prop_assert_eq!(packet.len(), HEADER_LENGTH + payload.len() + CHECKSUM_LENGTH);
        prop_assert_eq!(parse_response(&packet).unwrap(), payload);
    }

    /// 翻转任意一位（起始标记除外，包括长度字段和校验和本身）都会导致校验失败
    #[test]
    fn prop_single_bit_flip_detected(
        payload in proptest::collection::vec(any::<u8>(), 1..=64),
        index_seed in any::<usize>(),
        bit in 0u8..8,
    ) {
        let mut packet = build_command(CommandType::SensorRead, &payload).unwrap();
        // 起始标记单独校验；校验和先于长度检查，长度字段被改动时同样报校验错误
        let index = 1 + index_seed % (packet.len() - 1);
        packet[index] ^= 1 << bit;

        let err = parse_response(&packet).unwrap_err();
        let is_checksum_error = matches!(err, ProtocolError::ChecksumMismatch { .. });
        prop_assert!(is_checksum_error, "unexpected error: {:?}", err);
    }

    /// 起始标记不是 0xAA 时一律拒绝，无论校验和是否正确
    #[test]
    fn prop_bad_start_marker_rejected(
        marker in any::<u8>().prop_filter("not start marker", |m| *m != START_MARKER),
        payload in proptest::collection::vec(any::<u8>(), 0..=32),
    ) {
        let mut packet = build_command(CommandType::MotorControl, &payload).unwrap();
        packet[0] = marker;
        // 重新计算校验和，保证只有起始标记不合法
        let last = packet.len() - 1;
        packet[last] = checksum(&packet, 0, last);

        let err = parse_response(&packet).unwrap_err();
        let is_marker_error = matches!(err, ProtocolError::InvalidStartMarker { .. });
        prop_assert!(is_marker_error);
    }

    /// 超过 255 字节的数据一律拒绝
    #[test]
    fn prop_oversized_payload_rejected(len in 256usize..1024) {
        let payload = vec![0x5Au8; len];
        let err = build_command(CommandType::MotorControl, &payload).unwrap_err();
        let is_too_large = matches!(err, ProtocolError::PayloadTooLarge { .. });
        prop_assert!(is_too_large);
    }
}

#[test]
fn flipped_length_byte_is_a_checksum_error() {
    let mut packet = build_command(CommandType::SensorRead, &[0x00, 0xC8]).unwrap();
    packet[OFFSET_LENGTH] ^= 0x01;
    assert!(matches!(
        parse_response(&packet),
        Err(ProtocolError::ChecksumMismatch { .. })
    ));
}

#[test]
fn scenario_a_motor_forward_full_speed() {
    let packet = build_command(CommandType::MotorControl, &[0x01, 0xFF]).unwrap();
    assert_eq!(packet, vec![0xAA, 0x01, 0x02, 0x00, 0x01, 0xFF, 0xAD]);
}

#[test]
fn scenario_b_success_response() {
    let response = [0xAA, 0x01, 0x01, 0x00, 0x00, 0xAC];
    let payload = parse_response(&response).unwrap();
    assert_eq!(payload, vec![0x00]);
    assert_eq!(ResultCode::from(payload[0]), ResultCode::Success);
}

#[test]
fn speed_quantization_end_points() {
    assert_eq!(MotionIntent::SetSpeed(1.0).encode().unwrap()[1], 0xFF);
    assert_eq!(MotionIntent::SetSpeed(0.0).encode().unwrap()[1], 0x00);
}
