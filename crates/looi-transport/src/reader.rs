//! 响应帧读取
//!
//! 所有传输共用的阻塞读帧逻辑：跳过起始标记之前的字节，读满 4 字节包头，
//! 取第 2 字节为数据长度，再读满 `length + 1` 字节（数据 + 校验和）。
//! 整帧共用一个截止时间。

use crate::TransportError;
use looi_protocol::{HEADER_LENGTH, START_MARKER, packet_length};
use std::io;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// 带超时的字节源
///
/// 语义与 `std::io::Read::read` 相同，额外接收本次读取允许阻塞的最长时间：
/// - `Ok(0)`: 流已关闭
/// - `Err(TimedOut | WouldBlock)`: 本次读取超时
pub trait TimedRead {
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;
}

/// 读取一个完整数据包（不做校验，校验交给协议层）
pub fn read_packet<R: TimedRead + ?Sized>(
    source: &mut R,
    timeout: Duration,
) -> Result<Vec<u8>, TransportError> {
    let deadline = Instant::now() + timeout;

    let mut header = [0u8; HEADER_LENGTH];
    let mut skipped = 0usize;
    loop {
        read_exact_until(source, &mut header[..1], deadline, timeout)?;
        if header[0] == START_MARKER {
            break;
        }
        skipped += 1;
    }
    if skipped > 0 {
        debug!("Skipped {} bytes before start marker", skipped);
    }
    read_exact_until(source, &mut header[1..], deadline, timeout)?;

    let total = packet_length(&header);
    let mut packet = vec![0u8; total];
    packet[..HEADER_LENGTH].copy_from_slice(&header);
    read_exact_until(source, &mut packet[HEADER_LENGTH..], deadline, timeout)?;

    trace!("RX {} bytes: {:02X?}", packet.len(), packet);
    Ok(packet)
}

/// 单次清理最多丢弃的字节数，防止对端持续发送时无法返回
pub const DRAIN_LIMIT: usize = 4096;

/// 丢弃源中已到达的字节（不等待新数据），返回丢弃的字节数
///
/// 流已关闭时停止，关闭由下一次读取报告。
pub fn drain_pending<R: TimedRead + ?Sized>(source: &mut R) -> Result<usize, TransportError> {
    let mut scratch = [0u8; 64];
    let mut discarded = 0;
    while discarded < DRAIN_LIMIT {
        match source.read_timeout(&mut scratch, Duration::ZERO) {
            Ok(0) => break,
            Ok(n) => discarded += n,
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                break;
            },
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(TransportError::Communication(format!(
                    "Failed to discard input: {}",
                    e
                )));
            },
        }
    }
    if discarded > 0 {
        trace!("Discarded {} pending bytes", discarded);
    }
    Ok(discarded)
}

fn read_exact_until<R: TimedRead + ?Sized>(
    source: &mut R,
    buf: &mut [u8],
    deadline: Instant,
    timeout: Duration,
) -> Result<(), TransportError> {
    let mut filled = 0;
    while filled < buf.len() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(TransportError::Timeout(timeout));
        }

        match source.read_timeout(&mut buf[filled..], remaining) {
            Ok(0) => {
                return Err(TransportError::Communication("End of stream".to_string()));
            },
            Ok(n) => filled += n,
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                continue;
            },
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(TransportError::Communication(format!(
                    "Failed to read response: {}",
                    e
                )));
            },
        }
    }
    Ok(())
}
