//! 读帧逻辑在任意分块下的行为

use looi_protocol::{CommandType, Packet, build_command};
use looi_transport::{TimedRead, TransportError, read_packet};
use proptest::prelude::*;
use std::collections::VecDeque;
use std::io;
use std::time::Duration;

/// 按固定切分点返回数据，耗尽后超时
struct SplitSource {
    chunks: VecDeque<Vec<u8>>,
}

impl SplitSource {
    fn new(bytes: &[u8], cuts: &[usize]) -> Self {
        let mut chunks = VecDeque::new();
        let mut start = 0;
        let mut cuts: Vec<usize> = cuts.iter().map(|c| c % (bytes.len() + 1)).collect();
        cuts.sort_unstable();
        for cut in cuts {
            if cut > start {
                chunks.push_back(bytes[start..cut].to_vec());
                start = cut;
            }
        }
        if start < bytes.len() {
            chunks.push_back(bytes[start..].to_vec());
        }
        Self { chunks }
    }
}

impl TimedRead for SplitSource {
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let Some(mut chunk) = self.chunks.pop_front() else {
            std::thread::sleep(timeout.min(Duration::from_millis(2)));
            return Err(io::ErrorKind::TimedOut.into());
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            self.chunks.push_front(chunk.split_off(n));
        }
        Ok(n)
    }
}

proptest! {
    #[test]
    fn packet_survives_any_chunking(
        payload in proptest::collection::vec(any::<u8>(), 0..64),
        cuts in proptest::collection::vec(any::<usize>(), 0..8),
    ) {
        let packet = build_command(CommandType::SensorRead, &payload).unwrap();
        let mut source = SplitSource::new(&packet, &cuts);

        let read = read_packet(&mut source, Duration::from_millis(200)).unwrap();
        prop_assert_eq!(&read, &packet);
        let parsed = Packet::parse(&read).unwrap();
        prop_assert_eq!(parsed.payload(), &payload[..]);
    }

    #[test]
    fn truncated_packet_times_out(
        payload in proptest::collection::vec(any::<u8>(), 1..32),
        keep in 0usize..100,
    ) {
        let packet = build_command(CommandType::MotorControl, &payload).unwrap();
        let keep = keep % packet.len();
        let mut source = SplitSource::new(&packet[..keep], &[]);

        let err = read_packet(&mut source, Duration::from_millis(10)).unwrap_err();
        prop_assert!(matches!(err, TransportError::Timeout(_)));
    }
}
