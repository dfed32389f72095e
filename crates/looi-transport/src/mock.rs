//! Mock 传输（无硬件依赖）
//!
//! 入站字节由测试脚本化注入，出站命令被完整记录。读取走与真实后端相同的
//! [`read_packet`](crate::reader::read_packet) 逻辑，因此超时/断流语义与真实设备一致。

use crate::reader::{TimedRead, drain_pending, read_packet};
use crate::{
    AtomicLinkState, LinkState, Transport, TransportError, begin_connect, ensure_connected,
    record_failure,
};
use looi_protocol::{
    CommandType, DEFAULT_TIMEOUT, OFFSET_COMMAND_TYPE, ResultCode, build_command,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// 根据收到的命令生成响应
pub type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

#[derive(Default)]
struct MockInner {
    inbound: VecDeque<u8>,
    sent: Vec<Vec<u8>>,
    responder: Option<Responder>,
    connect_error: Option<TransportError>,
    send_error: Option<TransportError>,
    eof: bool,
    connects: usize,
    disconnects: usize,
}

/// 测试侧句柄，可在传输被移交给上层后继续注入数据和检查记录
#[derive(Clone, Default)]
pub struct MockHandle {
    inner: Arc<Mutex<MockInner>>,
}

impl MockHandle {
    /// 追加原始入站字节
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.inner.lock().inbound.extend(bytes.iter().copied());
    }

    /// 追加一个合法响应包：`[result_code, data..]`
    pub fn push_response(&self, command_type: CommandType, result: ResultCode, data: &[u8]) {
        let mut payload = vec![u8::from(result)];
        payload.extend_from_slice(data);
        // 测试数据长度远小于 255
        if let Ok(packet) = build_command(command_type, &payload) {
            self.push_bytes(&packet);
        }
    }

    /// 每条命令发出后调用 `responder` 生成响应
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static,
    {
        self.inner.lock().responder = Some(Box::new(responder));
    }

    /// 对每条命令回复 SUCCESS，数据为 `data`
    pub fn respond_success(&self, data: Vec<u8>) {
        self.set_responder(move |command| {
            let command_type = *command.get(OFFSET_COMMAND_TYPE)?;
            let mut payload = vec![u8::from(ResultCode::Success)];
            payload.extend_from_slice(&data);
            build_command(command_type, &payload).ok()
        });
    }

    /// 下一次 `connect()` 失败
    pub fn fail_next_connect(&self, err: TransportError) {
        self.inner.lock().connect_error = Some(err);
    }

    /// 下一次 `send_command()` 失败
    pub fn fail_next_send(&self, err: TransportError) {
        self.inner.lock().send_error = Some(err);
    }

    /// 入站数据耗尽后返回 EOF（模拟对端关闭）
    pub fn close_inbound(&self) {
        self.inner.lock().eof = true;
    }

    /// 已发送的全部命令
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.inner.lock().sent.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.inner.lock().sent.len()
    }

    pub fn connect_count(&self) -> usize {
        self.inner.lock().connects
    }

    pub fn disconnect_count(&self) -> usize {
        self.inner.lock().disconnects
    }
}

/// Mock 传输
pub struct MockTransport {
    handle: MockHandle,
    state: AtomicLinkState,
    timeout: Duration,
}

impl MockTransport {
    /// 创建传输和对应的测试句柄
    pub fn new() -> (Self, MockHandle) {
        let handle = MockHandle::default();
        let transport = Self {
            handle: handle.clone(),
            state: AtomicLinkState::default(),
            timeout: DEFAULT_TIMEOUT,
        };
        (transport, handle)
    }

    /// 设置默认读超时（测试中通常调小以加快超时场景）
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Transport for MockTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        if begin_connect(&self.state)? {
            return Ok(());
        }

        let mut inner = self.handle.inner.lock();
        if let Some(err) = inner.connect_error.take() {
            self.state.set(LinkState::Disconnected);
            return Err(err);
        }
        inner.connects += 1;
        self.state.set(LinkState::Connected);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.state.get() == LinkState::Disconnected {
            return;
        }
        self.state.set(LinkState::Disconnecting);
        self.handle.inner.lock().disconnects += 1;
        self.state.set(LinkState::Disconnected);
    }

    fn send_command(&mut self, packet: &[u8]) -> Result<(), TransportError> {
        ensure_connected(&self.state)?;

        let mut inner = self.handle.inner.lock();
        if let Some(err) = inner.send_error.take() {
            drop(inner);
            record_failure(&self.state, &err);
            return Err(err);
        }

        inner.sent.push(packet.to_vec());
        let response = inner.responder.as_mut().and_then(|respond| respond(packet));
        if let Some(response) = response {
            inner.inbound.extend(response);
        }
        Ok(())
    }

    fn discard_input(&mut self) -> Result<usize, TransportError> {
        ensure_connected(&self.state)?;
        drain_pending(&mut MockReader(&self.handle))
    }

    fn read_response_timeout(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        ensure_connected(&self.state)?;

        let result = read_packet(&mut MockReader(&self.handle), timeout);
        if let Err(e) = &result {
            record_failure(&self.state, e);
        }
        result
    }

    fn state(&self) -> LinkState {
        self.state.get()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

struct MockReader<'a>(&'a MockHandle);

impl TimedRead for MockReader<'_> {
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        {
            let mut inner = self.0.inner.lock();
            if !inner.inbound.is_empty() {
                let n = buf.len().min(inner.inbound.len());
                for (slot, byte) in buf.iter_mut().zip(inner.inbound.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
            if inner.eof {
                return Ok(0);
            }
        }
        // 不持锁等待，允许其他线程注入数据
        std::thread::sleep(timeout.min(Duration::from_millis(5)));
        Err(io::Error::from(io::ErrorKind::TimedOut))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_is_idempotent() {
        let (mut transport, handle) = MockTransport::new();
        transport.connect().unwrap();
        transport.connect().unwrap();
        assert_eq!(handle.connect_count(), 1);
        assert!(transport.is_connected());
    }

    #[test]
    fn test_disconnect_when_not_connected_is_noop() {
        let (mut transport, handle) = MockTransport::new();
        transport.disconnect();
        assert_eq!(handle.disconnect_count(), 0);
        assert_eq!(transport.state(), LinkState::Disconnected);
    }

    #[test]
    fn test_send_and_read_scripted_response() {
        let (mut transport, handle) = MockTransport::new();
        transport.connect().unwrap();
        handle.push_response(CommandType::MotorControl, ResultCode::Success, &[]);

        transport.send_command(&[0xAA, 0x01, 0x00, 0x00, 0xAB]).unwrap();
        let response = transport.read_response().unwrap();

        assert_eq!(response, vec![0xAA, 0x01, 0x01, 0x00, 0x00, 0xAC]);
        assert_eq!(handle.sent(), vec![vec![0xAA, 0x01, 0x00, 0x00, 0xAB]]);
    }

    #[test]
    fn test_silence_is_timeout_and_keeps_connection() {
        let (transport, _handle) = MockTransport::new();
        let mut transport = transport.with_timeout(Duration::from_millis(20));
        transport.connect().unwrap();

        let err = transport.read_response().unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
        assert_eq!(transport.state(), LinkState::Connected);
    }

    #[test]
    fn test_discard_input_drops_late_bytes() {
        let (mut transport, handle) = MockTransport::new();
        assert!(transport.discard_input().is_err());
        transport.connect().unwrap();
        handle.push_response(CommandType::SensorRead, ResultCode::Success, &[200]);

        assert_eq!(transport.discard_input().unwrap(), 7);
        assert_eq!(transport.discard_input().unwrap(), 0);
        assert!(matches!(
            transport.read_response_timeout(Duration::from_millis(10)),
            Err(TransportError::Timeout(_))
        ));
        assert_eq!(transport.state(), LinkState::Connected);
    }

    #[test]
    fn test_eof_moves_link_to_error_state() {
        let (mut transport, handle) = MockTransport::new();
        transport.connect().unwrap();
        handle.close_inbound();

        let err = transport.read_response().unwrap_err();
        assert!(matches!(err, TransportError::Communication(_)));
        assert_eq!(transport.state(), LinkState::Error);

        // Error 状态下不能直接重连
        assert!(matches!(
            transport.connect(),
            Err(TransportError::Connection(_))
        ));
        assert!(matches!(
            transport.send_command(&[0xAA]),
            Err(TransportError::Communication(_))
        ));

        // disconnect 之后可以恢复
        transport.disconnect();
        transport.connect().unwrap();
        assert_eq!(handle.connect_count(), 2);
    }

    #[test]
    fn test_injected_connect_failure() {
        let (mut transport, handle) = MockTransport::new();
        handle.fail_next_connect(TransportError::Connection("No paired devices found".into()));

        assert!(transport.connect().is_err());
        assert_eq!(transport.state(), LinkState::Disconnected);
        transport.connect().unwrap();
    }

    #[test]
    fn test_responder_acknowledges_each_command() {
        let (mut transport, handle) = MockTransport::new();
        handle.respond_success(vec![0x2A]);
        transport.connect().unwrap();

        for _ in 0..3 {
            transport
                .send_command(&build_command(CommandType::SensorRead, &[0x01]).unwrap())
                .unwrap();
            let response = transport.read_response().unwrap();
            assert_eq!(&response[4..6], &[0x00, 0x2A]);
            assert_eq!(response[1], 0x02);
        }
        assert_eq!(handle.sent_count(), 3);
    }
}
