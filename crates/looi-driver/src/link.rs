//! 共享物理链路
//!
//! 一个 [`RobotLink`] 独占一个 `Transport`，电机控制器和传感器管理器通过 `Arc` 共享它。
//!
//! - 请求/响应对在链路互斥锁内完成，不同调用方的命令不会交错
//! - 引用计数租约：第一个 [`LinkLease`] 建立连接，最后一个租约释放时断开
//! - 状态快照通过 `ArcSwap` 发布，读取无锁

use crate::error::HardwareError;
use arc_swap::ArcSwap;
use looi_protocol::{CommandType, Packet, build_command};
use looi_transport::{LinkState, Transport, TransportError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// 链路状态快照
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinkStatus {
    /// 传输层连接状态
    pub state: LinkState,
    /// 最近一次操作名称
    pub last_operation: Option<String>,
    /// 最近一次操作的错误（成功后清空）
    pub last_error: Option<String>,
    /// 已发送命令数
    pub commands_sent: u64,
    /// 失败操作数
    pub failures: u64,
}

/// 共享链路
pub struct RobotLink {
    transport: Mutex<Box<dyn Transport>>,
    /// 活跃租约数；连接/断开在此锁内完成
    leases: Mutex<usize>,
    status: ArcSwap<LinkStatus>,
    description: String,
}

impl RobotLink {
    pub fn new(transport: Box<dyn Transport>) -> Arc<Self> {
        let description = transport.describe();
        let status = LinkStatus {
            state: transport.state(),
            ..Default::default()
        };
        Arc::new(Self {
            transport: Mutex::new(transport),
            leases: Mutex::new(0),
            status: ArcSwap::from_pointee(status),
            description,
        })
    }

    /// 通道描述（如 "serial:/dev/ttyUSB0@115200"）
    pub fn describe(&self) -> &str {
        &self.description
    }

    /// 获取租约，必要时建立连接
    ///
    /// 连接失败时不计入租约。
    pub fn acquire(self: &Arc<Self>) -> Result<LinkLease, HardwareError> {
        let mut leases = self.leases.lock();
        if *leases == 0 {
            let mut transport = self.transport.lock();
            let result = transport.connect();
            self.update_state(transport.state());
            if let Err(e) = result {
                error!("Failed to connect {}: {}", self.description, e);
                let err = HardwareError::from(e);
                self.record_result("connect", &Err::<(), _>(err.clone()));
                return Err(err);
            }
            info!("Link {} connected", self.description);
        }
        *leases += 1;
        debug!("Link lease acquired ({} active)", *leases);
        Ok(LinkLease {
            link: Arc::clone(self),
        })
    }

    fn release_lease(&self) {
        let mut leases = self.leases.lock();
        *leases = leases.saturating_sub(1);
        debug!("Link lease released ({} active)", *leases);
        if *leases == 0 {
            let mut transport = self.transport.lock();
            transport.disconnect();
            self.update_state(transport.state());
            info!("Link {} disconnected", self.description);
        }
    }

    /// 活跃租约数
    pub fn lease_count(&self) -> usize {
        *self.leases.lock()
    }

    /// 状态快照（无锁）
    pub fn status(&self) -> LinkStatus {
        self.status.load().as_ref().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status.load().state.is_connected()
    }

    /// 记录一次高层操作的结果
    ///
    /// 只更新状态快照，不改变连接。
    pub fn record_result<T>(&self, operation: &str, result: &Result<T, HardwareError>) {
        if let Err(e) = result {
            warn!("{} failed: {}", operation, e);
        }
        self.status.rcu(|current| {
            let mut next = LinkStatus::clone(current);
            next.last_operation = Some(operation.to_string());
            match result {
                Ok(_) => next.last_error = None,
                Err(e) => {
                    next.last_error = Some(e.to_string());
                    next.failures += 1;
                },
            }
            next
        });
    }

    fn update_state(&self, state: LinkState) {
        self.status.rcu(|current| LinkStatus {
            state,
            ..LinkStatus::clone(current)
        });
    }

    fn count_command(&self) {
        self.status.rcu(|current| LinkStatus {
            commands_sent: current.commands_sent + 1,
            ..LinkStatus::clone(current)
        });
    }

    fn transact(
        &self,
        command_type: CommandType,
        payload: &[u8],
    ) -> Result<Vec<u8>, HardwareError> {
        let packet = build_command(command_type, payload)?;

        let mut transport = self.transport.lock();
        let exchange = match transport.send_command(&packet) {
            Ok(()) => {
                self.count_command();
                read_matching(&mut **transport, command_type)
            },
            Err(e) => Err(e.into()),
        };
        // 超时或损坏后残留的字节不能留给下一条命令
        if matches!(
            exchange,
            Err(HardwareError::Timeout(_) | HardwareError::Protocol(_))
        ) {
            match transport.discard_input() {
                Ok(0) => {},
                Ok(n) => debug!("Discarded {} stale bytes after failed exchange", n),
                Err(e) => warn!("Failed to discard input: {}", e),
            }
        }
        self.update_state(transport.state());
        exchange
    }
}

/// 读取与 `command_type` 对应的响应，跳过其他命令的迟到响应
///
/// 整个等待过程共用传输的读超时。
fn read_matching(
    transport: &mut dyn Transport,
    command_type: CommandType,
) -> Result<Vec<u8>, HardwareError> {
    let timeout = transport.timeout();
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(HardwareError::Timeout(timeout));
        }
        let response = transport
            .read_response_timeout(remaining)
            .map_err(|e| match e {
                TransportError::Timeout(_) => HardwareError::Timeout(timeout),
                other => HardwareError::from(other),
            })?;

        let parsed = Packet::parse(&response)?;
        if parsed.command_type_raw() == command_type.as_u8() {
            return Ok(parsed.payload().to_vec());
        }
        warn!(
            "Skipping stale response of type 0x{:02X} while waiting for 0x{:02X}",
            parsed.command_type_raw(),
            command_type.as_u8()
        );
    }
}

/// 链路租约
///
/// 持有租约期间链路保持连接；丢弃最后一个租约时断开。
pub struct LinkLease {
    link: Arc<RobotLink>,
}

impl LinkLease {
    pub fn link(&self) -> &Arc<RobotLink> {
        &self.link
    }

    /// 发送一条命令并返回响应数据部分（第 0 字节为结果码）
    ///
    /// 整个请求/响应在链路锁内完成。
    pub fn transact(
        &self,
        command_type: CommandType,
        payload: &[u8],
    ) -> Result<Vec<u8>, HardwareError> {
        self.link.transact(command_type, payload)
    }
}

impl std::fmt::Debug for LinkLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkLease")
            .field("link", &self.link.description)
            .finish()
    }
}

impl Drop for LinkLease {
    fn drop(&mut self) {
        self.link.release_lease();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use looi_protocol::ResultCode;
    use looi_transport::{MockHandle, MockTransport};
    use std::time::Duration;

    fn mock_link() -> (Arc<RobotLink>, MockHandle) {
        let (transport, handle) = MockTransport::new();
        let transport = transport.with_timeout(Duration::from_millis(30));
        (RobotLink::new(Box::new(transport)), handle)
    }

    #[test]
    fn test_first_lease_connects_last_lease_disconnects() {
        let (link, handle) = mock_link();
        assert!(!link.is_connected());

        let first = link.acquire().unwrap();
        let second = link.acquire().unwrap();
        assert_eq!(handle.connect_count(), 1);
        assert_eq!(link.lease_count(), 2);
        assert!(link.is_connected());

        drop(first);
        assert_eq!(handle.disconnect_count(), 0);
        assert!(link.is_connected());

        drop(second);
        assert_eq!(handle.disconnect_count(), 1);
        assert_eq!(link.lease_count(), 0);
        assert_eq!(link.status().state, LinkState::Disconnected);
    }

    #[test]
    fn test_failed_connect_is_not_counted() {
        let (link, handle) = mock_link();
        handle.fail_next_connect(TransportError::Connection("No paired devices found".into()));

        let err = link.acquire().unwrap_err();
        assert_eq!(
            err,
            HardwareError::Connection("No paired devices found".to_string())
        );
        assert_eq!(link.lease_count(), 0);
        let status = link.status();
        assert_eq!(status.last_operation.as_deref(), Some("connect"));
        assert!(status.last_error.is_some());

        let _lease = link.acquire().unwrap();
        assert_eq!(handle.connect_count(), 1);
    }

    #[test]
    fn test_transact_returns_payload() {
        let (link, handle) = mock_link();
        let lease = link.acquire().unwrap();
        handle.push_response(CommandType::SensorRead, ResultCode::Success, &[200]);

        let payload = lease.transact(CommandType::SensorRead, &[0x01]).unwrap();

        assert_eq!(payload, vec![0x00, 200]);
        assert_eq!(handle.sent(), vec![vec![0xAA, 0x02, 0x01, 0x00, 0x01, 0xAE]]);
        assert_eq!(link.status().commands_sent, 1);
    }

    #[test]
    fn test_corrupt_response_is_protocol_error() {
        let (link, handle) = mock_link();
        let lease = link.acquire().unwrap();
        handle.push_bytes(&[0xAA, 0x01, 0x01, 0x00, 0x00, 0x00]);

        let err = lease.transact(CommandType::MotorControl, &[0x00]).unwrap_err();
        assert!(matches!(err, HardwareError::Protocol(_)));
        // 协议错误不影响连接
        assert!(link.is_connected());
    }

    #[test]
    fn test_response_for_another_command_is_skipped() {
        let (link, handle) = mock_link();
        let lease = link.acquire().unwrap();
        handle.push_response(CommandType::SensorRead, ResultCode::Success, &[200]);
        handle.push_response(CommandType::MotorControl, ResultCode::Error, &[]);

        let payload = lease.transact(CommandType::MotorControl, &[0x00]).unwrap();
        assert_eq!(payload, vec![0xFF]);
    }

    #[test]
    fn test_only_stale_responses_is_timeout() {
        let (link, handle) = mock_link();
        let lease = link.acquire().unwrap();
        handle.push_response(CommandType::BatteryRead, ResultCode::Success, &[120]);

        let err = lease.transact(CommandType::MotorControl, &[0x00]).unwrap_err();
        assert_eq!(err, HardwareError::Timeout(Duration::from_millis(30)));
        assert!(link.is_connected());
    }

    #[test]
    fn test_record_result_updates_status_only() {
        let (link, _handle) = mock_link();
        let _lease = link.acquire().unwrap();

        link.record_result::<()>(
            "move forward",
            &Err(HardwareError::Communication("Failed to move forward".into())),
        );
        let status = link.status();
        assert_eq!(status.last_operation.as_deref(), Some("move forward"));
        assert_eq!(status.failures, 1);
        assert!(status.last_error.unwrap().contains("Failed to move forward"));
        assert_eq!(status.state, LinkState::Connected);

        link.record_result("stop", &Ok(()));
        assert_eq!(link.status().last_error, None);
        assert_eq!(link.status().failures, 1);
    }
}
