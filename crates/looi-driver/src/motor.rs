//! 电机控制器
//!
//! 把 [`MotionIntent`] 编码为 `MOTOR_CONTROL` 命令，并校验响应结果码。

use crate::error::HardwareError;
use crate::link::{LinkLease, RobotLink};
use looi_protocol::{CommandType, MotionIntent, ResultCode};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// 电机控制器
///
/// 所有运动方法都要求先调用 [`initialize`](Self::initialize)，否则返回
/// [`HardwareError::NotInitialized`] 且不发送任何字节。
///
/// # Example
///
/// ```no_run
/// use looi_driver::{MotorController, RobotLink};
/// use looi_transport::{SerialConfig, SerialTransport};
///
/// let link = RobotLink::new(Box::new(SerialTransport::new(SerialConfig::default())));
/// let motor = MotorController::new(link);
/// motor.initialize()?;
/// motor.move_forward(0.5)?;
/// motor.stop()?;
/// motor.release()?;
/// # Ok::<(), looi_driver::HardwareError>(())
/// ```
pub struct MotorController {
    link: Arc<RobotLink>,
    lease: Mutex<Option<LinkLease>>,
}

impl MotorController {
    pub fn new(link: Arc<RobotLink>) -> Self {
        Self {
            link,
            lease: Mutex::new(None),
        }
    }

    pub fn link(&self) -> &Arc<RobotLink> {
        &self.link
    }

    /// 建立连接（已初始化时为空操作）
    pub fn initialize(&self) -> Result<(), HardwareError> {
        let mut lease = self.lease.lock();
        if lease.is_none() {
            *lease = Some(self.link.acquire()?);
            debug!("Motor controller initialized on {}", self.link.describe());
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.lease.lock().is_some()
    }

    /// 执行一个运动意图
    pub fn execute(&self, intent: MotionIntent) -> Result<(), HardwareError> {
        let lease = self.lease.lock();
        let result = match lease.as_ref() {
            Some(lease) => send_intent(lease, intent),
            None => Err(HardwareError::NotInitialized),
        };
        self.link.record_result(intent.operation(), &result);
        result
    }

    pub fn move_forward(&self, speed: f32) -> Result<(), HardwareError> {
        self.execute(MotionIntent::MoveForward(speed))
    }

    pub fn move_backward(&self, speed: f32) -> Result<(), HardwareError> {
        self.execute(MotionIntent::MoveBackward(speed))
    }

    pub fn turn_left(&self, speed: f32) -> Result<(), HardwareError> {
        self.execute(MotionIntent::TurnLeft(speed))
    }

    pub fn turn_right(&self, speed: f32) -> Result<(), HardwareError> {
        self.execute(MotionIntent::TurnRight(speed))
    }

    /// 原地旋转，正角度逆时针
    pub fn rotate(&self, angle_deg: f32) -> Result<(), HardwareError> {
        self.execute(MotionIntent::Rotate(angle_deg))
    }

    pub fn stop(&self) -> Result<(), HardwareError> {
        self.execute(MotionIntent::Stop)
    }

    pub fn set_speed(&self, speed: f32) -> Result<(), HardwareError> {
        self.execute(MotionIntent::SetSpeed(speed))
    }

    /// 停止电机并释放链路租约
    ///
    /// 可重复调用。停止命令失败时租约仍会释放，随后返回该错误。
    pub fn release(&self) -> Result<(), HardwareError> {
        let Some(lease) = self.lease.lock().take() else {
            return Ok(());
        };

        let result = send_intent(&lease, MotionIntent::Stop);
        self.link.record_result("release", &result);
        drop(lease);
        debug!("Motor controller released");
        result
    }
}

impl Drop for MotorController {
    fn drop(&mut self) {
        if self.lease.get_mut().is_some()
            && let Err(e) = self.release()
        {
            warn!("Failed to stop motor while dropping controller: {}", e);
        }
    }
}

fn send_intent(lease: &LinkLease, intent: MotionIntent) -> Result<(), HardwareError> {
    let payload = intent.encode()?;
    let response = lease.transact(CommandType::MotorControl, &payload)?;

    match response.first().map(|&code| ResultCode::from(code)) {
        Some(code) if code.is_success() => Ok(()),
        _ => Err(HardwareError::Communication(format!(
            "Failed to {}",
            intent.operation()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use looi_transport::{MockHandle, MockTransport, TransportError};
    use std::time::Duration;

    fn controller() -> (MotorController, MockHandle) {
        let (transport, handle) = MockTransport::new();
        let transport = transport.with_timeout(Duration::from_millis(30));
        (
            MotorController::new(RobotLink::new(Box::new(transport))),
            handle,
        )
    }

    #[test]
    fn test_initialize_connects_once() {
        let (motor, handle) = controller();
        motor.initialize().unwrap();
        motor.initialize().unwrap();
        assert!(motor.is_initialized());
        assert_eq!(handle.connect_count(), 1);
    }

    #[test]
    fn test_commands_on_the_wire() {
        let (motor, handle) = controller();
        handle.respond_success(Vec::new());
        motor.initialize().unwrap();

        motor.move_backward(0.5).unwrap();
        motor.turn_left(0.0).unwrap();
        motor.rotate(-90.0).unwrap();
        motor.stop().unwrap();

        let sent = handle.sent();
        assert_eq!(sent[0], vec![0xAA, 0x01, 0x02, 0x00, 0x02, 0x80, 0x2F]);
        assert_eq!(sent[1], vec![0xAA, 0x01, 0x02, 0x00, 0x03, 0x00, 0xB0]);
        assert_eq!(&sent[2][4..7], &[0x05, 0x02, 0x40]);
        assert_eq!(sent[3], vec![0xAA, 0x01, 0x01, 0x00, 0x00, 0xAC]);
    }

    #[test]
    fn test_invalid_speed_sends_nothing() {
        let (motor, handle) = controller();
        motor.initialize().unwrap();

        let err = motor.set_speed(f32::NAN).unwrap_err();
        assert!(matches!(err, HardwareError::Protocol(_)));
        assert_eq!(handle.sent_count(), 0);
    }

    #[test]
    fn test_empty_response_payload_is_failure() {
        let (motor, handle) = controller();
        motor.initialize().unwrap();
        handle.push_bytes(&[0xAA, 0x01, 0x00, 0x00, 0xAB]);

        let err = motor.turn_right(1.0).unwrap_err();
        assert_eq!(
            err,
            HardwareError::Communication("Failed to turn right".to_string())
        );
    }

    #[test]
    fn test_release_is_idempotent() {
        let (motor, handle) = controller();
        handle.respond_success(Vec::new());
        motor.initialize().unwrap();

        motor.release().unwrap();
        motor.release().unwrap();

        assert!(!motor.is_initialized());
        assert_eq!(handle.sent(), vec![vec![0xAA, 0x01, 0x01, 0x00, 0x00, 0xAC]]);
        assert_eq!(handle.disconnect_count(), 1);
        assert_eq!(motor.stop(), Err(HardwareError::NotInitialized));
    }

    #[test]
    fn test_release_returns_stop_error_after_cleanup() {
        let (motor, handle) = controller();
        motor.initialize().unwrap();
        handle.fail_next_send(TransportError::Communication("Broken pipe".into()));

        let err = motor.release().unwrap_err();
        assert!(matches!(err, HardwareError::Communication(_)));
        assert!(!motor.is_initialized());
        assert_eq!(handle.disconnect_count(), 1);
    }

    #[test]
    fn test_drop_stops_initialized_motor() {
        let (motor, handle) = controller();
        handle.respond_success(Vec::new());
        motor.initialize().unwrap();
        drop(motor);

        assert_eq!(handle.sent(), vec![vec![0xAA, 0x01, 0x01, 0x00, 0x00, 0xAC]]);
        assert_eq!(handle.disconnect_count(), 1);
    }
}
