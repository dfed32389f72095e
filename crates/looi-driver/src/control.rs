//! 机器人控制
//!
//! [`RobotControl`] 组合电机控制器和传感器管理器，在共享链路之上提供按方向运动、
//! 速度/电量校验，并通过 `ArcSwap` 发布运动状态快照 [`RobotStatus`]。
//!
//! 校验顺序：初始化 → 速度范围 → 电量，任一失败都不会发送字节。

use crate::error::{ControlError, HardwareError};
use crate::link::RobotLink;
use crate::motor::MotorController;
use crate::sensor::SensorManager;
use arc_swap::ArcSwap;
use looi_protocol::{MovementDirection, SensorData};
use std::sync::Arc;
use tracing::{debug, warn};

/// 低于该电量时拒绝运动和传感器读取
pub const MIN_BATTERY_LEVEL: f32 = 0.1;

/// 机器人运动状态快照
#[derive(Debug, Clone, PartialEq)]
pub struct RobotStatus {
    pub is_moving: bool,
    /// 最近一次下发的速度
    pub current_speed: f32,
    /// 最近一次运动方向，从未运动时为 `None`
    pub current_direction: Option<MovementDirection>,
    /// 电量（0.0 ~ 1.0）
    pub battery_level: f32,
    /// 最近一次失败（下一次成功后清空）
    pub error: Option<String>,
    pub is_connected: bool,
}

impl Default for RobotStatus {
    fn default() -> Self {
        Self {
            is_moving: false,
            current_speed: 0.0,
            current_direction: None,
            battery_level: 1.0,
            error: None,
            is_connected: false,
        }
    }
}

/// 机器人控制
///
/// # Example
///
/// ```no_run
/// use looi_driver::{LinkConfig, RobotControl, open_link};
/// use looi_protocol::MovementDirection;
///
/// let control = RobotControl::new(open_link(&LinkConfig::default())?);
/// control.initialize()?;
/// control.move_in(MovementDirection::Forward, 0.8)?;
/// assert!(control.status().is_moving);
/// control.stop()?;
/// control.release()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct RobotControl {
    motor: MotorController,
    sensors: SensorManager,
    status: ArcSwap<RobotStatus>,
}

impl RobotControl {
    pub fn new(link: Arc<RobotLink>) -> Self {
        Self {
            motor: MotorController::new(link.clone()),
            sensors: SensorManager::new(link),
            status: ArcSwap::from_pointee(RobotStatus::default()),
        }
    }

    pub fn motor(&self) -> &MotorController {
        &self.motor
    }

    pub fn sensors(&self) -> &SensorManager {
        &self.sensors
    }

    /// 初始化电机和传感器（已初始化时为空操作）
    pub fn initialize(&self) -> Result<(), ControlError> {
        let result = self
            .motor
            .initialize()
            .and_then(|_| self.sensors.initialize())
            .map_err(ControlError::Initialize);
        self.finish(&result);
        result
    }

    pub fn is_initialized(&self) -> bool {
        self.motor.is_initialized() && self.sensors.is_initialized()
    }

    /// 状态快照（无锁）
    pub fn status(&self) -> RobotStatus {
        let mut status = self.status.load().as_ref().clone();
        status.is_connected = self.motor.link().is_connected();
        status
    }

    /// 更新电量（由应用根据电池电压等换算后上报）
    pub fn update_battery_level(&self, level: f32) {
        let level = if level.is_finite() {
            level.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.update(|status| status.battery_level = level);
    }

    /// 沿 `direction` 以 `speed` 运动，`Stop` 等价于 [`stop`](Self::stop)
    pub fn move_in(&self, direction: MovementDirection, speed: f32) -> Result<(), ControlError> {
        if direction == MovementDirection::Stop {
            return self.stop();
        }

        let result = self
            .check_initialized("move")
            .and_then(|_| validate_speed(speed))
            .and_then(|_| self.check_battery())
            .and_then(|_| {
                self.motor
                    .execute(direction.intent(speed))
                    .map_err(|source| ControlError::Motion {
                        operation: "move",
                        source,
                    })
            });
        if result.is_ok() {
            self.update(|status| {
                status.is_moving = true;
                status.current_speed = speed;
                status.current_direction = Some(direction);
            });
        }
        self.finish(&result);
        result
    }

    /// 原地旋转，正角度逆时针
    pub fn rotate(&self, angle_deg: f32) -> Result<(), ControlError> {
        let result = self
            .check_initialized("rotate")
            .and_then(|_| self.check_battery())
            .and_then(|_| {
                self.motor
                    .rotate(angle_deg)
                    .map_err(|source| ControlError::Motion {
                        operation: "rotate",
                        source,
                    })
            });
        if result.is_ok() {
            self.update(|status| {
                status.is_moving = true;
                status.current_direction = Some(MovementDirection::of_rotation(angle_deg));
            });
        }
        self.finish(&result);
        result
    }

    /// 停止运动（不检查电量）
    pub fn stop(&self) -> Result<(), ControlError> {
        let result = self.motor.stop().map_err(|source| ControlError::Motion {
            operation: "stop",
            source,
        });
        if result.is_ok() {
            self.update(|status| {
                status.is_moving = false;
                status.current_speed = 0.0;
                status.current_direction = Some(MovementDirection::Stop);
            });
        }
        self.finish(&result);
        result
    }

    pub fn set_speed(&self, speed: f32) -> Result<(), ControlError> {
        let result = self
            .check_initialized("set speed")
            .and_then(|_| validate_speed(speed))
            .and_then(|_| {
                self.motor
                    .set_speed(speed)
                    .map_err(|source| ControlError::Motion {
                        operation: "set speed",
                        source,
                    })
            });
        if result.is_ok() {
            self.update(|status| status.current_speed = speed);
        }
        self.finish(&result);
        result
    }

    /// 读取全部传感器
    pub fn get_sensor_data(&self) -> Result<SensorData, ControlError> {
        let result = if self.sensors.is_initialized() {
            self.check_battery()
                .and_then(|_| self.sensors.get_sensor_data().map_err(ControlError::Sensor))
        } else {
            Err(ControlError::Sensor(HardwareError::NotInitialized))
        };
        self.finish(&result);
        result
    }

    /// 停止并释放电机和传感器（可重复调用）
    ///
    /// 停止命令失败时仍会释放，随后返回该错误。
    pub fn release(&self) -> Result<(), ControlError> {
        if !self.motor.is_initialized() && !self.sensors.is_initialized() {
            return Ok(());
        }

        let result = self.motor.release().map_err(|source| ControlError::Motion {
            operation: "stop",
            source,
        });
        self.sensors.release();
        self.update(|status| {
            status.is_moving = false;
            status.current_speed = 0.0;
        });
        self.finish(&result);
        debug!("Robot control released");
        result
    }

    fn check_initialized(&self, operation: &'static str) -> Result<(), ControlError> {
        if self.motor.is_initialized() {
            Ok(())
        } else {
            Err(ControlError::Motion {
                operation,
                source: HardwareError::NotInitialized,
            })
        }
    }

    fn check_battery(&self) -> Result<(), ControlError> {
        let level = self.status.load().battery_level;
        if level < MIN_BATTERY_LEVEL {
            Err(ControlError::BatteryLow(level))
        } else {
            Ok(())
        }
    }

    fn update(&self, apply: impl Fn(&mut RobotStatus)) {
        self.status.rcu(|current| {
            let mut next = RobotStatus::clone(current);
            apply(&mut next);
            next
        });
    }

    fn finish<T>(&self, result: &Result<T, ControlError>) {
        match result {
            Ok(_) => self.update(|status| status.error = None),
            Err(e) => {
                warn!("{}", e);
                let message = e.to_string();
                self.update(|status| status.error = Some(message.clone()));
            },
        }
    }
}

fn validate_speed(speed: f32) -> Result<(), ControlError> {
    if (0.0..=1.0).contains(&speed) {
        Ok(())
    } else {
        Err(ControlError::InvalidSpeed(speed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use looi_protocol::{CommandType, ResultCode};
    use looi_transport::{MockHandle, MockTransport};
    use std::time::Duration;

    fn control() -> (RobotControl, MockHandle) {
        let (transport, handle) = MockTransport::new();
        let link = RobotLink::new(Box::new(transport.with_timeout(Duration::from_millis(30))));
        (RobotControl::new(link), handle)
    }

    #[test]
    fn test_move_in_updates_status() {
        let (control, handle) = control();
        handle.respond_success(vec![]);
        control.initialize().unwrap();

        control.move_in(MovementDirection::Forward, 1.0).unwrap();

        assert_eq!(
            handle.sent(),
            vec![vec![0xAA, 0x01, 0x02, 0x00, 0x01, 0xFF, 0xAD]]
        );
        let status = control.status();
        assert!(status.is_moving);
        assert_eq!(status.current_speed, 1.0);
        assert_eq!(status.current_direction, Some(MovementDirection::Forward));
        assert!(status.is_connected);
        assert_eq!(status.error, None);
    }

    #[test]
    fn test_speed_out_of_range_sends_nothing() {
        let (control, handle) = control();
        control.initialize().unwrap();

        for speed in [-0.1, 1.01, f32::NAN] {
            assert!(matches!(
                control.move_in(MovementDirection::Left, speed),
                Err(ControlError::InvalidSpeed(_))
            ));
        }
        assert!(matches!(
            control.set_speed(2.0),
            Err(ControlError::InvalidSpeed(_))
        ));
        assert_eq!(handle.sent_count(), 0);
        let status = control.status();
        assert!(!status.is_moving);
        assert!(status.error.unwrap().contains("Speed must be between"));
    }

    #[test]
    fn test_uninitialized_is_reported_per_operation() {
        let (control, handle) = control();

        let err = control.move_in(MovementDirection::Backward, 0.5).unwrap_err();
        assert_eq!(err.to_string(), "Failed to move: Hardware not initialized");
        assert!(matches!(
            control.get_sensor_data(),
            Err(ControlError::Sensor(HardwareError::NotInitialized))
        ));
        assert_eq!(handle.sent_count(), 0);
    }

    #[test]
    fn test_stop_and_rotate_track_direction() {
        let (control, handle) = control();
        handle.respond_success(vec![]);
        control.initialize().unwrap();

        control.rotate(90.0).unwrap();
        let status = control.status();
        assert!(status.is_moving);
        assert_eq!(status.current_direction, Some(MovementDirection::Right));

        control.set_speed(0.4).unwrap();
        assert_eq!(control.status().current_speed, 0.4);

        control.move_in(MovementDirection::Stop, 0.9).unwrap();
        let status = control.status();
        assert!(!status.is_moving);
        assert_eq!(status.current_speed, 0.0);
        assert_eq!(status.current_direction, Some(MovementDirection::Stop));
        assert_eq!(handle.sent().last().unwrap(), &vec![0xAA, 0x01, 0x01, 0x00, 0x00, 0xAC]);
    }

    #[test]
    fn test_low_battery_blocks_motion_but_not_stop() {
        let (control, handle) = control();
        handle.respond_success(vec![]);
        control.initialize().unwrap();
        control.update_battery_level(0.05);

        assert_eq!(
            control.move_in(MovementDirection::Forward, 0.5),
            Err(ControlError::BatteryLow(0.05))
        );
        assert!(matches!(
            control.rotate(30.0),
            Err(ControlError::BatteryLow(_))
        ));
        assert!(matches!(
            control.get_sensor_data(),
            Err(ControlError::BatteryLow(_))
        ));
        assert_eq!(handle.sent_count(), 0);

        control.stop().unwrap();
        assert_eq!(handle.sent_count(), 1);
        assert_eq!(control.status().error, None);
    }

    #[test]
    fn test_device_error_keeps_previous_motion_state() {
        let (control, handle) = control();
        control.initialize().unwrap();
        handle.push_response(CommandType::MotorControl, ResultCode::Error, &[]);

        let err = control.move_in(MovementDirection::Forward, 0.5).unwrap_err();
        assert!(err.to_string().contains("Failed to move forward"));
        let status = control.status();
        assert!(!status.is_moving);
        assert_eq!(status.current_direction, None);
        assert!(status.error.is_some());
    }

    #[test]
    fn test_release_stops_and_disconnects() {
        let (control, handle) = control();
        handle.respond_success(vec![]);
        control.initialize().unwrap();
        assert_eq!(handle.connect_count(), 1);

        control.release().unwrap();
        control.release().unwrap();

        assert!(!control.is_initialized());
        assert_eq!(handle.sent_count(), 1);
        assert_eq!(handle.disconnect_count(), 1);
        assert!(!control.status().is_connected);
    }
}
