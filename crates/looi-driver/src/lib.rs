//! # Looi Driver
//!
//! 机器人底座的设备驱动层，包括：
//! - 共享链路 [`RobotLink`]（引用计数连接、请求/响应串行化、无锁状态快照）
//! - 电机控制 [`MotorController`]
//! - 传感器读取 [`SensorManager`]
//! - 按方向运动与运动状态快照 [`RobotControl`]
//! - 可选重试策略 [`RetryPolicy`]
//! - TOML 配置与通道构建
//!
//! # Example
//!
//! ```no_run
//! use looi_driver::{LinkConfig, MotorController, SensorManager, open_link};
//!
//! let config = LinkConfig::default();
//! let link = open_link(&config)?;
//!
//! let motor = MotorController::new(link.clone());
//! let sensors = SensorManager::new(link.clone());
//! motor.initialize()?;
//! sensors.initialize()?;
//!
//! motor.move_forward(1.0)?;
//! let data = sensors.get_sensor_data()?;
//! println!("distance: {} cm", data.distance);
//!
//! motor.release()?;
//! sensors.release();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod config;
mod control;
mod error;
mod link;
mod motor;
pub mod retry;
mod sensor;

pub use config::{
    ConfigError, DEFAULT_BAUD_RATE, LinkConfig, RetryConfig, ScanConfig, TransportConfig,
    build_transport, open_link,
};
#[cfg(all(target_os = "linux", feature = "bluetooth"))]
pub use config::build_scanner;
pub use control::{MIN_BATTERY_LEVEL, RobotControl, RobotStatus};
pub use error::{ControlError, HardwareError};
pub use link::{LinkLease, LinkStatus, RobotLink};
pub use motor::MotorController;
pub use retry::{RetryPolicy, Retryable};
pub use sensor::SensorManager;
