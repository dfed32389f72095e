//! Looi SDK - Looi 机器人底座 Rust SDK
//!
//! 通过 USB 串口或蓝牙 RFCOMM 与机器人底座通信，控制电机并读取传感器。
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **协议层** (`protocol`): 数据包编解码、运动意图编码、传感器换算
//! - **传输层** (`transport`): 串口/蓝牙/Mock 通道，设备扫描
//! - **驱动层** (`driver`): 共享链路、电机控制器、传感器管理器、机器人控制、配置
//!
//! # 快速开始
//!
//! ```no_run
//! use looi_sdk::prelude::*;
//!
//! looi_sdk::init_logger!();
//!
//! let link = open_link(&LinkConfig::default())?;
//! let motor = MotorController::new(link.clone());
//! motor.initialize()?;
//! motor.rotate(90.0)?;
//! motor.release()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use looi_driver as driver;
pub use looi_protocol as protocol;
pub use looi_transport as transport;

pub mod logging;
pub mod prelude;

pub use logging::{init_logger, init_logger_with, try_init_logger};

// 协议层
pub use protocol::{
    CommandType, MotionIntent, MovementDirection, ProtocolError, ResultCode, SensorData, SensorKind,
};

// 传输层
pub use transport::{DeviceScanner, DiscoveredDevice, LinkState, Transport, TransportError};

// 驱动层（推荐入口）
pub use driver::{
    ConfigError, ControlError, HardwareError, LinkConfig, LinkStatus, MotorController, RetryPolicy,
    RobotControl, RobotLink, RobotStatus, SensorManager, build_transport, open_link,
};
