//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use looi_sdk::prelude::*;
//! ```

pub use crate::driver::{
    ControlError, HardwareError, LinkConfig, MotorController, RetryPolicy, RobotControl, RobotLink,
    RobotStatus, SensorManager, open_link,
};
pub use crate::protocol::{MotionIntent, MovementDirection, SensorData, SensorKind};
pub use crate::transport::{LinkState, Transport};
