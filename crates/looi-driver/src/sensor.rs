//! 传感器管理器

use crate::error::HardwareError;
use crate::link::{LinkLease, RobotLink};
use looi_protocol::{ProtocolError, ResultCode, SensorData, SensorKind};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

/// 响应数据最少字节数：结果码 + 原始读数
const MIN_READING_PAYLOAD: usize = 2;

/// 传感器管理器
///
/// 与 [`MotorController`](crate::MotorController) 共享同一个 [`RobotLink`] 时，
/// 两者的命令在链路上串行执行。
pub struct SensorManager {
    link: Arc<RobotLink>,
    lease: Mutex<Option<LinkLease>>,
}

impl SensorManager {
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
            debug!("Sensor manager initialized on {}", self.link.describe());
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.lease.lock().is_some()
    }

    /// 读取一个传感器，返回物理量
    pub fn read(&self, kind: SensorKind) -> Result<f32, HardwareError> {
        let lease = self.lease.lock();
        let result = match lease.as_ref() {
            Some(lease) => read_sensor(lease, kind),
            None => Err(HardwareError::NotInitialized),
        };
        self.link
            .record_result(&format!("read {}", kind.name()), &result);
        result
    }

    /// 距离（cm）
    pub fn read_distance(&self) -> Result<f32, HardwareError> {
        self.read(SensorKind::Distance)
    }

    /// 温度（°C）
    pub fn read_temperature(&self) -> Result<f32, HardwareError> {
        self.read(SensorKind::Temperature)
    }

    /// 湿度（%）
    pub fn read_humidity(&self) -> Result<f32, HardwareError> {
        self.read(SensorKind::Humidity)
    }

    /// 电池电压（V）
    pub fn read_battery_voltage(&self) -> Result<f32, HardwareError> {
        self.read(SensorKind::BatteryVoltage)
    }

    /// 电机电流（A）
    pub fn read_motor_current(&self) -> Result<f32, HardwareError> {
        self.read(SensorKind::MotorCurrent)
    }

    /// 依次读取全部五个传感器
    ///
    /// 协议不支持批量读取；任一读取失败时整体失败。
    pub fn get_sensor_data(&self) -> Result<SensorData, HardwareError> {
        let mut data = SensorData::default();
        for kind in SensorKind::ALL {
            data.set(kind, self.read(kind)?);
        }
        Ok(data)
    }

    /// 释放链路租约（可重复调用）
    pub fn release(&self) {
        if self.lease.lock().take().is_some() {
            debug!("Sensor manager released");
        }
    }
}

fn read_sensor(lease: &LinkLease, kind: SensorKind) -> Result<f32, HardwareError> {
    let response = lease.transact(kind.command_type(), &[kind.channel()])?;

    let Some(&code) = response.first() else {
        return Err(ProtocolError::InvalidLength {
            expected: MIN_READING_PAYLOAD,
            actual: 0,
        }
        .into());
    };
    if !ResultCode::from(code).is_success() {
        return Err(HardwareError::Communication(format!(
            "Failed to read {}",
            kind.name()
        )));
    }
    let Some(&raw) = response.get(1) else {
        return Err(ProtocolError::InvalidLength {
            expected: MIN_READING_PAYLOAD,
            actual: response.len(),
        }
        .into());
    };

    let value = kind.decode(raw);
    trace!("{}: raw {} -> {} {}", kind.name(), raw, value, kind.unit());
    Ok(value)
}
