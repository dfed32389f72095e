//! 传感器通道定义与读数换算
//!
//! 每种读数对应一个命令类型和一个子通道号，响应数据第 1 字节为原始读数（无符号），
//! 按固定线性变换换算为物理量。

use crate::command::CommandType;

/// 传感器读数类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SensorKind {
    /// 距离（cm）
    Distance,
    /// 温度（°C）
    Temperature,
    /// 湿度（%）
    Humidity,
    /// 电池电压（V）
    BatteryVoltage,
    /// 电机电流（A）
    MotorCurrent,
}

impl SensorKind {
    /// 所有读数类型，按 `get_sensor_data` 的读取顺序排列
    pub const ALL: [SensorKind; 5] = [
        SensorKind::Distance,
        SensorKind::Temperature,
        SensorKind::Humidity,
        SensorKind::BatteryVoltage,
        SensorKind::MotorCurrent,
    ];

    pub fn command_type(self) -> CommandType {
        match self {
            SensorKind::Distance | SensorKind::Temperature | SensorKind::Humidity => {
                CommandType::SensorRead
            },
            SensorKind::BatteryVoltage | SensorKind::MotorCurrent => CommandType::BatteryRead,
        }
    }

    /// 子通道号（请求数据第 0 字节）
    pub fn channel(self) -> u8 {
        match self {
            SensorKind::Distance => 0x01,
            SensorKind::Temperature => 0x02,
            SensorKind::Humidity => 0x03,
            SensorKind::BatteryVoltage => 0x01,
            SensorKind::MotorCurrent => 0x02,
        }
    }

    /// 原始读数换算为物理量
    pub fn decode(self, raw: u8) -> f32 {
        let raw = raw as f32;
        match self {
            SensorKind::Distance => raw * 0.1,
            SensorKind::Temperature => raw * 0.5 - 20.0,
            SensorKind::Humidity => raw * 0.5,
            SensorKind::BatteryVoltage => raw * 0.1,
            SensorKind::MotorCurrent => raw * 0.1,
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            SensorKind::Distance => "cm",
            SensorKind::Temperature => "°C",
            SensorKind::Humidity => "%",
            SensorKind::BatteryVoltage => "V",
            SensorKind::MotorCurrent => "A",
        }
    }

    /// 读数名称，用于错误信息（"Failed to read {name}"）
    pub fn name(self) -> &'static str {
        match self {
            SensorKind::Distance => "distance sensor",
            SensorKind::Temperature => "temperature sensor",
            SensorKind::Humidity => "humidity sensor",
            SensorKind::BatteryVoltage => "battery voltage",
            SensorKind::MotorCurrent => "motor current",
        }
    }
}

/// 一次完整的传感器快照
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorData {
    /// 距离（cm）
    pub distance: f32,
    /// 温度（°C）
    pub temperature: f32,
    /// 湿度（%）
    pub humidity: f32,
    /// 电池电压（V）
    pub battery_voltage: f32,
    /// 电机电流（A）
    pub motor_current: f32,
}

impl SensorData {
    pub fn get(&self, kind: SensorKind) -> f32 {
        match kind {
            SensorKind::Distance => self.distance,
            SensorKind::Temperature => self.temperature,
            SensorKind::Humidity => self.humidity,
            SensorKind::BatteryVoltage => self.battery_voltage,
            SensorKind::MotorCurrent => self.motor_current,
        }
    }

    pub fn set(&mut self, kind: SensorKind, value: f32) {
        match kind {
            SensorKind::Distance => self.distance = value,
            SensorKind::Temperature => self.temperature = value,
            SensorKind::Humidity => self.humidity = value,
            SensorKind::BatteryVoltage => self.battery_voltage = value,
            SensorKind::MotorCurrent => self.motor_current = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_decode_reference_points() {
        assert!(approx(SensorKind::Distance.decode(200), 20.0));
        assert!(approx(SensorKind::Temperature.decode(40), 0.0));
        assert!(approx(SensorKind::Humidity.decode(0), 0.0));
    }

    #[test]
    fn test_decode_extremes() {
        assert!(approx(SensorKind::Temperature.decode(0), -20.0));
        assert!(approx(SensorKind::Temperature.decode(255), 107.5));
        assert!(approx(SensorKind::Humidity.decode(200), 100.0));
        assert!(approx(SensorKind::BatteryVoltage.decode(120), 12.0));
        assert!(approx(SensorKind::MotorCurrent.decode(15), 1.5));
    }

    #[test]
    fn test_channel_mapping() {
        assert_eq!(SensorKind::Distance.command_type(), CommandType::SensorRead);
        assert_eq!(SensorKind::Humidity.channel(), 0x03);
        assert_eq!(SensorKind::BatteryVoltage.command_type(), CommandType::BatteryRead);
        assert_eq!(SensorKind::BatteryVoltage.channel(), 0x01);
        assert_eq!(SensorKind::MotorCurrent.channel(), 0x02);
    }

    #[test]
    fn test_sensor_data_get_set() {
        let mut data = SensorData::default();
        for (i, kind) in SensorKind::ALL.iter().enumerate() {
            data.set(*kind, i as f32);
        }
        assert_eq!(data.distance, 0.0);
        assert_eq!(data.motor_current, 4.0);
        assert_eq!(data.get(SensorKind::Humidity), 2.0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_sensor_data_serde() {
        let data = SensorData {
            distance: 20.0,
            ..Default::default()
        };
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("\"distance\":20.0"));
    }
}
