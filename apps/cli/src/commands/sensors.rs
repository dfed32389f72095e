//! 传感器读取命令

use anyhow::Result;
use clap::Args;
use looi_sdk::{LinkConfig, SensorData, SensorKind, SensorManager, open_link};
use std::time::Duration;

/// 传感器命令参数
#[derive(Args, Debug)]
pub struct SensorsCommand {
    /// 持续刷新间隔（秒），Ctrl-C 退出
    #[arg(short, long)]
    pub watch: Option<f64>,
}

impl SensorsCommand {
    pub fn execute(&self, config: &LinkConfig) -> Result<()> {
        let link = open_link(config)?;
        println!("🔌 Connecting to {}...", link.describe());
        let sensors = SensorManager::new(link);
        sensors.initialize()?;

        let policy = config.retry_policy();
        match self.watch {
            None => print_snapshot(&policy.run(|| sensors.get_sensor_data())?),
            Some(interval) => {
                let interval = Duration::try_from_secs_f64(interval)?;
                let running = super::interrupt_flag()?;
                loop {
                    print_snapshot(&policy.run(|| sensors.get_sensor_data())?);
                    if !super::wait_while_running(&running, interval) {
                        break;
                    }
                }
            },
        }

        sensors.release();
        Ok(())
    }
}

fn print_snapshot(data: &SensorData) {
    for kind in SensorKind::ALL {
        println!("{:<20} {:>8.1} {}", kind.name(), data.get(kind), kind.unit());
    }
    println!();
}
