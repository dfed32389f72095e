//! 运动命令

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use looi_sdk::{LinkConfig, MovementDirection, RobotControl, open_link};
use std::time::Duration;

/// 运动方向
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
}

impl From<Direction> for MovementDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Forward => MovementDirection::Forward,
            Direction::Backward => MovementDirection::Backward,
            Direction::Left => MovementDirection::Left,
            Direction::Right => MovementDirection::Right,
        }
    }
}

/// 运动命令参数
#[derive(Args, Debug)]
pub struct MoveCommand {
    /// 方向
    #[arg(value_enum)]
    pub direction: Direction,

    /// 速度（0.0 ~ 1.0）
    #[arg(short, long, default_value_t = 0.5)]
    pub speed: f32,

    /// 持续时间（秒），结束后自动停止
    #[arg(short, long, default_value_t = 1.0)]
    pub duration: f64,
}

impl MoveCommand {
    pub fn execute(&self, config: &LinkConfig) -> Result<()> {
        let duration = Duration::try_from_secs_f64(self.duration)
            .context("Duration must be a non-negative number of seconds")?;

        let running = super::interrupt_flag()?;
        let control = connect(config)?;

        let direction = MovementDirection::from(self.direction);
        println!("▶ {:?} at speed {:.2} for {:?}", direction, self.speed, duration);
        config
            .retry_policy()
            .run(|| control.move_in(direction, self.speed))?;

        if !super::wait_while_running(&running, duration) {
            println!("Interrupted");
        }

        // release 会先发送停止命令
        control.release()?;
        println!("✅ Stopped");
        Ok(())
    }
}

/// 旋转命令参数
#[derive(Args, Debug)]
pub struct RotateCommand {
    /// 角度（度），正值逆时针
    #[arg(short, long, allow_hyphen_values = true)]
    pub angle: f32,
}

impl RotateCommand {
    pub fn execute(&self, config: &LinkConfig) -> Result<()> {
        let control = connect(config)?;
        println!("↻ Rotating {}°", self.angle);
        config.retry_policy().run(|| control.rotate(self.angle))?;
        control.release()?;
        Ok(())
    }
}

/// 停止电机
pub fn stop(config: &LinkConfig) -> Result<()> {
    let control = connect(config)?;
    println!("🛑 Sending stop command...");
    config.retry_policy().run(|| control.stop())?;
    control.release()?;
    println!("✅ Stopped");
    Ok(())
}

fn connect(config: &LinkConfig) -> Result<RobotControl> {
    let link = open_link(config)?;
    println!("🔌 Connecting to {}...", link.describe());
    let control = RobotControl::new(link);
    control.initialize()?;
    Ok(control)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_maps_to_movement_direction() {
        assert_eq!(
            MovementDirection::from(Direction::Forward),
            MovementDirection::Forward
        );
        assert_eq!(MovementDirection::from(Direction::Left), MovementDirection::Left);
        assert_eq!(
            MovementDirection::from(Direction::Right),
            MovementDirection::Right
        );
    }
}
