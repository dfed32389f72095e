//! # Looi CLI
//!
//! Looi 机器人底座诊断工具。
//!
//! ```bash
//! # 扫描附近的机器人（需要 bluetooth 特性）
//! looi-cli scan --window 5
//!
//! # 读取全部传感器，每秒刷新一次，Ctrl-C 退出
//! looi-cli sensors --watch 1
//!
//! # 以半速前进 2 秒后停止
//! looi-cli move forward --speed 0.5 --duration 2
//!
//! # 使用配置文件（蓝牙、超时、重试等）
//! looi-cli --config looi.toml rotate --angle -90
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::{ConfigCommand, MoveCommand, RotateCommand, ScanCommand, SensorsCommand};
use looi_sdk::LinkConfig;
use looi_sdk::driver::{DEFAULT_BAUD_RATE, TransportConfig};

/// Looi CLI - 机器人底座命令行工具
#[derive(Parser, Debug)]
#[command(name = "looi-cli")]
#[command(about = "Command-line diagnostics for the Looi robot base", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件（TOML）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 串口路径（覆盖配置，使用串口通道）
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// 使用 mock 通道（无需硬件）
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 扫描附近的机器人
    Scan {
        #[command(flatten)]
        args: ScanCommand,
    },

    /// 读取传感器
    Sensors {
        #[command(flatten)]
        args: SensorsCommand,
    },

    /// 运动（forward/backward/left/right）
    Move {
        #[command(flatten)]
        args: MoveCommand,
    },

    /// 原地旋转
    Rotate {
        #[command(flatten)]
        args: RotateCommand,
    },

    /// 停止电机
    Stop,

    /// 打印生效的配置
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// 加载配置并应用命令行覆盖
    fn link_config(&self) -> Result<LinkConfig> {
        let mut config = match &self.config {
            Some(path) => LinkConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => LinkConfig::default(),
        };

        if self.mock {
            config.transport = TransportConfig::Mock;
        } else if let Some(port) = &self.port {
            let baud_rate = match config.transport {
                TransportConfig::Serial { baud_rate, .. } => baud_rate,
                _ => DEFAULT_BAUD_RATE,
            };
            config.transport = TransportConfig::Serial {
                port: Some(port.clone()),
                baud_rate,
            };
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("looi_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.link_config()?;

    match &cli.command {
        Commands::Scan { args } => args.execute(&config),
        Commands::Sensors { args } => args.execute(&config),
        Commands::Move { args } => args.execute(&config),
        Commands::Rotate { args } => args.execute(&config),
        Commands::Stop => commands::stop(&config),
        Commands::Config(cmd) => cmd.execute(&config),
    }
}
