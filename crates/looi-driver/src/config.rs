//! 链路配置
//!
//! TOML 格式，所有字段都有默认值：
//!
//! ```toml
//! response_timeout_ms = 1000
//!
//! [transport]
//! kind = "serial"          # serial | bluetooth | mock
//! port = "/dev/ttyUSB0"    # 省略时自动探测第一个 USB 串口
//! baud_rate = 115200
//!
//! [scan]
//! name_prefix = "LooiRobot"
//! window_ms = 10000
//!
//! [retry]
//! max_attempts = 3
//! delay_ms = 1000
//! ```
//!
//! 蓝牙：
//!
//! ```toml
//! [transport]
//! kind = "bluetooth"
//! address = "00:11:22:33:44:55"  # 或 name_prefix = "LooiRobot"；都省略时使用第一个已配对设备
//! rfcomm_channel = 1              # 省略时通过 SDP 查找
//! ```

use crate::link::RobotLink;
use crate::retry::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY, RetryPolicy};
use looi_protocol::DEFAULT_TIMEOUT_MS;
use looi_transport::{DEFAULT_NAME_PREFIX, DEFAULT_SCAN_WINDOW, DeviceSelector, Transport};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// 默认波特率
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// 所选通道未编译进当前构建
    #[error("Transport '{0}' is not supported by this build")]
    Unsupported(&'static str),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// 物理通道配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportConfig {
    Serial {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        port: Option<String>,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
    },
    Bluetooth {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        address: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name_prefix: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rfcomm_channel: Option<u8>,
    },
    /// 无硬件，所有命令返回 SUCCESS（用于演练）
    Mock,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Serial {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

impl TransportConfig {
    /// 蓝牙设备选择策略：地址优先，其次名称前缀，否则第一个已配对设备
    pub fn selector(&self) -> DeviceSelector {
        match self {
            TransportConfig::Bluetooth {
                address: Some(address),
                ..
            } => DeviceSelector::Address(address.clone()),
            TransportConfig::Bluetooth {
                name_prefix: Some(prefix),
                ..
            } => DeviceSelector::NamePrefix(prefix.clone()),
            _ => DeviceSelector::FirstBonded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub name_prefix: String,
    pub window_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            window_ms: DEFAULT_SCAN_WINDOW.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
        }
    }
}

/// 链路配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// 单次响应读取超时（毫秒）
    pub response_timeout_ms: u64,
    pub transport: TransportConfig,
    pub scan: ScanConfig,
    pub retry: RetryConfig,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            response_timeout_ms: DEFAULT_TIMEOUT_MS,
            transport: TransportConfig::default(),
            scan: ScanConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

impl LinkConfig {
    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: LinkConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config from {}", path.display());
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.response_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "response_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if let TransportConfig::Serial { baud_rate: 0, .. } = self.transport {
            return Err(ConfigError::Invalid(
                "baud_rate must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn scan_window(&self) -> Duration {
        Duration::from_millis(self.scan.window_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.delay_ms),
        )
    }
}

/// 按配置创建物理通道（未连接）
pub fn build_transport(config: &LinkConfig) -> Result<Box<dyn Transport>, ConfigError> {
    let timeout = config.response_timeout();
    match &config.transport {
        #[cfg(feature = "serial")]
        TransportConfig::Serial { port, baud_rate } => {
            use looi_transport::{SerialConfig, SerialTransport};
            Ok(Box::new(SerialTransport::new(SerialConfig {
                port: port.clone(),
                baud_rate: *baud_rate,
                timeout,
            })))
        },
        #[cfg(not(feature = "serial"))]
        TransportConfig::Serial { .. } => Err(ConfigError::Unsupported("serial")),

        #[cfg(all(target_os = "linux", feature = "bluetooth"))]
        TransportConfig::Bluetooth { rfcomm_channel, .. } => {
            use looi_transport::{BluetoothConfig, BluetoothTransport};
            Ok(Box::new(BluetoothTransport::new(BluetoothConfig {
                selector: config.transport.selector(),
                rfcomm_channel: *rfcomm_channel,
                timeout,
                ..Default::default()
            })))
        },
        #[cfg(not(all(target_os = "linux", feature = "bluetooth")))]
        TransportConfig::Bluetooth { .. } => Err(ConfigError::Unsupported("bluetooth")),

        #[cfg(feature = "mock")]
        TransportConfig::Mock => {
            use looi_transport::MockTransport;
            let (transport, handle) = MockTransport::new();
            // 结果码 SUCCESS + 读数 0
            handle.respond_success(vec![0]);
            Ok(Box::new(transport.with_timeout(timeout)))
        },
        #[cfg(not(feature = "mock"))]
        TransportConfig::Mock => Err(ConfigError::Unsupported("mock")),
    }
}

/// 按配置创建共享链路
pub fn open_link(config: &LinkConfig) -> Result<Arc<RobotLink>, ConfigError> {
    Ok(RobotLink::new(build_transport(config)?))
}

/// 按配置创建设备扫描器（需要蓝牙后端）
#[cfg(all(target_os = "linux", feature = "bluetooth"))]
pub fn build_scanner(config: &LinkConfig) -> looi_transport::DeviceScanner {
    use looi_transport::{BluerScanBackend, DeviceScanner};
    DeviceScanner::new(Box::new(BluerScanBackend::new()))
        .with_name_prefix(config.scan.name_prefix.clone())
        .with_window(config.scan_window())
}
