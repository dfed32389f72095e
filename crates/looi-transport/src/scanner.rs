//! 设备扫描
//!
//! 在限定时间窗口内发现名称带指定前缀的机器人。扫描结果是一个惰性迭代器，
//! 窗口结束、后端关闭或迭代器被丢弃时自动停止后端扫描。

use crate::TransportError;
use crate::device::DiscoveredDevice;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 机器人广播名称前缀
pub const DEFAULT_NAME_PREFIX: &str = "LooiRobot";

/// 默认扫描窗口
pub const DEFAULT_SCAN_WINDOW: Duration = Duration::from_secs(10);

/// 扫描失败原因（平台错误码）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanFailure {
    /// 扫描已在进行中，忽略
    AlreadyStarted,
    RegistrationFailed,
    InternalError,
    FeatureUnsupported,
    Unknown(i32),
}

impl ScanFailure {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => ScanFailure::AlreadyStarted,
            2 => ScanFailure::RegistrationFailed,
            3 => ScanFailure::InternalError,
            4 => ScanFailure::FeatureUnsupported,
            other => ScanFailure::Unknown(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            ScanFailure::AlreadyStarted => 1,
            ScanFailure::RegistrationFailed => 2,
            ScanFailure::InternalError => 3,
            ScanFailure::FeatureUnsupported => 4,
            ScanFailure::Unknown(code) => *code,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ScanFailure::AlreadyStarted => "Scan already started".to_string(),
            ScanFailure::RegistrationFailed => "Application registration failed".to_string(),
            ScanFailure::InternalError => "Internal error".to_string(),
            ScanFailure::FeatureUnsupported => "Feature unsupported".to_string(),
            ScanFailure::Unknown(code) => format!("Unknown error: {}", code),
        }
    }

    /// 转换为上报给调用方的错误；`AlreadyStarted` 不算失败
    pub fn into_error(self) -> Option<TransportError> {
        match self {
            ScanFailure::AlreadyStarted => None,
            other => Some(TransportError::Connection(format!(
                "Scan failed: {}",
                other.message()
            ))),
        }
    }
}

/// 后端上报的扫描事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Found(DiscoveredDevice),
    Failed(ScanFailure),
}

/// 平台扫描能力
pub trait ScanBackend: Send {
    /// 开始扫描，事件通过返回的通道上报；发送端全部关闭表示扫描结束
    fn start(&mut self) -> Result<Receiver<ScanEvent>, TransportError>;

    /// 停止扫描（未在扫描时调用是安全的）
    fn stop(&mut self);

    /// 已配对设备列表
    fn bonded_devices(&self) -> Result<Vec<DiscoveredDevice>, TransportError> {
        Ok(Vec::new())
    }
}

/// 设备扫描器
pub struct DeviceScanner {
    backend: Box<dyn ScanBackend>,
    name_prefix: String,
    window: Duration,
}

impl DeviceScanner {
    pub fn new(backend: Box<dyn ScanBackend>) -> Self {
        Self {
            backend,
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            window: DEFAULT_SCAN_WINDOW,
        }
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// 开始一次扫描
    ///
    /// 返回的迭代器逐个产出匹配设备（按地址去重），窗口结束后终止。
    pub fn scan(&mut self) -> Result<ScanResults<'_>, TransportError> {
        let events = self.backend.start()?;
        info!(
            "Scanning for '{}*' devices ({:?} window)",
            self.name_prefix, self.window
        );
        Ok(ScanResults {
            backend: self.backend.as_mut(),
            events,
            prefix: &self.name_prefix,
            deadline: Instant::now() + self.window,
            seen: HashSet::new(),
            finished: false,
        })
    }

    /// 名称匹配前缀的已配对设备
    pub fn bonded_devices(&self) -> Result<Vec<DiscoveredDevice>, TransportError> {
        let devices = self.backend.bonded_devices()?;
        Ok(devices
            .into_iter()
            .filter(|device| device.name_starts_with(&self.name_prefix))
            .collect())
    }

    /// 指定地址的设备是否已配对（大小写不敏感）
    pub fn is_device_bonded(&self, address: &str) -> Result<bool, TransportError> {
        Ok(self
            .backend
            .bonded_devices()?
            .iter()
            .any(|device| device.address.eq_ignore_ascii_case(address)))
    }
}

/// 一次扫描的结果流
pub struct ScanResults<'a> {
    backend: &'a mut dyn ScanBackend,
    events: Receiver<ScanEvent>,
    prefix: &'a str,
    deadline: Instant,
    seen: HashSet<String>,
    finished: bool,
}

impl ScanResults<'_> {
    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.backend.stop();
            debug!("Scan finished, {} device(s) reported", self.seen.len());
        }
    }
}

impl Iterator for ScanResults<'_> {
    type Item = Result<DiscoveredDevice, TransportError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let remaining = self.deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                self.finish();
                break;
            }

            match self.events.recv_timeout(remaining) {
                Ok(ScanEvent::Found(device)) => {
                    if !device.name_starts_with(self.prefix) {
                        continue;
                    }
                    if !self.seen.insert(device.address.clone()) {
                        continue;
                    }
                    debug!("Discovered {} ({:?})", device.address, device.name);
                    return Some(Ok(device));
                },
                Ok(ScanEvent::Failed(failure)) => match failure.into_error() {
                    Some(err) => {
                        warn!("Scan failed with code {}", failure.code());
                        self.finish();
                        return Some(Err(err));
                    },
                    None => debug!("Scan already started, continuing"),
                },
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    self.finish();
                },
            }
        }
        None
    }
}

impl Drop for ScanResults<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}

/// 由通道驱动的扫描后端
///
/// 测试中模拟扫描结果，也可用于桥接其他蓝牙栈：外部持有 `Sender` 推送事件，
/// 丢弃全部 `Sender` 即结束扫描。
pub struct ChannelScanBackend {
    events: Option<Receiver<ScanEvent>>,
    bonded: Vec<DiscoveredDevice>,
    stops: usize,
}

impl ChannelScanBackend {
    pub fn new() -> (Self, Sender<ScanEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let backend = Self {
            events: Some(rx),
            bonded: Vec::new(),
            stops: 0,
        };
        (backend, tx)
    }

    pub fn with_bonded(mut self, bonded: Vec<DiscoveredDevice>) -> Self {
        self.bonded = bonded;
        self
    }

    /// `stop()` 被调用的次数
    pub fn stop_count(&self) -> usize {
        self.stops
    }
}

impl ScanBackend for ChannelScanBackend {
    fn start(&mut self) -> Result<Receiver<ScanEvent>, TransportError> {
        self.events
            .take()
            .ok_or_else(|| TransportError::Connection("Scan source already consumed".to_string()))
    }

    fn stop(&mut self) {
        self.stops += 1;
    }

    fn bonded_devices(&self) -> Result<Vec<DiscoveredDevice>, TransportError> {
        Ok(self.bonded.clone())
    }
}
