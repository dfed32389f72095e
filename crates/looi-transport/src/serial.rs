//! USB 串口传输实现
//!
//! ## 特性
//!
//! - 115200 波特率，8 数据位，1 停止位，无校验，无流控
//! - 未指定端口时自动探测第一个 USB 串口设备
//!
//! ## 依赖
//!
//! - `serialport` crate（关闭 libudev，Linux 下通过 sysfs 枚举）
//!
//! ## 限制
//!
//! - **权限要求**：Linux 下通常需要 `dialout` 组权限

use crate::reader::{TimedRead, read_packet};
use crate::{
    AtomicLinkState, LinkState, Transport, TransportError, begin_connect, ensure_connected,
    record_failure,
};
use looi_protocol::DEFAULT_TIMEOUT;
use serialport::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortInfo, SerialPortType,
    StopBits,
};
use std::io::{self, Write};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// 默认波特率
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// 串口配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// 串口路径（如 "/dev/ttyUSB0"），`None` 表示自动探测
    pub port: Option<String>,
    pub baud_rate: u32,
    /// 默认读写超时
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// 枚举所有 USB 串口设备
///
/// 优先依据端口类型判断；部分平台（如未启用 libudev 的 Linux）拿不到类型信息时，
/// 退化为按设备名判断。
pub fn probe_usb_serial_ports() -> Result<Vec<SerialPortInfo>, TransportError> {
    let ports = serialport::available_ports().map_err(|e| {
        TransportError::Connection(format!("Failed to enumerate serial ports: {}", e))
    })?;
    Ok(ports.into_iter().filter(is_usb_serial).collect())
}

fn is_usb_serial(info: &SerialPortInfo) -> bool {
    matches!(info.port_type, SerialPortType::UsbPort(_)) || is_usb_serial_name(&info.port_name)
}

fn is_usb_serial_name(name: &str) -> bool {
    ["ttyUSB", "ttyACM", "cu.usbserial", "cu.usbmodem"]
        .iter()
        .any(|pattern| name.contains(pattern))
}

/// USB 串口传输
///
/// # 示例
///
/// ```no_run
/// use looi_transport::{SerialConfig, SerialTransport, Transport};
///
/// let mut transport = SerialTransport::new(SerialConfig::default());
/// transport.connect().unwrap();
/// ```
pub struct SerialTransport {
    config: SerialConfig,
    port: Option<Box<dyn SerialPort>>,
    /// 实际打开的路径（自动探测时与配置不同）
    opened_path: Option<String>,
    state: AtomicLinkState,
}

impl SerialTransport {
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            port: None,
            opened_path: None,
            state: AtomicLinkState::default(),
        }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    fn resolve_path(&self) -> Result<String, TransportError> {
        if let Some(path) = &self.config.port {
            return Ok(path.clone());
        }

        let ports = probe_usb_serial_ports()?;
        debug!("Found {} USB serial port(s)", ports.len());
        ports
            .into_iter()
            .next()
            .map(|info| info.port_name)
            .ok_or_else(|| TransportError::Connection("No USB serial devices found".to_string()))
    }

    fn open(&self) -> Result<(String, Box<dyn SerialPort>), TransportError> {
        let path = self.resolve_path()?;
        let port = serialport::new(&path, self.config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.config.timeout)
            .open()
            .map_err(|e| {
                TransportError::Connection(format!(
                    "Failed to open USB serial port '{}': {}",
                    path, e
                ))
            })?;
        Ok((path, port))
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>, TransportError> {
        self.port
            .as_mut()
            .ok_or_else(|| TransportError::Communication("Port closed".to_string()))
    }
}

impl Transport for SerialTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        if begin_connect(&self.state)? {
            debug!("Serial port already connected, ignoring connect()");
            return Ok(());
        }

        match self.open() {
            Ok((path, port)) => {
                // 丢弃打开前残留在接收缓冲区中的字节
                if let Err(e) = port.clear(ClearBuffer::Input) {
                    debug!("Failed to clear serial input buffer: {}", e);
                }
                info!(
                    "Opened serial port: {} at {} baud (8N1)",
                    path, self.config.baud_rate
                );
                self.port = Some(port);
                self.opened_path = Some(path);
                self.state.set(LinkState::Connected);
                Ok(())
            },
            Err(e) => {
                self.state.set(LinkState::Disconnected);
                Err(e)
            },
        }
    }

    fn disconnect(&mut self) {
        self.state.set(LinkState::Disconnecting);
        if let Some(port) = self.port.take() {
            if let Err(e) = port.clear(ClearBuffer::All) {
                warn!("Error while closing serial port: {}", e);
            }
            info!(
                "Closed serial port: {}",
                self.opened_path.as_deref().unwrap_or("<unknown>")
            );
        }
        self.opened_path = None;
        self.state.set(LinkState::Disconnected);
    }

    fn send_command(&mut self, packet: &[u8]) -> Result<(), TransportError> {
        ensure_connected(&self.state)?;
        trace!("TX {} bytes: {:02X?}", packet.len(), packet);

        let result = self.port_mut().and_then(|port| {
            port.write_all(packet)
                .and_then(|_| port.flush())
                .map_err(|e| TransportError::Communication(format!("Failed to send command: {}", e)))
        });
        if let Err(e) = &result {
            record_failure(&self.state, e);
        }
        result
    }

    fn discard_input(&mut self) -> Result<usize, TransportError> {
        ensure_connected(&self.state)?;

        let result = self.port_mut().and_then(|port| {
            let pending = port.bytes_to_read().unwrap_or(0) as usize;
            port.clear(ClearBuffer::Input)
                .map(|_| pending)
                .map_err(|e| TransportError::Communication(format!("Failed to discard input: {}", e)))
        });
        if let Err(e) = &result {
            record_failure(&self.state, e);
        }
        result
    }

    fn read_response_timeout(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        ensure_connected(&self.state)?;

        let result = self
            .port_mut()
            .and_then(|port| read_packet(&mut PortReader(port.as_mut()), timeout));
        if let Err(e) = &result {
            record_failure(&self.state, e);
        }
        result
    }

    fn state(&self) -> LinkState {
        self.state.get()
    }

    fn timeout(&self) -> Duration {
        self.config.timeout
    }

    fn describe(&self) -> String {
        match (&self.opened_path, &self.config.port) {
            (Some(path), _) | (None, Some(path)) => {
                format!("serial:{}@{}", path, self.config.baud_rate)
            },
            (None, None) => format!("serial:auto@{}", self.config.baud_rate),
        }
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.port.is_some() {
            self.disconnect();
        }
    }
}

/// 把串口适配为 `TimedRead`：每次读取前把端口超时设为剩余时间
struct PortReader<'a>(&'a mut dyn SerialPort);

impl TimedRead for PortReader<'_> {
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.0.set_timeout(timeout).map_err(io::Error::from)?;
        self.0.read(buf)
    }
}
