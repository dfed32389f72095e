//! 蓝牙 RFCOMM（SPP）传输实现
//!
//! 基于 BlueZ（`bluer`）。BlueZ 接口是异步的，每个传输持有一个单线程 tokio 运行时，
//! 对外仍暴露阻塞式的 `Transport` 接口。
//!
//! ## 连接流程
//!
//! 1. 检查默认适配器存在且已开启
//! 2. 枚举已配对设备，按 [`DeviceSelector`] 选择目标
//! 3. 配置了 RFCOMM 通道时直接连接该通道，否则注册 SPP 客户端 Profile，由 BlueZ 通过
//!    SDP 查找通道
//!
//! ## 限制
//!
//! - 仅 Linux，需要 `bluetoothd` 正在运行
//! - 设备必须事先完成配对

use crate::device::{DeviceSelector, DiscoveredDevice};
use crate::reader::{TimedRead, drain_pending, read_packet};
use crate::scanner::{ScanBackend, ScanEvent, ScanFailure};
use crate::{
    AtomicLinkState, LinkState, Transport, TransportError, begin_connect, ensure_connected,
    record_failure,
};
use bluer::rfcomm::{Profile, Role, SocketAddr, Stream};
use bluer::{Adapter, AdapterEvent, Address, Session, Uuid};
use crossbeam_channel::{Receiver, Sender};
use futures::StreamExt;
use looi_protocol::DEFAULT_TIMEOUT;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::runtime::Runtime;
use tracing::{debug, error, info, trace, warn};

/// SPP 服务 UUID
const SPP: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// 默认建立连接超时
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// 扫描线程检查停止标志的间隔
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 蓝牙传输配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BluetoothConfig {
    pub selector: DeviceSelector,
    /// 固定 RFCOMM 通道；`None` 表示通过 SDP 查找
    pub rfcomm_channel: Option<u8>,
    /// 默认读超时
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            selector: DeviceSelector::FirstBonded,
            rfcomm_channel: None,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

fn build_runtime() -> Result<Runtime, TransportError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TransportError::Connection(format!("Failed to start Bluetooth runtime: {}", e)))
}

/// 打开 BlueZ 会话并取得已开启的默认适配器
async fn powered_adapter() -> Result<(Session, Adapter), TransportError> {
    let not_available = |e: bluer::Error| {
        debug!("BlueZ unavailable: {}", e);
        TransportError::Connection("Bluetooth is not available".to_string())
    };

    let session = Session::new().await.map_err(not_available)?;
    let adapter = session.default_adapter().await.map_err(not_available)?;
    if !adapter.is_powered().await.map_err(not_available)? {
        return Err(TransportError::Connection(
            "Bluetooth is not enabled".to_string(),
        ));
    }
    Ok((session, adapter))
}

/// 已配对设备（按适配器返回的顺序）
async fn paired_devices(adapter: &Adapter) -> Result<Vec<DiscoveredDevice>, TransportError> {
    let addresses = adapter.device_addresses().await.map_err(|e| {
        TransportError::Connection(format!("Failed to list Bluetooth devices: {}", e))
    })?;

    let mut paired = Vec::new();
    for address in addresses {
        let Ok(device) = adapter.device(address) else {
            continue;
        };
        if !device.is_paired().await.unwrap_or(false) {
            continue;
        }
        let name = device.name().await.ok().flatten();
        paired.push(DiscoveredDevice::new(address.to_string(), name));
    }
    Ok(paired)
}

async fn open_stream(
    session: &Session,
    adapter: &Adapter,
    address: Address,
    channel: Option<u8>,
) -> Result<Stream, TransportError> {
    let failed =
        |e: bluer::Error| TransportError::Connection(format!("Failed to connect to {}: {}", address, e));

    if let Some(channel) = channel {
        debug!("Connecting RFCOMM channel {} on {}", channel, address);
        return Stream::connect(SocketAddr::new(address, channel))
            .await
            .map_err(|e| {
                TransportError::Connection(format!("Failed to connect to {}: {}", address, e))
            });
    }

    let profile = Profile {
        uuid: SPP,
        role: Some(Role::Client),
        require_authentication: Some(false),
        require_authorization: Some(false),
        auto_connect: Some(false),
        ..Default::default()
    };
    let mut handle = session.register_profile(profile).await.map_err(failed)?;
    let device = adapter.device(address).map_err(failed)?;

    debug!("Connecting SPP profile on {}", address);
    let connect = device.connect_profile(&SPP);
    tokio::pin!(connect);
    let mut connect_done = false;
    let request = loop {
        tokio::select! {
            result = &mut connect, if !connect_done => {
                connect_done = true;
                result.map_err(failed)?;
            }
            request = handle.next() => break request,
        }
    };

    let request = request.ok_or_else(|| {
        TransportError::Connection("Bluetooth profile closed before connecting".to_string())
    })?;
    request.accept().map_err(|e| {
        TransportError::Connection(format!("Failed to accept RFCOMM connection: {}", e))
    })
}

struct Connection {
    runtime: Runtime,
    // 会话需与流同生命周期（Profile 注册随会话释放）
    _session: Session,
    stream: Stream,
    device: DiscoveredDevice,
}

/// 蓝牙 RFCOMM 传输
pub struct BluetoothTransport {
    config: BluetoothConfig,
    connection: Option<Connection>,
    state: AtomicLinkState,
}

impl BluetoothTransport {
    pub fn new(config: BluetoothConfig) -> Self {
        Self {
            config,
            connection: None,
            state: AtomicLinkState::default(),
        }
    }

    pub fn config(&self) -> &BluetoothConfig {
        &self.config
    }

    /// 当前连接的设备
    pub fn device(&self) -> Option<&DiscoveredDevice> {
        self.connection.as_ref().map(|conn| &conn.device)
    }

    fn open(&self) -> Result<Connection, TransportError> {
        let runtime = build_runtime()?;
        let selector = self.config.selector.clone();
        let channel = self.config.rfcomm_channel;
        let connect_timeout = self.config.connect_timeout;

        let (session, stream, device) = runtime.block_on(async move {
            let (session, adapter) = powered_adapter().await?;

            let paired = paired_devices(&adapter).await?;
            if paired.is_empty() {
                return Err(TransportError::Connection(
                    "No paired devices found".to_string(),
                ));
            }
            let device = selector.select(&paired).cloned().ok_or_else(|| {
                TransportError::Connection(format!("No paired device matches {:?}", selector))
            })?;
            let address: Address = device.address.parse().map_err(|_| {
                TransportError::Connection(format!("Invalid Bluetooth address: {}", device.address))
            })?;

            let stream = tokio::time::timeout(
                connect_timeout,
                open_stream(&session, &adapter, address, channel),
            )
            .await
            .map_err(|_| {
                TransportError::Connection(format!(
                    "Timed out connecting to {} after {:?}",
                    address, connect_timeout
                ))
            })??;

            Ok::<_, TransportError>((session, stream, device))
        })?;

        Ok(Connection {
            runtime,
            _session: session,
            stream,
            device,
        })
    }
}

impl Transport for BluetoothTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        if begin_connect(&self.state)? {
            debug!("Bluetooth link already connected, ignoring connect()");
            return Ok(());
        }

        match self.open() {
            Ok(connection) => {
                info!(
                    "Connected to {} ({})",
                    connection.device.address,
                    connection.device.name.as_deref().unwrap_or("unnamed")
                );
                self.connection = Some(connection);
                self.state.set(LinkState::Connected);
                Ok(())
            },
            Err(e) => {
                error!("Bluetooth connect failed: {}", e);
                self.state.set(LinkState::Disconnected);
                Err(e)
            },
        }
    }

    fn disconnect(&mut self) {
        self.state.set(LinkState::Disconnecting);
        if let Some(mut connection) = self.connection.take() {
            let Connection {
                runtime, stream, ..
            } = &mut connection;
            if let Err(e) = runtime.block_on(stream.shutdown()) {
                warn!("Error while closing RFCOMM stream: {}", e);
            }
            info!("Disconnected from {}", connection.device.address);
        }
        self.state.set(LinkState::Disconnected);
    }

    fn send_command(&mut self, packet: &[u8]) -> Result<(), TransportError> {
        ensure_connected(&self.state)?;
        trace!("TX {} bytes: {:02X?}", packet.len(), packet);

        let result = match self.connection.as_mut() {
            Some(Connection {
                runtime, stream, ..
            }) => runtime
                .block_on(async {
                    stream.write_all(packet).await?;
                    stream.flush().await
                })
                .map_err(|e| TransportError::Communication(format!("Failed to send command: {}", e))),
            None => Err(TransportError::Communication("Stream closed".to_string())),
        };
        if let Err(e) = &result {
            record_failure(&self.state, e);
        }
        result
    }

    fn discard_input(&mut self) -> Result<usize, TransportError> {
        ensure_connected(&self.state)?;

        let result = match self.connection.as_mut() {
            Some(Connection {
                runtime, stream, ..
            }) => drain_pending(&mut StreamReader { runtime, stream }),
            None => Err(TransportError::Communication("Stream closed".to_string())),
        };
        if let Err(e) = &result {
            record_failure(&self.state, e);
        }
        result
    }

    fn read_response_timeout(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        ensure_connected(&self.state)?;

        let result = match self.connection.as_mut() {
            Some(Connection {
                runtime, stream, ..
            }) => read_packet(&mut StreamReader { runtime, stream }, timeout),
            None => Err(TransportError::Communication("Stream closed".to_string())),
        };
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
        match self.device() {
            Some(device) => format!("bluetooth:{}", device.address),
            None => format!("bluetooth:{:?}", self.config.selector),
        }
    }
}

impl Drop for BluetoothTransport {
    fn drop(&mut self) {
        if self.connection.is_some() {
            self.disconnect();
        }
    }
}

struct StreamReader<'a> {
    runtime: &'a Runtime,
    stream: &'a mut Stream,
}

impl TimedRead for StreamReader<'_> {
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let stream = &mut *self.stream;
        match self
            .runtime
            .block_on(tokio::time::timeout(timeout, stream.read(buf)))
        {
            Ok(result) => result,
            Err(_) => Err(io::Error::from(io::ErrorKind::TimedOut)),
        }
    }
}

/// 基于 BlueZ 设备发现的扫描后端
///
/// 发现过程在独立线程的运行时中进行，结果通过通道转发给 [`DeviceScanner`](crate::DeviceScanner)。
#[derive(Default)]
pub struct BluerScanBackend {
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl BluerScanBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

async fn discover(
    adapter: Adapter,
    events: Sender<ScanEvent>,
    stop: Arc<AtomicBool>,
) -> Result<(), bluer::Error> {
    let stream = adapter.discover_devices().await?;
    tokio::pin!(stream);

    while !stop.load(Ordering::Acquire) {
        let event = match tokio::time::timeout(SCAN_POLL_INTERVAL, stream.next()).await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(_) => continue,
        };
        let AdapterEvent::DeviceAdded(address) = event else {
            continue;
        };
        let name = match adapter.device(address) {
            Ok(device) => device.name().await.ok().flatten(),
            Err(_) => None,
        };
        let found = ScanEvent::Found(DiscoveredDevice::new(address.to_string(), name));
        if events.send(found).is_err() {
            break;
        }
    }
    Ok(())
}

impl ScanBackend for BluerScanBackend {
    fn start(&mut self) -> Result<Receiver<ScanEvent>, TransportError> {
        if self.worker.is_some() {
            self.stop();
        }
        self.stop.store(false, Ordering::Release);

        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let stop = self.stop.clone();

        let worker = std::thread::Builder::new()
            .name("looi-bt-scan".into())
            .spawn(move || {
                let runtime = match build_runtime() {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    },
                };
                runtime.block_on(async move {
                    let (_session, adapter) = match powered_adapter().await {
                        Ok(pair) => pair,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        },
                    };
                    let _ = ready_tx.send(Ok(()));

                    if let Err(e) = discover(adapter, events_tx.clone(), stop).await {
                        warn!("Bluetooth discovery failed: {}", e);
                        let _ = events_tx.send(ScanEvent::Failed(ScanFailure::InternalError));
                    }
                });
            })
            .map_err(|e| TransportError::Connection(format!("Failed to spawn scan thread: {}", e)))?;

        let ready = ready_rx.recv().unwrap_or_else(|_| {
            Err(TransportError::Connection(
                "Scan thread exited unexpectedly".to_string(),
            ))
        });
        self.worker = Some(worker);
        if let Err(e) = ready {
            self.stop();
            return Err(e);
        }
        Ok(events_rx)
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            error!("Bluetooth scan thread panicked");
        }
    }

    fn bonded_devices(&self) -> Result<Vec<DiscoveredDevice>, TransportError> {
        let runtime = build_runtime()?;
        runtime.block_on(async {
            let (_session, adapter) = powered_adapter().await?;
            paired_devices(&adapter).await
        })
    }
}

impl Drop for BluerScanBackend {
    fn drop(&mut self) {
        self.stop();
    }
}
