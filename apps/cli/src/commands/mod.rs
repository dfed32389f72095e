//! 命令定义和实现

pub mod config;
pub mod motion;
pub mod scan;
pub mod sensors;

pub use config::ConfigCommand;
pub use motion::{MoveCommand, RotateCommand, stop};
pub use scan::ScanCommand;
pub use sensors::SensorsCommand;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// 安装 Ctrl-C 处理，返回“仍在运行”标志
pub(crate) fn interrupt_flag() -> anyhow::Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })?;
    Ok(running)
}

/// 等待 `duration`，收到 Ctrl-C 时提前返回 `false`
pub(crate) fn wait_while_running(running: &AtomicBool, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20).min(deadline - Instant::now()));
    }
    running.load(Ordering::SeqCst)
}
