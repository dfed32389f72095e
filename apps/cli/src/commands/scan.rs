//! 扫描命令

use anyhow::Result;
use clap::Args;
use looi_sdk::LinkConfig;

/// 扫描命令参数
#[derive(Args, Debug)]
pub struct ScanCommand {
    /// 扫描时长（秒），默认取配置
    #[arg(short, long)]
    pub window: Option<u64>,

    /// 只列出已配对的机器人
    #[arg(long)]
    pub bonded: bool,
}

impl ScanCommand {
    #[cfg(all(target_os = "linux", feature = "bluetooth"))]
    pub fn execute(&self, config: &LinkConfig) -> Result<()> {
        use looi_sdk::driver::build_scanner;
        use std::time::Duration;

        let mut scanner = build_scanner(config);
        if let Some(secs) = self.window {
            scanner = scanner.with_window(Duration::from_secs(secs));
        }

        if self.bonded {
            for device in scanner.bonded_devices()? {
                print_device(&device);
            }
            return Ok(());
        }

        println!(
            "🔍 Scanning for '{}*' ({:?})...",
            scanner.name_prefix(),
            scanner.window()
        );
        let mut found = 0;
        for device in scanner.scan()? {
            print_device(&device?);
            found += 1;
        }
        println!("{} device(s) found", found);
        Ok(())
    }

    #[cfg(not(all(target_os = "linux", feature = "bluetooth")))]
    pub fn execute(&self, _config: &LinkConfig) -> Result<()> {
        anyhow::bail!("Scanning requires a Linux build with the `bluetooth` feature")
    }
}

#[cfg(all(target_os = "linux", feature = "bluetooth"))]
fn print_device(device: &looi_sdk::DiscoveredDevice) {
    println!(
        "{}  {}",
        device.address,
        device.name.as_deref().unwrap_or("<unnamed>")
    );
}
