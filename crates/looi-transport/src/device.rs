//! 设备描述与选择策略

/// 扫描或配对列表中的一个设备
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscoveredDevice {
    /// 设备地址（蓝牙 MAC，如 "00:11:22:33:44:55"）
    pub address: String,
    /// 广播名称
    pub name: Option<String>,
}

impl DiscoveredDevice {
    pub fn new(address: impl Into<String>, name: Option<String>) -> Self {
        Self {
            address: address.into(),
            name,
        }
    }

    /// 名称是否以指定前缀开头（无名称的设备不匹配）
    pub fn name_starts_with(&self, prefix: &str) -> bool {
        self.name.as_deref().is_some_and(|name| name.starts_with(prefix))
    }
}

/// 已配对设备的选择策略
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeviceSelector {
    /// 第一个已配对设备
    #[default]
    FirstBonded,
    /// 指定地址（大小写不敏感）
    Address(String),
    /// 第一个名称以该前缀开头的已配对设备
    NamePrefix(String),
}

impl DeviceSelector {
    pub fn matches(&self, device: &DiscoveredDevice) -> bool {
        match self {
            DeviceSelector::FirstBonded => true,
            DeviceSelector::Address(address) => device.address.eq_ignore_ascii_case(address),
            DeviceSelector::NamePrefix(prefix) => device.name_starts_with(prefix),
        }
    }

    /// 按候选顺序返回第一个匹配的设备
    pub fn select<'a>(&self, candidates: &'a [DiscoveredDevice]) -> Option<&'a DiscoveredDevice> {
        candidates.iter().find(|device| self.matches(device))
    }
}
