//! 配置命令

use anyhow::Result;
use clap::Subcommand;
use looi_sdk::LinkConfig;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 打印生效的配置（含命令行覆盖）
    Show,

    /// 打印默认配置，可作为配置文件模板
    Default,
}

impl ConfigCommand {
    pub fn execute(&self, config: &LinkConfig) -> Result<()> {
        let text = match self {
            ConfigCommand::Show => config.to_toml_string()?,
            ConfigCommand::Default => LinkConfig::default().to_toml_string()?,
        };
        print!("{}", text);
        Ok(())
    }
}
