pub mod config;
pub mod manager;

pub use config::{
    AgentConfig, AuthSettings, Config, ConfigError, ConfigResult, LlmConfig, LogLevel, LoggingConfig,
    ProviderSettings, RegistryConfig, StorageConfig,
};
pub use manager::ConfigManager;

use std::path::PathBuf;

/// 获取 Cinder 配置目录路径
pub fn cinder_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".cinder"))
}

/// 获取默认配置文件路径
pub fn default_config_path() -> Option<PathBuf> {
    cinder_dir().map(|dir| dir.join("config.json"))
}

/// 获取默认 threads 目录
pub fn default_threads_dir() -> Option<PathBuf> {
    cinder_dir().map(|dir| dir.join("threads"))
}

/// 获取默认日志文件路径
pub fn default_log_path() -> Option<PathBuf> {
    cinder_dir().map(|dir| dir.join("logs").join("cinder.log"))
}

/// 初始化 Cinder 目录结构
pub async fn init_cinder_dirs() -> ConfigResult<()> {
    if let Some(cinder) = cinder_dir() {
        tokio::fs::create_dir_all(&cinder).await?;
        tokio::fs::create_dir_all(cinder.join("threads")).await?;
        tokio::fs::create_dir_all(cinder.join("logs")).await?;
    }
    Ok(())
}

/// 展开路径中的 ~ 为用户主目录
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(path)),
    }
}
