//! 配置管理模块
//!
//! 配置文件为 YAML，默认位于 `~/.routecast/config.yaml`。
//! 所有字段均有默认值，缺失的配置节按默认值处理。

use crate::models::ProviderDeletionPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 主配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// 数据库文件路径，未设置时使用 `~/.routecast/routecast.db`
    pub database_path: Option<PathBuf>,
    /// 旧版 settings.json 路径，设置后首次启动时导入
    pub legacy_settings_path: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub bootstrap: BootstrapConfig,
    /// Provider 删除后引用它的规则如何处理
    pub provider_deletion: ProviderDeletionPolicy,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    /// 默认日志级别（`RUST_LOG` 优先）
    pub level: String,
    /// 日志文件路径，为空时只输出到 stderr
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            log_file: None,
        }
    }
}

/// 默认规则补齐配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BootstrapConfig {
    /// 加载时自动补齐 OpenAI/Anthropic 默认规则
    pub enabled: bool,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// 默认配置文件路径
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".routecast")
        .join("config.yaml")
}

/// 加载配置，文件不存在时返回默认配置
pub fn load_config(path: &Path) -> Result<RouterConfig> {
    if !path.exists() {
        tracing::debug!("[配置] {:?} 不存在，使用默认配置", path);
        return Ok(RouterConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
    let config: RouterConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
    Ok(config)
}

/// 保存配置
pub fn save_config(path: &Path, config: &RouterConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("创建配置目录失败: {}", parent.display()))?;
    }
    let content = serde_yaml::to_string(config).context("序列化配置失败")?;
    std::fs::write(path, content)
        .with_context(|| format!("写入配置文件失败: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, RouterConfig::default());
        assert!(config.bootstrap.enabled);
        assert_eq!(config.provider_deletion, ProviderDeletionPolicy::Cascade);
    }

    #[test]
    fn test_partial_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "provider_deletion: flag\nlogging:\n  level: debug\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.provider_deletion, ProviderDeletionPolicy::Flag);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.enabled);
        assert!(config.bootstrap.enabled);
    }

    #[test]
    fn test_malformed_yaml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "bootstrap: [unclosed").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let config = RouterConfig {
            database_path: Some(dir.path().join("routes.db")),
            bootstrap: BootstrapConfig { enabled: false },
            ..Default::default()
        };
        save_config(&path, &config).unwrap();

        assert_eq!(load_config(&path).unwrap(), config);
    }
}
