//! 日志管理模块
//!
//! 基于 `tracing-subscriber` 初始化全局日志。`RUST_LOG` 优先于配置中的级别。
use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// 默认日志目录: ~/.routecast/logs
pub fn log_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".routecast")
        .join("logs")
}

/// 相对路径的日志文件放在日志目录下
fn resolve_log_file(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        log_dir().join(path)
    }
}

/// 初始化日志
///
/// 重复初始化不会报错，保留第一次安装的订阅者。
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("无效的日志级别: {}", config.level))?,
    };

    let result = match config.log_file {
        Some(ref log_file) => {
            let path = resolve_log_file(log_file);
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("创建日志目录失败: {}", dir.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("打开日志文件失败: {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };

    if let Err(e) = result {
        tracing::debug!("[日志] 已存在全局订阅者，跳过初始化: {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_log_file() {
        let absolute = std::env::temp_dir().join("routecast.log");
        assert_eq!(resolve_log_file(&absolute), absolute);
        assert_eq!(
            resolve_log_file(Path::new("routecast.log")),
            log_dir().join("routecast.log")
        );
    }

    #[test]
    fn test_init_logging_twice() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            enabled: true,
            level: "debug".to_string(),
            log_file: Some(dir.path().join("logs").join("routecast.log")),
        };
        init_logging(&config).unwrap();
        init_logging(&config).unwrap();
        assert!(dir.path().join("logs").join("routecast.log").exists());
    }

    #[test]
    fn test_invalid_level() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig {
            enabled: true,
            level: "routecast=notalevel".to_string(),
            log_file: None,
        };
        assert!(init_logging(&config).is_err());
    }
}
