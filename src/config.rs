use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 包数据库的读取方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// 直接解析 dpkg status 与 apt 索引文件
    #[default]
    Files,
    /// 调用 dpkg-query / apt-cache
    DpkgQuery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub status_path: PathBuf,
    pub lists_dir: PathBuf,
    /// 用于解压 lz4 / xz 等压缩索引的 apt-helper
    pub apt_helper: PathBuf,
    /// 本机架构，未设置时通过 `dpkg --print-architecture` 检测
    pub architecture: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::Files,
            status_path: PathBuf::from("/var/lib/dpkg/status"),
            lists_dir: PathBuf::from("/var/lib/apt/lists"),
            apt_helper: PathBuf::from("/usr/lib/apt/apt-helper"),
            architecture: None,
        }
    }
}

impl Config {
    pub fn load_or_default() -> Result<Self> {
        // 配置路径优先级：APT_QUERY_CONFIG > ~/.config/apt-query/config.toml
        let config_path = match std::env::var_os("APT_QUERY_CONFIG") {
            Some(path) => PathBuf::from(path),
            None => {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".config/apt-query/config.toml")
            }
        };

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        log::debug!("已加载配置: {}", path.display());
        Ok(config)
    }
}
