//! PackageManager 相关数据类型定义

/// dpkg 记录的包当前状态（Status 字段的第三个词）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageState {
    NotInstalled,
    ConfigFiles,
    HalfInstalled,
    Unpacked,
    HalfConfigured,
    TriggersAwaiting,
    TriggersPending,
    Installed,
}

impl PackageState {
    /// 解析 dpkg 状态词，未知的词返回 None
    pub fn from_status_word(word: &str) -> Option<Self> {
        let state = match word {
            "not-installed" => PackageState::NotInstalled,
            "config-files" => PackageState::ConfigFiles,
            "half-installed" => PackageState::HalfInstalled,
            "unpacked" => PackageState::Unpacked,
            "half-configured" => PackageState::HalfConfigured,
            "triggers-awaiting" => PackageState::TriggersAwaiting,
            "triggers-pending" => PackageState::TriggersPending,
            "installed" => PackageState::Installed,
            _ => return None,
        };
        Some(state)
    }

    /// 是否存在当前安装版本（与 apt 的 CurrentVer 语义一致）
    pub fn has_current_version(self) -> bool {
        !matches!(self, PackageState::NotInstalled | PackageState::ConfigFiles)
    }
}

/// 包数据库中的一条记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub name: String,
    pub architecture: Option<String>,
    pub state: PackageState,
    pub version: Option<String>,
}

impl PackageRecord {
    /// 仅出现在 apt 索引中、从未安装过的包
    #[cfg(test)]
    pub fn available(name: impl Into<String>, architecture: Option<String>) -> Self {
        Self {
            name: name.into(),
            architecture,
            state: PackageState::NotInstalled,
            version: None,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.state.has_current_version()
    }

    /// 已安装时返回版本号
    pub fn installed_version(&self) -> Option<&str> {
        if self.is_installed() {
            self.version.as_deref()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_files_has_no_current_version() {
        let record = PackageRecord {
            name: "lolcat".to_string(),
            architecture: Some("all".to_string()),
            state: PackageState::ConfigFiles,
            version: Some("42.0.99-1".to_string()),
        };
        assert!(!record.is_installed());
        assert_eq!(record.installed_version(), None);
    }

    #[test]
    fn test_half_configured_counts_as_installed() {
        let state = PackageState::from_status_word("half-configured").unwrap();
        assert!(state.has_current_version());
        assert_eq!(PackageState::from_status_word("purged"), None);
    }
}
