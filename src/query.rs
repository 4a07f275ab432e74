//! 包安装状态查询

use crate::package_manager::PackageCache;
use std::collections::BTreeMap;
use thiserror::Error;

/// 查询全部已安装包的保留标识
pub const ALL: &str = "all";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("The package '{0}' was not found in the apt-cache")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryTarget {
    All,
    Package(String),
}

impl From<&str> for QueryTarget {
    fn from(identifier: &str) -> Self {
        if identifier == ALL {
            QueryTarget::All
        } else {
            QueryTarget::Package(identifier.to_string())
        }
    }
}

/// 查询结果；`installed` 仅在单包查询时存在
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub package_info: BTreeMap<String, String>,
    pub installed: Option<bool>,
}

/// 查询单个包或全部已安装包。
///
/// 单包查询：已安装时返回 `{name: version}` 且 `installed = true`；
/// 已知但未安装时返回 `{name: ""}` 且 `installed = false`；
/// 数据库中不存在时返回 [`QueryError::NotFound`]。
///
/// `all` 查询只列出已安装的包，未安装的包不出现在结果里。
pub fn query(cache: &PackageCache, identifier: &str) -> Result<QueryResult, QueryError> {
    match QueryTarget::from(identifier) {
        QueryTarget::All => {
            let package_info: BTreeMap<String, String> = cache
                .installed()
                .map(|(name, version)| (name, version.to_string()))
                .collect();
            log::debug!("已安装包共 {} 个", package_info.len());
            Ok(QueryResult {
                package_info,
                installed: None,
            })
        }
        QueryTarget::Package(name) => {
            let record = cache.lookup(&name).ok_or_else(|| {
                log::warn!("包数据库中不存在: {}", name);
                QueryError::NotFound(name.clone())
            })?;

            let version = record.installed_version();
            let installed = version.is_some();
            let mut package_info = BTreeMap::new();
            package_info.insert(name, version.unwrap_or_default().to_string());
            Ok(QueryResult {
                package_info,
                installed: Some(installed),
            })
        }
    }
}
