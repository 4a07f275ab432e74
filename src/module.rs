//! Ansible 模块调用约定：读取参数文件、输出单个 JSON 结果

use crate::query::QueryResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("failed to read module arguments {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read module arguments from stdin: {0}")]
    Stdin(#[source] io::Error),
    #[error("{0}")]
    InvalidInput(String),
}

#[derive(Debug, Deserialize)]
struct RawArgs {
    #[serde(alias = "pkg", alias = "package")]
    name: Option<String>,
}

/// 校验后的模块参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleArgs {
    pub name: String,
}

impl ModuleArgs {
    /// 从参数文件读取；未给出路径时读取 stdin
    pub fn load(path: Option<&Path>) -> Result<Self, ModuleError> {
        let content = match path {
            Some(path) => std::fs::read_to_string(path).map_err(|source| ModuleError::Read {
                path: path.to_path_buf(),
                source,
            })?,
            None => {
                let mut buf = String::new();
                io::stdin()
                    .read_to_string(&mut buf)
                    .map_err(ModuleError::Stdin)?;
                buf
            }
        };
        Self::parse(&content)
    }

    /// 支持三种格式：扁平 JSON、`ANSIBLE_MODULE_ARGS` 包裹的 JSON、旧式 `key=value`
    pub fn parse(content: &str) -> Result<Self, ModuleError> {
        let trimmed = content.trim();
        let value = if trimmed.starts_with('{') {
            let mut value: Value = serde_json::from_str(trimmed)
                .map_err(|e| ModuleError::InvalidInput(format!("invalid JSON arguments: {}", e)))?;
            let wrapped = value.get_mut("ANSIBLE_MODULE_ARGS").map(Value::take);
            wrapped.unwrap_or(value)
        } else {
            Value::Object(parse_key_value(trimmed)?)
        };

        let raw: RawArgs = serde_json::from_value(value)
            .map_err(|e| ModuleError::InvalidInput(format!("invalid arguments: {}", e)))?;
        match raw.name {
            Some(name) if !name.trim().is_empty() => Ok(ModuleArgs { name }),
            _ => Err(ModuleError::InvalidInput(
                "missing required arguments: name".to_string(),
            )),
        }
    }
}

/// 旧式参数按 shell 规则拆分，`name='a b'` 保持为一个值
fn parse_key_value(content: &str) -> Result<Map<String, Value>, ModuleError> {
    let words = shlex::split(content).ok_or_else(|| {
        ModuleError::InvalidInput("invalid key=value arguments: unbalanced quotes".to_string())
    })?;
    Ok(words
        .into_iter()
        .filter_map(|word| {
            let (key, val) = word.split_once('=')?;
            Some((key.to_string(), Value::String(val.to_string())))
        })
        .collect())
}

/// 写到 stdout 的模块结果
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleResponse {
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_info: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl ModuleResponse {
    pub fn failure(msg: impl Into<String>) -> Self {
        Self {
            failed: Some(true),
            msg: Some(msg.into()),
            ..Self::default()
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.failed == Some(true) {
            1
        } else {
            0
        }
    }
}

impl From<QueryResult> for ModuleResponse {
    fn from(result: QueryResult) -> Self {
        Self {
            package_info: Some(result.package_info),
            installed: result.installed,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_aliases_map_to_name() {
        for key in ["name", "pkg", "package"] {
            let content = format!(r#"{{"{}": "openssl", "_ansible_check_mode": false}}"#, key);
            assert_eq!(ModuleArgs::parse(&content).unwrap().name, "openssl");
        }
    }

    #[test]
    fn test_wrapped_args() {
        let content = json!({ "ANSIBLE_MODULE_ARGS": { "pkg": "all" } }).to_string();
        assert_eq!(ModuleArgs::parse(&content).unwrap().name, "all");
    }

    #[test]
    fn test_key_value_args() {
        let args = ModuleArgs::parse("package='openssl' _ansible_verbosity=0\n").unwrap();
        assert_eq!(args.name, "openssl");
    }

    #[test]
    fn test_key_value_quoted_value_keeps_spaces() {
        let args = ModuleArgs::parse(r#"name='a b' _ansible_check_mode="False""#).unwrap();
        assert_eq!(args.name, "a b");

        let err = ModuleArgs::parse("name='openssl").unwrap_err();
        assert!(matches!(err, ModuleError::InvalidInput(_)));
    }

    #[test]
    fn test_missing_or_empty_name() {
        for content in ["{}", r#"{"name": ""}"#, "", r#"{"name": null}"#] {
            let err = ModuleArgs::parse(content).unwrap_err();
            assert_eq!(err.to_string(), "missing required arguments: name");
        }
    }

    #[test]
    fn test_conflicting_aliases_rejected() {
        let err = ModuleArgs::parse(r#"{"name": "a", "pkg": "b"}"#).unwrap_err();
        assert!(matches!(err, ModuleError::InvalidInput(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("args");
        std::fs::write(&path, r#"{"name": "lolcat"}"#).unwrap();
        assert_eq!(ModuleArgs::load(Some(path.as_path())).unwrap().name, "lolcat");

        let missing = dir.path().join("missing");
        let err = ModuleArgs::load(Some(missing.as_path())).unwrap_err();
        assert!(matches!(err, ModuleError::Read { .. }));
    }

    #[test]
    fn test_single_package_response() {
        let mut package_info = BTreeMap::new();
        package_info.insert("lolcat".to_string(), String::new());
        let response = ModuleResponse::from(QueryResult {
            package_info,
            installed: Some(false),
        });

        assert_eq!(response.exit_code(), 0);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "changed": false, "package_info": { "lolcat": "" }, "installed": false })
        );
    }

    #[test]
    fn test_all_response_has_no_installed_flag() {
        let response = ModuleResponse::from(QueryResult {
            package_info: BTreeMap::new(),
            installed: None,
        });
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "changed": false, "package_info": {} })
        );
    }

    #[test]
    fn test_failure_response() {
        let response =
            ModuleResponse::failure("The package 'foobar123' was not found in the apt-cache");
        assert_eq!(response.exit_code(), 1);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "changed": false,
                "failed": true,
                "msg": "The package 'foobar123' was not found in the apt-cache"
            })
        );
    }
}
