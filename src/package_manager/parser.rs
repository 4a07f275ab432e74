//! 输出解析函数

use super::types::{PackageRecord, PackageState};
use std::io::{self, BufRead};

/// 解析 deb822 格式的包记录（dpkg status 文件与 apt 索引文件共用）
///
/// 记录之间以空行分隔，只关心 Package / Architecture / Status / Version，
/// 以空白开头的续行（Description 等）全部忽略。没有 Status 字段的记录
/// 视为未安装，此时 Version 是仓库中的可用版本，不予保留。
pub fn parse_stanzas<R: BufRead>(reader: R) -> io::Result<Vec<PackageRecord>> {
    let mut records = Vec::new();
    let mut stanza = Stanza::default();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            stanza.flush_into(&mut records);
            continue;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            continue;
        }

        if let Some(colon) = line.find(':') {
            let key = line[..colon].trim();
            let val = line[colon + 1..].trim();
            match key {
                "Package" => stanza.name = val.to_string(),
                "Architecture" => stanza.architecture = Some(val.to_string()),
                "Status" => stanza.status = Some(val.to_string()),
                "Version" => stanza.version = Some(val.to_string()),
                _ => {}
            }
        }
    }
    stanza.flush_into(&mut records);

    Ok(records)
}

#[derive(Default)]
struct Stanza {
    name: String,
    architecture: Option<String>,
    status: Option<String>,
    version: Option<String>,
}

impl Stanza {
    fn flush_into(&mut self, records: &mut Vec<PackageRecord>) {
        let stanza = std::mem::take(self);
        if stanza.name.is_empty() {
            return;
        }

        let state = match stanza.status.as_deref() {
            Some(status) => match parse_status_field(status) {
                Some(state) => state,
                None => {
                    log::warn!("忽略无法识别的 Status 字段: {} ({})", stanza.name, status);
                    return;
                }
            },
            None => PackageState::NotInstalled,
        };
        let version = if stanza.status.is_some() { stanza.version } else { None };

        records.push(PackageRecord {
            name: stanza.name,
            architecture: stanza.architecture,
            state,
            version,
        });
    }
}

/// 解析 `want flag status` 三元组，例如 `install ok installed`
pub fn parse_status_field(status: &str) -> Option<PackageState> {
    status
        .split_whitespace()
        .nth(2)
        .and_then(PackageState::from_status_word)
}

/// 解析 `dpkg-query -W -f '${Package}\t${Architecture}\t${db:Status-Status}\t${Version}\n'` 的输出
pub fn parse_dpkg_query_output(output: &str) -> Vec<PackageRecord> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split('\t');
            let name = parts.next()?.trim();
            let architecture = parts.next()?.trim();
            let state = PackageState::from_status_word(parts.next()?.trim())?;
            let version = parts.next().unwrap_or("").trim();
            if name.is_empty() {
                return None;
            }
            Some(PackageRecord {
                name: name.to_string(),
                architecture: (!architecture.is_empty()).then(|| architecture.to_string()),
                state,
                version: (!version.is_empty()).then(|| version.to_string()),
            })
        })
        .collect()
}
