//! 包管理器模块 — 对 dpkg / apt 包数据库的只读封装

pub mod parser;
pub mod types;

pub use types::PackageRecord;

use crate::config::{Backend, Config};
use flate2::read::MultiGzDecoder;
use parser::{parse_dpkg_query_output, parse_stanzas};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

const DPKG_QUERY_FORMAT: &str = "${Package}\t${Architecture}\t${db:Status-Status}\t${Version}\n";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to read package database {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to run {command}: {source}")]
    Command {
        command: String,
        #[source]
        source: io::Error,
    },
}

/// 单次调用内有效的包数据库只读句柄
///
/// 按包名索引，同名包可能因多架构存在多条记录。
#[derive(Debug)]
pub struct PackageCache {
    packages: BTreeMap<String, Vec<PackageRecord>>,
    native_arch: Option<String>,
}

impl PackageCache {
    /// 按配置选择后端并读取包数据库
    pub fn open(config: &Config) -> Result<Self, CacheError> {
        let native_arch = config.architecture.clone().or_else(detect_native_arch);
        log::debug!(
            "打开包数据库: backend={:?}, arch={:?}",
            config.backend,
            native_arch
        );

        let mut cache = PackageCache {
            packages: BTreeMap::new(),
            native_arch,
        };
        match config.backend {
            Backend::Files => cache.load_files(config)?,
            Backend::DpkgQuery => cache.load_dpkg_query()?,
        }

        log::debug!("包数据库共 {} 个包名", cache.len());
        Ok(cache)
    }

    /// 由现成的记录构造（status 记录在前，索引记录在后）
    #[cfg(test)]
    pub fn from_records(
        records: impl IntoIterator<Item = PackageRecord>,
        native_arch: Option<String>,
    ) -> Self {
        let mut cache = PackageCache {
            packages: BTreeMap::new(),
            native_arch,
        };
        for record in records {
            cache.insert(record);
        }
        cache
    }

    fn load_files(&mut self, config: &Config) -> Result<(), CacheError> {
        for record in read_index(&config.status_path, IndexFormat::Plain, &config.apt_helper)? {
            self.insert(record);
        }

        let lists_dir = &config.lists_dir;
        let entries = match fs::read_dir(lists_dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("无法读取 apt 索引目录 {}: {}", lists_dir.display(), e);
                return Ok(());
            }
        };
        let mut indexes: Vec<(PathBuf, IndexFormat)> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter_map(|path| index_format(&path).map(|format| (path, format)))
            .collect();
        indexes.sort_by(|a, b| a.0.cmp(&b.0));

        // 任何一个索引读取失败都使整次打开失败，不返回部分结果
        for (index, format) in &indexes {
            log::debug!("读取 apt 索引: {} ({:?})", index.display(), format);
            for record in read_index(index, *format, &config.apt_helper)? {
                self.insert(record);
            }
        }
        Ok(())
    }

    fn load_dpkg_query(&mut self) -> Result<(), CacheError> {
        let installed = duct::cmd!("dpkg-query", "-W", "-f", DPKG_QUERY_FORMAT)
            .stderr_null()
            .read()
            .map_err(|source| CacheError::Command {
                command: "dpkg-query -W".to_string(),
                source,
            })?;

        // dumpavail 只输出真实包，虚包不会被当作“已知未安装”
        let available = match duct::cmd!("apt-cache", "dumpavail").stderr_null().read() {
            Ok(output) => Some(output),
            Err(e) => {
                log::warn!("apt-cache dumpavail 执行失败: {}", e);
                None
            }
        };

        self.merge_dpkg_query(&installed, available.as_deref());
        Ok(())
    }

    fn merge_dpkg_query(&mut self, installed: &str, available: Option<&str>) {
        for record in parse_dpkg_query_output(installed) {
            self.insert(record);
        }
        let Some(available) = available else {
            return;
        };
        match parse_stanzas(available.as_bytes()) {
            Ok(records) => {
                for record in records {
                    self.insert(record);
                }
            }
            Err(e) => log::warn!("无法解析 apt-cache dumpavail 输出: {}", e),
        }
    }

    /// 插入记录；同名同架构已存在时保留先到者（status 优先于索引）
    fn insert(&mut self, record: PackageRecord) {
        let entries = self.packages.entry(record.name.clone()).or_default();
        let duplicate = entries.iter().any(|existing| {
            record.architecture.is_none() || existing.architecture == record.architecture
        });
        if !duplicate {
            entries.push(record);
        }
    }

    /// 按 `name` 或 `name:arch` 查找
    pub fn lookup(&self, identifier: &str) -> Option<&PackageRecord> {
        if let Some(records) = self.packages.get(identifier) {
            return self.pick(records);
        }

        let (name, arch) = identifier.rsplit_once(':')?;
        self.packages.get(name)?.iter().find(|record| {
            match record.architecture.as_deref() {
                Some(a) => a == arch || (a == "all" && self.native_arch.as_deref() == Some(arch)),
                None => false,
            }
        })
    }

    /// 与 apt 一致：本机架构优先，没有本机记录时才退到外来架构
    fn pick<'a>(&self, records: &'a [PackageRecord]) -> Option<&'a PackageRecord> {
        records
            .iter()
            .find(|r| r.is_installed() && self.is_native(r))
            .or_else(|| records.iter().find(|r| self.is_native(r)))
            .or_else(|| records.iter().find(|r| r.is_installed()))
            .or_else(|| records.first())
    }

    fn is_native(&self, record: &PackageRecord) -> bool {
        match (record.architecture.as_deref(), self.native_arch.as_deref()) {
            (Some("all"), _) | (None, _) | (_, None) => true,
            (Some(arch), Some(native)) => arch == native,
        }
    }

    /// apt 风格的完整包名：外来架构带 `:arch` 后缀
    pub fn full_name(&self, record: &PackageRecord) -> String {
        match record.architecture.as_deref() {
            Some(arch) if !self.is_native(record) => format!("{}:{}", record.name, arch),
            _ => record.name.clone(),
        }
    }

    /// 遍历所有已安装包，返回 (完整包名, 版本)
    pub fn installed(&self) -> impl Iterator<Item = (String, &str)> + '_ {
        self.packages
            .values()
            .flatten()
            .filter_map(move |record| {
                record
                    .installed_version()
                    .map(|version| (self.full_name(record), version))
            })
    }

    pub(crate) fn len(&self) -> usize {
        self.packages.len()
    }
}

/// apt 索引文件的存储格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexFormat {
    Plain,
    Gzip,
    /// lz4 / xz / zstd 等交给 `apt-helper cat-file` 解压
    Helper,
}

fn index_format(path: &Path) -> Option<IndexFormat> {
    let name = path.file_name()?.to_str()?;
    if name.ends_with("_Packages") {
        return Some(IndexFormat::Plain);
    }
    let (stem, ext) = name.rsplit_once('.')?;
    if !stem.ends_with("_Packages") {
        return None;
    }
    match ext {
        "gz" => Some(IndexFormat::Gzip),
        "lz4" | "xz" | "zst" | "bz2" | "lzma" => Some(IndexFormat::Helper),
        _ => {
            log::warn!("跳过无法识别压缩格式的 apt 索引: {}", path.display());
            None
        }
    }
}

fn read_index(
    path: &Path,
    format: IndexFormat,
    apt_helper: &Path,
) -> Result<Vec<PackageRecord>, CacheError> {
    let io_err = |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };
    match format {
        IndexFormat::Plain => {
            let file = File::open(path).map_err(io_err)?;
            parse_stanzas(BufReader::new(file)).map_err(io_err)
        }
        IndexFormat::Gzip => {
            let file = File::open(path).map_err(io_err)?;
            parse_stanzas(BufReader::new(MultiGzDecoder::new(file))).map_err(io_err)
        }
        IndexFormat::Helper => {
            let reader = duct::cmd!(apt_helper, "cat-file", path)
                .stderr_null()
                .reader()
                .map_err(io_err)?;
            parse_stanzas(BufReader::new(reader)).map_err(io_err)
        }
    }
}

fn detect_native_arch() -> Option<String> {
    duct::cmd!("dpkg", "--print-architecture")
        .stderr_null()
        .read()
        .ok()
        .map(|arch| arch.trim().to_string())
        .filter(|arch| !arch.is_empty())
}
