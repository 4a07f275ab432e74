mod config;
mod module;
mod package_manager;
mod query;

use anyhow::{Context, Result};
use config::Config;
use module::{ModuleArgs, ModuleResponse};
use package_manager::PackageCache;
use std::path::{Path, PathBuf};

fn main() {
    env_logger::init();

    let response = run().unwrap_or_else(|e| {
        log::error!("查询失败: {:#}", e);
        ModuleResponse::failure(format!("{:#}", e))
    });

    match serde_json::to_string(&response) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("无法序列化模块结果: {}", e);
            std::process::exit(1);
        }
    }
    std::process::exit(response.exit_code());
}

fn run() -> Result<ModuleResponse> {
    // 参数文件路径由调用方作为第一个参数传入，缺省时读取 stdin
    let args_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::load_or_default()?;
    execute(args_path.as_deref(), &config)
}

/// 一次完整的模块调用：读取参数、打开包数据库、查询
fn execute(args_path: Option<&Path>, config: &Config) -> Result<ModuleResponse> {
    let args = ModuleArgs::load(args_path)?;

    // 句柄只在本次调用内有效，离开作用域即释放
    let cache = PackageCache::open(config).context("failed to open the apt-cache")?;

    match query::query(&cache, &args.name) {
        Ok(result) => Ok(ModuleResponse::from(result)),
        Err(e) => Ok(ModuleResponse::failure(e.to_string())),
    }
}
