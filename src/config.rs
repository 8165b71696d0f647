//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `FLOWLINE__*` 覆盖（双下划线表示嵌套，如 `FLOWLINE__RUNNER__CLEAN_UP=false`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::flow::ErrorHandling;
use crate::restart::RestartOperationConfig;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineSection,
    pub runner: RunnerSection,
    pub restart: RestartSection,
}

/// [engine] 段：流程 ID 起点、默认错误处理
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_first_flow_id")]
    pub first_flow_id: u64,
    /// 流程定义未写 error_handling 时使用
    #[serde(default)]
    pub error_handling: ErrorHandling,
}

fn default_first_flow_id() -> u64 {
    1
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            first_flow_id: default_first_flow_id(),
            error_handling: ErrorHandling::default(),
        }
    }
}

/// [runner] 段：运行后是否 cleanUp、是否只做 setUp、目录运行时的文件通配符
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerSection {
    #[serde(default = "default_clean_up")]
    pub clean_up: bool,
    #[serde(default)]
    pub no_execute: bool,
    #[serde(default = "default_include")]
    pub include: String,
}

fn default_clean_up() -> bool {
    true
}

fn default_include() -> String {
    "*".to_string()
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            clean_up: default_clean_up(),
            no_execute: false,
            include: default_include(),
        }
    }
}

/// [restart] 段：失败后使用的重启操作（默认 null，即不重启）
///
/// ```toml
/// [restart.operation]
/// type = "multi"
/// operations = [
///   { type = "external_command", command = "logger flow @{flow_id} failed" },
///   { type = "restart_itself", use_flow_file_variable = true },
/// ]
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RestartSection {
    #[serde(default)]
    pub operation: RestartOperationConfig,
}

/// 从 config 目录加载配置，环境变量 FLOWLINE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 FLOWLINE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!("Config file {} not found, ignoring", path.display());
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("FLOWLINE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
