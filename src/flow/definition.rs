//! 流程定义：序列化的 Actor 树（JSON 或 TOML）
//!
//! 每个节点是 `{ "type": "...", "name": "...", "actors": [...], <选项> }`，
//! 除固定字段外的键全部进入 options，由对应 Actor 工厂反序列化成自己的选项结构。

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::FlowError;

/// 根节点必须使用的类型标签
pub const FLOW_TYPE: &str = "Flow";

fn default_true() -> bool {
    true
}

/// Actor 定义节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorDef {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip: bool,
    /// 仅在 ErrorHandling::ActorsDecide 下生效
    #[serde(default = "default_true")]
    pub stop_flow_on_error: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actors: Vec<ActorDef>,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl ActorDef {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: None,
            skip: false,
            stop_flow_on_error: true,
            actors: Vec::new(),
            options: Map::new(),
        }
    }

    /// 未显式命名时使用类型标签作为名称
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.kind)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: ActorDef) -> Self {
        self.actors.push(child);
        self
    }

    pub fn skipped(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn stop_flow_on_error(mut self, stop: bool) -> Self {
        self.stop_flow_on_error = stop;
        self
    }

    pub fn is_flow(&self) -> bool {
        self.kind == FLOW_TYPE
    }

    /// 把 options 反序列化为 Actor 的选项结构
    pub fn options<T: DeserializeOwned>(&self) -> Result<T, FlowError> {
        serde_json::from_value(Value::Object(self.options.clone())).map_err(|e| {
            FlowError::InvalidOptions {
                path: self.name().to_string(),
                reason: e.to_string(),
            }
        })
    }
}

/// 从文件读取定义：`.toml` 按 TOML 解析，其余按 JSON
pub async fn load_definition(path: &Path) -> Result<ActorDef, FlowError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| FlowError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    parse_definition(path, &content)
}

pub fn parse_definition(path: &Path, content: &str) -> Result<ActorDef, FlowError> {
    let parse_error = |reason: String| FlowError::Parse {
        path: path.to_path_buf(),
        reason,
    };
    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    if is_toml {
        toml::from_str(content).map_err(|e| parse_error(e.to_string()))
    } else {
        serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))
    }
}

/// 以格式化 JSON 写出定义
pub async fn save_definition(definition: &ActorDef, path: &Path) -> Result<(), FlowError> {
    let json = serde_json::to_string_pretty(definition).map_err(|e| FlowError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    tokio::fs::write(path, json)
        .await
        .map_err(|source| FlowError::Io {
            path: path.to_path_buf(),
            source,
        })
}
