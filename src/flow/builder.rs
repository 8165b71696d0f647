//! 流程构建器
//!
//! 提供流畅的 API 以代码方式构建流程定义

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::core::{EngineContext, FlowError};
use crate::flow::actor::ErrorHandling;
use crate::flow::definition::{save_definition, ActorDef, FLOW_TYPE};
use crate::flow::instance::{Flow, FlowHandle};

/// 流程构建器
pub struct FlowBuilder {
    name: String,
    error_handling: Option<ErrorHandling>,
    variables: BTreeMap<String, String>,
    actors: Vec<ActorDef>,
}

impl FlowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error_handling: None,
            variables: BTreeMap::new(),
            actors: Vec::new(),
        }
    }

    /// 设置错误处理策略（默认取引擎配置）
    pub fn error_handling(mut self, error_handling: ErrorHandling) -> Self {
        self.error_handling = Some(error_handling);
        self
    }

    /// 添加 setUp 时设置的变量
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// 追加顶层 Actor
    pub fn actor(mut self, actor: ActorDef) -> Self {
        self.actors.push(actor);
        self
    }

    /// 生成定义
    pub fn definition(self) -> ActorDef {
        let mut def = ActorDef::new(FLOW_TYPE).named(self.name);
        if let Some(error_handling) = self.error_handling {
            let value = serde_json::to_value(error_handling).unwrap_or(Value::Null);
            def = def.with_option("error_handling", value);
        }
        if !self.variables.is_empty() {
            let vars: serde_json::Map<String, Value> = self
                .variables
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            def = def.with_option("variables", Value::Object(vars));
        }
        def.actors = self.actors;
        def
    }

    /// 构建流程
    pub fn build(self, context: Arc<EngineContext>) -> Result<FlowHandle, FlowError> {
        Flow::from_definition(self.definition(), context)
    }

    /// 写出为流程文件后从文件加载（程序变量指向该文件）
    pub async fn build_to_file(
        self,
        path: &Path,
        context: Arc<EngineContext>,
    ) -> Result<FlowHandle, FlowError> {
        save_definition(&self.definition(), path).await?;
        Flow::load(path, context).await
    }
}
