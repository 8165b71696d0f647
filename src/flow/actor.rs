//! Actor 抽象：统一执行单元及其 setUp / 执行上下文
//!
//! - Actor：独立（Standalone）、源（Source）、变换（Transformer）、汇（Sink）四类
//! - ActorNode：树中节点 = 名称 + 路径 + 跳过/出错策略 + Actor 实例
//! - SetUpContext：setUp 阶段可变访问 CallableActors 注册表
//! - ExecutionContext：执行阶段读取变量、存储，轮询取消令牌

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::core::FlowError;
use crate::flow::callable::CallableActors;
use crate::flow::definition::ActorDef;
use crate::flow::registry::ActorRegistry;
use crate::flow::storage::Storage;
use crate::flow::token::Token;
use crate::flow::variables::Variables;
use crate::flow::ActorPath;

/// Actor 在链中的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorKind {
    Standalone,
    Source,
    Transformer,
    Sink,
}

impl ActorKind {
    pub fn accepts_input(self) -> bool {
        matches!(self, ActorKind::Transformer | ActorKind::Sink)
    }
}

impl std::fmt::Display for ActorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActorKind::Standalone => "standalone",
            ActorKind::Source => "source",
            ActorKind::Transformer => "transformer",
            ActorKind::Sink => "sink",
        };
        write!(f, "{}", s)
    }
}

/// 执行出错时的处理策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorHandling {
    /// 第一个错误即中止整棵子树并向上传播
    #[default]
    AlwaysStop,
    /// 由每个 Actor 的 stop_flow_on_error 决定；为 false 时记录错误并继续处理下一个 token
    ActorsDecide,
}

/// 统一执行单元
///
/// 变换/汇先通过 `input` 收到 token，再 `execute`；源与变换在 `execute` 后通过
/// `has_output` / `output` 逐个交出 token。
#[async_trait]
pub trait Actor: Send + Sync {
    fn kind(&self) -> ActorKind;

    async fn set_up(&mut self, _ctx: &mut SetUpContext<'_>) -> Result<(), FlowError> {
        Ok(())
    }

    fn input(&mut self, _token: Token) {}

    async fn execute(&mut self, ctx: &ExecutionContext<'_>) -> Result<(), FlowError>;

    fn has_output(&self) -> bool {
        false
    }

    fn output(&mut self) -> Option<Token> {
        None
    }

    async fn wrap_up(&mut self) {}

    async fn clean_up(&mut self) {}
}

/// 树节点
pub struct ActorNode {
    name: String,
    skip: bool,
    stop_flow_on_error: bool,
    path: ActorPath,
    actor: Box<dyn Actor>,
}

impl ActorNode {
    /// 通过注册表构造；路径在 setUp 时确定
    pub fn build(def: &ActorDef, registry: &ActorRegistry) -> Result<Self, FlowError> {
        let actor = registry.create(def)?;
        Ok(Self {
            name: def.name().to_string(),
            skip: def.skip,
            stop_flow_on_error: def.stop_flow_on_error,
            path: ActorPath::root(def.name()),
            actor,
        })
    }

    pub fn build_all(defs: &[ActorDef], registry: &ActorRegistry) -> Result<Vec<Self>, FlowError> {
        defs.iter().map(|d| Self::build(d, registry)).collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_skipped(&self) -> bool {
        self.skip
    }

    pub fn stop_flow_on_error(&self) -> bool {
        self.stop_flow_on_error
    }

    pub fn kind(&self) -> ActorKind {
        self.actor.kind()
    }

    pub fn path(&self) -> &ActorPath {
        &self.path
    }

    pub fn actor(&self) -> &dyn Actor {
        self.actor.as_ref()
    }

    pub fn actor_mut(&mut self) -> &mut dyn Actor {
        self.actor.as_mut()
    }

    /// ctx 的路径即本节点路径
    pub async fn set_up(&mut self, ctx: &mut SetUpContext<'_>) -> Result<(), FlowError> {
        self.path = ctx.path.clone();
        self.actor.set_up(ctx).await
    }

    pub async fn wrap_up(&mut self) {
        self.actor.wrap_up().await;
    }

    pub async fn clean_up(&mut self) {
        self.actor.clean_up().await;
    }
}

impl std::fmt::Debug for ActorNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorNode")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("skip", &self.skip)
            .field("path", &self.path.to_string())
            .finish()
    }
}

/// setUp 阶段上下文
pub struct SetUpContext<'a> {
    path: ActorPath,
    callables: &'a mut CallableActors,
    registry: &'a ActorRegistry,
    variables: &'a Variables,
}

impl<'a> SetUpContext<'a> {
    pub fn new(
        path: ActorPath,
        callables: &'a mut CallableActors,
        registry: &'a ActorRegistry,
        variables: &'a Variables,
    ) -> Self {
        Self {
            path,
            callables,
            registry,
            variables,
        }
    }

    pub fn path(&self) -> &ActorPath {
        &self.path
    }

    pub fn callables(&self) -> &CallableActors {
        self.callables
    }

    pub fn callables_mut(&mut self) -> &mut CallableActors {
        self.callables
    }

    pub fn registry(&self) -> &'a ActorRegistry {
        self.registry
    }

    pub fn variables(&self) -> &'a Variables {
        self.variables
    }

    /// 子节点上下文（重借用注册表）
    pub fn for_child(&mut self, name: &str) -> SetUpContext<'_> {
        SetUpContext {
            path: self.path.child(name),
            callables: &mut *self.callables,
            registry: self.registry,
            variables: self.variables,
        }
    }

    pub fn invalid(&self, reason: impl Into<String>) -> FlowError {
        FlowError::InvalidStructure {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

/// 执行阶段上下文；同一个取消令牌贯穿整棵树
#[derive(Clone)]
pub struct ExecutionContext<'a> {
    path: ActorPath,
    variables: &'a Variables,
    storage: &'a Storage,
    callables: &'a CallableActors,
    stop: &'a CancellationToken,
    error_handling: ErrorHandling,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        path: ActorPath,
        variables: &'a Variables,
        storage: &'a Storage,
        callables: &'a CallableActors,
        stop: &'a CancellationToken,
        error_handling: ErrorHandling,
    ) -> Self {
        Self {
            path,
            variables,
            storage,
            callables,
            stop,
            error_handling,
        }
    }

    pub fn path(&self) -> &ActorPath {
        &self.path
    }

    pub fn variables(&self) -> &'a Variables {
        self.variables
    }

    pub fn storage(&self) -> &'a Storage {
        self.storage
    }

    pub fn callables(&self) -> &'a CallableActors {
        self.callables
    }

    pub fn error_handling(&self) -> ErrorHandling {
        self.error_handling
    }

    pub fn for_child(&self, name: &str) -> ExecutionContext<'a> {
        self.with_path(self.path.child(name))
    }

    pub fn with_path(&self, path: ActorPath) -> ExecutionContext<'a> {
        ExecutionContext {
            path,
            ..self.clone()
        }
    }

    /// 读取配置值时展开 `@{变量}` 与 `%{存储}`
    pub async fn expand(&self, text: &str) -> Result<String, FlowError> {
        let text = self.variables.expand(text).await?;
        self.storage.expand(&text).await
    }

    /// 数值选项：数字直接使用，字符串先展开再解析
    pub async fn integer(&self, option: &str, value: &Value) -> Result<i64, FlowError> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .ok_or_else(|| self.error(format!("option '{}' is not an integer: {}", option, n))),
            Value::String(s) => {
                let expanded = self.expand(s).await?;
                expanded.trim().parse::<i64>().map_err(|_| {
                    self.error(format!("option '{}' is not an integer: {}", option, expanded))
                })
            }
            other => Err(self.error(format!("option '{}' is not an integer: {}", option, other))),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// 等待停止请求（用于可取消的等待）
    pub fn cancelled(&self) -> WaitForCancellationFuture<'a> {
        self.stop.cancelled()
    }

    /// 由 Actor 主动停止整个流程
    pub fn stop_flow(&self, reason: &str) {
        tracing::info!(actor = %self.path, "Flow stop requested: {}", reason);
        self.stop.cancel();
    }

    /// 以当前路径构造执行错误
    pub fn error(&self, message: impl Into<String>) -> FlowError {
        FlowError::Actor {
            path: self.path.clone(),
            message: message.into(),
        }
    }
}
