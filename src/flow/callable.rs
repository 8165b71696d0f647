//! CallableActors：按名称注册、可在树中任意位置引用的 Actor
//!
//! 注册表在流程 setUp 时由 CallableActors 容器填充，执行期间只读。
//! 引用方（CallableSource / CallableTransformer / CallableSink）在自己的 setUp 中解析并缓存，
//! 可选择共享实例或从定义深拷贝一个独立实例。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::core::FlowError;
use crate::flow::actor::{Actor, ActorKind, ActorNode, ExecutionContext, SetUpContext};
use crate::flow::definition::ActorDef;
use crate::flow::token::Token;

/// 已注册的可调用 Actor
#[derive(Clone)]
pub struct CallableEntry {
    node: Arc<Mutex<ActorNode>>,
    definition: ActorDef,
    kind: ActorKind,
}

impl CallableEntry {
    pub fn kind(&self) -> ActorKind {
        self.kind
    }

    pub fn definition(&self) -> &ActorDef {
        &self.definition
    }

    pub fn node(&self) -> Arc<Mutex<ActorNode>> {
        Arc::clone(&self.node)
    }
}

/// 名称 -> 可调用 Actor
#[derive(Default)]
pub struct CallableActors {
    entries: HashMap<String, CallableEntry>,
    /// 注册顺序，wrapUp / cleanUp 按此顺序
    order: Vec<String>,
}

impl CallableActors {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个已 setUp 的节点；重名报错
    pub fn register(&mut self, node: ActorNode, definition: ActorDef) -> Result<(), FlowError> {
        let name = node.name().to_string();
        if self.entries.contains_key(&name) {
            return Err(FlowError::DuplicateCallable(name));
        }
        let kind = node.kind();
        self.entries.insert(
            name.clone(),
            CallableEntry {
                node: Arc::new(Mutex::new(node)),
                definition,
                kind,
            },
        );
        self.order.push(name);
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&CallableEntry, FlowError> {
        self.entries
            .get(name)
            .ok_or_else(|| FlowError::UnknownCallable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub async fn wrap_up(&self) {
        for name in &self.order {
            if let Some(entry) = self.entries.get(name) {
                entry.node.lock().await.wrap_up().await;
            }
        }
    }

    pub async fn clean_up(&mut self) {
        for name in &self.order {
            if let Some(entry) = self.entries.get(name) {
                entry.node.lock().await.clean_up().await;
            }
        }
        self.entries.clear();
        self.order.clear();
    }
}

/// CallableActors 容器（独立 Actor）：子 Actor setUp 后注册为可调用
pub struct CallableActorsContainer {
    children: Vec<(ActorNode, ActorDef)>,
}

impl CallableActorsContainer {
    pub fn new(children: Vec<(ActorNode, ActorDef)>) -> Self {
        Self { children }
    }
}

#[async_trait]
impl Actor for CallableActorsContainer {
    fn kind(&self) -> ActorKind {
        ActorKind::Standalone
    }

    async fn set_up(&mut self, ctx: &mut SetUpContext<'_>) -> Result<(), FlowError> {
        for (mut node, def) in self.children.drain(..) {
            if ctx.callables().contains(node.name()) {
                return Err(FlowError::DuplicateCallable(node.name().to_string()));
            }
            let name = node.name().to_string();
            node.set_up(&mut ctx.for_child(&name)).await?;
            ctx.callables_mut().register(node, def)?;
        }
        Ok(())
    }

    async fn execute(&mut self, _ctx: &ExecutionContext<'_>) -> Result<(), FlowError> {
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CallableOptions {
    pub callable: String,
    /// true 时深拷贝而不是共享实例
    #[serde(default)]
    pub copy: bool,
}

enum Resolved {
    Shared(Arc<Mutex<ActorNode>>),
    Owned(Box<ActorNode>),
}

/// 对可调用 Actor 的引用；kind 必须与被引用者一致。
/// 输出不做缓冲，每次 output 从被引用者取一个 token，停止检查由执行器在 token 之间完成。
pub struct CallableRef {
    target: String,
    copy: bool,
    kind: ActorKind,
    resolved: Option<Resolved>,
    pending_input: Option<Token>,
}

impl CallableRef {
    pub fn new(target: impl Into<String>, copy: bool, kind: ActorKind) -> Self {
        Self {
            target: target.into(),
            copy,
            kind,
            resolved: None,
            pending_input: None,
        }
    }

    pub(crate) fn from_options(options: CallableOptions, kind: ActorKind) -> Self {
        Self::new(options.callable, options.copy, kind)
    }

    async fn run_target(
        node: &mut ActorNode,
        input: Option<Token>,
        ctx: &ExecutionContext<'_>,
    ) -> Result<(), FlowError> {
        let target_ctx = ctx.with_path(node.path().clone());
        let actor = node.actor_mut();
        if let Some(token) = input {
            actor.input(token);
        }
        actor.execute(&target_ctx).await
    }
}

#[async_trait]
impl Actor for CallableRef {
    fn kind(&self) -> ActorKind {
        self.kind
    }

    async fn set_up(&mut self, ctx: &mut SetUpContext<'_>) -> Result<(), FlowError> {
        let entry = ctx.callables().resolve(&self.target)?;
        if entry.kind() != self.kind {
            return Err(ctx.invalid(format!(
                "callable '{}' is a {}, expected a {}",
                self.target,
                entry.kind(),
                self.kind
            )));
        }
        let resolved = if self.copy {
            let definition = entry.definition().clone();
            let mut node = ActorNode::build(&definition, ctx.registry())?;
            node.set_up(&mut ctx.for_child(&self.target)).await?;
            Resolved::Owned(Box::new(node))
        } else {
            Resolved::Shared(entry.node())
        };
        tracing::debug!(
            actor = %ctx.path(),
            "Resolved callable '{}' (copy: {})",
            self.target,
            self.copy
        );
        self.resolved = Some(resolved);
        Ok(())
    }

    fn input(&mut self, token: Token) {
        self.pending_input = Some(token);
    }

    async fn execute(&mut self, ctx: &ExecutionContext<'_>) -> Result<(), FlowError> {
        let input = self.pending_input.take();
        match &mut self.resolved {
            Some(Resolved::Shared(node)) => {
                let mut node = node.lock().await;
                Self::run_target(&mut node, input, ctx).await
            }
            Some(Resolved::Owned(node)) => Self::run_target(node, input, ctx).await,
            None => Err(FlowError::UnknownCallable(self.target.clone())),
        }
    }

    // 共享实例只在 execute 期间加锁；同一流程内顺序执行，try_lock 不会与之冲突
    fn has_output(&self) -> bool {
        match &self.resolved {
            Some(Resolved::Shared(node)) => node
                .try_lock()
                .map(|node| node.actor().has_output())
                .unwrap_or(false),
            Some(Resolved::Owned(node)) => node.actor().has_output(),
            None => false,
        }
    }

    fn output(&mut self) -> Option<Token> {
        match &mut self.resolved {
            Some(Resolved::Shared(node)) => node
                .try_lock()
                .ok()
                .and_then(|mut node| node.actor_mut().output()),
            Some(Resolved::Owned(node)) => node.actor_mut().output(),
            None => None,
        }
    }

    async fn wrap_up(&mut self) {
        if let Some(Resolved::Owned(node)) = &mut self.resolved {
            node.wrap_up().await;
        }
    }

    async fn clean_up(&mut self) {
        if let Some(Resolved::Owned(node)) = &mut self.resolved {
            node.clean_up().await;
        }
        self.resolved = None;
    }
}
