//! Flow：根容器 Actor，独占 Actor 树、变量、存储与可选的 RestartManager
//!
//! 生命周期：Created → setUp → execute（Running → Finished / Stopped / Failed）→ wrapUp → cleanUp。
//! - Actor 树在每次 setUp 时从定义重建，execute 期间整棵树处于异步锁内
//! - 停止通过 CancellationToken：每次 setUp 安装新令牌，stop_execution 取消它
//! - 状态通过 watch 通道发布，可在其它任务中等待

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};

use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::{EngineContext, FlowError};
use crate::flow::actor::{ActorNode, ErrorHandling, ExecutionContext, SetUpContext};
use crate::flow::builder::FlowBuilder;
use crate::flow::callable::CallableActors;
use crate::flow::definition::{load_definition, ActorDef};
use crate::flow::director;
use crate::flow::storage::{Storage, StorageSnapshot};
use crate::flow::variables::{Variables, VariablesSnapshot};
use crate::flow::ActorPath;
use crate::restart::RestartManager;

/// 流程文件绝对路径
pub const VAR_FLOW_FILENAME_LONG: &str = "flow_filename_long";
/// 流程文件名
pub const VAR_FLOW_FILENAME_SHORT: &str = "flow_filename_short";
/// 流程文件所在目录
pub const VAR_FLOW_DIR: &str = "flow_dir";
/// 流程 ID
pub const VAR_FLOW_ID: &str = "flow_id";

pub type FlowHandle = Arc<Flow>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Created,
    SetUp,
    Running,
    Finished,
    Stopped,
    Failed,
    WrappedUp,
    CleanedUp,
}

impl FlowState {
    /// execute 已结束（正常、停止或失败）
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FlowState::Finished
                | FlowState::Stopped
                | FlowState::Failed
                | FlowState::WrappedUp
                | FlowState::CleanedUp
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    SetUp,
    ExecutionStarted,
    ExecutionFinished,
    StopRequested,
    WrappedUp,
    CleanedUp,
}

/// 生命周期监听器
pub trait FlowListener: Send + Sync {
    fn on_event(&self, flow: &Flow, event: LifecycleEvent);
}

/// cleanUp 前保留的变量与存储，供同实例重启恢复
#[derive(Debug, Clone, Default)]
pub struct RetainedState {
    pub variables: VariablesSnapshot,
    pub storage: StorageSnapshot,
}

#[derive(Debug, Default, Deserialize)]
struct FlowOptions {
    #[serde(default)]
    error_handling: Option<ErrorHandling>,
    /// setUp 时设置（不覆盖已有值）
    #[serde(default)]
    variables: BTreeMap<String, String>,
}

struct FlowTree {
    children: Vec<ActorNode>,
    callables: CallableActors,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct Flow {
    me: Weak<Flow>,
    id: u64,
    name: String,
    definition: ActorDef,
    error_handling: ErrorHandling,
    option_variables: BTreeMap<String, String>,
    source_file: Option<PathBuf>,
    context: Arc<EngineContext>,
    tree: tokio::sync::Mutex<Option<FlowTree>>,
    variables: Variables,
    storage: Storage,
    stop: Mutex<CancellationToken>,
    state: watch::Sender<FlowState>,
    listeners: RwLock<Vec<Arc<dyn FlowListener>>>,
    restart_manager: RwLock<Option<Arc<RestartManager>>>,
    retained: Mutex<Option<RetainedState>>,
    launched: Mutex<Option<JoinHandle<()>>>,
}

impl Flow {
    pub fn builder(name: impl Into<String>) -> FlowBuilder {
        FlowBuilder::new(name)
    }

    /// 从定义构造；根节点类型必须是 Flow
    pub fn from_definition(
        definition: ActorDef,
        context: Arc<EngineContext>,
    ) -> Result<FlowHandle, FlowError> {
        Self::create(definition, None, context)
    }

    /// 从文件加载，文件路径写入程序变量
    pub async fn load(path: &Path, context: Arc<EngineContext>) -> Result<FlowHandle, FlowError> {
        let definition = load_definition(path).await?;
        let absolute = tokio::fs::canonicalize(path)
            .await
            .map_err(|source| FlowError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::create(definition, Some(absolute), context)
    }

    fn create(
        definition: ActorDef,
        source_file: Option<PathBuf>,
        context: Arc<EngineContext>,
    ) -> Result<FlowHandle, FlowError> {
        if !definition.is_flow() {
            return Err(FlowError::NotAFlow);
        }
        let options: FlowOptions = definition.options()?;
        let id = context.next_flow_id();
        let name = definition.name().to_string();
        let error_handling = options
            .error_handling
            .unwrap_or_else(|| context.default_error_handling());
        let (state, _) = watch::channel(FlowState::Created);
        tracing::debug!(flow_id = id, "Created flow '{}'", name);
        Ok(Arc::new_cyclic(|me| Flow {
            me: me.clone(),
            id,
            name,
            definition,
            error_handling,
            option_variables: options.variables,
            source_file,
            context,
            tree: tokio::sync::Mutex::new(None),
            variables: Variables::new(),
            storage: Storage::new(),
            stop: Mutex::new(CancellationToken::new()),
            state,
            listeners: RwLock::new(Vec::new()),
            restart_manager: RwLock::new(None),
            retained: Mutex::new(None),
            launched: Mutex::new(None),
        }))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> ActorPath {
        ActorPath::root(&self.name)
    }

    pub fn definition(&self) -> &ActorDef {
        &self.definition
    }

    pub fn error_handling(&self) -> ErrorHandling {
        self.error_handling
    }

    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.context
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn state(&self) -> FlowState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<FlowState> {
        self.state.subscribe()
    }

    /// 等待状态满足条件
    pub async fn wait_for(&self, predicate: impl Fn(FlowState) -> bool) -> FlowState {
        let mut rx = self.state.subscribe();
        let result = match rx.wait_for(|s| predicate(*s)).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        result
    }

    pub fn add_listener(&self, listener: Arc<dyn FlowListener>) {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    pub fn listeners(&self) -> Vec<Arc<dyn FlowListener>> {
        self.listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn set_restart_manager(&self, manager: Option<Arc<RestartManager>>) {
        *self
            .restart_manager
            .write()
            .unwrap_or_else(|e| e.into_inner()) = manager;
    }

    pub fn restart_manager(&self) -> Option<Arc<RestartManager>> {
        self.restart_manager
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// 记录后台执行任务；同实例只保留最近一次
    pub(crate) fn set_launched(&self, handle: JoinHandle<()>) {
        *lock(&self.launched) = Some(handle);
    }

    /// 等待最近一次后台执行任务结束（未启动过则立即返回）
    pub async fn join_launched(&self) {
        let handle = lock(&self.launched).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(flow_id = self.id, "Execution task of flow '{}' failed: {}", self.name, e);
            }
        }
    }

    /// 自上次 setUp 以来是否已请求停止
    pub fn is_stopped(&self) -> bool {
        lock(&self.stop).is_cancelled()
    }

    /// 请求协作式停止，不阻塞
    pub fn stop_execution(&self) {
        let token = lock(&self.stop).clone();
        if token.is_cancelled() {
            return;
        }
        token.cancel();
        tracing::info!(flow_id = self.id, "Stop requested for flow '{}'", self.name);
        self.notify(LifecycleEvent::StopRequested);
    }

    fn set_state(&self, state: FlowState) {
        self.state.send_replace(state);
    }

    fn notify(&self, event: LifecycleEvent) {
        for listener in self.listeners() {
            listener.on_event(self, event);
        }
    }

    /// 设置程序变量：文件路径相关变量与 flow_id
    pub async fn apply_programmatic_variables(&self) {
        if let Some(file) = &self.source_file {
            self.variables
                .set(VAR_FLOW_FILENAME_LONG, file.display().to_string())
                .await;
            if let Some(short) = file.file_name() {
                self.variables
                    .set(VAR_FLOW_FILENAME_SHORT, short.to_string_lossy().to_string())
                    .await;
            }
            if let Some(dir) = file.parent() {
                self.variables
                    .set(VAR_FLOW_DIR, dir.display().to_string())
                    .await;
            }
        }
        self.variables.set(VAR_FLOW_ID, self.id.to_string()).await;
    }

    /// 校验并初始化 Actor 树；失败时流程进入 Failed，不得执行
    pub async fn set_up(&self) -> Result<(), FlowError> {
        let mut slot = self.tree.lock().await;
        *lock(&self.stop) = CancellationToken::new();
        self.apply_programmatic_variables().await;
        for (name, value) in &self.option_variables {
            self.variables.set_default(name.clone(), value.clone()).await;
        }

        match self.build_tree().await {
            Ok(tree) => {
                *slot = Some(tree);
                self.set_state(FlowState::SetUp);
                tracing::info!(flow_id = self.id, "Flow '{}' set up", self.name);
                self.notify(LifecycleEvent::SetUp);
                Ok(())
            }
            Err(e) => {
                *slot = None;
                self.set_state(FlowState::Failed);
                tracing::error!(flow_id = self.id, "Failed to set up flow '{}': {}", self.name, e);
                Err(e)
            }
        }
    }

    async fn build_tree(&self) -> Result<FlowTree, FlowError> {
        let registry = self.context.actors();
        let root = self.path();
        let mut children = ActorNode::build_all(&self.definition.actors, registry)?;
        director::validate(&root, &children)?;
        let mut callables = CallableActors::new();
        let mut ctx = SetUpContext::new(root, &mut callables, registry, &self.variables);
        director::set_up_children(&mut children, &mut ctx).await?;
        Ok(FlowTree {
            children,
            callables,
        })
    }

    /// 执行整棵树直到完成、停止或出错；需先 setUp
    pub async fn execute(&self) -> Result<(), FlowError> {
        let mut slot = self.tree.lock().await;
        let tree = match slot.as_mut() {
            Some(tree) if self.state() == FlowState::SetUp => tree,
            _ => return Err(FlowError::NotSetUp(self.name.clone())),
        };
        let stop = lock(&self.stop).clone();

        self.context.register_running(self.id, self.me.clone()).await;
        self.set_state(FlowState::Running);
        tracing::info!(flow_id = self.id, "Flow '{}' started", self.name);
        self.notify(LifecycleEvent::ExecutionStarted);
        let started = chrono::Utc::now();

        let FlowTree {
            children,
            callables,
        } = tree;
        let ctx = ExecutionContext::new(
            self.path(),
            &self.variables,
            &self.storage,
            callables,
            &stop,
            self.error_handling,
        );
        let result = director::execute_children(children, &ctx).await;

        self.context.unregister_running(self.id).await;
        let elapsed_ms = (chrono::Utc::now() - started).num_milliseconds();
        let state = match &result {
            Err(_) => FlowState::Failed,
            Ok(()) if stop.is_cancelled() => FlowState::Stopped,
            Ok(()) => FlowState::Finished,
        };
        self.set_state(state);
        match &result {
            Ok(()) => tracing::info!(
                flow_id = self.id,
                "Flow '{}' {:?} after {}ms",
                self.name,
                state,
                elapsed_ms
            ),
            Err(e) => tracing::error!(
                flow_id = self.id,
                "Flow '{}' failed after {}ms: {}",
                self.name,
                elapsed_ms,
                e
            ),
        }
        self.notify(LifecycleEvent::ExecutionFinished);
        result
    }

    /// 结束执行后的收尾（等待 execute 释放树）
    pub async fn wrap_up(&self) {
        let mut slot = self.tree.lock().await;
        let Some(tree) = slot.as_mut() else {
            return;
        };
        director::wrap_up_children(&mut tree.children).await;
        tree.callables.wrap_up().await;
        self.set_state(FlowState::WrappedUp);
        tracing::info!(flow_id = self.id, "Flow '{}' wrapped up", self.name);
        self.notify(LifecycleEvent::WrappedUp);
    }

    /// 释放 Actor 资源，清空存储与变量（先保留一份快照）
    pub async fn clean_up(&self) {
        let mut slot = self.tree.lock().await;
        if let Some(mut tree) = slot.take() {
            director::clean_up_children(&mut tree.children).await;
            tree.callables.clean_up().await;
        }
        if self.state() != FlowState::CleanedUp {
            let retained = RetainedState {
                variables: self.variables.snapshot().await,
                storage: self.storage.snapshot().await,
            };
            *lock(&self.retained) = Some(retained);
        }
        self.variables.clear().await;
        self.storage.clear().await;
        self.set_state(FlowState::CleanedUp);
        tracing::info!(flow_id = self.id, "Flow '{}' cleaned up", self.name);
        self.notify(LifecycleEvent::CleanedUp);
    }

    /// cleanUp 时保留的快照
    pub fn retained_state(&self) -> Option<RetainedState> {
        lock(&self.retained).clone()
    }

    /// 把 cleanUp 时保留的变量与存储放回（同实例重启）
    pub async fn restore_retained_state(&self) -> bool {
        let retained = lock(&self.retained).take();
        match retained {
            Some(retained) => {
                self.variables.assign(retained.variables).await;
                self.storage.assign(retained.storage).await;
                true
            }
            None => false,
        }
    }

    /// 读取变量；已 cleanUp 时从保留快照读取
    pub async fn variable(&self, name: &str) -> Option<String> {
        if let Some(value) = self.variables.get_opt(name).await {
            return Some(value);
        }
        lock(&self.retained)
            .as_ref()
            .and_then(|r| r.variables.get(name).cloned())
    }

    /// 展开 `@{...}`；已 cleanUp 时针对保留快照展开
    pub async fn expand(&self, text: &str) -> Result<String, FlowError> {
        if self.state() == FlowState::CleanedUp {
            let snapshot = self.retained_state().unwrap_or_default();
            return Variables::expand_with(&snapshot.variables, text);
        }
        self.variables.expand(text).await
    }
}

impl std::fmt::Debug for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flow")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .field("source_file", &self.source_file)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counting_flow() -> ActorDef {
        ActorDef::new("Flow")
            .named("counter")
            .with_child(
                ActorDef::new("ForLoop")
                    .with_option("lower", 1)
                    .with_option("upper", 3),
            )
            .with_child(ActorDef::new("SetStorageValue").with_option("storage_name", "last"))
    }

    #[tokio::test]
    async fn test_rejects_non_flow_root() {
        let err = Flow::from_definition(ActorDef::new("Trigger"), EngineContext::new()).unwrap_err();
        assert_eq!(err.to_string(), "loaded actor is not of type Flow");
    }

    #[tokio::test]
    async fn test_execute_requires_set_up() {
        let flow = Flow::from_definition(counting_flow(), EngineContext::new()).unwrap();
        let err = flow.execute().await.unwrap_err();
        assert!(matches!(err, FlowError::NotSetUp(ref name) if name == "counter"));
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let flow = Flow::from_definition(counting_flow(), EngineContext::new()).unwrap();
        assert_eq!(flow.state(), FlowState::Created);
        flow.set_up().await.unwrap();
        assert_eq!(flow.state(), FlowState::SetUp);
        flow.execute().await.unwrap();
        assert_eq!(flow.state(), FlowState::Finished);
        assert_eq!(flow.storage().get("last").await, Some(json!(3)));
        assert!(!flow.is_stopped());

        flow.wrap_up().await;
        flow.clean_up().await;
        assert_eq!(flow.state(), FlowState::CleanedUp);
        assert!(flow.storage().is_empty().await);
        let retained = flow.retained_state().unwrap();
        assert_eq!(retained.storage.get("last"), Some(&json!(3)));
        assert_eq!(flow.variable(VAR_FLOW_ID).await, Some(flow.id().to_string()));
    }

    #[tokio::test]
    async fn test_set_up_failure_marks_failed() {
        let def = ActorDef::new("Flow").with_child(
            ActorDef::new("CallableSource").with_option("callable", "missing"),
        );
        let flow = Flow::from_definition(def, EngineContext::new()).unwrap();
        let err = flow.set_up().await.unwrap_err();
        assert_eq!(err.to_string(), "unknown callable: missing");
        assert_eq!(flow.state(), FlowState::Failed);
        assert!(flow.execute().await.is_err());
    }

    #[tokio::test]
    async fn test_option_variables_do_not_override() {
        let def = ActorDef::new("Flow").with_option("variables", json!({"a": "1", "b": "2"}));
        let flow = Flow::from_definition(def, EngineContext::new()).unwrap();
        flow.variables().set("a", "custom").await;
        flow.set_up().await.unwrap();
        assert_eq!(flow.variables().get("a").await.unwrap(), "custom");
        assert_eq!(flow.variables().get("b").await.unwrap(), "2");
    }

    #[tokio::test]
    async fn test_stop_execution_is_idempotent_until_next_set_up() {
        let flow = Flow::from_definition(counting_flow(), EngineContext::new()).unwrap();
        flow.set_up().await.unwrap();
        flow.stop_execution();
        flow.stop_execution();
        assert!(flow.is_stopped());
        flow.set_up().await.unwrap();
        assert!(!flow.is_stopped());
    }
}
