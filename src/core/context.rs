//! 引擎上下文：流程共享服务的唯一持有者
//!
//! 包含流程 ID 生成器、Actor 注册表、默认错误处理策略与运行中流程表（只存 Weak 引用）。
//! 流程构造时传入 Arc<EngineContext>，组件借用而不是访问全局单例。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::RwLock;

use crate::config::EngineSection;
use crate::flow::{ActorRegistry, ErrorHandling, Flow, FlowHandle};

/// 进程内单调递增的流程 ID
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    pub fn new(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// 自增并返回当前值
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(1)
    }
}

/// 引擎上下文
pub struct EngineContext {
    ids: IdGenerator,
    actors: ActorRegistry,
    error_handling: ErrorHandling,
    /// 正在执行的流程：flow id -> Weak<Flow>
    running: RwLock<HashMap<u64, Weak<Flow>>>,
}

impl EngineContext {
    /// 使用内置 Actor 目录与默认设置
    pub fn new() -> Arc<Self> {
        Self::with_registry(ActorRegistry::with_builtins())
    }

    pub fn with_registry(actors: ActorRegistry) -> Arc<Self> {
        Arc::new(Self {
            ids: IdGenerator::default(),
            actors,
            error_handling: ErrorHandling::default(),
            running: RwLock::new(HashMap::new()),
        })
    }

    /// 按 [engine] 配置段创建
    pub fn from_config(section: &EngineSection, actors: ActorRegistry) -> Arc<Self> {
        Arc::new(Self {
            ids: IdGenerator::new(section.first_flow_id),
            actors,
            error_handling: section.error_handling,
            running: RwLock::new(HashMap::new()),
        })
    }

    pub fn next_flow_id(&self) -> u64 {
        self.ids.next_id()
    }

    pub fn actors(&self) -> &ActorRegistry {
        &self.actors
    }

    /// 流程定义未指定时使用的错误处理策略
    pub fn default_error_handling(&self) -> ErrorHandling {
        self.error_handling
    }

    pub(crate) async fn register_running(&self, id: u64, flow: Weak<Flow>) {
        self.running.write().await.insert(id, flow);
    }

    pub(crate) async fn unregister_running(&self, id: u64) {
        self.running.write().await.remove(&id);
    }

    /// 当前仍存活且在执行中的流程
    pub async fn running_flows(&self) -> Vec<FlowHandle> {
        let mut running = self.running.write().await;
        running.retain(|_, flow| flow.strong_count() > 0);
        running.values().filter_map(Weak::upgrade).collect()
    }

    /// 请求所有运行中的流程停止（不等待其结束）
    pub async fn stop_all(&self) -> usize {
        let flows = self.running_flows().await;
        for flow in &flows {
            flow.stop_execution();
        }
        if !flows.is_empty() {
            tracing::info!("Requested stop of {} running flows", flows.len());
        }
        flows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generator_is_monotonic() {
        let ids = IdGenerator::new(5);
        assert_eq!(ids.next_id(), 5);
        assert_eq!(ids.next_id(), 6);
        assert_eq!(ids.next_id(), 7);
    }

    #[test]
    fn test_id_generator_concurrent_unique() {
        let ids = Arc::new(IdGenerator::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..100).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();
        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 400);
    }

    #[tokio::test]
    async fn test_running_table_prunes_dropped_flows() {
        let ctx = EngineContext::new();
        ctx.register_running(1, Weak::new()).await;
        assert!(ctx.running_flows().await.is_empty());
        assert_eq!(ctx.stop_all().await, 0);
    }
}
