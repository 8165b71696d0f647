//! RestartManager：流程异常结束或健康检查失败时调用配置的重启操作
//!
//! 不做自动重试：restart 返回的错误记录为 SEVERE 并返回给调用方。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::core::RestartError;
use crate::flow::{Flow, FlowHandle, FlowState};
use crate::restart::{NullOperation, RestartOperation, RestartOperationConfig};

/// 周期性健康检查
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self, flow: &Flow) -> Result<(), String>;
}

/// 流程处于 Failed 即视为不健康
#[derive(Debug, Default, Clone, Copy)]
pub struct FailedStateCheck;

#[async_trait]
impl HealthCheck for FailedStateCheck {
    async fn check(&self, flow: &Flow) -> Result<(), String> {
        if flow.state() == FlowState::Failed {
            return Err(format!("flow '{}' is in failed state", flow.name()));
        }
        Ok(())
    }
}

pub struct RestartManager {
    operation: Box<dyn RestartOperation>,
    attempts: AtomicU64,
}

impl RestartManager {
    pub fn new(operation: Box<dyn RestartOperation>) -> Self {
        Self {
            operation,
            attempts: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &RestartOperationConfig) -> Self {
        Self::new(config.build())
    }

    pub fn operation_name(&self) -> &str {
        self.operation.name()
    }

    /// on_failure 被调用的次数
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// 调用重启操作；错误记录后原样返回，不再触发新的重启
    pub async fn on_failure(&self, flow: &FlowHandle) -> Result<(), RestartError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(
            flow_id = flow.id(),
            operation = self.operation.name(),
            attempt,
            "Restarting flow '{}'",
            flow.name()
        );
        match self.operation.restart(flow).await {
            Ok(()) => {
                tracing::info!(flow_id = flow.id(), "Restart operation '{}' completed", self.operation.name());
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    flow_id = flow.id(),
                    operation = self.operation.name(),
                    "Failed to restart flow '{}': {}",
                    flow.name(),
                    e
                );
                Err(e)
            }
        }
    }

    /// 周期性检查流程健康；第一次失败触发一次 on_failure 后结束。
    /// 流程正常结束、被停止或句柄被释放时监控也结束。
    pub fn monitor(
        self: &Arc<Self>,
        flow: &FlowHandle,
        interval: Duration,
        check: Arc<dyn HealthCheck>,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let weak = Arc::downgrade(flow);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(flow) = weak.upgrade() else {
                    tracing::debug!("Monitored flow dropped, stopping health checks");
                    return;
                };
                if matches!(
                    flow.state(),
                    FlowState::Finished | FlowState::Stopped | FlowState::WrappedUp | FlowState::CleanedUp
                ) {
                    tracing::debug!(flow_id = flow.id(), "Flow '{}' ended, stopping health checks", flow.name());
                    return;
                }
                if let Err(reason) = check.check(&flow).await {
                    tracing::error!(flow_id = flow.id(), "Health check failed: {}", reason);
                    // 错误已在 on_failure 中记录
                    let _ = manager.on_failure(&flow).await;
                    return;
                }
            }
        })
    }
}

impl Default for RestartManager {
    fn default() -> Self {
        Self::new(Box::new(NullOperation))
    }
}

impl std::fmt::Debug for RestartManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestartManager")
            .field("operation", &self.operation.name())
            .field("attempts", &self.attempts())
            .finish()
    }
}
