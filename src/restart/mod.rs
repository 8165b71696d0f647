//! 重启子系统：停止流程并让（可能是另一个）流程重新进入执行
//!
//! 所有操作共享 `stop_flow`（已停止则不做任何事）；新流程的 execute 通过 `launch`
//! 在独立任务中运行，restart 只同步报告新流程 setUp 之前的失败。

pub mod config;
pub mod external_command;
pub mod flow_file;
pub mod manager;
pub mod multi;
pub mod null;
pub mod process;
pub mod restart_itself;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::RestartError;
use crate::flow::{Flow, FlowHandle};

pub use config::RestartOperationConfig;
pub use external_command::ExternalCommand;
pub use flow_file::FlowFile;
pub use manager::{FailedStateCheck, HealthCheck, RestartManager};
pub use multi::MultiOperation;
pub use null::NullOperation;
pub use process::{ProcessOutcome, ProcessRunner, ShellProcessRunner};
pub use restart_itself::RestartItself;

/// 重启策略
#[async_trait]
pub trait RestartOperation: Send + Sync {
    fn name(&self) -> &str;

    async fn restart(&self, flow: &FlowHandle) -> Result<(), RestartError>;
}

/// 未停止时依次 stopExecution、wrapUp、cleanUp；已停止则不做任何事
pub async fn stop_flow(flow: &Flow) {
    if flow.is_stopped() {
        tracing::debug!(flow_id = flow.id(), "Flow '{}' already stopped", flow.name());
        return;
    }
    tracing::info!(flow_id = flow.id(), "Stopping flow '{}'", flow.name());
    flow.stop_execution();
    flow.wrap_up().await;
    flow.clean_up().await;
}

/// 在新任务中执行已 setUp 的流程；执行错误只记录日志。
/// 启动前登记到运行中流程表，任务句柄由流程自身保存（见 `Flow::join_launched`）。
pub async fn launch(flow: FlowHandle) {
    let context = Arc::clone(flow.context());
    context
        .register_running(flow.id(), Arc::downgrade(&flow))
        .await;
    let task_flow = Arc::clone(&flow);
    let handle = tokio::spawn(async move {
        let flow = task_flow;
        // 任务开始前已被停止（例如再次同实例重启）时不再执行
        if flow.is_stopped() {
            context.unregister_running(flow.id()).await;
            tracing::debug!(flow_id = flow.id(), "Flow '{}' stopped before launch", flow.name());
            return;
        }
        let result = flow.execute().await;
        context.unregister_running(flow.id()).await;
        match result {
            Ok(()) => tracing::info!(
                flow_id = flow.id(),
                "Restarted flow '{}' ended: {:?}",
                flow.name(),
                flow.state()
            ),
            Err(e) => tracing::error!(
                flow_id = flow.id(),
                "Restarted flow '{}' failed: {}",
                flow.name(),
                e
            ),
        }
        if !flow.is_stopped() {
            flow.wrap_up().await;
        }
    });
    flow.set_launched(handle);
}

/// 从文件加载新流程，继承旧流程的监听器与 RestartManager，setUp 成功后启动
pub(crate) async fn start_from_file(old: &Flow, path: &Path) -> Result<FlowHandle, RestartError> {
    let flow = Flow::load(path, old.context().clone()).await?;
    for listener in old.listeners() {
        flow.add_listener(listener);
    }
    flow.set_restart_manager(old.restart_manager());
    flow.set_up().await?;
    tracing::info!(
        flow_id = flow.id(),
        "Starting flow '{}' from {}",
        flow.name(),
        path.display()
    );
    launch(flow.clone()).await;
    Ok(flow)
}
