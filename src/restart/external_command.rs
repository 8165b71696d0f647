//! ExternalCommand：停止流程后把控制权交给外部进程（如服务管理器）
//!
//! 命令在停止前展开 `@{...}`；展开失败时仍停止流程但不启动进程。
//! 进程在独立任务中运行，退出码与输出只记录日志，restart 总是返回 Ok。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::RestartError;
use crate::flow::FlowHandle;
use crate::restart::process::{ProcessRunner, ShellProcessRunner};
use crate::restart::{stop_flow, RestartOperation};

pub struct ExternalCommand {
    command: String,
    runner: Arc<dyn ProcessRunner>,
}

impl ExternalCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self::with_runner(command, Arc::new(ShellProcessRunner::default()))
    }

    pub fn with_runner(command: impl Into<String>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            command: command.into(),
            runner,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl RestartOperation for ExternalCommand {
    fn name(&self) -> &str {
        "external_command"
    }

    async fn restart(&self, flow: &FlowHandle) -> Result<(), RestartError> {
        // 先展开：cleanUp 之后变量已清空
        let expanded = flow.expand(&self.command).await;

        stop_flow(flow).await;

        let command = match expanded {
            Ok(command) => command,
            Err(e) => {
                tracing::error!(flow_id = flow.id(), "Failed to expand command '{}': {}", self.command, e);
                return Ok(());
            }
        };

        let runner = Arc::clone(&self.runner);
        let flow_id = flow.id();
        tokio::spawn(async move {
            match runner.run(&command).await {
                Ok(outcome) if outcome.success() => tracing::info!(
                    flow_id,
                    exit_code = ?outcome.exit_code,
                    stdout = %outcome.stdout.trim(),
                    stderr = %outcome.stderr.trim(),
                    "External command '{}' finished",
                    command
                ),
                Ok(outcome) => tracing::error!(
                    flow_id,
                    exit_code = ?outcome.exit_code,
                    stdout = %outcome.stdout.trim(),
                    stderr = %outcome.stderr.trim(),
                    "External command '{}' failed",
                    command
                ),
                Err(e) => tracing::error!(flow_id, "External command '{}' failed: {}", command, e),
            }
        });
        Ok(())
    }
}
