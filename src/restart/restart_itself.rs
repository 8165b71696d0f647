//! RestartItself：重启流程自身
//!
//! - use_flow_file_variable = false：复用同一实例，恢复 cleanUp 前的变量与存储后重新 setUp 并执行
//! - use_flow_file_variable = true：从变量（默认 flow_filename_long）读取流程文件；
//!   文件不存在时在停止任何东西之前报错

use async_trait::async_trait;

use crate::core::{FlowError, RestartError};
use crate::flow::{FlowHandle, VAR_FLOW_FILENAME_LONG};
use crate::restart::{launch, start_from_file, stop_flow, RestartOperation};

#[derive(Debug, Clone)]
pub struct RestartItself {
    use_flow_file_variable: bool,
    variable: String,
}

impl RestartItself {
    pub fn new(use_flow_file_variable: bool) -> Self {
        Self {
            use_flow_file_variable,
            variable: VAR_FLOW_FILENAME_LONG.to_string(),
        }
    }

    /// 改用其它变量保存流程文件路径
    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = variable.into();
        self
    }
}

impl Default for RestartItself {
    fn default() -> Self {
        Self::new(false)
    }
}

#[async_trait]
impl RestartOperation for RestartItself {
    fn name(&self) -> &str {
        "restart_itself"
    }

    async fn restart(&self, flow: &FlowHandle) -> Result<(), RestartError> {
        if self.use_flow_file_variable {
            let file = flow
                .variable(&self.variable)
                .await
                .ok_or_else(|| FlowError::UnknownVariable(self.variable.clone()))?;
            let exists = tokio::fs::try_exists(&file).await.unwrap_or(false);
            if !exists {
                return Err(RestartError::FlowFileMissing(file));
            }
            stop_flow(flow).await;
            start_from_file(flow, std::path::Path::new(&file)).await?;
            return Ok(());
        }

        stop_flow(flow).await;
        // 上一次同实例启动的任务必须先结束，避免两个任务争用同一棵树
        flow.join_launched().await;
        flow.restore_retained_state().await;
        flow.set_up().await?;
        tracing::info!(flow_id = flow.id(), "Restarting flow '{}' in place", flow.name());
        launch(flow.clone()).await;
        Ok(())
    }
}
