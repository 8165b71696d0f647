//! FlowFile：停止当前流程，从指定文件加载新流程并异步执行

use std::path::Path;

use async_trait::async_trait;

use crate::core::RestartError;
use crate::flow::FlowHandle;
use crate::restart::{start_from_file, stop_flow, RestartOperation};

#[derive(Debug, Clone)]
pub struct FlowFile {
    /// 可含 `@{...}`
    file: String,
}

impl FlowFile {
    pub fn new(file: impl Into<String>) -> Self {
        Self { file: file.into() }
    }

    pub fn file(&self) -> &str {
        &self.file
    }
}

#[async_trait]
impl RestartOperation for FlowFile {
    fn name(&self) -> &str {
        "flow_file"
    }

    async fn restart(&self, flow: &FlowHandle) -> Result<(), RestartError> {
        let file = flow.expand(&self.file).await?;
        stop_flow(flow).await;
        start_from_file(flow, Path::new(&file)).await?;
        Ok(())
    }
}
