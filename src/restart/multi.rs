//! MultiOperation：先停止一次流程，再按顺序执行子操作，第一个错误即返回

use async_trait::async_trait;

use crate::core::RestartError;
use crate::flow::FlowHandle;
use crate::restart::{stop_flow, RestartOperation};

#[derive(Default)]
pub struct MultiOperation {
    operations: Vec<Box<dyn RestartOperation>>,
}

impl MultiOperation {
    pub fn new(operations: Vec<Box<dyn RestartOperation>>) -> Self {
        Self { operations }
    }

    pub fn push(mut self, operation: impl RestartOperation + 'static) -> Self {
        self.operations.push(Box::new(operation));
        self
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[async_trait]
impl RestartOperation for MultiOperation {
    fn name(&self) -> &str {
        "multi"
    }

    async fn restart(&self, flow: &FlowHandle) -> Result<(), RestartError> {
        stop_flow(flow).await;
        for (index, operation) in self.operations.iter().enumerate() {
            if let Err(e) = operation.restart(flow).await {
                tracing::error!(
                    flow_id = flow.id(),
                    operation = operation.name(),
                    "Restart operation #{} failed: {}",
                    index + 1,
                    e
                );
                return Err(e);
            }
        }
        Ok(())
    }
}
