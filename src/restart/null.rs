//! 不做任何事的重启操作（默认，即禁用重启）

use async_trait::async_trait;

use crate::core::RestartError;
use crate::flow::FlowHandle;
use crate::restart::RestartOperation;

#[derive(Debug, Default, Clone, Copy)]
pub struct NullOperation;

#[async_trait]
impl RestartOperation for NullOperation {
    fn name(&self) -> &str {
        "null"
    }

    async fn restart(&self, flow: &FlowHandle) -> Result<(), RestartError> {
        tracing::debug!(flow_id = flow.id(), "Null restart operation, nothing to do");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EngineContext;
    use crate::flow::{ActorDef, Flow, FlowState};

    #[tokio::test]
    async fn test_null_leaves_flow_untouched() {
        let flow = Flow::from_definition(ActorDef::new("Flow"), EngineContext::new()).unwrap();
        flow.set_up().await.unwrap();
        flow.storage().put("dataset", 1).await;
        flow.variables().set("x", "y").await;

        NullOperation.restart(&flow).await.unwrap();

        assert_eq!(flow.state(), FlowState::SetUp);
        assert!(!flow.is_stopped());
        assert_eq!(flow.storage().keys().await, vec!["dataset".to_string()]);
        assert_eq!(flow.variables().get("x").await.unwrap(), "y");
    }
}
