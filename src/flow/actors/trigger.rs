//! Trigger：每收到一个 token 执行一次子流程，然后转发该 token

use async_trait::async_trait;

use crate::core::FlowError;
use crate::flow::actor::{Actor, ActorKind, ActorNode, ExecutionContext, SetUpContext};
use crate::flow::director;
use crate::flow::token::Token;

pub struct Trigger {
    children: Vec<ActorNode>,
    pending: Option<Token>,
    output: Option<Token>,
}

impl Trigger {
    pub fn new(children: Vec<ActorNode>) -> Self {
        Self {
            children,
            pending: None,
            output: None,
        }
    }
}

#[async_trait]
impl Actor for Trigger {
    fn kind(&self) -> ActorKind {
        ActorKind::Transformer
    }

    async fn set_up(&mut self, ctx: &mut SetUpContext<'_>) -> Result<(), FlowError> {
        director::validate(ctx.path(), &self.children)?;
        director::set_up_children(&mut self.children, ctx).await
    }

    fn input(&mut self, token: Token) {
        self.pending = Some(token);
    }

    async fn execute(&mut self, ctx: &ExecutionContext<'_>) -> Result<(), FlowError> {
        let Some(token) = self.pending.take() else {
            return Ok(());
        };
        director::execute_children(&mut self.children, ctx).await?;
        if !ctx.is_stopped() {
            self.output = Some(token);
        }
        Ok(())
    }

    fn has_output(&self) -> bool {
        self.output.is_some()
    }

    fn output(&mut self) -> Option<Token> {
        self.output.take()
    }

    async fn wrap_up(&mut self) {
        director::wrap_up_children(&mut self.children).await;
    }

    async fn clean_up(&mut self) {
        director::clean_up_children(&mut self.children).await;
    }
}
