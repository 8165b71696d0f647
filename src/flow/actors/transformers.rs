//! 变换 Actor：SetStorageValue、Sleep、Fail、PassThrough

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::core::FlowError;
use crate::flow::actor::{Actor, ActorKind, ExecutionContext};
use crate::flow::token::Token;

/// 原样转发
#[derive(Default)]
pub struct PassThrough {
    pending: Option<Token>,
    output: Option<Token>,
}

#[async_trait]
impl Actor for PassThrough {
    fn kind(&self) -> ActorKind {
        ActorKind::Transformer
    }

    fn input(&mut self, token: Token) {
        self.pending = Some(token);
    }

    async fn execute(&mut self, _ctx: &ExecutionContext<'_>) -> Result<(), FlowError> {
        self.output = self.pending.take();
        Ok(())
    }

    fn has_output(&self) -> bool {
        self.output.is_some()
    }

    fn output(&mut self) -> Option<Token> {
        self.output.take()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetStorageValueOptions {
    pub storage_name: String,
}

/// 载荷写入存储并转发
pub struct SetStorageValue {
    options: SetStorageValueOptions,
    pending: Option<Token>,
    output: Option<Token>,
}

impl SetStorageValue {
    pub fn new(options: SetStorageValueOptions) -> Self {
        Self {
            options,
            pending: None,
            output: None,
        }
    }
}

#[async_trait]
impl Actor for SetStorageValue {
    fn kind(&self) -> ActorKind {
        ActorKind::Transformer
    }

    fn input(&mut self, token: Token) {
        self.pending = Some(token);
    }

    async fn execute(&mut self, ctx: &ExecutionContext<'_>) -> Result<(), FlowError> {
        let Some(token) = self.pending.take() else {
            return Ok(());
        };
        let name = ctx.expand(&self.options.storage_name).await?;
        ctx.storage().put(name, token.payload().clone()).await;
        self.output = Some(token);
        Ok(())
    }

    fn has_output(&self) -> bool {
        self.output.is_some()
    }

    fn output(&mut self) -> Option<Token> {
        self.output.take()
    }
}

fn default_interval() -> Value {
    Value::from(1000)
}

#[derive(Debug, Clone, Deserialize)]
pub struct SleepOptions {
    /// 毫秒；可为 `@{...}` 字符串
    #[serde(default = "default_interval")]
    pub interval_ms: Value,
}

/// 等待后转发；停止请求会立即结束等待
pub struct SleepTransformer {
    options: SleepOptions,
    pending: Option<Token>,
    output: Option<Token>,
}

impl SleepTransformer {
    pub fn new(options: SleepOptions) -> Self {
        Self {
            options,
            pending: None,
            output: None,
        }
    }
}

#[async_trait]
impl Actor for SleepTransformer {
    fn kind(&self) -> ActorKind {
        ActorKind::Transformer
    }

    fn input(&mut self, token: Token) {
        self.pending = Some(token);
    }

    async fn execute(&mut self, ctx: &ExecutionContext<'_>) -> Result<(), FlowError> {
        let interval = ctx.integer("interval_ms", &self.options.interval_ms).await?;
        let interval = Duration::from_millis(interval.max(0) as u64);
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = ctx.cancelled() => {
                tracing::debug!(actor = %ctx.path(), "Sleep interrupted by stop request");
            }
        }
        self.output = self.pending.take();
        Ok(())
    }

    fn has_output(&self) -> bool {
        self.output.is_some()
    }

    fn output(&mut self) -> Option<Token> {
        self.output.take()
    }
}

fn default_fail_message() -> String {
    "Fail actor triggered".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct FailOptions {
    #[serde(default = "default_fail_message")]
    pub message: String,
}

/// 收到 token 即报错（用于构造失败路径）
pub struct FailTransformer {
    options: FailOptions,
    pending: Option<Token>,
}

impl FailTransformer {
    pub fn new(options: FailOptions) -> Self {
        Self {
            options,
            pending: None,
        }
    }
}

#[async_trait]
impl Actor for FailTransformer {
    fn kind(&self) -> ActorKind {
        ActorKind::Transformer
    }

    fn input(&mut self, token: Token) {
        self.pending = Some(token);
    }

    async fn execute(&mut self, ctx: &ExecutionContext<'_>) -> Result<(), FlowError> {
        let token = self.pending.take();
        let message = ctx.expand(&self.options.message).await?;
        match token {
            Some(token) => Err(ctx.error(format!("{} (token: {})", message, token.payload_text()))),
            None => Err(ctx.error(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::actor::ErrorHandling;
    use crate::flow::callable::CallableActors;
    use crate::flow::storage::Storage;
    use crate::flow::variables::Variables;
    use crate::flow::ActorPath;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    struct Fixture {
        variables: Variables,
        storage: Storage,
        callables: CallableActors,
        stop: CancellationToken,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                variables: Variables::new(),
                storage: Storage::new(),
                callables: CallableActors::new(),
                stop: CancellationToken::new(),
            }
        }

        fn ctx(&self) -> ExecutionContext<'_> {
            ExecutionContext::new(
                ActorPath::root("Flow").child("actor"),
                &self.variables,
                &self.storage,
                &self.callables,
                &self.stop,
                ErrorHandling::AlwaysStop,
            )
        }
    }

    fn token(payload: Value) -> Token {
        Token::new(payload, ActorPath::root("Flow").child("source"))
    }

    #[tokio::test]
    async fn test_set_storage_value_forwards() {
        let fx = Fixture::new();
        fx.variables.set("key", "dataset").await;
        let mut actor = SetStorageValue::new(SetStorageValueOptions {
            storage_name: "@{key}".into(),
        });
        actor.input(token(json!([1, 2])));
        actor.execute(&fx.ctx()).await.unwrap();
        assert_eq!(fx.storage.get("dataset").await, Some(json!([1, 2])));
        assert_eq!(actor.output().unwrap().into_payload(), json!([1, 2]));
        assert!(!actor.has_output());
    }

    #[tokio::test]
    async fn test_sleep_interrupted_by_stop() {
        let fx = Fixture::new();
        let mut actor = SleepTransformer::new(SleepOptions {
            interval_ms: json!(60_000),
        });
        actor.input(token(json!(1)));
        fx.stop.cancel();
        tokio::time::timeout(Duration::from_secs(5), actor.execute(&fx.ctx()))
            .await
            .expect("sleep should end on stop")
            .unwrap();
        assert!(actor.has_output());
    }

    #[tokio::test]
    async fn test_fail_reports_path() {
        let fx = Fixture::new();
        let mut actor = FailTransformer::new(FailOptions {
            message: "boom".into(),
        });
        actor.input(token(json!(3)));
        let err = actor.execute(&fx.ctx()).await.unwrap_err();
        assert_eq!(err.to_string(), "Flow.actor: boom (token: 3)");
        assert!(err.is_located());
    }

    #[tokio::test]
    async fn test_pass_through() {
        let fx = Fixture::new();
        let mut actor = PassThrough::default();
        assert!(!actor.has_output());
        actor.input(token(json!("x")));
        actor.execute(&fx.ctx()).await.unwrap();
        assert_eq!(actor.output().unwrap().payload_text(), "x");
    }
}
