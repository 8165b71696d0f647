//! 汇 Actor：Null、Console、DumpFile、Stop

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use crate::core::FlowError;
use crate::flow::actor::{Actor, ActorKind, ExecutionContext};
use crate::flow::token::Token;

/// 丢弃 token
pub struct NullSink;

#[async_trait]
impl Actor for NullSink {
    fn kind(&self) -> ActorKind {
        ActorKind::Sink
    }

    async fn execute(&mut self, _ctx: &ExecutionContext<'_>) -> Result<(), FlowError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsoleOptions {
    #[serde(default)]
    pub prefix: String,
}

/// 以 info 级别输出载荷
pub struct ConsoleSink {
    options: ConsoleOptions,
    pending: Option<Token>,
}

impl ConsoleSink {
    pub fn new(options: ConsoleOptions) -> Self {
        Self {
            options,
            pending: None,
        }
    }
}

#[async_trait]
impl Actor for ConsoleSink {
    fn kind(&self) -> ActorKind {
        ActorKind::Sink
    }

    fn input(&mut self, token: Token) {
        self.pending = Some(token);
    }

    async fn execute(&mut self, ctx: &ExecutionContext<'_>) -> Result<(), FlowError> {
        if let Some(token) = self.pending.take() {
            let prefix = ctx.expand(&self.options.prefix).await?;
            tracing::info!(actor = %ctx.path(), "{}{}", prefix, token.payload_text());
        }
        Ok(())
    }
}

fn default_append() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct DumpFileOptions {
    /// 执行时展开
    pub output_file: String,
    /// false 时每次执行后第一次写入先清空文件
    #[serde(default = "default_append")]
    pub append: bool,
}

/// 每个 token 写一行
pub struct DumpFileSink {
    options: DumpFileOptions,
    pending: Option<Token>,
    truncated: bool,
}

impl DumpFileSink {
    pub fn new(options: DumpFileOptions) -> Self {
        Self {
            options,
            pending: None,
            truncated: false,
        }
    }
}

#[async_trait]
impl Actor for DumpFileSink {
    fn kind(&self) -> ActorKind {
        ActorKind::Sink
    }

    fn input(&mut self, token: Token) {
        self.pending = Some(token);
    }

    async fn execute(&mut self, ctx: &ExecutionContext<'_>) -> Result<(), FlowError> {
        let Some(token) = self.pending.take() else {
            return Ok(());
        };
        let path = ctx.expand(&self.options.output_file).await?;
        let truncate = !self.options.append && !self.truncated;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(!truncate)
            .truncate(truncate)
            .open(&path)
            .await
            .map_err(|e| ctx.error(format!("failed to open '{}': {}", path, e)))?;
        self.truncated = true;
        let line = format!("{}\n", token.payload_text());
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| ctx.error(format!("failed to write '{}': {}", path, e)))?;
        // tokio 的写入在后台线程完成，关闭前必须 flush
        file.flush()
            .await
            .map_err(|e| ctx.error(format!("failed to flush '{}': {}", path, e)))?;
        Ok(())
    }

    async fn wrap_up(&mut self) {
        self.truncated = false;
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StopOptions {
    #[serde(default)]
    pub message: Option<String>,
}

/// 收到 token 即请求停止整个流程
pub struct StopSink {
    options: StopOptions,
    pending: Option<Token>,
}

impl StopSink {
    pub fn new(options: StopOptions) -> Self {
        Self {
            options,
            pending: None,
        }
    }
}

#[async_trait]
impl Actor for StopSink {
    fn kind(&self) -> ActorKind {
        ActorKind::Sink
    }

    fn input(&mut self, token: Token) {
        self.pending = Some(token);
    }

    async fn execute(&mut self, ctx: &ExecutionContext<'_>) -> Result<(), FlowError> {
        if self.pending.take().is_none() {
            return Ok(());
        }
        let reason = match &self.options.message {
            Some(message) => ctx.expand(message).await?,
            None => "Stop actor".to_string(),
        };
        ctx.stop_flow(&reason);
        Ok(())
    }
}
