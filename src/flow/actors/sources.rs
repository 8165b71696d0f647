//! 源 Actor：Start、ForLoop、StringConstants、StorageValue

use std::collections::VecDeque;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::core::FlowError;
use crate::flow::actor::{Actor, ActorKind, ExecutionContext};
use crate::flow::token::Token;
use crate::flow::ActorPath;

/// 输出一个空载荷 token
#[derive(Default)]
pub struct StartSource {
    output: Option<Token>,
}

#[async_trait]
impl Actor for StartSource {
    fn kind(&self) -> ActorKind {
        ActorKind::Source
    }

    async fn execute(&mut self, ctx: &ExecutionContext<'_>) -> Result<(), FlowError> {
        self.output = Some(Token::new(Value::Null, ctx.path().clone()));
        Ok(())
    }

    fn has_output(&self) -> bool {
        self.output.is_some()
    }

    fn output(&mut self) -> Option<Token> {
        self.output.take()
    }
}

fn default_lower() -> Value {
    Value::from(1)
}

fn default_upper() -> Value {
    Value::from(10)
}

fn default_step() -> Value {
    Value::from(1)
}

/// 数值可写成整数，也可写成含 `@{...}` 的字符串（执行时读取）
#[derive(Debug, Clone, Deserialize)]
pub struct ForLoopOptions {
    #[serde(default = "default_lower")]
    pub lower: Value,
    #[serde(default = "default_upper")]
    pub upper: Value,
    #[serde(default = "default_step")]
    pub step: Value,
}

/// 按 lower..=upper（step 可为负）逐个输出整数
pub struct ForLoopSource {
    options: ForLoopOptions,
    next: Option<i64>,
    upper: i64,
    step: i64,
    path: ActorPath,
}

impl ForLoopSource {
    pub fn new(options: ForLoopOptions) -> Self {
        Self {
            options,
            next: None,
            upper: 0,
            step: 1,
            path: ActorPath::default(),
        }
    }

    fn in_range(&self, value: i64) -> bool {
        if self.step > 0 {
            value <= self.upper
        } else {
            value >= self.upper
        }
    }
}

#[async_trait]
impl Actor for ForLoopSource {
    fn kind(&self) -> ActorKind {
        ActorKind::Source
    }

    async fn execute(&mut self, ctx: &ExecutionContext<'_>) -> Result<(), FlowError> {
        let lower = ctx.integer("lower", &self.options.lower).await?;
        let upper = ctx.integer("upper", &self.options.upper).await?;
        let step = ctx.integer("step", &self.options.step).await?;
        if step == 0 {
            return Err(ctx.error("step must not be 0"));
        }
        self.upper = upper;
        self.step = step;
        self.path = ctx.path().clone();
        self.next = Some(lower).filter(|v| self.in_range(*v));
        Ok(())
    }

    fn has_output(&self) -> bool {
        self.next.is_some()
    }

    fn output(&mut self) -> Option<Token> {
        let current = self.next?;
        self.next = current
            .checked_add(self.step)
            .filter(|v| self.in_range(*v));
        Some(Token::new(current, self.path.clone()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StringConstantsOptions {
    #[serde(default)]
    pub strings: Vec<String>,
}

/// 逐个输出（展开后的）字符串
pub struct StringConstantsSource {
    options: StringConstantsOptions,
    queue: VecDeque<Token>,
}

impl StringConstantsSource {
    pub fn new(options: StringConstantsOptions) -> Self {
        Self {
            options,
            queue: VecDeque::new(),
        }
    }
}

#[async_trait]
impl Actor for StringConstantsSource {
    fn kind(&self) -> ActorKind {
        ActorKind::Source
    }

    async fn execute(&mut self, ctx: &ExecutionContext<'_>) -> Result<(), FlowError> {
        self.queue.clear();
        for s in &self.options.strings {
            let value = ctx.expand(s).await?;
            self.queue.push_back(Token::new(value, ctx.path().clone()));
        }
        Ok(())
    }

    fn has_output(&self) -> bool {
        !self.queue.is_empty()
    }

    fn output(&mut self) -> Option<Token> {
        self.queue.pop_front()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageValueOptions {
    pub storage_name: String,
}

/// 输出存储中的值；不存在时报错
pub struct StorageValueSource {
    options: StorageValueOptions,
    output: Option<Token>,
}

impl StorageValueSource {
    pub fn new(options: StorageValueOptions) -> Self {
        Self {
            options,
            output: None,
        }
    }
}

#[async_trait]
impl Actor for StorageValueSource {
    fn kind(&self) -> ActorKind {
        ActorKind::Source
    }

    async fn execute(&mut self, ctx: &ExecutionContext<'_>) -> Result<(), FlowError> {
        let name = ctx.expand(&self.options.storage_name).await?;
        let value = ctx
            .storage()
            .get(&name)
            .await
            .ok_or(FlowError::UnknownStorageValue(name))?;
        self.output = Some(Token::new(value, ctx.path().clone()));
        Ok(())
    }

    fn has_output(&self) -> bool {
        self.output.is_some()
    }

    fn output(&mut self) -> Option<Token> {
        self.output.take()
    }
}
