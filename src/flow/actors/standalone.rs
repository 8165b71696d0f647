//! SetVariable：带 value 时为独立 Actor（设置展开后的值），否则为变换（token 载荷写入变量并转发）

use async_trait::async_trait;
use serde::Deserialize;

use crate::core::FlowError;
use crate::flow::actor::{Actor, ActorKind, ExecutionContext};
use crate::flow::definition::ActorDef;
use crate::flow::token::Token;
use crate::flow::variables::Variables;

#[derive(Debug, Clone, Deserialize)]
pub struct SetVariableOptions {
    pub var_name: String,
    /// 在执行时展开，可引用其它变量
    #[serde(default)]
    pub value: Option<String>,
}

pub struct SetVariable {
    options: SetVariableOptions,
    pending: Option<Token>,
    output: Option<Token>,
}

impl SetVariable {
    pub fn new(options: SetVariableOptions) -> Self {
        Self {
            options,
            pending: None,
            output: None,
        }
    }

    pub fn from_def(def: &ActorDef) -> Result<Self, FlowError> {
        let options: SetVariableOptions = def.options()?;
        if !Variables::is_valid_name(&options.var_name) {
            return Err(FlowError::InvalidOptions {
                path: def.name().to_string(),
                reason: format!("invalid variable name '{}'", options.var_name),
            });
        }
        Ok(Self::new(options))
    }
}

#[async_trait]
impl Actor for SetVariable {
    fn kind(&self) -> ActorKind {
        if self.options.value.is_some() {
            ActorKind::Standalone
        } else {
            ActorKind::Transformer
        }
    }

    fn input(&mut self, token: Token) {
        self.pending = Some(token);
    }

    async fn execute(&mut self, ctx: &ExecutionContext<'_>) -> Result<(), FlowError> {
        let value = match (&self.options.value, self.pending.take()) {
            (Some(value), _) => ctx.expand(value).await?,
            (None, Some(token)) => {
                let text = token.payload_text();
                self.output = Some(token);
                text
            }
            (None, None) => return Ok(()),
        };
        tracing::debug!(actor = %ctx.path(), "{} = {}", self.options.var_name, value);
        ctx.variables().set(self.options.var_name.clone(), value).await;
        Ok(())
    }

    fn has_output(&self) -> bool {
        self.output.is_some()
    }

    fn output(&mut self) -> Option<Token> {
        self.output.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_depends_on_value() {
        let standalone = SetVariable::from_def(
            &ActorDef::new("SetVariable")
                .with_option("var_name", "x")
                .with_option("value", "1"),
        )
        .unwrap();
        assert_eq!(standalone.kind(), ActorKind::Standalone);

        let transformer =
            SetVariable::from_def(&ActorDef::new("SetVariable").with_option("var_name", "x"))
                .unwrap();
        assert_eq!(transformer.kind(), ActorKind::Transformer);
    }

    #[test]
    fn test_rejects_invalid_name() {
        let err = SetVariable::from_def(
            &ActorDef::new("SetVariable").with_option("var_name", "bad name"),
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("invalid variable name"));
    }
}
