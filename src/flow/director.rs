//! 顺序执行器：Flow 与 Trigger 共用
//!
//! 先按顺序执行开头的独立 Actor，再运行链：源产生的每个 token 深度优先地
//! 经过变换直到汇；每次调用 Actor 与每个输出 token 之前都检查停止请求。

use std::collections::HashSet;

use futures_util::future::BoxFuture;

use crate::core::FlowError;
use crate::flow::actor::{ActorKind, ActorNode, ErrorHandling, ExecutionContext, SetUpContext};
use crate::flow::token::Token;
use crate::flow::ActorPath;

/// 校验子节点结构：名称唯一；链为 `Source, Transformer*, Sink?`；独立 Actor 只能在链之前
pub fn validate(path: &ActorPath, children: &[ActorNode]) -> Result<(), FlowError> {
    let invalid = |reason: String| FlowError::InvalidStructure {
        path: path.clone(),
        reason,
    };

    let mut names = HashSet::new();
    for child in children {
        if !names.insert(child.name()) {
            return Err(invalid(format!("duplicate actor name '{}'", child.name())));
        }
    }

    let mut chain_started = false;
    let mut previous: Option<&ActorNode> = None;
    for child in children.iter().filter(|c| !c.is_skipped()) {
        let kind = child.kind();
        match kind {
            ActorKind::Standalone => {
                if chain_started {
                    return Err(invalid(format!(
                        "standalone '{}' must precede the first source",
                        child.name()
                    )));
                }
            }
            ActorKind::Source => {
                if chain_started {
                    return Err(invalid(format!(
                        "source '{}' must start the chain",
                        child.name()
                    )));
                }
                chain_started = true;
            }
            ActorKind::Transformer | ActorKind::Sink => {
                if !chain_started {
                    return Err(invalid(format!(
                        "{} '{}' has no source before it",
                        kind,
                        child.name()
                    )));
                }
                if let Some(prev) = previous {
                    if prev.kind() == ActorKind::Sink {
                        return Err(invalid(format!(
                            "sink '{}' must be the last actor",
                            prev.name()
                        )));
                    }
                }
            }
        }
        previous = Some(child);
    }
    Ok(())
}

/// 按顺序 setUp 子节点
pub async fn set_up_children(
    children: &mut [ActorNode],
    ctx: &mut SetUpContext<'_>,
) -> Result<(), FlowError> {
    for child in children.iter_mut() {
        let name = child.name().to_string();
        let mut child_ctx = ctx.for_child(&name);
        if let Err(e) = child.set_up(&mut child_ctx).await {
            tracing::error!(actor = %child_ctx.path(), "Set up failed: {}", e);
            return Err(e);
        }
    }
    Ok(())
}

pub async fn wrap_up_children(children: &mut [ActorNode]) {
    for child in children.iter_mut() {
        child.wrap_up().await;
    }
}

pub async fn clean_up_children(children: &mut [ActorNode]) {
    for child in children.iter_mut() {
        child.clean_up().await;
    }
}

/// 执行子节点；ctx 为容器自身的上下文
pub async fn execute_children(
    children: &mut [ActorNode],
    ctx: &ExecutionContext<'_>,
) -> Result<(), FlowError> {
    let split = children
        .iter()
        .position(|c| !c.is_skipped() && c.kind() != ActorKind::Standalone)
        .unwrap_or(children.len());
    let (standalones, chain) = children.split_at_mut(split);

    for node in standalones.iter_mut() {
        if ctx.is_stopped() {
            return Ok(());
        }
        if node.is_skipped() {
            continue;
        }
        let node_ctx = ctx.with_path(node.path().clone());
        if let Err(e) = node.actor_mut().execute(&node_ctx).await {
            handle_error(node, e, ctx.error_handling())?;
        }
    }

    run_chain(chain, None, ctx).await
}

/// 出错处理：补全位置信息；ActorsDecide 且 stop_flow_on_error 为 false 时吞掉错误
fn handle_error(
    node: &ActorNode,
    error: FlowError,
    error_handling: ErrorHandling,
) -> Result<(), FlowError> {
    let error = if error.is_located() {
        error
    } else {
        FlowError::Actor {
            path: node.path().clone(),
            message: error.to_string(),
        }
    };
    tracing::error!(actor = %node.path(), "Actor failed: {}", error);
    if error_handling == ErrorHandling::ActorsDecide && !node.stop_flow_on_error() {
        tracing::warn!(actor = %node.path(), "Continuing after error (stop_flow_on_error = false)");
        return Ok(());
    }
    Err(error)
}

fn run_chain<'a, 'b: 'a>(
    chain: &'a mut [ActorNode],
    token: Option<Token>,
    ctx: &'a ExecutionContext<'b>,
) -> BoxFuture<'a, Result<(), FlowError>> {
    Box::pin(async move {
        let Some((node, rest)) = chain.split_first_mut() else {
            return Ok(());
        };
        if ctx.is_stopped() {
            return Ok(());
        }
        if node.is_skipped() {
            return run_chain(rest, token, ctx).await;
        }
        if token.is_none() && node.kind().accepts_input() {
            return Ok(());
        }

        let node_ctx = ctx.with_path(node.path().clone());
        if let Some(token) = token {
            tracing::debug!(actor = %node.path(), "Input from {}", token.produced_by());
            node.actor_mut().input(token);
        }
        if let Err(e) = node.actor_mut().execute(&node_ctx).await {
            return handle_error(node, e, ctx.error_handling());
        }

        while node.actor_mut().has_output() {
            if ctx.is_stopped() {
                break;
            }
            let Some(output) = node.actor_mut().output() else {
                break;
            };
            if rest.is_empty() {
                continue;
            }
            run_chain(rest, Some(output), ctx).await?;
        }
        Ok(())
    })
}
