//! 流程错误类型与重启错误
//!
//! FlowError 覆盖 setUp / execute / 定义加载阶段；RestartError 是重启操作同步返回给 RestartManager 的错误。

use std::path::PathBuf;

use thiserror::Error;

use crate::flow::ActorPath;

/// 流程生命周期中可能出现的错误（变量、引用、结构校验、定义加载、Actor 执行）
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    #[error("cyclic placeholder reference in '{0}'")]
    CyclicReference(String),

    #[error("unknown storage value: {0}")]
    UnknownStorageValue(String),

    #[error("unknown callable: {0}")]
    UnknownCallable(String),

    #[error("duplicate callable name: {0}")]
    DuplicateCallable(String),

    #[error("unknown actor type: {0}")]
    UnknownActorType(String),

    #[error("loaded actor is not of type Flow")]
    NotAFlow,

    #[error("invalid flow structure at {path}: {reason}")]
    InvalidStructure { path: ActorPath, reason: String },

    #[error("invalid options for {path}: {reason}")]
    InvalidOptions { path: String, reason: String },

    /// Actor 执行失败；path 为出错 Actor 在树中的位置
    #[error("{path}: {message}")]
    Actor { path: ActorPath, message: String },

    #[error("flow '{0}' has not been set up")]
    NotSetUp(String),

    #[error("failed to read flow definition '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse flow definition '{}': {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// FlowRunner 对执行错误的包装
    #[error("Error executing flow '{flow}': {source}")]
    Run {
        flow: String,
        #[source]
        source: Box<FlowError>,
    },
}

impl FlowError {
    /// 是否已带有 Actor 位置信息（避免容器逐层重复包装）
    pub fn is_located(&self) -> bool {
        matches!(self, FlowError::Actor { .. } | FlowError::InvalidStructure { .. })
    }
}

/// 重启操作的同步错误：只报告新流程在启动前（setUp 阶段）的失败
#[derive(Error, Debug)]
pub enum RestartError {
    #[error("flow file does not exist: {0}")]
    FlowFileMissing(String),

    #[error(transparent)]
    Flow(#[from] FlowError),
}
