//! Flowline - 基于 Actor 树的流程执行与重启引擎
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、引擎上下文（流程 ID、Actor 注册表、运行中流程表）、优雅关闭
//! - **flow**: Token / 变量 / 存储、Actor 抽象与内置 Actor、顺序执行器、Flow 生命周期
//! - **observability**: tracing 日志初始化
//! - **restart**: 重启操作（Null / ExternalCommand / FlowFile / RestartItself / Multi）与 RestartManager
//! - **runner**: 从文件或目录运行流程

pub mod config;
pub mod core;
pub mod flow;
pub mod observability;
pub mod restart;
pub mod runner;

pub use crate::core::{EngineContext, FlowError, RestartError};
pub use crate::flow::{ActorDef, Flow, FlowHandle, FlowState};
pub use crate::restart::{RestartManager, RestartOperation, RestartOperationConfig};
pub use crate::runner::FlowRunner;
