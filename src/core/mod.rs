//! 核心层：错误类型、引擎上下文（ID 生成、Actor 注册表、运行中流程表）、优雅关闭

pub mod context;
pub mod error;
pub mod shutdown;

pub use context::{EngineContext, IdGenerator};
pub use error::{FlowError, RestartError};
pub use shutdown::{run_until_shutdown, ShutdownManager, ShutdownReason};
