//! 流程执行模型
//!
//! Token / ActorPath / Variables / Storage 构成数据模型；Actor 树由 ActorRegistry 按定义构造，
//! director 负责顺序执行，Flow 是拥有整棵树的根容器。

pub mod actor;
pub mod actors;
pub mod builder;
pub mod callable;
pub mod definition;
pub mod director;
pub mod instance;
pub mod path;
pub mod registry;
pub mod storage;
pub mod token;
pub mod variables;

pub use actor::{Actor, ActorKind, ActorNode, ErrorHandling, ExecutionContext, SetUpContext};
pub use builder::FlowBuilder;
pub use callable::{CallableActors, CallableEntry};
pub use definition::{load_definition, save_definition, ActorDef};
pub use instance::{
    Flow, FlowHandle, FlowListener, FlowState, LifecycleEvent, RetainedState, VAR_FLOW_DIR,
    VAR_FLOW_FILENAME_LONG, VAR_FLOW_FILENAME_SHORT, VAR_FLOW_ID,
};
pub use path::ActorPath;
pub use registry::{ActorFactory, ActorRegistry};
pub use storage::Storage;
pub use token::Token;
pub use variables::Variables;
