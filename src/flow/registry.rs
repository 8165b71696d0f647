//! Actor 注册表
//!
//! 类型标签 -> 工厂函数。工厂从 ActorDef 的 options 反序列化自己的选项结构，
//! 容器类 Actor 通过传入的注册表构造子节点。默认注册表包含全部内置 Actor。

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::FlowError;
use crate::flow::actor::Actor;
use crate::flow::actors;
use crate::flow::definition::ActorDef;

/// Actor 工厂
pub type ActorFactory =
    Arc<dyn Fn(&ActorDef, &ActorRegistry) -> Result<Box<dyn Actor>, FlowError> + Send + Sync>;

/// 类型标签 -> 工厂，支持 register / create / type_names
#[derive(Default, Clone)]
pub struct ActorRegistry {
    factories: HashMap<String, ActorFactory>,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 含全部内置 Actor
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        actors::register_builtins(&mut registry);
        registry
    }

    /// 注册（同名覆盖）
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&ActorDef, &ActorRegistry) -> Result<Box<dyn Actor>, FlowError> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn create(&self, def: &ActorDef) -> Result<Box<dyn Actor>, FlowError> {
        let factory = self
            .factories
            .get(&def.kind)
            .ok_or_else(|| FlowError::UnknownActorType(def.kind.clone()))?;
        factory(def, self)
    }

    /// 已注册类型，按名称排序
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ActorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}
