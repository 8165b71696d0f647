//! 内置 Actor 目录
//!
//! - standalone：CallableActors、SetVariable（带 value）
//! - source：Start、ForLoop、StringConstants、StorageValue、CallableSource
//! - transformer：Trigger、SetVariable（不带 value）、SetStorageValue、Sleep、Fail、PassThrough、CallableTransformer
//! - sink：Null、Console、DumpFile、Stop、CallableSink

pub mod sinks;
pub mod sources;
pub mod standalone;
pub mod transformers;
pub mod trigger;

use crate::core::FlowError;
use crate::flow::actor::{Actor, ActorKind, ActorNode};
use crate::flow::callable::{CallableActorsContainer, CallableOptions, CallableRef};
use crate::flow::definition::ActorDef;
use crate::flow::registry::ActorRegistry;

pub use sinks::{ConsoleSink, DumpFileSink, NullSink, StopSink};
pub use sources::{ForLoopSource, StartSource, StorageValueSource, StringConstantsSource};
pub use standalone::SetVariable;
pub use transformers::{FailTransformer, PassThrough, SetStorageValue, SleepTransformer};
pub use trigger::Trigger;

fn boxed(actor: impl Actor + 'static) -> Box<dyn Actor> {
    Box::new(actor)
}

/// 注册全部内置 Actor
pub fn register_builtins(registry: &mut ActorRegistry) {
    registry.register("CallableActors", |def: &ActorDef, registry: &ActorRegistry| {
        let children = def
            .actors
            .iter()
            .map(|child| Ok((ActorNode::build(child, registry)?, child.clone())))
            .collect::<Result<Vec<_>, FlowError>>()?;
        Ok(boxed(CallableActorsContainer::new(children)))
    });
    registry.register("SetVariable", |def, _| Ok(boxed(SetVariable::from_def(def)?)));

    registry.register("Start", |_, _| Ok(boxed(StartSource::default())));
    registry.register("ForLoop", |def, _| Ok(boxed(ForLoopSource::new(def.options()?))));
    registry.register("StringConstants", |def, _| {
        Ok(boxed(StringConstantsSource::new(def.options()?)))
    });
    registry.register("StorageValue", |def, _| {
        Ok(boxed(StorageValueSource::new(def.options()?)))
    });

    registry.register("Trigger", |def, registry| {
        Ok(boxed(Trigger::new(ActorNode::build_all(&def.actors, registry)?)))
    });
    registry.register("SetStorageValue", |def, _| {
        Ok(boxed(SetStorageValue::new(def.options()?)))
    });
    registry.register("Sleep", |def, _| Ok(boxed(SleepTransformer::new(def.options()?))));
    registry.register("Fail", |def, _| Ok(boxed(FailTransformer::new(def.options()?))));
    registry.register("PassThrough", |_, _| Ok(boxed(PassThrough::default())));

    registry.register("Null", |_, _| Ok(boxed(NullSink)));
    registry.register("Console", |def, _| Ok(boxed(ConsoleSink::new(def.options()?))));
    registry.register("DumpFile", |def, _| Ok(boxed(DumpFileSink::new(def.options()?))));
    registry.register("Stop", |def, _| Ok(boxed(StopSink::new(def.options()?))));

    for (tag, kind) in [
        ("CallableSource", ActorKind::Source),
        ("CallableTransformer", ActorKind::Transformer),
        ("CallableSink", ActorKind::Sink),
    ] {
        registry.register(tag, move |def, _| {
            let options: CallableOptions = def.options()?;
            Ok(boxed(CallableRef::from_options(options, kind)))
        });
    }
}
