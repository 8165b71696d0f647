//! 流程执行集成测试：文件加载、内置 Actor、callable、错误处理、停止、FlowRunner

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use flowline::config::RunnerSection;
use flowline::core::EngineContext;
use flowline::flow::{save_definition, ActorDef, ErrorHandling, Flow, FlowBuilder, FlowState};
use flowline::restart::NullOperation;
use flowline::{FlowRunner, RestartManager};
use serde_json::json;

async fn write_flow(dir: &Path, file: &str, builder: FlowBuilder) -> std::path::PathBuf {
    let path = dir.join(file);
    save_definition(&builder.definition(), &path).await.unwrap();
    path
}

fn keep_state() -> RunnerSection {
    RunnerSection {
        clean_up: false,
        ..RunnerSection::default()
    }
}

#[tokio::test]
async fn test_json_flow_with_trigger_and_dump_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_flow(
        dir.path(),
        "lines.json",
        FlowBuilder::new("lines")
            .actor(
                ActorDef::new("SetVariable")
                    .with_option("var_name", "out")
                    .with_option("value", "@{flow_dir}/out.txt"),
            )
            .actor(ActorDef::new("ForLoop").with_option("upper", 3))
            .actor(
                ActorDef::new("SetVariable")
                    .named("set_i")
                    .with_option("var_name", "i"),
            )
            .actor(
                ActorDef::new("Trigger")
                    .with_child(
                        ActorDef::new("StringConstants")
                            .with_option("strings", json!(["@{flow_filename_short} line @{i}"])),
                    )
                    .with_child(
                        ActorDef::new("DumpFile")
                            .with_option("output_file", "@{out}")
                            .with_option("append", false),
                    ),
            )
            .actor(ActorDef::new("Null")),
    )
    .await;

    let runner = FlowRunner::new(EngineContext::new(), RunnerSection::default());
    let flow = runner.run_file(&file).await.unwrap();

    assert_eq!(flow.state(), FlowState::CleanedUp);
    let content = std::fs::read_to_string(dir.path().join("out.txt")).unwrap();
    assert_eq!(
        content,
        "lines.json line 1\nlines.json line 2\nlines.json line 3\n"
    );
}

#[tokio::test]
async fn test_toml_flow_with_option_variables() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("greet.toml");
    std::fs::write(
        &file,
        r#"
type = "Flow"
name = "greet"

[variables]
greeting = "hello"

[[actors]]
type = "StringConstants"
strings = ["@{greeting} world", "@{greeting} again"]

[[actors]]
type = "DumpFile"
output_file = "@{flow_dir}/greet.txt"
"#,
    )
    .unwrap();

    let runner = FlowRunner::new(EngineContext::new(), keep_state());
    let flow = runner.run_file(&file).await.unwrap();

    assert_eq!(flow.name(), "greet");
    assert_eq!(flow.state(), FlowState::WrappedUp);
    assert_eq!(flow.variables().get("greeting").await.unwrap(), "hello");
    let content = std::fs::read_to_string(dir.path().join("greet.txt")).unwrap();
    assert_eq!(content, "hello world\nhello again\n");
}

#[tokio::test]
async fn test_storage_values_flow_between_actors() {
    let flow = FlowBuilder::new("storage")
        .actor(ActorDef::new("ForLoop").with_option("lower", 2).with_option("upper", 4))
        .actor(ActorDef::new("SetStorageValue").with_option("storage_name", "last"))
        .actor(ActorDef::new("Null"))
        .build(EngineContext::new())
        .unwrap();
    flow.set_up().await.unwrap();
    flow.execute().await.unwrap();

    assert_eq!(flow.state(), FlowState::Finished);
    assert_eq!(flow.storage().get("last").await, Some(json!(4)));
}

#[tokio::test]
async fn test_callable_sink_shared_and_copied() {
    for copy in [false, true] {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("callable.txt");
        let flow = FlowBuilder::new("callables")
            .actor(
                ActorDef::new("CallableActors").with_child(
                    ActorDef::new("DumpFile")
                        .named("dump")
                        .with_option("output_file", out.display().to_string()),
                ),
            )
            .actor(ActorDef::new("ForLoop").with_option("upper", 3))
            .actor(
                ActorDef::new("CallableSink")
                    .with_option("callable", "dump")
                    .with_option("copy", copy),
            )
            .build(EngineContext::new())
            .unwrap();
        flow.set_up().await.unwrap();
        flow.execute().await.unwrap();

        let content = std::fs::read_to_string(&out).unwrap();
        assert_eq!(content, "1\n2\n3\n", "copy = {}", copy);
    }
}

#[tokio::test]
async fn test_callable_reference_errors() {
    let wrong_kind = FlowBuilder::new("wrong_kind")
        .actor(
            ActorDef::new("CallableActors")
                .with_child(ActorDef::new("Null").named("sink")),
        )
        .actor(ActorDef::new("CallableSource").with_option("callable", "sink"))
        .build(EngineContext::new())
        .unwrap();
    let err = wrong_kind.set_up().await.unwrap_err();
    assert!(err.to_string().contains("is a sink"), "{}", err);
    assert_eq!(wrong_kind.state(), FlowState::Failed);
    assert!(wrong_kind.execute().await.is_err());

    let duplicate = FlowBuilder::new("duplicate")
        .actor(
            ActorDef::new("CallableActors")
                .with_child(ActorDef::new("Null").named("sink"))
                .with_child(ActorDef::new("Console").named("sink")),
        )
        .build(EngineContext::new())
        .unwrap();
    let err = duplicate.set_up().await.unwrap_err();
    assert!(err.to_string().contains("sink"), "{}", err);
}

#[tokio::test]
async fn test_invalid_structure_rejected_at_set_up() {
    let flow = FlowBuilder::new("backwards")
        .actor(ActorDef::new("Null"))
        .actor(ActorDef::new("Start"))
        .build(EngineContext::new())
        .unwrap();
    let err = flow.set_up().await.unwrap_err();
    assert!(err.to_string().starts_with("invalid flow structure"), "{}", err);

    let unknown = FlowBuilder::new("unknown")
        .actor(ActorDef::new("Teleport"))
        .build(EngineContext::new())
        .unwrap();
    assert_eq!(
        unknown.set_up().await.unwrap_err().to_string(),
        "unknown actor type: Teleport"
    );
    assert_eq!(unknown.state(), FlowState::Failed);
}

#[tokio::test]
async fn test_skipped_actor_passes_tokens_through() {
    let flow = FlowBuilder::new("skip")
        .actor(ActorDef::new("ForLoop").with_option("upper", 3))
        .actor(ActorDef::new("Fail").skipped(true))
        .actor(ActorDef::new("SetStorageValue").with_option("storage_name", "last"))
        .build(EngineContext::new())
        .unwrap();
    flow.set_up().await.unwrap();
    flow.execute().await.unwrap();

    assert_eq!(flow.state(), FlowState::Finished);
    assert_eq!(flow.storage().get("last").await, Some(json!(3)));
}

#[tokio::test]
async fn test_stop_actor_ends_flow_through_callable_source() {
    let flow = FlowBuilder::new("callable_stopper")
        .actor(
            ActorDef::new("CallableActors").with_child(
                ActorDef::new("ForLoop")
                    .named("numbers")
                    .with_option("upper", 3_000_000),
            ),
        )
        .actor(ActorDef::new("CallableSource").with_option("callable", "numbers"))
        .actor(ActorDef::new("SetStorageValue").with_option("storage_name", "last"))
        .actor(ActorDef::new("Stop"))
        .build(EngineContext::new())
        .unwrap();
    flow.set_up().await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), flow.execute())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(flow.state(), FlowState::Stopped);
    assert_eq!(flow.storage().get("last").await, Some(json!(1)));
}

#[tokio::test]
async fn test_stop_actor_ends_flow() {
    let flow = FlowBuilder::new("stopper")
        .actor(ActorDef::new("ForLoop").with_option("upper", 1000))
        .actor(ActorDef::new("SetStorageValue").with_option("storage_name", "last"))
        .actor(ActorDef::new("Stop").with_option("message", "enough"))
        .build(EngineContext::new())
        .unwrap();
    flow.set_up().await.unwrap();
    flow.execute().await.unwrap();

    assert_eq!(flow.state(), FlowState::Stopped);
    assert!(flow.is_stopped());
    assert_eq!(flow.storage().get("last").await, Some(json!(1)));
}

#[tokio::test]
async fn test_error_handling_always_stop_vs_actors_decide() {
    let build = |error_handling| {
        FlowBuilder::new("errors")
            .error_handling(error_handling)
            .actor(ActorDef::new("ForLoop").with_option("upper", 3))
            .actor(
                ActorDef::new("Trigger")
                    .with_child(ActorDef::new("Start"))
                    .with_child(
                        ActorDef::new("Fail")
                            .with_option("message", "boom")
                            .stop_flow_on_error(false),
                    ),
            )
            .actor(ActorDef::new("SetStorageValue").with_option("storage_name", "last"))
            .build(EngineContext::new())
            .unwrap()
    };

    let strict = build(ErrorHandling::AlwaysStop);
    strict.set_up().await.unwrap();
    let err = strict.execute().await.unwrap_err();
    assert!(err.to_string().contains("Trigger.Fail"), "{}", err);
    assert!(err.to_string().contains("boom"), "{}", err);
    assert_eq!(strict.state(), FlowState::Failed);
    assert!(!strict.storage().has("last").await);

    let lenient = build(ErrorHandling::ActorsDecide);
    lenient.set_up().await.unwrap();
    lenient.execute().await.unwrap();
    assert_eq!(lenient.state(), FlowState::Finished);
    assert_eq!(lenient.storage().get("last").await, Some(json!(3)));
}

#[tokio::test]
async fn test_external_stop_interrupts_sleep() {
    let context = EngineContext::new();
    let flow = FlowBuilder::new("sleepy")
        .actor(ActorDef::new("Start"))
        .actor(ActorDef::new("Sleep").with_option("interval_ms", 60_000))
        .actor(ActorDef::new("Null"))
        .build(Arc::clone(&context))
        .unwrap();
    flow.set_up().await.unwrap();

    let running = flow.clone();
    let handle = tokio::spawn(async move { running.execute().await });
    flow.wait_for(|s| s == FlowState::Running).await;
    assert_eq!(context.running_flows().await.len(), 1);

    assert_eq!(context.stop_all().await, 1);
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(flow.state(), FlowState::Stopped);
    assert!(context.running_flows().await.is_empty());
}

#[tokio::test]
async fn test_execute_requires_set_up() {
    let flow = FlowBuilder::new("lazy")
        .actor(ActorDef::new("Start"))
        .build(EngineContext::new())
        .unwrap();
    let err = flow.execute().await.unwrap_err();
    assert_eq!(err.to_string(), "flow 'lazy' has not been set up");
}

#[tokio::test]
async fn test_runner_wraps_error_and_hands_flow_to_restart_manager() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_flow(
        dir.path(),
        "broken.json",
        FlowBuilder::new("broken")
            .actor(ActorDef::new("Start"))
            .actor(ActorDef::new("Fail").with_option("message", "boom")),
    )
    .await;
    let context = EngineContext::new();
    let manager = Arc::new(RestartManager::new(Box::new(NullOperation)));
    let runner = FlowRunner::new(Arc::clone(&context), RunnerSection::default())
        .with_restart_manager(Arc::clone(&manager));

    let err = runner.run_file(&file).await.unwrap_err();

    let message = err.to_string();
    assert!(message.starts_with("Error executing flow '"), "{}", message);
    assert!(message.contains("broken.json"), "{}", message);
    assert!(message.ends_with("boom (token: null)"), "{}", message);
    assert_eq!(manager.attempts(), 1);
}

#[tokio::test]
async fn test_runner_no_execute_only_sets_up() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_flow(
        dir.path(),
        "dry.json",
        FlowBuilder::new("dry")
            .actor(ActorDef::new("Start"))
            .actor(ActorDef::new("DumpFile").with_option("output_file", "@{flow_dir}/dry.txt")),
    )
    .await;
    let options = RunnerSection {
        no_execute: true,
        ..RunnerSection::default()
    };
    let runner = FlowRunner::new(EngineContext::new(), options);

    let flow = runner.run_file(&file).await.unwrap();

    assert_eq!(flow.state(), FlowState::CleanedUp);
    assert!(!dir.path().join("dry.txt").exists());
}

#[tokio::test]
async fn test_runner_directory_stops_at_first_error() {
    let dir = tempfile::tempdir().unwrap();
    let marker = |name: &str| {
        FlowBuilder::new(name)
            .actor(ActorDef::new("StringConstants").with_option("strings", json!(["done"])))
            .actor(
                ActorDef::new("DumpFile")
                    .with_option("output_file", format!("@{{flow_dir}}/{}.done", name)),
            )
    };
    write_flow(dir.path(), "a.json", marker("a")).await;
    write_flow(
        dir.path(),
        "b.json",
        FlowBuilder::new("b")
            .actor(ActorDef::new("Start"))
            .actor(ActorDef::new("Fail")),
    )
    .await;
    write_flow(dir.path(), "c.json", marker("c")).await;

    let runner = FlowRunner::new(EngineContext::new(), RunnerSection::default());
    let err = runner.run_path(dir.path()).await.unwrap_err();

    assert!(err.to_string().contains("Fail actor triggered"), "{}", err);
    assert!(dir.path().join("a.done").exists());
    assert!(!dir.path().join("c.done").exists());
}

#[tokio::test]
async fn test_load_rejects_non_flow_root() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("trigger.json");
    std::fs::write(&file, r#"{ "type": "Trigger" }"#).unwrap();

    let err = Flow::load(&file, EngineContext::new()).await.unwrap_err();
    assert_eq!(err.to_string(), "loaded actor is not of type Flow");
}
