//! flowline 命令行入口
//!
//! `flowline run <path>`：加载配置、初始化日志，运行流程文件（或目录中的全部流程文件）。
//! Ctrl+C / SIGTERM 会请求所有运行中的流程停止。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use flowline::config::load_config;
use flowline::core::{run_until_shutdown, EngineContext, ShutdownManager};
use flowline::flow::ActorRegistry;
use flowline::{FlowRunner, RestartManager};

#[derive(Parser)]
#[command(name = "flowline")]
#[command(about = "Actor-tree flow execution engine with restart support", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a flow file, or every flow file in a directory
    Run {
        /// Flow definition (.json / .toml) or directory
        path: PathBuf,

        /// Configuration file layered over config/default.toml
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Only set up the flow(s), do not execute
        #[arg(long)]
        no_execute: bool,

        /// Keep storage and variables after the run
        #[arg(long)]
        no_clean_up: bool,

        /// Glob for file names when running a directory
        #[arg(long)]
        include: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    flowline::observability::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            path,
            config,
            no_execute,
            no_clean_up,
            include,
        } => {
            let mut app_config = load_config(config).context("Failed to load configuration")?;
            if no_execute {
                app_config.runner.no_execute = true;
            }
            if no_clean_up {
                app_config.runner.clean_up = false;
            }
            if let Some(include) = include {
                app_config.runner.include = include;
            }

            let context =
                EngineContext::from_config(&app_config.engine, ActorRegistry::with_builtins());
            let manager = Arc::new(RestartManager::from_config(&app_config.restart.operation));
            tracing::info!("Restart operation: {}", manager.operation_name());
            let runner = FlowRunner::new(Arc::clone(&context), app_config.runner.clone())
                .with_restart_manager(manager);

            let shutdown = Arc::new(ShutdownManager::new());
            shutdown.install_signal_handlers();

            let result = run_until_shutdown(shutdown, context, async {
                let result = runner.run_path(&path).await;
                runner.wait_for_running().await;
                result
            })
            .await;

            let flows = result.with_context(|| format!("Failed to run {}", path.display()))?;
            tracing::info!("Completed {} flow(s)", flows.len());
        }
    }

    Ok(())
}
