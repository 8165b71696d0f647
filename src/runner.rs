//! FlowRunner：setUp → execute → wrapUp → cleanUp
//!
//! 执行失败时把流程交给其 RestartManager，再返回带流程标识的原始错误。
//! 目录输入按文件名顺序运行匹配的流程文件，遇到第一个错误即停止。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::RunnerSection;
use crate::core::{EngineContext, FlowError};
use crate::flow::{Flow, FlowHandle, FlowState};
use crate::restart::RestartManager;

/// 流程文件扩展名
const FLOW_EXTENSIONS: &[&str] = &["json", "toml"];

pub struct FlowRunner {
    context: Arc<EngineContext>,
    options: RunnerSection,
    restart_manager: Option<Arc<RestartManager>>,
}

impl FlowRunner {
    pub fn new(context: Arc<EngineContext>, options: RunnerSection) -> Self {
        Self {
            context,
            options,
            restart_manager: None,
        }
    }

    /// 为未设置 RestartManager 的流程提供默认值
    pub fn with_restart_manager(mut self, manager: Arc<RestartManager>) -> Self {
        self.restart_manager = Some(manager);
        self
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.context
    }

    pub fn options(&self) -> &RunnerSection {
        &self.options
    }

    fn label(flow: &Flow) -> String {
        flow.source_file()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| flow.name().to_string())
    }

    async fn finish(&self, flow: &Flow) {
        flow.wrap_up().await;
        if self.options.clean_up {
            flow.clean_up().await;
        }
    }

    /// 运行一个已构造的流程
    pub async fn run_flow(&self, flow: &FlowHandle) -> Result<(), FlowError> {
        if flow.restart_manager().is_none() {
            flow.set_restart_manager(self.restart_manager.clone());
        }

        if let Err(e) = flow.set_up().await {
            self.finish(flow).await;
            return Err(e);
        }

        if self.options.no_execute {
            tracing::info!(flow_id = flow.id(), "Flow '{}' set up, execution skipped", flow.name());
            self.finish(flow).await;
            return Ok(());
        }

        match flow.execute().await {
            Ok(()) => {
                self.finish(flow).await;
                Ok(())
            }
            Err(e) => {
                if let Some(manager) = flow.restart_manager() {
                    // 错误已由 RestartManager 记录
                    let _ = manager.on_failure(flow).await;
                }
                // 重启操作可能已经停止或重新启动了该实例
                if flow.state() == FlowState::Failed {
                    self.finish(flow).await;
                }
                Err(FlowError::Run {
                    flow: Self::label(flow),
                    source: Box::new(e),
                })
            }
        }
    }

    /// 加载并运行一个流程文件
    pub async fn run_file(&self, path: &Path) -> Result<FlowHandle, FlowError> {
        let flow = Flow::load(path, Arc::clone(&self.context)).await?;
        self.run_flow(&flow).await?;
        Ok(flow)
    }

    /// 文件或目录
    pub async fn run_path(&self, path: &Path) -> Result<Vec<FlowHandle>, FlowError> {
        if !path.is_dir() {
            return Ok(vec![self.run_file(path).await?]);
        }
        let files = list_flow_files(path, &self.options.include)?;
        tracing::info!("Running {} flows from {}", files.len(), path.display());
        let mut flows = Vec::with_capacity(files.len());
        for file in files {
            flows.push(self.run_file(&file).await?);
        }
        Ok(flows)
    }

    /// 等待重启操作在后台启动的流程全部结束
    pub async fn wait_for_running(&self) {
        loop {
            let flows = self.context.running_flows().await;
            if flows.is_empty() {
                return;
            }
            for flow in flows {
                flow.wait_for(FlowState::is_terminal).await;
            }
            tokio::task::yield_now().await;
        }
    }
}

/// 目录下文件名匹配 include 且扩展名为 json / toml 的文件，按文件名排序
pub fn list_flow_files(dir: &Path, include: &str) -> Result<Vec<PathBuf>, FlowError> {
    let pattern = glob::Pattern::new(include).map_err(|e| FlowError::InvalidOptions {
        path: "runner.include".to_string(),
        reason: e.to_string(),
    })?;
    let entries = std::fs::read_dir(dir).map_err(|source| FlowError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| FLOW_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| pattern.matches(n))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}
