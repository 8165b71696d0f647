//! 优雅关闭处理
//!
//! Ctrl+C / SIGTERM 触发关闭：取消关闭令牌，并请求所有运行中的流程停止，
//! 给各流程机会在 Actor 迭代边界处结束并完成 wrapUp / cleanUp。

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::EngineContext;

/// 关闭信号管理器
#[derive(Clone, Default)]
pub struct ShutdownManager {
    shutdown_token: CancellationToken,
}

/// 关闭原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C
    UserInitiated,
    /// SIGTERM
    Signal,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 触发关闭
    pub fn shutdown(&self, reason: ShutdownReason) {
        tracing::info!(?reason, "Shutdown requested");
        self.shutdown_token.cancel();
    }

    pub async fn wait_for_shutdown(&self) {
        self.shutdown_token.cancelled().await;
    }

    /// 安装系统信号处理器 (Ctrl+C, SIGTERM)
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                tracing::info!("Received Ctrl+C, stopping running flows...");
                manager.shutdown(ShutdownReason::UserInitiated);
            }
        });

        #[cfg(unix)]
        {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                    sigterm.recv().await;
                    tracing::info!("Received SIGTERM, stopping running flows...");
                    manager.shutdown(ShutdownReason::Signal);
                }
            });
        }
    }
}

/// 运行 app 直到结束；期间收到关闭信号时请求所有运行中的流程停止，并继续等待 app 自行结束
pub async fn run_until_shutdown<F>(
    shutdown_manager: Arc<ShutdownManager>,
    context: Arc<EngineContext>,
    app: F,
) -> F::Output
where
    F: Future,
{
    tokio::pin!(app);
    tokio::select! {
        output = &mut app => {
            return output;
        }
        _ = shutdown_manager.wait_for_shutdown() => {
            let stopped = context.stop_all().await;
            tracing::info!("Shutdown requested, stop sent to {} flows", stopped);
        }
    }
    app.await
}
