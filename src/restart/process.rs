//! 外部进程执行：sh -c / cmd /C，带超时

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

/// 进程结束状态与输出
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// 被信号终止时为 None
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// 执行命令行；Err 表示无法启动或超时，非零退出码仍是 Ok
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: &str) -> Result<ProcessOutcome, String>;
}

/// 通过系统 shell 执行
#[derive(Debug, Clone)]
pub struct ShellProcessRunner {
    timeout_secs: u64,
}

impl ShellProcessRunner {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }
}

impl Default for ShellProcessRunner {
    fn default() -> Self {
        Self::new(60)
    }
}

#[async_trait]
impl ProcessRunner for ShellProcessRunner {
    async fn run(&self, command: &str) -> Result<ProcessOutcome, String> {
        let command = command.trim();
        if command.is_empty() {
            return Err("Empty command".to_string());
        }

        tracing::info!(command = %command, "Running external command");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), cmd.output())
            .await
            .map_err(|_| format!("Command timed out after {}s", self.timeout_secs))?
            .map_err(|e| format!("Execution failed: {}", e))?;

        Ok(ProcessOutcome {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
