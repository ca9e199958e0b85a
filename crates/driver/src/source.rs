use async_trait::async_trait;
use serde_json::Value;

use crate::error::{DriverError, Result};
use crate::message::AgentMessage;

/// Abstraction over where the agent's message stream comes from: a real
/// subprocess, or a scripted sequence for tests. The ask-user rendezvous,
/// budget enforcement, and logging in [`crate::driver::run`] are written
/// once against this trait and shared by both.
#[async_trait]
pub trait MessageSource: Send {
    /// Read the next message, or `None` once the stream has ended.
    async fn next_message(&mut self) -> Result<Option<AgentMessage>>;

    /// Inject a tool result back into the conversation (used to resume
    /// the agent after an ask-user rendezvous completes).
    async fn send_tool_result(&mut self, tool_use_id: &str, payload: Value) -> Result<()>;

    /// Terminate the underlying process or stream early.
    async fn interrupt(&mut self);
}

/// Drives a real agent subprocess over newline-delimited JSON on stdio.
pub struct SubprocessSource {
    child: tokio::process::Child,
    stdin: tokio::process::ChildStdin,
    stdout: tokio::io::Lines<tokio::io::BufReader<tokio::process::ChildStdout>>,
}

impl SubprocessSource {
    /// Spawn `command` with `args` in `cwd`, write `prompt` to its stdin,
    /// and prepare to read its newline-delimited JSON message stream.
    pub async fn spawn(
        command: &str,
        args: &[String],
        cwd: &std::path::Path,
        prompt: &str,
    ) -> Result<Self> {
        use tokio::io::AsyncWriteExt;

        let mut cmd = tokio::process::Command::new(command);
        cmd.args(args)
            .current_dir(cwd)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let mut child = cmd.spawn().map_err(DriverError::Spawn)?;

        let mut stdin = child.stdin.take().ok_or(DriverError::MissingStdin)?;
        stdin
            .write_all(prompt.as_bytes())
            .await
            .map_err(DriverError::Stdin)?;
        stdin.write_all(b"\n").await.map_err(DriverError::Stdin)?;

        let stdout = child.stdout.take().ok_or(DriverError::MissingStdout)?;
        let stdout = tokio::io::BufReader::new(stdout);

        use tokio::io::AsyncBufReadExt;
        let stdout = stdout.lines();

        Ok(Self {
            child,
            stdin,
            stdout,
        })
    }
}

#[async_trait]
impl MessageSource for SubprocessSource {
    async fn next_message(&mut self) -> Result<Option<AgentMessage>> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await
                .map_err(DriverError::Stdout)?;
            let Some(line) = line else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            let message: AgentMessage =
                serde_json::from_str(&line).map_err(DriverError::MalformedMessage)?;
            return Ok(Some(message));
        }
    }

    async fn send_tool_result(&mut self, tool_use_id: &str, payload: Value) -> Result<()> {
        use tokio::io::AsyncWriteExt;
        let message = AgentMessage::User {
            content: vec![crate::message::ContentBlock::ToolResult {
                tool_use_id: tool_use_id.to_string(),
                content: payload,
            }],
        };
        let line = serde_json::to_string(&message).map_err(DriverError::MalformedMessage)?;
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(DriverError::Stdin)?;
        self.stdin.write_all(b"\n").await.map_err(DriverError::Stdin)?;
        Ok(())
    }

    async fn interrupt(&mut self) {
        let _ = self.child.start_kill();
    }
}
