//! VBoxManage invocation.
//!
//! Everything that spawns a process lives behind the [`VBoxManage`] trait so the
//! manager can be driven by a scripted runner in tests.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{NatNetError, Result};

/// Capability to execute VBoxManage with an argument list.
#[async_trait]
pub trait VBoxManage: Send + Sync {
    /// Run VBoxManage, discarding its standard output.
    async fn run(&self, args: &[String]) -> Result<()>;

    /// Run VBoxManage and return its raw standard output.
    async fn output(&self, args: &[String]) -> Result<Vec<u8>>;
}

/// Runs the real VBoxManage executable.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: PathBuf,
}

impl CommandRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command_line(&self, args: &[String]) -> String {
        let mut line = self.program.display().to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    async fn execute(&self, args: &[String], capture: bool) -> Result<Output> {
        let command = self.command_line(args);
        debug!(command = %command, "Executing VBoxManage");

        let stdout = if capture {
            Stdio::piped()
        } else {
            Stdio::null()
        };

        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => {
                    NatNetError::ToolNotFound(self.program.display().to_string())
                }
                _ => NatNetError::Spawn {
                    command: command.clone(),
                    source: e,
                },
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(NatNetError::Subprocess {
                command,
                status: output.status,
                stderr,
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl VBoxManage for CommandRunner {
    async fn run(&self, args: &[String]) -> Result<()> {
        self.execute(args, false).await.map(|_| ())
    }

    async fn output(&self, args: &[String]) -> Result<Vec<u8>> {
        Ok(self.execute(args, true).await?.stdout)
    }
}
