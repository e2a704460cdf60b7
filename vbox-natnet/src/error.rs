//! Error types for NAT network operations.

use std::io;
use std::process::ExitStatus;

use thiserror::Error;

/// Errors returned by the NAT network manager.
#[derive(Debug, Error)]
pub enum NatNetError {
    /// VBoxManage ran but exited unsuccessfully.
    #[error("{command} failed ({status}): {stderr}")]
    Subprocess {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    /// VBoxManage could not be started.
    #[error("Failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The VBoxManage executable does not exist.
    #[error("VBoxManage not found: {0}")]
    ToolNotFound(String),

    /// A CIDR reported by VBoxManage could not be parsed.
    #[error("Invalid CIDR '{value}': {source}")]
    Parse {
        value: String,
        #[source]
        source: ipnet::AddrParseError,
    },

    /// The captured output could not be read line by line.
    #[error("Failed to read VBoxManage output: {0}")]
    Scan(#[from] io::Error),
}

impl NatNetError {
    /// True for every failure of the external tool invocation itself.
    pub fn is_subprocess(&self) -> bool {
        matches!(
            self,
            NatNetError::Subprocess { .. } | NatNetError::Spawn { .. } | NatNetError::ToolNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, NatNetError>;
