//! vbox-natnet: VirtualBox NAT network management
//!
//! Wraps `VBoxManage` to list, create, modify and delete NAT networks.

pub mod config;
pub mod error;
pub mod natnet;
pub mod parse;
pub mod runner;

pub use error::{NatNetError, Result};
pub use natnet::{NatNet, NatNetManager};
pub use runner::{CommandRunner, VBoxManage};
