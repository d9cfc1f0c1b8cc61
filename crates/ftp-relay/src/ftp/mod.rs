//! # ftp-relay: FTP transfer orchestration
//!
//! Drives whole-file transfers against FTP servers: connect, log in, move
//! the bytes, tear the sessions down, and retry with a fixed back-off.
//! Broken transfers are resumed by comparing source and destination sizes.
//!
//! Three topologies are supported:
//! - remote → local (download) and local → remote (upload) via [`LocalTransfer`]
//! - remote → remote (server-to-server, FXP-style) via [`RemoteTransfer`]
//!
//! Architecture:
//! - `types`: data structures, enums, config
//! - `error`: FTP fault type and endpoint URL error
//! - `protocol`: blocking command/response codec
//! - `connection`: control-connection establishment
//! - `transfer`: data channel setup (PASV / PORT)
//! - `parser`: Unix/Windows/MLSD LIST response parsing
//! - `session`: the `FtpSession` collaborator trait
//! - `client`: `FtpClient`, the TCP implementation of `FtpSession`
//! - `local_fs`: local file handle used by the local strategy
//! - `endpoint`: endpoint URL grammar and decomposition
//! - `navigator`: ensure-and-enter for remote directories
//! - `workflow`: the connect/login/transfer/teardown retry engine
//! - `local`: download / upload strategy
//! - `remote`: server-to-server strategy

pub mod types;
pub mod error;
pub mod protocol;
pub mod connection;
pub mod transfer;
pub mod parser;
pub mod session;
pub mod client;
pub mod local_fs;
pub mod endpoint;
pub mod navigator;
pub mod workflow;
pub mod local;
pub mod remote;

#[cfg(test)]
pub(crate) mod testing;

pub use types::*;
pub use error::{EndpointError, FtpError, FtpErrorKind, FtpResult};
pub use session::FtpSession;
pub use client::FtpClient;
pub use endpoint::EndpointDescriptor;
pub use navigator::ensure_and_enter;
pub use workflow::{RetryState, TransferStage, TransferWorkflow, WorkflowState};
pub use local::LocalTransfer;
pub use remote::RemoteTransfer;
