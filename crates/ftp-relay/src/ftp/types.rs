//! Shared types for the relay crate.

use crate::ftp::error::{FtpError, FtpResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ─── Transfer ────────────────────────────────────────────────────────

/// Direction of a local transfer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TransferDirection {
    /// Remote file → local file.
    #[default]
    Download,
    /// Local file → remote file.
    Upload,
}

/// Transfer type (RFC 959 TYPE command).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TransferType {
    Ascii,
    #[default]
    Binary,
}

impl TransferType {
    pub(crate) fn command(self) -> &'static str {
        match self {
            TransferType::Ascii => "TYPE A",
            TransferType::Binary => "TYPE I",
        }
    }
}

/// How the next data connection of a session is established.
///
/// The `Remote*` modes are used for server-to-server transfers, where the
/// data connection runs between two servers and never touches this process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum DataConnectionMode {
    /// Client listens, server connects (PORT).
    #[default]
    LocalActive,
    /// Server listens, client connects (PASV).
    LocalPassive,
    /// Server connects to a third-party address (PORT to a peer).
    RemoteActive,
    /// Server listens for a third party (PASV, address handed to the peer).
    RemotePassive,
}

impl DataConnectionMode {
    pub fn is_remote(self) -> bool {
        matches!(
            self,
            DataConnectionMode::RemoteActive | DataConnectionMode::RemotePassive
        )
    }
}

// ─── Configuration ───────────────────────────────────────────────────

/// Connection-level settings for an [`FtpClient`](crate::ftp::FtpClient).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtpConnectionConfig {
    /// Control connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_sec: u64,
    /// Data-channel and read timeout in seconds.
    #[serde(default = "default_data_timeout")]
    pub data_timeout_sec: u64,
    /// Send `OPTS UTF8 ON` after login.
    #[serde(default = "default_true")]
    pub utf8: bool,
    /// Local address to bind for active-mode data connections.
    #[serde(default)]
    pub active_bind_address: Option<String>,
}

fn default_connect_timeout() -> u64 {
    15
}
fn default_data_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

impl Default for FtpConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_sec: default_connect_timeout(),
            data_timeout_sec: default_data_timeout(),
            utf8: true,
            active_bind_address: None,
        }
    }
}

impl FtpConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_sec)
    }

    pub fn data_timeout(&self) -> Duration {
        Duration::from_secs(self.data_timeout_sec)
    }
}

/// Retry and resume policy shared by every transfer strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferConfig {
    /// Maximum number of retries after the first attempt (0 = no retry).
    #[serde(default)]
    pub retry_times: u32,
    /// Fixed wait between attempts, in seconds.
    #[serde(default = "default_retry_wait")]
    pub retry_wait_sec: u64,
    /// Resume a broken transfer from the size already on the destination.
    #[serde(default = "default_true")]
    pub resume_broken: bool,
}

fn default_retry_wait() -> u64 {
    1
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            retry_times: 0,
            retry_wait_sec: default_retry_wait(),
            resume_broken: true,
        }
    }
}

impl TransferConfig {
    /// Parse a JSON document such as `{"retryTimes": 3, "resumeBroken": false}`.
    pub fn from_json(text: &str) -> FtpResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| FtpError::invalid_config(format!("Invalid transfer config: {}", e)))
    }
}

// ─── FTP Response ────────────────────────────────────────────────────

/// A single FTP response (may be multi-line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpResponse {
    pub code: u16,
    pub lines: Vec<String>,
}

impl FtpResponse {
    /// Full response text (all lines joined).
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Positive preliminary reply (1xx).
    pub fn is_preliminary(&self) -> bool {
        (100..200).contains(&self.code)
    }

    /// Positive completion reply (2xx).
    pub fn is_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Positive intermediate reply (3xx).
    pub fn is_intermediate(&self) -> bool {
        (300..400).contains(&self.code)
    }
}

// ─── Directory Listing ───────────────────────────────────────────────

/// Type of a remote filesystem entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FtpEntryKind {
    File,
    Directory,
    Symlink,
    Unknown,
}

/// One entry from a LIST response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FtpEntry {
    pub name: String,
    pub kind: FtpEntryKind,
    pub size: u64,
    pub permissions: Option<String>,
    pub link_target: Option<String>,
    /// Raw line from the server.
    pub raw: Option<String>,
}
