//! Server-to-server transfers.
//!
//! The destination is put in passive mode and its advertised address is
//! handed to the source with `PORT`, so the two servers exchange the data
//! directly. Only control traffic passes through this process.

use crate::ftp::client::FtpClient;
use crate::ftp::endpoint::EndpointDescriptor;
use crate::ftp::error::{EndpointError, FtpResult};
use crate::ftp::navigator::ensure_and_enter;
use crate::ftp::session::{connect_endpoint, disconnect_quietly, logout_quietly, FtpSession};
use crate::ftp::types::{FtpConnectionConfig, TransferConfig, TransferType};
use crate::ftp::workflow::{RetryState, TransferStage, TransferWorkflow};
use log::{error, info, warn};
use std::time::Duration;

/// Copy one file from a source FTP server to a destination FTP server.
pub struct RemoteTransfer<S: FtpSession = FtpClient> {
    source: S,
    destination: S,
    retry: RetryState,
}

impl RemoteTransfer<FtpClient> {
    pub fn new() -> Self {
        Self::with_sessions(FtpClient::new(), FtpClient::new())
    }

    /// Use separate connection settings per server, e.g. UTF-8 on one side only.
    pub fn with_client_configs(source: FtpConnectionConfig, destination: FtpConnectionConfig) -> Self {
        Self::with_sessions(FtpClient::with_config(source), FtpClient::with_config(destination))
    }
}

impl Default for RemoteTransfer<FtpClient> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: FtpSession> RemoteTransfer<S> {
    pub fn with_sessions(source: S, destination: S) -> Self {
        Self {
            source,
            destination,
            retry: RetryState::default(),
        }
    }

    /// Apply retry and resume settings. The used-retry counter is kept.
    pub fn apply_config(&mut self, config: &TransferConfig) {
        self.retry.max_attempts = config.retry_times;
        self.retry.backoff = Duration::from_secs(config.retry_wait_sec);
        self.retry.resume_broken = config.resume_broken;
    }

    pub fn retry_times(&self) -> u32 {
        self.retry.max_attempts
    }

    pub fn set_retry_times(&mut self, retry_times: u32) {
        self.retry.max_attempts = retry_times;
    }

    pub fn current_retry_times(&self) -> u32 {
        self.retry.attempts_used
    }

    pub fn retry_wait_secs(&self) -> u64 {
        self.retry.backoff.as_secs()
    }

    pub fn set_retry_wait_secs(&mut self, secs: u64) {
        self.retry.backoff = Duration::from_secs(secs);
    }

    pub fn is_resume_broken(&self) -> bool {
        self.retry.resume_broken
    }

    pub fn set_resume_broken(&mut self, resume_broken: bool) {
        self.retry.resume_broken = resume_broken;
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn destination(&self) -> &S {
        &self.destination
    }

    /// Copy `source_url` to `destination_url`. Only malformed URLs are
    /// errors; everything else ends in a logged `Ok(false)`.
    pub fn transfer(&mut self, source_url: &str, destination_url: &str) -> Result<bool, EndpointError> {
        let source_endpoint = EndpointDescriptor::parse(source_url)?;
        let destination_endpoint = EndpointDescriptor::parse(destination_url)?;
        info!(
            "Server-to-server {}:{} -> {}:{}",
            source_endpoint.host(),
            source_endpoint.full_path(),
            destination_endpoint.host(),
            destination_endpoint.full_path()
        );

        let mut stage = RemoteStage {
            source: &mut self.source,
            destination: &mut self.destination,
            source_endpoint,
            destination_endpoint,
        };
        Ok(TransferWorkflow::new(&mut stage, &mut self.retry).run())
    }
}

struct RemoteStage<'a, S: FtpSession> {
    source: &'a mut S,
    destination: &'a mut S,
    source_endpoint: EndpointDescriptor,
    destination_endpoint: EndpointDescriptor,
}

impl<S: FtpSession> TransferStage for RemoteStage<'_, S> {
    fn connect(&mut self) -> FtpResult<bool> {
        if !connect_endpoint(self.source, &self.source_endpoint)? {
            error!("Failed to connect to source server.");
            return Ok(false);
        }
        if !connect_endpoint(self.destination, &self.destination_endpoint)? {
            error!("Failed to connect to destination server.");
            return Ok(false);
        }
        Ok(true)
    }

    fn login(&mut self) -> FtpResult<bool> {
        let src = &self.source_endpoint;
        if !self.source.login(src.username(), src.password())? {
            error!("Cannot login to source server.");
            return Ok(false);
        }
        let dst = &self.destination_endpoint;
        if !self.destination.login(dst.username(), dst.password())? {
            error!("Cannot login to destination server.");
            return Ok(false);
        }
        Ok(true)
    }

    fn transfer(&mut self, resume_broken: bool) -> FtpResult<bool> {
        let src = &self.source_endpoint;
        let dst = &self.destination_endpoint;

        let source_files = self.source.list_files(src.full_path())?;
        let destination_files = self.destination.list_files(dst.full_path())?;

        let source_size = match source_files.first() {
            Some(entry) => entry.size,
            None => {
                error!("Source file {} does not exist.", src.full_path());
                return Ok(false);
            }
        };

        if let Some(existing) = destination_files.first() {
            if resume_broken {
                if source_size <= existing.size {
                    error!(
                        "Destination file is {} bytes, not smaller than the source {} bytes.",
                        existing.size, source_size
                    );
                    return Ok(false);
                }
                self.source.set_restart_offset(existing.size);
                self.destination.set_restart_offset(existing.size);
            } else if !self.destination.delete_file(dst.full_path())? {
                error!("Cannot delete destination file for a fresh transfer.");
                return Ok(false);
            }
        }

        if !ensure_and_enter(self.destination, dst.directory()) {
            error!("Change directory failed.");
            return Ok(false);
        }

        self.source.set_file_type(TransferType::Binary)?;
        self.destination.set_file_type(TransferType::Binary)?;

        if !self.destination.enter_remote_passive_mode()? {
            error!("Destination server refused passive mode.");
            return Ok(false);
        }
        let peer = match self.destination.passive_address() {
            Some(addr) => addr,
            None => {
                error!("Destination server advertised no passive address.");
                return Ok(false);
            }
        };
        if !self.source.enter_remote_active_mode(peer)? {
            error!("Source server refused to connect to {}.", peer);
            return Ok(false);
        }

        if self.source.remote_retrieve(src.full_path())? && self.destination.remote_store(dst.file_name())? {
            if !self.source.complete_pending_command()? {
                warn!("Source server did not confirm sending {}", src.full_path());
            }
            if !self.destination.complete_pending_command()? {
                warn!("Destination server did not confirm storing {}", dst.full_path());
            }
            Ok(true)
        } else {
            error!("Couldn't initiate transfer. Check that filenames are valid.");
            Ok(false)
        }
    }

    fn teardown(&mut self) {
        logout_quietly(self.source, "source");
        logout_quietly(self.destination, "destination");
        disconnect_quietly(self.source, "source");
        disconnect_quietly(self.destination, "destination");
    }
}
