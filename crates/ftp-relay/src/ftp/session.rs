//! The FTP session collaborator.
//!
//! Strategies and the directory navigator only talk to a server through
//! this trait. [`FtpClient`](crate::ftp::FtpClient) is the TCP
//! implementation; tests substitute scripted sessions.
//!
//! Convention for every method returning `FtpResult<bool>`: `Ok(false)`
//! is a server-side refusal (negative reply), `Err(_)` is a fault on the
//! connection or the local side.

use crate::ftp::endpoint::EndpointDescriptor;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::types::{FtpEntry, TransferType};
use log::error;
use std::io::{Read, Write};
use std::net::SocketAddr;

pub trait FtpSession {
    /// Open the control connection; `Ok(true)` when the banner is a
    /// positive completion. `None` uses the default FTP port.
    fn connect(&mut self, host: &str, port: Option<u16>) -> FtpResult<bool>;

    fn login(&mut self, username: &str, password: &str) -> FtpResult<bool>;

    fn is_connected(&self) -> bool;

    /// Send `QUIT`.
    fn logout(&mut self) -> FtpResult<bool>;

    /// Drop the control connection.
    fn disconnect(&mut self) -> FtpResult<()>;

    fn set_file_type(&mut self, file_type: TransferType) -> FtpResult<bool>;

    /// Use PASV for subsequent data connections. No command is sent.
    fn enter_local_passive_mode(&mut self);

    /// Ask the server to listen for a peer server (`PASV`).
    fn enter_remote_passive_mode(&mut self) -> FtpResult<bool>;

    /// Address advertised by the last successful
    /// [`enter_remote_passive_mode`](Self::enter_remote_passive_mode).
    fn passive_address(&self) -> Option<SocketAddr>;

    /// Tell the server to connect to a peer server at `addr` (`PORT`).
    fn enter_remote_active_mode(&mut self, addr: SocketAddr) -> FtpResult<bool>;

    /// List `path`; an empty vector means the path does not exist.
    fn list_files(&mut self, path: &str) -> FtpResult<Vec<FtpEntry>>;

    /// Byte offset the next retrieve/store starts at (sent as `REST`).
    fn set_restart_offset(&mut self, offset: u64);

    fn change_working_directory(&mut self, path: &str) -> FtpResult<bool>;

    fn make_directory(&mut self, path: &str) -> FtpResult<bool>;

    /// Download `path` into `output`.
    fn retrieve_file(&mut self, path: &str, output: &mut dyn Write) -> FtpResult<bool>;

    /// Upload `input` as `name` in the working directory.
    fn store_file(&mut self, name: &str, input: &mut dyn Read) -> FtpResult<bool>;

    /// Start sending `path` to the peer server; `Ok(true)` on a 1xx reply.
    fn remote_retrieve(&mut self, path: &str) -> FtpResult<bool>;

    /// Start receiving `name` from the peer server; `Ok(true)` on a 1xx reply.
    fn remote_store(&mut self, name: &str) -> FtpResult<bool>;

    /// Wait for the final reply of a transfer started remotely.
    fn complete_pending_command(&mut self) -> FtpResult<bool>;

    fn delete_file(&mut self, path: &str) -> FtpResult<bool>;
}

// ─── Helpers shared by the transfer strategies ──────────────────────

/// Connect `session` to the endpoint's host, on its port when one is given.
pub(crate) fn connect_endpoint<S: FtpSession + ?Sized>(
    session: &mut S,
    endpoint: &EndpointDescriptor,
) -> FtpResult<bool> {
    let port = match endpoint.port_number() {
        Some(Ok(port)) => Some(port),
        Some(Err(_)) => {
            return Err(FtpError::invalid_config(format!(
                "Port {} of {} is out of range",
                endpoint.port().unwrap_or_default(),
                endpoint.host()
            )))
        }
        None => None,
    };
    if !session.connect(endpoint.host(), port)? {
        error!("FTP server {} refused connection.", endpoint.host());
        return Ok(false);
    }
    Ok(true)
}

/// Send `QUIT` if still connected; a fault is logged, not returned.
pub(crate) fn logout_quietly<S: FtpSession + ?Sized>(session: &mut S, label: &str) {
    if session.is_connected() {
        if let Err(e) = session.logout() {
            error!("{} logout failed: {}", label, e);
        }
    }
}

/// Drop the control connection if still connected; a fault is logged.
pub(crate) fn disconnect_quietly<S: FtpSession + ?Sized>(session: &mut S, label: &str) {
    if session.is_connected() {
        if let Err(e) = session.disconnect() {
            error!("{} disconnect failed: {}", label, e);
        }
    }
}
