//! TCP transport: establishes the FTP control connection.
//!
//! Handles name resolution, the connect timeout, socket timeouts and the
//! server welcome banner.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::FtpCodec;
use crate::ftp::types::{FtpConnectionConfig, FtpResponse};
use std::net::{TcpStream, ToSocketAddrs};

/// Default control port (RFC 959).
pub const DEFAULT_PORT: u16 = 21;

/// Establish the control connection and return a ready-to-use codec
/// **plus** the server welcome banner.
///
/// The banner is returned as-is; whether it is a positive completion is
/// for the caller to judge.
pub fn connect(
    host: &str,
    port: u16,
    config: &FtpConnectionConfig,
) -> FtpResult<(FtpCodec, FtpResponse)> {
    let addr = format!("{}:{}", host, port);
    let sock_addr = addr
        .to_socket_addrs()
        .map_err(|e| FtpError::connection_failed(format!("Resolve {}: {}", addr, e)))?
        .next()
        .ok_or_else(|| FtpError::connection_failed(format!("No address for {}", addr)))?;

    let tcp = TcpStream::connect_timeout(&sock_addr, config.connect_timeout()).map_err(|e| {
        if e.kind() == std::io::ErrorKind::TimedOut {
            FtpError::timeout(format!("TCP connect to {} timed out", addr))
        } else {
            FtpError::connection_failed(format!("TCP connect to {}: {}", addr, e))
        }
    })?;

    tcp.set_nodelay(true).ok();
    tcp.set_read_timeout(Some(config.data_timeout()))?;
    tcp.set_write_timeout(Some(config.data_timeout()))?;

    let mut codec = FtpCodec::from_tcp(tcp)?;
    let banner = codec.read_response()?;
    Ok((codec, banner))
}
