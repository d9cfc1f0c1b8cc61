//! Data-channel management for FTP transfers.
//!
//! - **PASV**: server opens a port, client connects
//! - **PORT**: client opens a port, tells server, accepts after the
//!   transfer command has been issued
//!
//! The same `h1,h2,h3,h4,p1,p2` encoding is used to hand a passive
//! server's address to its peer in a server-to-server transfer.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::FtpCodec;
use crate::ftp::types::{DataConnectionMode, FtpConnectionConfig};
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

lazy_static! {
    static ref PASV_ADDR: Regex =
        Regex::new(r"\((\d+),(\d+),(\d+),(\d+),(\d+),(\d+)\)").expect("static PASV regex");
}

const ACCEPT_POLL: Duration = Duration::from_millis(20);

/// A data channel that is either connected (PASV) or still waiting for
/// the server to connect (PORT).
pub enum DataChannel {
    Connected(TcpStream),
    Listening(TcpListener),
}

impl DataChannel {
    /// Obtain the connected stream, accepting the server's connection
    /// first when in active mode.
    pub fn into_stream(self, timeout: Duration) -> FtpResult<TcpStream> {
        let stream = match self {
            DataChannel::Connected(tcp) => tcp,
            DataChannel::Listening(listener) => accept_with_timeout(&listener, timeout)?,
        };
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        Ok(stream)
    }
}

/// Open a data channel for the given mode.
///
/// `Ok(None)` means the server refused the channel (or the mode does not
/// carry data through this process); the caller reports the operation as
/// failed without raising a fault.
pub fn open_data_channel(
    codec: &mut FtpCodec,
    mode: DataConnectionMode,
    config: &FtpConnectionConfig,
) -> FtpResult<Option<DataChannel>> {
    match mode {
        DataConnectionMode::LocalPassive => open_pasv(codec, config.data_timeout()),
        DataConnectionMode::LocalActive => {
            open_port(codec, config.active_bind_address.as_deref())
        }
        DataConnectionMode::RemoteActive | DataConnectionMode::RemotePassive => {
            warn!("No local data channel in {:?} mode", mode);
            Ok(None)
        }
    }
}

// ─── PASV ────────────────────────────────────────────────────────────

/// Issue `PASV` and return the advertised address, or `None` if refused.
pub fn request_passive_address(codec: &mut FtpCodec) -> FtpResult<Option<SocketAddr>> {
    let resp = codec.execute("PASV")?;
    if resp.code != 227 {
        return Ok(None);
    }
    parse_pasv_response(&resp.text()).map(Some)
}

fn open_pasv(codec: &mut FtpCodec, data_timeout: Duration) -> FtpResult<Option<DataChannel>> {
    let addr = match request_passive_address(codec)? {
        Some(addr) => addr,
        None => return Ok(None),
    };
    let tcp = TcpStream::connect_timeout(&addr, data_timeout)
        .map_err(|e| FtpError::data_channel(format!("PASV data connect to {}: {}", addr, e)))?;
    Ok(Some(DataChannel::Connected(tcp)))
}

/// Parse `(h1,h2,h3,h4,p1,p2)` from a 227 response.
pub fn parse_pasv_response(text: &str) -> FtpResult<SocketAddr> {
    let caps = PASV_ADDR
        .captures(text)
        .ok_or_else(|| FtpError::protocol_error(format!("Cannot parse PASV: {}", text)))?;

    let nums: Vec<u8> = (1..=6)
        .map(|i| {
            caps[i]
                .parse::<u8>()
                .map_err(|_| FtpError::protocol_error("PASV number out of range"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let ip = IpAddr::from([nums[0], nums[1], nums[2], nums[3]]);
    let port = (nums[4] as u16) * 256 + (nums[5] as u16);
    Ok(SocketAddr::new(ip, port))
}

// ─── PORT ────────────────────────────────────────────────────────────

/// Encode an IPv4 socket address as the `PORT` argument.
pub fn format_port_argument(addr: SocketAddrV4) -> String {
    let o = addr.ip().octets();
    let port = addr.port();
    format!(
        "{},{},{},{},{},{}",
        o[0],
        o[1],
        o[2],
        o[3],
        port / 256,
        port % 256
    )
}

/// Require an IPv4 address; PORT cannot express anything else.
pub fn ipv4_only(addr: SocketAddr) -> FtpResult<SocketAddrV4> {
    match addr {
        SocketAddr::V4(v4) => Ok(v4),
        SocketAddr::V6(_) => Err(FtpError::data_channel(format!(
            "PORT requires IPv4, got {}",
            addr
        ))),
    }
}

/// Bind a local listener and announce it with `PORT`.
fn open_port(codec: &mut FtpCodec, bind_addr: Option<&str>) -> FtpResult<Option<DataChannel>> {
    let bind_ip: IpAddr = match bind_addr {
        Some(addr) => addr
            .parse()
            .map_err(|_| FtpError::invalid_config(format!("Bad active bind address: {}", addr)))?,
        // Advertise the interface the control connection runs over.
        None => codec.local_addr()?.ip(),
    };
    let bind_ip = match bind_ip {
        IpAddr::V4(v4) => v4,
        IpAddr::V6(_) => Ipv4Addr::UNSPECIFIED,
    };

    let listener = TcpListener::bind(SocketAddrV4::new(bind_ip, 0))
        .map_err(|e| FtpError::data_channel(format!("PORT bind: {}", e)))?;
    let local = ipv4_only(listener.local_addr()?)?;

    let resp = codec.execute(&format!("PORT {}", format_port_argument(local)))?;
    if !resp.is_completion() {
        return Ok(None);
    }
    Ok(Some(DataChannel::Listening(listener)))
}

fn accept_with_timeout(listener: &TcpListener, timeout: Duration) -> FtpResult<TcpStream> {
    listener.set_nonblocking(true)?;
    let started = Instant::now();
    loop {
        match listener.accept() {
            Ok((tcp, _)) => {
                tcp.set_nonblocking(false)?;
                return Ok(tcp);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                if started.elapsed() >= timeout {
                    return Err(FtpError::data_channel("PORT accept timed out"));
                }
                thread::sleep(ACCEPT_POLL);
            }
            Err(e) => return Err(FtpError::data_channel(format!("PORT accept: {}", e))),
        }
    }
}
