//! Blocking FTP command/response codec (RFC 959 §4).
//!
//! Handles:
//! - Sending FTP commands terminated with `\r\n`
//! - Reading single-line and multi-line replies
//! - Parsing the 3-digit reply code
//!
//! Every command and reply is logged at `debug` level with the `PASS`
//! argument masked.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::types::FtpResponse;
use log::debug;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

/// The FTP command/response codec over a control connection.
pub struct FtpCodec {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl FtpCodec {
    /// Create a codec from a connected TCP stream.
    pub fn from_tcp(stream: TcpStream) -> FtpResult<Self> {
        let writer = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
        })
    }

    /// Send a raw FTP command (CRLF is appended).
    pub fn send_command(&mut self, cmd: &str) -> FtpResult<()> {
        let line = format!("{}\r\n", cmd);
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;
        debug!("> {}", redact(cmd));
        Ok(())
    }

    /// Read a complete FTP response (possibly multi-line).
    pub fn read_response(&mut self) -> FtpResult<FtpResponse> {
        let resp = read_reply(&mut self.reader)?;
        for line in &resp.lines {
            debug!("< {}", line);
        }
        Ok(resp)
    }

    /// Send a command and return the response.
    pub fn execute(&mut self, cmd: &str) -> FtpResult<FtpResponse> {
        self.send_command(cmd)?;
        self.read_response()
    }

    /// Local address of the control connection (used to advertise PORT).
    pub fn local_addr(&self) -> FtpResult<SocketAddr> {
        Ok(self.writer.local_addr()?)
    }

    /// Change how long a reply may take to arrive (`None` waits forever).
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> FtpResult<()> {
        self.writer.set_read_timeout(timeout)?;
        Ok(())
    }

    /// Current reply timeout.
    pub fn read_timeout(&self) -> FtpResult<Option<Duration>> {
        Ok(self.writer.read_timeout()?)
    }

    /// Close both directions of the control connection.
    pub fn shutdown(&self) -> FtpResult<()> {
        match self.writer.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            // The server already hung up, typically right after QUIT.
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Read one reply from any buffered reader.
///
/// Multi-line replies look like:
/// ```text
/// 220-Welcome to my FTP server
/// 220-This is line 2
/// 220 End of greeting
/// ```
pub fn read_reply<R: BufRead>(reader: &mut R) -> FtpResult<FtpResponse> {
    let first = read_line_raw(reader)?;

    if first.len() < 3 {
        return Err(FtpError::protocol_error(format!(
            "Response too short: '{}'",
            first
        )));
    }

    let code = parse_code(&first)?;
    let is_multi = first.as_bytes().get(3) == Some(&b'-');
    let mut lines = vec![first];

    // "NNN-" means more lines follow until "NNN " (or a bare "NNN") is seen.
    if is_multi {
        let terminator = format!("{} ", code);
        loop {
            let next = read_line_raw(reader)?;
            let done = next.starts_with(&terminator) || next == code.to_string();
            lines.push(next);
            if done {
                break;
            }
        }
    }

    let resp = FtpResponse { code, lines };
    // 421: the server is closing the control connection.
    if resp.code == 421 {
        return Err(FtpError::from_reply(resp.code, &resp.text()));
    }
    Ok(resp)
}

/// Read a single line, strip CRLF. Invalid UTF-8 is replaced, not rejected.
fn read_line_raw<R: BufRead>(reader: &mut R) -> FtpResult<String> {
    let mut buf = Vec::new();
    let n = reader.read_until(b'\n', &mut buf)?;
    if n == 0 {
        return Err(FtpError::disconnected("Server closed connection"));
    }
    let line = String::from_utf8_lossy(&buf);
    Ok(line.trim_end_matches(|c| c == '\r' || c == '\n').to_string())
}

/// Parse the 3-digit reply code from the start of a line.
fn parse_code(line: &str) -> FtpResult<u16> {
    line.get(..3)
        .and_then(|c| c.parse::<u16>().ok())
        .ok_or_else(|| FtpError::protocol_error(format!("Invalid reply code in: '{}'", line)))
}

fn redact(cmd: &str) -> &str {
    match cmd.get(..5) {
        Some(verb) if verb.eq_ignore_ascii_case("PASS ") => "PASS ******",
        _ => cmd,
    }
}
