//! Blocking FTP client: owns the control connection and issues commands.
//!
//! Lifecycle: `connect()` → `login()` → commands → `logout()` →
//! `disconnect()`. A disconnected client can connect again.
//!
//! A restart offset set with `set_restart_offset` is sent as `REST` right
//! before the next `RETR`/`STOR` and then cleared.

use crate::ftp::connection::{self, DEFAULT_PORT};
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::parser;
use crate::ftp::protocol::FtpCodec;
use crate::ftp::session::FtpSession;
use crate::ftp::transfer::{self, ipv4_only};
use crate::ftp::types::*;
use log::debug;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};

/// An FTP client session over TCP.
pub struct FtpClient {
    config: FtpConnectionConfig,
    codec: Option<FtpCodec>,
    data_mode: DataConnectionMode,
    transfer_type: TransferType,
    restart_offset: u64,
    passive_address: Option<SocketAddr>,
}

impl Default for FtpClient {
    fn default() -> Self {
        Self::with_config(FtpConnectionConfig::default())
    }
}

impl FtpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FtpConnectionConfig) -> Self {
        Self {
            config,
            codec: None,
            data_mode: DataConnectionMode::default(),
            transfer_type: TransferType::default(),
            restart_offset: 0,
            passive_address: None,
        }
    }

    pub fn config(&self) -> &FtpConnectionConfig {
        &self.config
    }

    pub fn data_connection_mode(&self) -> DataConnectionMode {
        self.data_mode
    }

    pub fn transfer_type(&self) -> TransferType {
        self.transfer_type
    }

    fn codec(&mut self) -> FtpResult<&mut FtpCodec> {
        self.codec
            .as_mut()
            .ok_or_else(|| FtpError::disconnected("FTP session is not connected"))
    }

    /// Send a command and report whether the reply was a 2xx.
    fn command_ok(&mut self, cmd: &str) -> FtpResult<bool> {
        Ok(self.codec()?.execute(cmd)?.is_completion())
    }

    /// Send the pending `REST`, if any. `Ok(false)` when the server refuses it.
    fn send_restart(&mut self) -> FtpResult<bool> {
        let offset = std::mem::take(&mut self.restart_offset);
        if offset == 0 {
            return Ok(true);
        }
        let resp = self.codec()?.execute(&format!("REST {}", offset))?;
        Ok(resp.is_intermediate())
    }

    /// Set up a data channel, issue `command`, and hand back the connected
    /// data stream. `None` when the server refuses any step.
    fn open_transfer(&mut self, command: &str, with_restart: bool) -> FtpResult<Option<TcpStream>> {
        let codec = self
            .codec
            .as_mut()
            .ok_or_else(|| FtpError::disconnected("FTP session is not connected"))?;
        let channel = match transfer::open_data_channel(codec, self.data_mode, &self.config)? {
            Some(channel) => channel,
            None => return Ok(None),
        };

        if with_restart && !self.send_restart()? {
            return Ok(None);
        }

        let resp = self.codec()?.execute(command)?;
        if !resp.is_preliminary() {
            return Ok(None);
        }
        channel.into_stream(self.config.data_timeout()).map(Some)
    }

    fn reset_session_state(&mut self) {
        self.data_mode = DataConnectionMode::default();
        self.transfer_type = TransferType::default();
        self.restart_offset = 0;
        self.passive_address = None;
    }
}

impl FtpSession for FtpClient {
    fn connect(&mut self, host: &str, port: Option<u16>) -> FtpResult<bool> {
        if self.codec.is_some() {
            self.disconnect()?;
        }
        let port = port.unwrap_or(DEFAULT_PORT);
        let (codec, banner) = connection::connect(host, port, &self.config)?;
        debug!("Connected to {} on {}", host, port);
        self.codec = Some(codec);
        self.reset_session_state();
        Ok(banner.is_completion())
    }

    fn login(&mut self, username: &str, password: &str) -> FtpResult<bool> {
        let codec = self.codec()?;
        let user = codec.execute(&format!("USER {}", username))?;
        let logged_in = if user.is_completion() {
            true
        } else if user.is_intermediate() {
            codec.execute(&format!("PASS {}", password))?.is_completion()
        } else {
            false
        };

        if logged_in && self.config.utf8 {
            // Servers without UTF8 support reject this.
            self.codec()?.execute("OPTS UTF8 ON")?;
        }
        Ok(logged_in)
    }

    fn is_connected(&self) -> bool {
        self.codec.is_some()
    }

    fn logout(&mut self) -> FtpResult<bool> {
        self.command_ok("QUIT")
    }

    fn disconnect(&mut self) -> FtpResult<()> {
        match self.codec.take() {
            Some(codec) => codec.shutdown(),
            None => Ok(()),
        }
    }

    fn set_file_type(&mut self, file_type: TransferType) -> FtpResult<bool> {
        let ok = self.command_ok(file_type.command())?;
        if ok {
            self.transfer_type = file_type;
        }
        Ok(ok)
    }

    fn enter_local_passive_mode(&mut self) {
        self.data_mode = DataConnectionMode::LocalPassive;
        self.passive_address = None;
    }

    fn enter_remote_passive_mode(&mut self) -> FtpResult<bool> {
        match transfer::request_passive_address(self.codec()?)? {
            Some(addr) => {
                self.data_mode = DataConnectionMode::RemotePassive;
                self.passive_address = Some(addr);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn passive_address(&self) -> Option<SocketAddr> {
        self.passive_address
    }

    fn enter_remote_active_mode(&mut self, addr: SocketAddr) -> FtpResult<bool> {
        let peer = ipv4_only(addr)?;
        let ok = self.command_ok(&format!("PORT {}", transfer::format_port_argument(peer)))?;
        if ok {
            self.data_mode = DataConnectionMode::RemoteActive;
            self.passive_address = None;
        }
        Ok(ok)
    }

    fn list_files(&mut self, path: &str) -> FtpResult<Vec<FtpEntry>> {
        let mut stream = match self.open_transfer(&format!("LIST {}", path), false)? {
            Some(stream) => stream,
            None => return Ok(Vec::new()),
        };
        let mut body = Vec::new();
        stream.read_to_end(&mut body)?;
        drop(stream);

        if !self.complete_pending_command()? {
            debug!("LIST {} did not complete cleanly", path);
        }
        Ok(parser::parse_listing(&String::from_utf8_lossy(&body)))
    }

    fn set_restart_offset(&mut self, offset: u64) {
        self.restart_offset = offset;
    }

    fn change_working_directory(&mut self, path: &str) -> FtpResult<bool> {
        self.command_ok(&format!("CWD {}", path))
    }

    fn make_directory(&mut self, path: &str) -> FtpResult<bool> {
        self.command_ok(&format!("MKD {}", path))
    }

    fn retrieve_file(&mut self, path: &str, output: &mut dyn Write) -> FtpResult<bool> {
        let mut stream = match self.open_transfer(&format!("RETR {}", path), true)? {
            Some(stream) => stream,
            None => return Ok(false),
        };
        let received = io::copy(&mut stream, output)?;
        // Buffered bytes must reach the output before the final reply counts.
        output.flush()?;
        drop(stream);
        debug!("Received {} bytes of {}", received, path);
        self.complete_pending_command()
    }

    fn store_file(&mut self, name: &str, input: &mut dyn Read) -> FtpResult<bool> {
        let mut stream = match self.open_transfer(&format!("STOR {}", name), true)? {
            Some(stream) => stream,
            None => return Ok(false),
        };
        let sent = io::copy(input, &mut stream)?;
        stream.flush()?;
        // Closing the data connection marks end-of-file for the server.
        drop(stream);
        debug!("Sent {} bytes as {}", sent, name);
        self.complete_pending_command()
    }

    fn remote_retrieve(&mut self, path: &str) -> FtpResult<bool> {
        if !self.data_mode.is_remote() || !self.send_restart()? {
            return Ok(false);
        }
        Ok(self.codec()?.execute(&format!("RETR {}", path))?.is_preliminary())
    }

    fn remote_store(&mut self, name: &str) -> FtpResult<bool> {
        if !self.data_mode.is_remote() || !self.send_restart()? {
            return Ok(false);
        }
        Ok(self.codec()?.execute(&format!("STOR {}", name))?.is_preliminary())
    }

    fn complete_pending_command(&mut self) -> FtpResult<bool> {
        let codec = self.codec()?;
        // A server-to-server transfer may run far longer than the reply timeout.
        let previous = codec.read_timeout()?;
        codec.set_read_timeout(None)?;
        let reply = codec.read_response();
        codec.set_read_timeout(previous)?;
        Ok(reply?.is_completion())
    }

    fn delete_file(&mut self, path: &str) -> FtpResult<bool> {
        self.command_ok(&format!("DELE {}", path))
    }
}
