//! In-memory `FtpSession` used by unit tests.
//!
//! Keeps a tiny remote file system (directories + file contents), records
//! every call as a short command string, and lets a test script per-command
//! replies: accept, refuse (`Ok(false)`) or fault (`Err`).

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::session::FtpSession;
use crate::ftp::parser::parse_listing;
use crate::ftp::types::{FtpEntry, FtpEntryKind, TransferType};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::io::{Read, Write};
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reply {
    Accept,
    Refuse,
    Fault,
}

pub(crate) struct FakeSession {
    pub calls: Vec<String>,
    pub dirs: BTreeSet<String>,
    pub files: BTreeMap<String, Vec<u8>>,
    pub cwd: String,
    pub connected: bool,
    pub restart_offset: u64,
    pub passive: Option<SocketAddr>,
    advertised: SocketAddr,
    listings: HashMap<String, String>,
    script: HashMap<&'static str, VecDeque<Reply>>,
}

impl Default for FakeSession {
    fn default() -> Self {
        let mut dirs = BTreeSet::new();
        dirs.insert("/".to_string());
        Self {
            calls: Vec::new(),
            dirs,
            files: BTreeMap::new(),
            cwd: "/".to_string(),
            connected: false,
            restart_offset: 0,
            passive: None,
            advertised: SocketAddr::from(([10, 0, 0, 2], 2000)),
            listings: HashMap::new(),
            script: HashMap::new(),
        }
    }
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory and all of its parents.
    pub fn with_dir(mut self, path: &str) -> Self {
        let mut current = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current.push('/');
            current.push_str(part);
            self.dirs.insert(current.clone());
        }
        self
    }

    /// Add a file, creating its parent directories.
    pub fn with_file(self, path: &str, content: &[u8]) -> Self {
        let parent = path.rsplit_once('/').map(|(p, _)| p).unwrap_or("");
        let mut fake = self.with_dir(parent);
        fake.files.insert(path.to_string(), content.to_vec());
        fake
    }

    /// Answer `LIST path` with this raw listing text instead of the file table.
    pub fn with_listing(mut self, path: &str, raw: &str) -> Self {
        self.listings.insert(path.to_string(), raw.to_string());
        self
    }

    pub fn with_advertised(mut self, addr: SocketAddr) -> Self {
        self.advertised = addr;
        self
    }

    /// Queue replies for `op`; once the queue is drained `op` is accepted.
    pub fn script(mut self, op: &'static str, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.script.entry(op).or_default().extend(replies);
        self
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls.iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    fn reply(&mut self, op: &'static str) -> FtpResult<bool> {
        let next = self
            .script
            .get_mut(op)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Reply::Accept);
        match next {
            Reply::Accept => Ok(true),
            Reply::Refuse => Ok(false),
            Reply::Fault => Err(FtpError::disconnected(format!("{} fault", op))),
        }
    }

    fn record(&mut self, call: String) {
        self.calls.push(call);
    }

    fn resolve(&self, path: &str) -> String {
        if path.starts_with('/') {
            return path.to_string();
        }
        if self.cwd == "/" {
            format!("/{}", path)
        } else {
            format!("{}/{}", self.cwd, path)
        }
    }
}

impl FtpSession for FakeSession {
    fn connect(&mut self, host: &str, port: Option<u16>) -> FtpResult<bool> {
        self.record(format!("CONNECT {}:{}", host, port.unwrap_or(21)));
        let ok = self.reply("CONNECT")?;
        // A refused banner still leaves the socket open.
        self.connected = true;
        self.cwd = "/".to_string();
        self.restart_offset = 0;
        self.passive = None;
        Ok(ok)
    }

    fn login(&mut self, username: &str, _password: &str) -> FtpResult<bool> {
        self.record(format!("LOGIN {}", username));
        self.reply("LOGIN")
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn logout(&mut self) -> FtpResult<bool> {
        self.record("QUIT".to_string());
        self.reply("QUIT")
    }

    fn disconnect(&mut self) -> FtpResult<()> {
        self.record("DISCONNECT".to_string());
        self.connected = false;
        self.reply("DISCONNECT").map(drop)
    }

    fn set_file_type(&mut self, file_type: TransferType) -> FtpResult<bool> {
        self.record(file_type.command().to_string());
        self.reply("TYPE")
    }

    fn enter_local_passive_mode(&mut self) {
        self.record("LOCAL PASSIVE".to_string());
    }

    fn enter_remote_passive_mode(&mut self) -> FtpResult<bool> {
        self.record("PASV".to_string());
        let ok = self.reply("PASV")?;
        if ok {
            self.passive = Some(self.advertised);
        }
        Ok(ok)
    }

    fn passive_address(&self) -> Option<SocketAddr> {
        self.passive
    }

    fn enter_remote_active_mode(&mut self, addr: SocketAddr) -> FtpResult<bool> {
        self.record(format!("PORT {}", addr));
        self.reply("PORT")
    }

    fn list_files(&mut self, path: &str) -> FtpResult<Vec<FtpEntry>> {
        self.record(format!("LIST {}", path));
        if !self.reply("LIST")? {
            return Ok(Vec::new());
        }
        let full = self.resolve(path);
        if let Some(raw) = self.listings.get(&full) {
            return Ok(parse_listing(raw));
        }
        Ok(self
            .files
            .get(&full)
            .map(|data| {
                let name = full.rsplit('/').next().unwrap_or_default();
                vec![FtpEntry {
                    name: name.to_string(),
                    kind: FtpEntryKind::File,
                    size: data.len() as u64,
                    permissions: None,
                    link_target: None,
                    raw: None,
                }]
            })
            .unwrap_or_default())
    }

    fn set_restart_offset(&mut self, offset: u64) {
        self.record(format!("REST {}", offset));
        self.restart_offset = offset;
    }

    fn change_working_directory(&mut self, path: &str) -> FtpResult<bool> {
        self.record(format!("CWD {}", path));
        if !self.reply("CWD")? {
            return Ok(false);
        }
        let full = self.resolve(path);
        if self.dirs.contains(&full) {
            self.cwd = full;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn make_directory(&mut self, path: &str) -> FtpResult<bool> {
        self.record(format!("MKD {}", path));
        if !self.reply("MKD")? {
            return Ok(false);
        }
        let full = self.resolve(path);
        Ok(self.dirs.insert(full))
    }

    fn retrieve_file(&mut self, path: &str, output: &mut dyn Write) -> FtpResult<bool> {
        self.record(format!("RETR {}", path));
        let offset = std::mem::take(&mut self.restart_offset) as usize;
        if !self.reply("RETR")? {
            return Ok(false);
        }
        let full = self.resolve(path);
        match self.files.get(&full) {
            Some(data) => {
                output.write_all(&data[offset.min(data.len())..])?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn store_file(&mut self, name: &str, input: &mut dyn Read) -> FtpResult<bool> {
        self.record(format!("STOR {}", name));
        let offset = std::mem::take(&mut self.restart_offset) as usize;
        if !self.reply("STOR")? {
            return Ok(false);
        }
        let mut incoming = Vec::new();
        input.read_to_end(&mut incoming)?;
        let full = self.resolve(name);
        let data = self.files.entry(full).or_default();
        data.truncate(offset);
        data.extend_from_slice(&incoming);
        Ok(true)
    }

    fn remote_retrieve(&mut self, path: &str) -> FtpResult<bool> {
        self.record(format!("REMOTE RETR {}", path));
        self.restart_offset = 0;
        self.reply("REMOTE RETR")
    }

    fn remote_store(&mut self, name: &str) -> FtpResult<bool> {
        self.record(format!("REMOTE STOR {}", name));
        self.restart_offset = 0;
        self.reply("REMOTE STOR")
    }

    fn complete_pending_command(&mut self) -> FtpResult<bool> {
        self.record("COMPLETE".to_string());
        self.reply("COMPLETE")
    }

    fn delete_file(&mut self, path: &str) -> FtpResult<bool> {
        self.record(format!("DELE {}", path));
        if !self.reply("DELE")? {
            return Ok(false);
        }
        let full = self.resolve(path);
        Ok(self.files.remove(&full).is_some())
    }
}
