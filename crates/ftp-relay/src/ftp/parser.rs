//! LIST response parser.
//!
//! Only the name, kind and size of an entry matter to the transfer
//! strategies, so timestamps are not decoded. Three formats are recognised:
//! 1. **MLSD facts** (RFC 3659): `type=file;size=1234;modify=20260101120000; file.txt`
//! 2. **Unix-style** (`ls -l`): `-rwxr-xr-x 1 owner group 1234 Jan  1 12:00 file.txt`
//! 3. **Windows/IIS-style**: `01-01-26  12:00AM       1234 file.txt`
//!
//! Any other line (a server error message, say) is dropped.

use crate::ftp::types::{FtpEntry, FtpEntryKind};
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

lazy_static! {
    static ref UNIX_LINE: Regex = Regex::new(
        r"(?x)
        ^([dlcbps-][rwxsStT-]{9})[+@.]?\s+  # permissions
        \d+\s+                               # link count
        \S+\s+                               # owner
        (?:\S+\s+)?                          # group
        (\d+)\s+                             # size
        \w{3}\s+\d{1,2}\s+[\d:]+\s+          # date
        (.+)$                                # name (possibly with -> target)
        "
    )
    .expect("static unix listing regex");
    static ref WINDOWS_LINE: Regex = Regex::new(
        r"(?x)
        ^\d{2}-\d{2}-\d{2,4}\s+              # date
        \d{1,2}:\d{2}(?:AM|PM)?\s+           # time
        (<DIR>|\d+)\s+                       # size or <DIR>
        (.+)$                                # name
        "
    )
    .expect("static windows listing regex");
}

/// Parse a full multi-line LIST or MLSD response body.
pub fn parse_listing(raw: &str) -> Vec<FtpEntry> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("total "))
        .filter_map(parse_line)
        .filter(|e| e.name != "." && e.name != "..")
        .collect()
}

fn parse_line(line: &str) -> Option<FtpEntry> {
    let parsed = if line.contains(';') && line.contains('=') {
        parse_mlsd(line)
    } else {
        None
    };

    let mut entry = parsed
        .or_else(|| parse_unix(line))
        .or_else(|| parse_windows(line));
    match entry.as_mut() {
        Some(entry) => entry.raw = Some(line.to_string()),
        None => debug!("Skipping unparseable listing line: {}", line),
    }
    entry
}

/// `fact1=val1;fact2=val2; filename`
fn parse_mlsd(line: &str) -> Option<FtpEntry> {
    let (facts, name) = line.split_once("; ")?;
    if name.is_empty() {
        return None;
    }

    let mut kind = FtpEntryKind::Unknown;
    let mut size = 0;
    let mut permissions = None;
    for fact in facts.split(';') {
        let (key, value) = match fact.split_once('=') {
            Some(kv) => kv,
            None => continue,
        };
        match key.to_ascii_lowercase().as_str() {
            "type" => {
                kind = match value.to_ascii_lowercase().as_str() {
                    "file" => FtpEntryKind::File,
                    "dir" | "cdir" | "pdir" => FtpEntryKind::Directory,
                    "os.unix=symlink" | "os.unix=slink" => FtpEntryKind::Symlink,
                    _ => FtpEntryKind::Unknown,
                }
            }
            "size" => size = value.parse().unwrap_or(0),
            "unix.mode" => permissions = Some(value.to_string()),
            _ => {}
        }
    }

    Some(FtpEntry {
        name: name.to_string(),
        kind,
        size,
        permissions,
        link_target: None,
        raw: None,
    })
}

fn parse_unix(line: &str) -> Option<FtpEntry> {
    let caps = UNIX_LINE.captures(line)?;
    let perms = caps.get(1)?.as_str();
    let size = caps.get(2)?.as_str().parse().unwrap_or(0);
    let name_raw = caps.get(3)?.as_str();

    let kind = match perms.as_bytes()[0] {
        b'd' => FtpEntryKind::Directory,
        b'l' => FtpEntryKind::Symlink,
        b'-' => FtpEntryKind::File,
        _ => FtpEntryKind::Unknown,
    };

    let (name, link_target) = match (kind, name_raw.split_once(" -> ")) {
        (FtpEntryKind::Symlink, Some((name, target))) => (name, Some(target.to_string())),
        _ => (name_raw, None),
    };

    Some(FtpEntry {
        name: name.to_string(),
        kind,
        size,
        permissions: Some(perms.to_string()),
        link_target,
        raw: None,
    })
}

fn parse_windows(line: &str) -> Option<FtpEntry> {
    let caps = WINDOWS_LINE.captures(line)?;
    let size_or_dir = caps.get(1)?.as_str();
    let name = caps.get(2)?.as_str();

    let (kind, size) = if size_or_dir == "<DIR>" {
        (FtpEntryKind::Directory, 0)
    } else {
        (FtpEntryKind::File, size_or_dir.parse().unwrap_or(0))
    };

    Some(FtpEntry {
        name: name.to_string(),
        kind,
        size,
        permissions: None,
        link_target: None,
        raw: None,
    })
}
