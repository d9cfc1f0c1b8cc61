//! Remote directory navigation.

use crate::ftp::error::FtpResult;
use crate::ftp::session::FtpSession;
use log::{debug, error};

const ROOT: &str = "/";

/// Change into the absolute directory `path`, creating any missing
/// segment on the way.
///
/// Starts from `/` and descends one segment at a time: `CWD seg`, and only
/// if that fails, `MKD seg` then `CWD seg` again. The first segment that
/// cannot be entered aborts the walk. `None` or an empty path succeeds
/// without touching the session. Session faults are logged and reported
/// as `false`.
pub fn ensure_and_enter<S: FtpSession + ?Sized>(session: &mut S, path: Option<&str>) -> bool {
    let path = match path {
        Some(p) if !p.is_empty() => p,
        _ => return true,
    };

    match walk(session, path) {
        Ok(entered) => entered,
        Err(e) => {
            error!("Failed to change directory to {}: {}", path, e);
            false
        }
    }
}

fn walk<S: FtpSession + ?Sized>(session: &mut S, path: &str) -> FtpResult<bool> {
    if !session.change_working_directory(ROOT)? {
        debug!("Cannot enter {} on the server", ROOT);
        return Ok(false);
    }

    // Leading, doubled and trailing separators leave empty segments.
    for dir in path.split('/').filter(|d| !d.is_empty()) {
        if session.change_working_directory(dir)? {
            continue;
        }
        if !(session.make_directory(dir)? && session.change_working_directory(dir)?) {
            debug!("Cannot create or enter {} under {}", dir, path);
            return Ok(false);
        }
    }
    Ok(true)
}
