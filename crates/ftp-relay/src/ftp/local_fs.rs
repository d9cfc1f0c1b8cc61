//! Local file handle used by the download/upload strategy.

use log::debug;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// A local file addressed by path. Nothing is opened until asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    path: PathBuf,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn len(&self) -> io::Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    pub fn delete(&self) -> io::Result<()> {
        fs::remove_file(&self.path)
    }

    /// Create an empty file; fails if one already exists.
    pub fn create_new(&self) -> io::Result<()> {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .map(drop)
    }

    /// Make sure the parent directory exists, creating the whole chain.
    pub fn ensure_parent(&self) -> io::Result<()> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
                fs::create_dir_all(parent)
            }
            _ => Ok(()),
        }
    }

    pub fn open_append(&self) -> io::Result<LocalOutput> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        Ok(LocalOutput {
            writer: Some(BufWriter::new(file)),
            path: self.path.clone(),
        })
    }

    pub fn open_read(&self) -> io::Result<LocalInput> {
        Ok(LocalInput {
            reader: BufReader::new(File::open(&self.path)?),
        })
    }
}

/// Append-mode output. Flushed when dropped; a flush failure is only logged.
pub struct LocalOutput {
    writer: Option<BufWriter<File>>,
    path: PathBuf,
}

impl Write for LocalOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.writer.as_mut() {
            Some(w) => w.write(buf),
            None => Err(io::Error::new(io::ErrorKind::Other, "output already closed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(w) => w.flush(),
            None => Ok(()),
        }
    }
}

impl LocalOutput {
    pub fn close(mut self) {
        self.close_quietly();
    }

    fn close_quietly(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                debug!("Closing {} failed: {}", self.path.display(), e);
            }
        }
    }
}

impl Drop for LocalOutput {
    fn drop(&mut self) {
        self.close_quietly();
    }
}

/// Buffered input over a local file.
pub struct LocalInput {
    reader: BufReader<File>,
}

impl LocalInput {
    /// Discard up to `n` bytes and return how many were actually skipped.
    /// Fewer than `n` means the file ended first.
    pub fn skip(&mut self, n: u64) -> io::Result<u64> {
        io::copy(&mut self.reader.by_ref().take(n), &mut io::sink())
    }
}

impl Read for LocalInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}
