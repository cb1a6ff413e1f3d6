//! Output destinations and the scoped writers behind them.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, TemplarError};
use crate::input::STDIO;

/// Where a rendered input goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Output is thrown away (partials).
    Discard,
    /// Standard output.
    Stdout,
    /// A file, created or truncated.
    File(PathBuf),
}

impl Destination {
    /// Interpret a destination argument: `""` discards, `"-"` is standard output.
    pub fn parse(spec: &str) -> Self {
        match spec {
            "" => Self::Discard,
            STDIO => Self::Stdout,
            path => Self::File(PathBuf::from(path)),
        }
    }

    pub fn is_discard(&self) -> bool {
        matches!(self, Self::Discard)
    }

    /// Open a writer for this destination.
    ///
    /// Files are opened with mode `0644` (before umask) and truncated.
    pub fn open(&self) -> Result<Sink> {
        match self {
            Self::Discard => Ok(Sink::Discard(io::sink())),
            Self::Stdout => Ok(Sink::Stdout(io::stdout())),
            Self::File(path) => {
                let file = open_out_file(path).map_err(|source| TemplarError::OpenOutput {
                    path: path.clone(),
                    source,
                })?;
                Ok(Sink::File(BufWriter::new(file)))
            }
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discard => f.write_str("(discard)"),
            Self::Stdout => f.write_str(STDIO),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(unix)]
fn open_out_file(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o644)
        .open(path)
}

#[cfg(not(unix))]
fn open_out_file(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

/// An open output. Dropping it closes the underlying handle.
pub enum Sink {
    Discard(io::Sink),
    Stdout(io::Stdout),
    File(BufWriter<File>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Discard(w) => w.write(buf),
            Self::Stdout(w) => w.write(buf),
            Self::File(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Discard(w) => w.flush(),
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Discard(_) => "Discard",
            Self::Stdout(_) => "Stdout",
            Self::File(_) => "File",
        };
        f.debug_tuple("Sink").field(&kind).finish()
    }
}
