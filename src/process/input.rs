// src/process/input.rs

use std::fmt;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::AsyncRead;

/// Where a child's stdin comes from.
#[derive(Default)]
pub enum Input {
    /// Share the parent's stdin.
    Inherit,
    /// The null device (default).
    #[default]
    Null,
    /// In-memory bytes, written to the child and then closed.
    Bytes(Vec<u8>),
    /// A file opened for reading at start time.
    File(PathBuf),
    /// Any async reader, streamed to the child until EOF.
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl Input {
    pub fn reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Input::Reader(Box::new(reader))
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Input::File(path.into())
    }

    /// Resolve into the `Stdio` handed to the OS plus, for bytes and readers,
    /// the data a feeder task still has to write.
    pub(crate) fn into_stdio(self) -> io::Result<(Stdio, Option<Feed>)> {
        match self {
            Input::Inherit => Ok((Stdio::inherit(), None)),
            Input::Null => Ok((Stdio::null(), None)),
            Input::Bytes(bytes) => Ok((Stdio::piped(), Some(Feed::Bytes(bytes)))),
            Input::File(path) => {
                let file = File::open(&path).map_err(|e| {
                    io::Error::new(e.kind(), format!("opening stdin file {}: {e}", path.display()))
                })?;
                Ok((Stdio::from(file), None))
            }
            Input::Reader(reader) => Ok((Stdio::piped(), Some(Feed::Reader(reader)))),
        }
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::Inherit => write!(f, "Inherit"),
            Input::Null => write!(f, "Null"),
            Input::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Input::File(path) => f.debug_tuple("File").field(path).finish(),
            Input::Reader(_) => write!(f, "Reader(..)"),
        }
    }
}

impl From<&str> for Input {
    fn from(s: &str) -> Self {
        Input::Bytes(s.as_bytes().to_vec())
    }
}

impl From<String> for Input {
    fn from(s: String) -> Self {
        Input::Bytes(s.into_bytes())
    }
}

impl From<Vec<u8>> for Input {
    fn from(bytes: Vec<u8>) -> Self {
        Input::Bytes(bytes)
    }
}

/// Data still to be written into a child's stdin after spawn.
pub(crate) enum Feed {
    Bytes(Vec<u8>),
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}
