//! Outbound message forms accepted by `Session::write`.
//!
//! Buffers and file regions have a byte length and count toward
//! backpressure. Objects are opaque until an encoder in the filter chain
//! turns them into buffers, so they count as messages but not bytes.

use std::any::Any;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;

/// An opaque application message, shared between the writer and the chain.
pub type AnyMessage = Arc<dyn Any + Send + Sync>;

/// What an application hands to `Session::write`.
pub enum Message {
    Buffer(Bytes),
    Object(AnyMessage),
    /// An open file, sent whole from position 0.
    File(File),
    /// A file the session opens itself right before queuing.
    Path(PathBuf),
    Region(FileRegion),
}

impl Message {
    /// Wrap any value as an opaque object message.
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Message::Object(Arc::new(value))
    }

    /// A buffer with nothing left to send. Writing one is a caller bug.
    pub fn is_empty_buffer(&self) -> bool {
        matches!(self, Message::Buffer(b) if b.is_empty())
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Buffer(b) => f.debug_tuple("Buffer").field(&b.len()).finish(),
            Message::Object(_) => f.write_str("Object(..)"),
            Message::File(_) => f.write_str("File(..)"),
            Message::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Message::Region(r) => f.debug_tuple("Region").field(r).finish(),
        }
    }
}

impl From<Bytes> for Message {
    fn from(b: Bytes) -> Self {
        Message::Buffer(b)
    }
}

impl From<Vec<u8>> for Message {
    fn from(v: Vec<u8>) -> Self {
        Message::Buffer(Bytes::from(v))
    }
}

impl From<&'static [u8]> for Message {
    fn from(s: &'static [u8]) -> Self {
        Message::Buffer(Bytes::from_static(s))
    }
}

impl From<File> for Message {
    fn from(f: File) -> Self {
        Message::File(f)
    }
}

impl From<PathBuf> for Message {
    fn from(p: PathBuf) -> Self {
        Message::Path(p)
    }
}

impl From<FileRegion> for Message {
    fn from(r: FileRegion) -> Self {
        Message::Region(r)
    }
}

/// A byte range of an open file. The file closes when the last clone drops.
#[derive(Debug, Clone)]
pub struct FileRegion {
    file: Arc<File>,
    path: Option<PathBuf>,
    position: u64,
    length: u64,
}

impl FileRegion {
    pub fn new(file: File, position: u64, length: u64) -> Self {
        Self {
            file: Arc::new(file),
            path: None,
            position,
            length,
        }
    }

    /// The whole of an already open file.
    pub fn whole(file: File) -> io::Result<Self> {
        let length = file.metadata()?.len();
        Ok(Self::new(file, 0, length))
    }

    /// Open `path` read-only and cover the whole file.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let mut region = Self::whole(File::open(path)?)?;
        region.path = Some(path.to_path_buf());
        Ok(region)
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn length(&self) -> u64 {
        self.length
    }
}
