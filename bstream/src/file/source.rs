use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::DEFAULT_FILE_BUFFER_SIZE;
use crate::error::StreamError;
use crate::source::{Source, SourceBackend, SourceCursor};
use crate::types::{ByteOrder, Position};

/// File backend for [`FileSource`].
pub struct SourceFile {
    file: Option<File>,
    buf: Vec<u8>,
    filename: PathBuf,
    size: Position,
    os_pos: Option<Position>,
}

pub type FileSource = Source<SourceFile>;

impl SourceFile {
    fn file(&mut self) -> Result<&mut File, StreamError> {
        self.file.as_mut().ok_or(StreamError::NotOpen)
    }
}

impl SourceBackend for SourceFile {
    fn window(&self) -> &[u8] {
        &self.buf
    }

    fn underflow(&mut self, cursor: &mut SourceCursor) -> Result<usize, StreamError> {
        let pos = cursor.position();
        if self.os_pos != Some(pos) {
            self.file()?.seek(SeekFrom::Start(pos))?;
            self.os_pos = Some(pos);
        }
        let file = self.file.as_mut().ok_or(StreamError::NotOpen)?;
        let n = loop {
            match file.read(&mut self.buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    self.os_pos = None;
                    return Err(e.into());
                }
            }
        };
        self.os_pos = Some(pos + n as Position);
        cursor.set_window(pos, 0, n);
        Ok(n)
    }

    fn seek(&mut self, cursor: &mut SourceCursor, pos: Position) -> Result<(), StreamError> {
        self.file()?.seek(SeekFrom::Start(pos))?;
        self.os_pos = Some(pos);
        cursor.set_window(pos, 0, 0);
        Ok(())
    }

    fn size(&self, _cursor: &SourceCursor) -> Position {
        self.size
    }
}

impl std::fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceFile")
            .field("filename", &self.filename)
            .field("open", &self.file.is_some())
            .field("buffer_size", &self.buf.len())
            .field("size", &self.size)
            .finish()
    }
}

impl Source<SourceFile> {
    /// Unopened file source with the default buffer size.
    #[must_use]
    pub fn new(order: ByteOrder) -> Self {
        Self::with_buffer_size(DEFAULT_FILE_BUFFER_SIZE, order)
    }

    /// Unopened file source reading `buffer_size` bytes at a time.
    #[must_use]
    pub fn with_buffer_size(buffer_size: usize, order: ByteOrder) -> Self {
        let backend = SourceFile {
            file: None,
            buf: vec![0; buffer_size.max(1)],
            filename: PathBuf::new(),
            size: 0,
            os_pos: None,
        };
        Self::from_backend(backend, order)
    }

    /// Open `path` in a new source with the default buffer size.
    ///
    /// # Errors
    /// If the file cannot be opened.
    pub fn with_path(path: impl AsRef<Path>, order: ByteOrder) -> Result<Self, StreamError> {
        let mut source = Self::new(order);
        source.open(path)?;
        Ok(source)
    }

    /// Open `path` for reading, replacing the current file.
    ///
    /// # Errors
    /// If the file cannot be opened or its size cannot be read.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<(), StreamError> {
        let mut options = OpenOptions::new();
        options.read(true);
        self.open_with(path, &options)
    }

    /// As [`Source::open`], with explicit open options.
    ///
    /// # Errors
    /// If the file cannot be opened or its size cannot be read.
    pub fn open_with(&mut self, path: impl AsRef<Path>, options: &OpenOptions) -> Result<(), StreamError> {
        self.close();
        let path = path.as_ref();
        let file = options.open(path)?;
        let size = file.metadata()?.len();
        log::debug!("file source: opened {} ({size} bytes)", path.display());
        let (cursor, backend) = self.parts_mut();
        backend.file = Some(file);
        backend.filename = path.to_path_buf();
        backend.size = size;
        backend.os_pos = Some(0);
        cursor.set_window(0, 0, 0);
        Ok(())
    }

    /// Close the file. Closing a closed source does nothing.
    pub fn close(&mut self) {
        let (cursor, backend) = self.parts_mut();
        if backend.file.take().is_some() {
            log::debug!("file source: closed {}", backend.filename.display());
        }
        backend.os_pos = None;
        let pos = cursor.position();
        cursor.set_window(pos, 0, 0);
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.backend().file.is_some()
    }

    #[must_use]
    pub fn filename(&self) -> &Path {
        &self.backend().filename
    }

    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.backend().buf.len()
    }
}
