use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{HoleStrategy, DEFAULT_FILE_BUFFER_SIZE};
use crate::error::StreamError;
use crate::sink::{Sink, SinkBackend, SinkCursor};
use crate::types::{ByteOrder, OpenMode, Position};

const ZEROS: [u8; 4096] = [0; 4096];

/// File backend for [`FileSink`].
pub struct SinkFile {
    file: Option<File>,
    buf: Vec<u8>,
    filename: PathBuf,
    mode: OpenMode,
    holes: HoleStrategy,
    /// Bytes known to exist in the file.
    file_len: Position,
    /// OS file offset, when known.
    os_pos: Option<Position>,
}

pub type FileSink = Sink<SinkFile>;

impl SinkFile {
    fn file(&mut self) -> Result<&mut File, StreamError> {
        self.file.as_mut().ok_or(StreamError::NotOpen)
    }

    fn seek_os(&mut self, pos: Position) -> Result<(), StreamError> {
        if self.os_pos != Some(pos) {
            self.file()?.seek(SeekFrom::Start(pos))?;
            self.os_pos = Some(pos);
        }
        Ok(())
    }

    fn write_at(&mut self, offset: Position, range: std::ops::Range<usize>) -> Result<(), StreamError> {
        if self.holes == HoleStrategy::ZeroFill
            && self.mode != OpenMode::Append
            && offset > self.file_len
        {
            self.fill_zeros(self.file_len, offset)?;
        }
        self.seek_os(offset)?;
        let written_end = offset + range.len() as Position;
        let file = self.file.as_mut().ok_or(StreamError::NotOpen)?;
        if let Err(e) = file.write_all(&self.buf[range]) {
            self.os_pos = None;
            return Err(e.into());
        }
        self.os_pos = Some(written_end);
        self.file_len = self.file_len.max(written_end);
        Ok(())
    }

    fn fill_zeros(&mut self, from: Position, to: Position) -> Result<(), StreamError> {
        log::trace!("file sink: zero-fill hole {from}..{to}");
        self.seek_os(from)?;
        let mut remaining = to - from;
        while remaining > 0 {
            let n = usize::try_from(remaining).map_or(ZEROS.len(), |r| r.min(ZEROS.len()));
            if let Err(e) = self.file()?.write_all(&ZEROS[..n]) {
                self.os_pos = None;
                return Err(e.into());
            }
            remaining -= n as Position;
        }
        self.os_pos = Some(to);
        self.file_len = self.file_len.max(to);
        Ok(())
    }
}

impl SinkBackend for SinkFile {
    fn window(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    fn overflow(&mut self, cursor: &mut SinkCursor, _requested: usize) -> Result<(), StreamError> {
        if self.file.is_none() {
            return Err(StreamError::NotOpen);
        }
        cursor.set_window(cursor.position(), 0, self.buf.len());
        Ok(())
    }

    fn flush(&mut self, cursor: &mut SinkCursor) -> Result<(), StreamError> {
        if let Some(range) = cursor.dirty_range() {
            let offset = cursor.base_offset() + range.start as Position;
            self.write_at(offset, range)?;
        }
        cursor.set_window(cursor.position(), 0, self.buf.len());
        Ok(())
    }

    fn jump(&mut self, cursor: &mut SinkCursor, target: Position) -> Result<(), StreamError> {
        self.file()?.seek(SeekFrom::Start(target))?;
        self.os_pos = Some(target);
        cursor.set_window(target, 0, self.buf.len());
        Ok(())
    }

    fn is_valid_position(&self, _cursor: &SinkCursor, pos: Position) -> bool {
        i64::try_from(pos).is_ok()
    }
}

impl std::fmt::Debug for SinkFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkFile")
            .field("filename", &self.filename)
            .field("open", &self.file.is_some())
            .field("mode", &self.mode)
            .field("buffer_size", &self.buf.len())
            .field("file_len", &self.file_len)
            .finish()
    }
}

impl Sink<SinkFile> {
    /// Unopened file sink with the default buffer size.
    #[must_use]
    pub fn new(order: ByteOrder) -> Self {
        Self::with_buffer_size(DEFAULT_FILE_BUFFER_SIZE, order)
    }

    /// Unopened file sink buffering `buffer_size` bytes between writes.
    #[must_use]
    pub fn with_buffer_size(buffer_size: usize, order: ByteOrder) -> Self {
        let backend = SinkFile {
            file: None,
            buf: vec![0; buffer_size.max(1)],
            filename: PathBuf::new(),
            mode: OpenMode::default(),
            holes: HoleStrategy::default(),
            file_len: 0,
            os_pos: None,
        };
        Self::with_window(backend, order, 0)
    }

    /// Open `path` in a new sink with the default buffer size.
    ///
    /// # Errors
    /// If the file cannot be opened.
    pub fn with_path(path: impl AsRef<Path>, mode: OpenMode, order: ByteOrder) -> Result<Self, StreamError> {
        let mut sink = Self::new(order);
        sink.open(path, mode)?;
        Ok(sink)
    }

    /// Open `path`, closing the current file first.
    ///
    /// The high watermark starts at the file length; the position starts at
    /// the end of the file for `Append` and `AtEnd`, at 0 otherwise.
    ///
    /// # Errors
    /// If closing the current file or opening the new one fails.
    pub fn open(&mut self, path: impl AsRef<Path>, mode: OpenMode) -> Result<(), StreamError> {
        self.open_with(path, mode, &mode.to_open_options())
    }

    /// As [`Sink::open`], with explicit open options overriding those
    /// derived from `mode`.
    ///
    /// # Errors
    /// If closing the current file or opening the new one fails.
    pub fn open_with(
        &mut self,
        path: impl AsRef<Path>,
        mode: OpenMode,
        options: &OpenOptions,
    ) -> Result<(), StreamError> {
        self.close()?;
        let path = path.as_ref();
        let mut file = options.open(path)?;
        let len = file.seek(SeekFrom::End(0))?;
        let start = if mode.starts_at_end() { len } else { 0 };
        file.seek(SeekFrom::Start(start))?;
        log::debug!("file sink: opened {} ({mode:?}, {len} bytes)", path.display());

        let buffer_size = {
            let backend = self.backend_mut();
            backend.file = Some(file);
            backend.filename = path.to_path_buf();
            backend.mode = mode;
            backend.file_len = len;
            backend.os_pos = Some(start);
            backend.buf.len()
        };
        self.reset_cursor(buffer_size);
        let (cursor, _) = self.parts_mut();
        cursor.set_window(start, 0, buffer_size);
        cursor.force_high_watermark(len);
        Ok(())
    }

    /// Flush and close the file. Closing a closed sink does nothing.
    ///
    /// # Errors
    /// If the final flush fails; the file stays open then.
    pub fn close(&mut self) -> Result<(), StreamError> {
        if !self.is_open() {
            return Ok(());
        }
        self.flush()?;
        let (cursor, backend) = self.parts_mut();
        backend.file = None;
        backend.os_pos = None;
        let pos = cursor.position();
        cursor.set_window(pos, 0, 0);
        log::debug!("file sink: closed {}", backend.filename.display());
        Ok(())
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.backend().file.is_some()
    }

    /// Cut the file at the current position.
    ///
    /// # Errors
    /// `NotOpen`, or the failure of the flush or the truncation.
    pub fn truncate(&mut self) -> Result<Position, StreamError> {
        self.settle()?;
        let pos = self.position();
        let (cursor, backend) = self.parts_mut();
        backend.file()?.set_len(pos)?;
        backend.file_len = pos;
        cursor.force_high_watermark(pos);
        log::debug!("file sink: truncated {} at {pos}", backend.filename.display());
        Ok(pos)
    }

    #[must_use]
    pub fn filename(&self) -> &Path {
        &self.backend().filename
    }

    #[must_use]
    pub fn mode(&self) -> OpenMode {
        self.backend().mode
    }

    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.backend().buf.len()
    }

    pub fn set_hole_strategy(&mut self, holes: HoleStrategy) {
        self.backend_mut().holes = holes;
    }
}
