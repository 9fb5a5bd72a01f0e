//! In-memory editable stream.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use super::EditableStream;
use crate::{Error, Result};

/// A growable, shrinkable byte buffer with a cursor.
///
/// `EditableBuffer` gives an in-memory document the contract of a
/// random-access file plus splicing: bytes can be inserted or deleted at the
/// cursor, not only overwritten.
///
/// Invariants held after every operation:
/// - `size() == as_bytes().len()`
/// - `0 <= position() <= size()`
///
/// The buffer has no internal synchronization. It is meant to be owned by a
/// single workflow invocation and handed to the engine by value.
///
/// # Example
///
/// ```rust
/// use docseal::EditableBuffer;
///
/// let mut buffer = EditableBuffer::new(b"abcdef".to_vec());
/// buffer.seek(2)?;
/// assert_eq!(buffer.delete(2), 2);
/// assert_eq!(buffer.position(), 2);
/// buffer.insert(b"XY")?;
/// assert_eq!(buffer.as_bytes(), b"abXYef");
/// assert_eq!(buffer.position(), 4);
/// # Ok::<(), docseal::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct EditableBuffer {
    content: Vec<u8>,
    size: i64,
    position: i64,
}

impl EditableBuffer {
    /// Creates a buffer over the given content with the cursor at zero.
    pub fn new(content: Vec<u8>) -> Self {
        let size = content.len() as i64;
        Self {
            content,
            size,
            position: 0,
        }
    }

    /// Reads the whole of `reader` into a new buffer.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;
        Ok(Self::new(content))
    }

    /// Reads the file at `path` into a new buffer.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read(path.as_ref())?;
        log::debug!(
            "Loaded {} bytes from '{}' into memory",
            content.len(),
            path.as_ref().display()
        );
        Ok(Self::new(content))
    }

    /// Returns the buffer contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.content
    }

    /// Consumes the buffer and returns its contents.
    pub fn into_inner(self) -> Vec<u8> {
        self.content
    }

    /// Returns the cursor position.
    pub fn position(&self) -> i64 {
        self.position
    }

    /// Returns the number of bytes in the buffer.
    pub fn size(&self) -> i64 {
        self.size
    }

    /// Returns true if the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Bytes between the cursor and the end of the buffer.
    fn remaining(&self) -> i64 {
        self.size - self.position
    }

    /// Copies up to `buf.len()` bytes at the cursor into `buf`.
    ///
    /// Returns the number of bytes copied; a short count at end of buffer is
    /// normal and zero means the cursor is at the end.
    pub fn read(&mut self, buf: &mut [u8]) -> i64 {
        let count = (buf.len() as i64).min(self.remaining());
        if count > 0 {
            let start = self.position as usize;
            let end = start + count as usize;
            buf[..count as usize].copy_from_slice(&self.content[start..end]);
            self.position += count;
        }
        count
    }

    /// Reads up to `max_len` bytes at the cursor into a new vector.
    ///
    /// `max_len <= 0` returns an empty vector and leaves the cursor alone.
    pub fn read_bytes(&mut self, max_len: i64) -> Vec<u8> {
        if max_len <= 0 {
            return Vec::new();
        }
        let mut out = vec![0u8; max_len.min(self.remaining()) as usize];
        let count = self.read(&mut out);
        out.truncate(count as usize);
        out
    }

    /// Splices `data` into the buffer at the cursor.
    ///
    /// Existing bytes are shifted, not overwritten. The cursor moves to the
    /// end of the inserted region.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityExceeded`] if the new size would not fit in
    /// an `i64`. The buffer is left untouched in that case.
    pub fn insert(&mut self, data: &[u8]) -> Result<i64> {
        if data.is_empty() {
            return Ok(0);
        }
        let len = i64::try_from(data.len()).map_err(|_| Error::CapacityExceeded {
            size: self.size,
            requested: i64::MAX,
        })?;
        if i64::MAX - self.size < len {
            return Err(Error::CapacityExceeded {
                size: self.size,
                requested: len,
            });
        }

        let at = self.position as usize;
        self.content.splice(at..at, data.iter().copied());
        self.size += len;
        self.position += len;
        Ok(len)
    }

    /// Removes up to `count` bytes ahead of the cursor.
    ///
    /// The cursor stays where it is. Returns the number of bytes removed,
    /// which is clamped to the bytes remaining after the cursor.
    pub fn delete(&mut self, count: i64) -> i64 {
        if count <= 0 {
            return 0;
        }
        let deleted = count.min(self.remaining());
        if deleted > 0 {
            let start = self.position as usize;
            self.content.drain(start..start + deleted as usize);
            self.size -= deleted;
        }
        deleted
    }

    /// Replaces `replace_len` bytes at the cursor with `data`.
    ///
    /// This is a delete followed by an insert and is not atomic: if the
    /// insert fails, the deleted bytes stay deleted.
    pub fn update(&mut self, data: &[u8], replace_len: i64) -> Result<i64> {
        self.delete(replace_len);
        self.insert(data)
    }

    /// Overwrites forward from the cursor with `data`.
    ///
    /// Equivalent to `update(data, data.len())`: bytes past the end of the
    /// buffer are appended.
    pub fn write(&mut self, data: &[u8]) -> Result<i64> {
        let len = i64::try_from(data.len()).unwrap_or(i64::MAX);
        self.update(data, len)
    }

    /// Moves the cursor to `position`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `position` is negative or past
    /// the end of the buffer. Seeking exactly to the end is allowed.
    pub fn seek(&mut self, position: i64) -> Result<()> {
        if position < 0 {
            return Err(Error::invalid_argument(
                "Position must not be less than zero",
            ));
        }
        if position > self.size {
            return Err(Error::invalid_argument(format!(
                "Position {} must not be larger than size {}",
                position, self.size
            )));
        }
        self.position = position;
        Ok(())
    }

    /// Setting the size directly is not supported.
    ///
    /// The size only ever changes through insert, delete and update.
    pub fn set_size(&mut self, _size: i64) -> Result<()> {
        Err(Error::NotImplemented("setting stream size directly"))
    }

    /// Always true: the buffer is readable.
    pub fn can_read(&self) -> bool {
        true
    }

    /// Always true: the buffer is writable.
    pub fn can_write(&self) -> bool {
        true
    }

    /// No-op; there is no backing store to synchronize.
    pub fn flush(&mut self) -> bool {
        true
    }

    #[cfg(test)]
    fn with_reported_size(mut self, size: i64) -> Self {
        self.size = size;
        self
    }
}

impl EditableStream for EditableBuffer {
    fn read(&mut self, buf: &mut [u8]) -> i64 {
        EditableBuffer::read(self, buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<i64> {
        EditableBuffer::write(self, data)
    }

    fn insert(&mut self, data: &[u8]) -> Result<i64> {
        EditableBuffer::insert(self, data)
    }

    fn update(&mut self, data: &[u8], replace_len: i64) -> Result<i64> {
        EditableBuffer::update(self, data, replace_len)
    }

    fn delete(&mut self, count: i64) -> i64 {
        EditableBuffer::delete(self, count)
    }

    fn flush(&mut self) -> bool {
        EditableBuffer::flush(self)
    }

    fn seek(&mut self, position: i64) -> Result<()> {
        EditableBuffer::seek(self, position)
    }

    fn can_read(&self) -> bool {
        EditableBuffer::can_read(self)
    }

    fn can_write(&self) -> bool {
        EditableBuffer::can_write(self)
    }

    fn position(&self) -> i64 {
        self.position
    }

    fn size(&self) -> i64 {
        self.size
    }

    fn set_size(&mut self, size: i64) -> Result<()> {
        EditableBuffer::set_size(self, size)
    }
}

fn to_io_error(error: Error) -> io::Error {
    match error {
        Error::Io(e) => e,
        Error::InvalidArgument(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
        other => io::Error::other(other),
    }
}

impl Read for EditableBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(EditableBuffer::read(self, buf) as usize)
    }
}

impl Write for EditableBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        EditableBuffer::write(self, buf)
            .map(|n| n as usize)
            .map_err(to_io_error)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for EditableBuffer {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => i64::try_from(offset).ok(),
            SeekFrom::End(offset) => self.size.checked_add(offset),
            SeekFrom::Current(offset) => self.position.checked_add(offset),
        }
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek position out of range")
        })?;
        EditableBuffer::seek(self, target).map_err(to_io_error)?;
        Ok(self.position as u64)
    }
}
