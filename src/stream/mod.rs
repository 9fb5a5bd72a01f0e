//! Editable streams over document content.
//!
//! Protection engines read and rewrite document content through an
//! [`EditableStream`]: a random-access stream that, unlike a plain file,
//! can also insert and delete bytes at the cursor. [`EditableBuffer`] is the
//! in-memory implementation used when a document is loaded before it is
//! handed to the engine.
//!
//! # Example
//!
//! ```rust
//! use docseal::stream::{EditableBuffer, EditableStream};
//!
//! let mut buffer = EditableBuffer::new(b"Hello World".to_vec());
//! buffer.seek(6)?;
//! buffer.update(b"Rust", 5)?;
//! assert_eq!(buffer.as_bytes(), b"Hello Rust");
//! # Ok::<(), docseal::Error>(())
//! ```
//!
//! # Length Domain
//!
//! Positions and lengths are signed 64-bit values, matching the engine's
//! stream contract. Non-positive lengths are no-ops; only out-of-range
//! seeks and length overflow are errors.

mod buffer;

pub use buffer::EditableBuffer;

use crate::Result;

/// The stream contract that protection engines operate on.
///
/// All lengths and positions are signed 64-bit values. Implementations clamp
/// short reads and deletes at the end of the stream instead of failing.
pub trait EditableStream: Send {
    /// Reads up to `buf.len()` bytes at the cursor and advances it.
    ///
    /// Returns the number of bytes copied, which is zero at end of stream.
    fn read(&mut self, buf: &mut [u8]) -> i64;

    /// Overwrites forward from the cursor, growing the stream if needed.
    fn write(&mut self, data: &[u8]) -> Result<i64>;

    /// Inserts `data` at the cursor without overwriting, advancing the cursor
    /// past the inserted bytes.
    fn insert(&mut self, data: &[u8]) -> Result<i64>;

    /// Replaces `replace_len` bytes at the cursor with `data`.
    fn update(&mut self, data: &[u8], replace_len: i64) -> Result<i64>;

    /// Removes up to `count` bytes ahead of the cursor. The cursor does not move.
    fn delete(&mut self, count: i64) -> i64;

    /// Synchronizes with the backing store.
    fn flush(&mut self) -> bool;

    /// Moves the cursor to an absolute position in `0..=size`.
    fn seek(&mut self, position: i64) -> Result<()>;

    /// Returns true if the stream supports reading.
    fn can_read(&self) -> bool;

    /// Returns true if the stream supports writing.
    fn can_write(&self) -> bool;

    /// Returns the cursor position.
    fn position(&self) -> i64;

    /// Returns the stream length.
    fn size(&self) -> i64;

    /// Sets the stream length directly.
    fn set_size(&mut self, size: i64) -> Result<()>;
}
