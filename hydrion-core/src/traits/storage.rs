//! Configuration storage abstraction
//!
//! Path-keyed text storage for configuration documents. Operations are
//! blocking; the driver runs to completion on the caller's thread.

/// Errors from storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// No file at the given path
    NotFound,
    /// Buffer too small for the stored data
    BufferTooSmall,
    /// Read failed
    ReadFailed,
    /// Write failed
    WriteFailed,
}

/// Named-file storage for configuration text
pub trait ConfigStorage {
    /// Check whether a file exists at `path`
    fn exists(&mut self, path: &str) -> bool;

    /// Read the file at `path` into `buf`
    ///
    /// Returns the number of bytes read.
    fn read(&mut self, path: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write `data` to `path`, replacing any previous contents
    fn write(&mut self, path: &str, data: &[u8]) -> Result<(), StorageError>;
}
