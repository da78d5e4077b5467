pub mod credentials;
pub mod flash_record;

pub use credentials::{CredentialStore, Credentials, CredentialsError};
pub use flash_record::FlashRecord;

use thiserror_no_std::Error;

/// Largest record any backend has to hold.
///
/// A full record is `ssid\npassword\n`: at most 32 + 1 + 64 + 1 = 98 bytes.
pub const RECORD_CAPACITY: usize = 128;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage I/O failed")]
    Io,
    #[error("record of {len} bytes exceeds capacity of {capacity}")]
    TooLarge { len: usize, capacity: usize },
    #[error("record header is corrupt")]
    Corrupt,
}

/// Durable storage holding exactly one opaque record.
///
/// The firmware backs this with a framed flash region ([`FlashRecord`]), the
/// simulator with a plain file.
pub trait RecordStorage {
    /// Copy the record into `buf`.
    ///
    /// Returns `Ok(None)` if no record has ever been written, otherwise the
    /// record length.
    fn read_record(&mut self, buf: &mut [u8]) -> Result<Option<usize>, StorageError>;

    /// Replace the record with `data`.
    fn write_record(&mut self, data: &[u8]) -> Result<(), StorageError>;
}

impl<T: RecordStorage + ?Sized> RecordStorage for &mut T {
    fn read_record(&mut self, buf: &mut [u8]) -> Result<Option<usize>, StorageError> {
        (**self).read_record(buf)
    }

    fn write_record(&mut self, data: &[u8]) -> Result<(), StorageError> {
        (**self).write_record(data)
    }
}
