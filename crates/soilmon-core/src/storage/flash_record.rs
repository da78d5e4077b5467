use embedded_storage::Storage;
use heapless::Vec;
use log::{debug, error};

use super::{RECORD_CAPACITY, RecordStorage, StorageError};

/// Marks a written record. Erased flash reads back as `0xFF`.
const MAGIC: [u8; 4] = *b"SOIL";

/// Magic followed by the little-endian payload length.
const HEADER_LEN: usize = 6;

/// A single length-prefixed record at a fixed offset of a flash device.
///
/// Binary format:
/// - magic: 4 bytes (`SOIL`)
/// - length: 2 bytes (u16, little-endian)
/// - payload: `length` bytes, at most [`RECORD_CAPACITY`]
///
/// Writes go through [`Storage::write`], which on `esp-storage` performs the
/// sector read-modify-erase-write itself. A write is not transactional: power
/// loss mid-write can leave a record that fails the magic check, which reads
/// back as "no record".
pub struct FlashRecord<S> {
    flash: S,
    offset: u32,
}

impl<S: Storage> FlashRecord<S> {
    pub const fn new(flash: S, offset: u32) -> Self {
        Self { flash, offset }
    }
}

impl<S: Storage> RecordStorage for FlashRecord<S> {
    fn read_record(&mut self, buf: &mut [u8]) -> Result<Option<usize>, StorageError> {
        let mut header = [0u8; HEADER_LEN];
        self.flash.read(self.offset, &mut header).map_err(|_| {
            error!("Flash read of record header failed");
            StorageError::Io
        })?;

        if header[..4] != MAGIC {
            debug!("No record at flash offset {:#x}", self.offset);
            return Ok(None);
        }

        let len = u16::from_le_bytes([header[4], header[5]]) as usize;
        if len > RECORD_CAPACITY || len > buf.len() {
            return Err(StorageError::Corrupt);
        }

        self.flash
            .read(self.offset + HEADER_LEN as u32, &mut buf[..len])
            .map_err(|_| {
                error!("Flash read of record payload failed");
                StorageError::Io
            })?;

        Ok(Some(len))
    }

    fn write_record(&mut self, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > RECORD_CAPACITY {
            return Err(StorageError::TooLarge {
                len: data.len(),
                capacity: RECORD_CAPACITY,
            });
        }

        let mut frame: Vec<u8, { HEADER_LEN + RECORD_CAPACITY }> = Vec::new();
        // Capacity is checked above, these cannot overflow.
        let _ = frame.extend_from_slice(&MAGIC);
        let _ = frame.extend_from_slice(&(data.len() as u16).to_le_bytes());
        let _ = frame.extend_from_slice(data);

        self.flash.write(self.offset, &frame).map_err(|_| {
            error!("Flash write of record failed");
            StorageError::Io
        })
    }
}
