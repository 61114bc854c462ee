//! Reading IFD entry values, inline or at an offset.
//!
//! Array values such as TileOffsets are fetched with a single range read.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{IfdEntry, TiffHeader};
use super::tags::FieldType;

/// Reads tag values respecting the file's byte order and offset width.
pub struct ValueReader<'a, R: RangeReader + ?Sized> {
    reader: &'a R,
    header: &'a TiffHeader,
}

impl<'a, R: RangeReader + ?Sized> ValueReader<'a, R> {
    pub fn new(reader: &'a R, header: &'a TiffHeader) -> Self {
        Self { reader, header }
    }

    /// Raw bytes of an entry's value.
    pub async fn read_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        if entry.field_type.is_none() {
            return Err(TiffError::UnknownFieldType(entry.field_type_raw));
        }
        let size = entry
            .value_byte_size()
            .filter(|&size| entry.is_inline || size <= self.reader.size())
            .ok_or(TiffError::CountTooLarge {
                what: "value",
                count: entry.count,
            })?;

        if entry.is_inline {
            return Ok(Bytes::copy_from_slice(
                &entry.value_offset_bytes[..size as usize],
            ));
        }

        let offset = entry.value_offset(self.header.byte_order, self.header.is_bigtiff);
        Ok(self.reader.read_exact_at(offset, size as usize).await?)
    }

    /// Read an integer array (Short, Long or Long8), widened to u64.
    pub async fn read_u64_array(
        &self,
        entry: &IfdEntry,
        tag: &'static str,
    ) -> Result<Vec<u64>, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;
        if entry.count == 0 {
            return Ok(Vec::new());
        }

        let width = match field_type {
            FieldType::Short | FieldType::Long | FieldType::Long8 => field_type.size_in_bytes(),
            other => {
                return Err(TiffError::InvalidTagValue {
                    tag,
                    message: format!("expected an integer array, got {other:?}"),
                })
            }
        };

        let bytes = self.read_bytes(entry).await?;
        let order = self.header.byte_order;

        Ok(bytes
            .chunks_exact(width)
            .map(|chunk| match field_type {
                FieldType::Short => order.read_u16(chunk) as u64,
                FieldType::Long => order.read_u32(chunk) as u64,
                _ => order.read_u64(chunk),
            })
            .collect())
    }

    /// Read an ASCII value, stopping at the first NUL.
    pub async fn read_string(
        &self,
        entry: &IfdEntry,
        tag: &'static str,
    ) -> Result<String, TiffError> {
        if entry.field_type != Some(FieldType::Ascii) {
            return Err(TiffError::InvalidTagValue {
                tag,
                message: format!("expected Ascii, got type {}", entry.field_type_raw),
            });
        }

        let bytes = self.read_bytes(entry).await?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}
