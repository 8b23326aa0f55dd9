//! The inbound `ObjectInfo` dataset (`SendObjectInfo` data phase).
//!
//! The dataset is parsed from the fully accumulated data container, header
//! included, at the fixed offsets 15740 defines: format at 16, compressed
//! size at 20, then the filename string at 64 followed by the capture and
//! modification date strings.

use crate::datetime;
use crate::{ProtoError, Result};

const FORMAT_OFFSET: usize = 16;
const FILE_SIZE_OFFSET: usize = 20;
const FILE_NAME_OFFSET: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub format: u16,
    pub size: u32,
    pub name: String,
    pub created: Option<i64>,
    pub modified: Option<i64>,
}

/// Reads a PTP string: a count byte (characters including the terminator)
/// followed by that many UTF-16LE code units. Returns the string and the
/// offset just past it.
fn read_string(buf: &[u8], off: usize) -> Result<(String, usize)> {
    let count = *buf.get(off).ok_or(ProtoError::TruncatedDataset(off))? as usize;
    if count == 0 {
        return Ok((String::new(), off + 1));
    }
    let end = off + 1 + count * 2;
    if buf.len() < end {
        return Err(ProtoError::TruncatedDataset(buf.len()));
    }
    let units: Vec<u16> = buf[off + 1..end]
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();
    String::from_utf16(&units)
        .map(|s| (s, end))
        .map_err(|_| ProtoError::BadString(off))
}

pub fn parse_object_info(data: &[u8]) -> Result<ObjectInfo> {
    if data.len() < FILE_NAME_OFFSET + 1 {
        return Err(ProtoError::TruncatedDataset(data.len()));
    }
    let format = u16::from_le_bytes(data[FORMAT_OFFSET..FORMAT_OFFSET + 2].try_into().unwrap());
    let size = u32::from_le_bytes(
        data[FILE_SIZE_OFFSET..FILE_SIZE_OFFSET + 4]
            .try_into()
            .unwrap(),
    );
    let (name, off) = read_string(data, FILE_NAME_OFFSET)?;
    if name.is_empty() {
        return Err(ProtoError::BadString(FILE_NAME_OFFSET));
    }
    let (created, off) = read_string(data, off)?;
    let (modified, _) = read_string(data, off)?;

    Ok(ObjectInfo {
        format,
        size,
        name,
        created: datetime::parse_timestamp(&created),
        modified: datetime::parse_timestamp(&modified),
    })
}
