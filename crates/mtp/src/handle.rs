//! Object handles: a 32-bit value split into storage / folder / item fields,
//! with the item field derived from a filename CRC.
//!
//! The split is `storage 4 / folder 8 / item 20`, giving 16 volumes, 255
//! non-root folders per volume and about a million files per folder. The
//! widths here and the field declarations on [`ObjectHandle`] must agree;
//! the folder side-cache persists ordinals encoded with these masks.

use modular_bitfield::prelude::*;

pub const STORAGE_BITS: u32 = 4;
pub const FOLDER_BITS: u32 = 8;
pub const ITEM_BITS: u32 = 20;

pub const STORAGE_SHIFT: u32 = 32 - STORAGE_BITS;
pub const ITEM_MASK: u32 = (1 << ITEM_BITS) - 1;
pub const FOLDER_MASK: u32 = ((1 << FOLDER_BITS) - 1) << ITEM_BITS;
pub const STORAGE_MASK: u32 = !(FOLDER_MASK | ITEM_MASK);

/// Field view of a handle. All-ones folder bits mean "volume root"; item 0
/// addresses the folder itself.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHandle {
    pub item: B20,
    pub folder: B8,
    pub storage: B4,
}

impl From<u32> for ObjectHandle {
    fn from(raw: u32) -> Self {
        Self::from_bytes(raw.to_le_bytes())
    }
}

impl From<ObjectHandle> for u32 {
    fn from(h: ObjectHandle) -> u32 {
        u32::from_le_bytes(h.into_bytes())
    }
}

/// Storage id on the wire for the `index`-th volume.
pub fn storage_id(index: usize) -> u32 {
    (((index as u32) + 1) << 16) + 1
}

/// Inverse of [`storage_id`]; `None` for ids no volume can have produced.
pub fn drive_index(storage_id: u32) -> Option<usize> {
    (storage_id >> 16).checked_sub(1).map(|i| i as usize)
}

/// Handle of a volume's root directory.
pub fn root_handle(volume_index: usize) -> u32 {
    ((volume_index as u32) << STORAGE_SHIFT) | FOLDER_MASK
}

/// Handle of a directory listed at 1-based line `ordinal` of the volume's
/// folder cache.
pub fn dir_handle(volume_index: usize, ordinal: u32) -> u32 {
    ((volume_index as u32) << STORAGE_SHIFT) | (ordinal << ITEM_BITS)
}

pub fn volume_index(handle: u32) -> usize {
    (handle >> STORAGE_SHIFT) as usize
}

/// Nibble lookup table for the 0x04C11DB7 polynomial.
const CRC_TABLE: [u32; 16] = [
    0x00000000, 0x04C11DB7, 0x09823B6E, 0x0D4326D9, 0x130476DC, 0x17C56B6B, 0x1A864DB2, 0x1E475005,
    0x2608EDB8, 0x22C9F00F, 0x2F8AD6D6, 0x2B4BCB61, 0x350C9B64, 0x31CD86D3, 0x3C8EA00A, 0x384FBDBD,
];

/// CRC-32 the way the STM32 peripheral computes it: 32-bit words, MSB-first,
/// initial value all-ones, the tail zero-padded to a word boundary.
pub fn crc32(input: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for chunk in input.chunks(4) {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        crc ^= u32::from_le_bytes(word);
        for _ in 0..8 {
            crc = (crc << 4) ^ CRC_TABLE[(crc >> 28) as usize];
        }
    }
    crc
}

/// Item field for a filename. The reserved values 0 (the folder itself) and
/// all-ones (directory fence) collapse inward.
pub fn item_hash(name: &str) -> u32 {
    let mut item = crc32(name.as_bytes()) & ITEM_MASK;
    if item == 0 {
        item = 1;
    }
    if item == ITEM_MASK {
        item = ITEM_MASK - 1;
    }
    item
}
