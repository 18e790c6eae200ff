// SPDX-License-Identifier: MIT
use core::ops::Range;

use super::{Block, DeviceTreeError, Region};

/// Big-endian magic word at offset 0 of every flattened device tree.
pub const FDT_MAGIC: u32 = 0xd00d_feed;

/// Size of the ten-word header.
pub const HEADER_SIZE: usize = 40;

/// Newest layout this parser understands; `size_dt_struct` only exists from here on.
const SUPPORTED_VERSION: u32 = 17;

const RESERVATION_ENTRY_SIZE: usize = 16;

/// The fixed header of a flattened device tree, all fields host-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdtHeader {
    pub magic: u32,
    pub totalsize: u32,
    pub off_dt_struct: u32,
    pub off_dt_strings: u32,
    pub off_mem_rsvmap: u32,
    pub version: u32,
    pub last_comp_version: u32,
    pub boot_cpuid_phys: u32,
    pub size_dt_strings: u32,
    pub size_dt_struct: u32,
}

impl FdtHeader {
    /// Decodes the header and checks that every block it describes fits inside `blob`.
    pub fn read(blob: &[u8]) -> Result<Self, DeviceTreeError> {
        let word = |index: usize| be32(blob, index * 4).ok_or(DeviceTreeError::Truncated);

        let magic = word(0)?;
        if magic != FDT_MAGIC {
            return Err(DeviceTreeError::BadMagic(magic));
        }

        let header = Self {
            magic,
            totalsize: word(1)?,
            off_dt_struct: word(2)?,
            off_dt_strings: word(3)?,
            off_mem_rsvmap: word(4)?,
            version: word(5)?,
            last_comp_version: word(6)?,
            boot_cpuid_phys: word(7)?,
            size_dt_strings: word(8)?,
            size_dt_struct: word(9)?,
        };
        header.validate(blob.len())?;

        Ok(header)
    }

    fn validate(&self, available: usize) -> Result<(), DeviceTreeError> {
        if self.version < SUPPORTED_VERSION || self.last_comp_version > SUPPORTED_VERSION {
            return Err(DeviceTreeError::UnsupportedVersion {
                version: self.version,
                last_comp_version: self.last_comp_version,
            });
        }

        let total = self.totalsize as usize;
        if total < HEADER_SIZE || total > available {
            return Err(DeviceTreeError::Truncated);
        }

        check_block(Block::Structure, self.off_dt_struct, self.size_dt_struct, total)?;
        check_block(Block::Strings, self.off_dt_strings, self.size_dt_strings, total)?;

        let rsvmap = self.off_mem_rsvmap as usize;
        if rsvmap % 8 != 0 {
            return Err(DeviceTreeError::MisalignedBlock(Block::ReservationMap));
        }
        if rsvmap < HEADER_SIZE || rsvmap >= total {
            return Err(DeviceTreeError::BlockOutOfBounds(Block::ReservationMap));
        }
        if self.off_dt_struct % 4 != 0 {
            return Err(DeviceTreeError::MisalignedBlock(Block::Structure));
        }

        Ok(())
    }

    pub fn structure_range(&self) -> Range<usize> {
        let start = self.off_dt_struct as usize;
        start..start + self.size_dt_struct as usize
    }

    pub fn strings_range(&self) -> Range<usize> {
        let start = self.off_dt_strings as usize;
        start..start + self.size_dt_strings as usize
    }
}

fn check_block(block: Block, offset: u32, size: u32, total: usize) -> Result<(), DeviceTreeError> {
    let start = offset as usize;
    match start.checked_add(size as usize) {
        Some(end) if start >= HEADER_SIZE && end <= total => Ok(()),
        _ => Err(DeviceTreeError::BlockOutOfBounds(block)),
    }
}

/// Makes sure the `/memreserve/` list is terminated before the end of the blob.
pub(super) fn check_reservations(blob: &[u8], header: &FdtHeader) -> Result<(), DeviceTreeError> {
    let mut offset = header.off_mem_rsvmap as usize;
    loop {
        let (address, size) = reservation_at(blob, offset)
            .ok_or(DeviceTreeError::BlockOutOfBounds(Block::ReservationMap))?;
        if address == 0 && size == 0 {
            return Ok(());
        }
        offset += RESERVATION_ENTRY_SIZE;
    }
}

fn reservation_at(blob: &[u8], offset: usize) -> Option<(u64, u64)> {
    Some((be64(blob, offset)?, be64(blob, offset + 8)?))
}

/// Entries of the memory reservation block, in blob order.
pub struct Reservations<'dt> {
    blob: &'dt [u8],
    offset: usize,
}

impl<'dt> Reservations<'dt> {
    pub(super) fn new(blob: &'dt [u8], header: &FdtHeader) -> Self {
        Self {
            blob,
            offset: header.off_mem_rsvmap as usize,
        }
    }
}

impl Iterator for Reservations<'_> {
    type Item = Region;

    fn next(&mut self) -> Option<Region> {
        let (base, size) = reservation_at(self.blob, self.offset)?;
        if base == 0 && size == 0 {
            return None;
        }
        self.offset += RESERVATION_ENTRY_SIZE;

        Some(Region { base, size })
    }
}

/// Reads a big-endian word, `None` if it would run past the end of `bytes`.
pub(crate) fn be32(bytes: &[u8], offset: usize) -> Option<u32> {
    let raw = bytes.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

pub(crate) fn be64(bytes: &[u8], offset: usize) -> Option<u64> {
    let high = be32(bytes, offset)?;
    let low = be32(bytes, offset.checked_add(4)?)?;
    Some((u64::from(high) << 32) | u64::from(low))
}
