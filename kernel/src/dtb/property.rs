// SPDX-License-Identifier: MIT
use core::slice::ChunksExact;

/// How a property value reads, inferred from its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// One or more NUL-terminated printable strings.
    String,
    /// A whole number of big-endian 32-bit cells; includes empty properties.
    CellArray,
    Opaque,
}

/// A named value attached to a node, borrowing straight from the blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Property<'dt> {
    name: &'dt str,
    data: &'dt [u8],
    kind: PropertyKind,
}

impl<'dt> Property<'dt> {
    pub(super) fn new(name: &'dt str, data: &'dt [u8]) -> Self {
        Self {
            name,
            data,
            kind: classify(data),
        }
    }

    pub fn name(&self) -> &'dt str {
        self.name
    }

    /// The raw value exactly as stored in the blob.
    pub fn data(&self) -> &'dt [u8] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    /// The first string of a string property.
    pub fn as_str(&self) -> Option<&'dt str> {
        self.strings().next()
    }

    /// Every string of a string list such as `compatible`; empty for other kinds.
    pub fn strings(&self) -> impl Iterator<Item = &'dt str> {
        let list = match self.kind {
            PropertyKind::String => &self.data[..self.data.len() - 1],
            _ => &[][..],
        };

        list.split(|b| *b == 0)
            .filter(|s| !s.is_empty())
            .filter_map(|s| core::str::from_utf8(s).ok())
    }

    /// The value as big-endian cells; a trailing partial cell is ignored.
    pub fn cells(&self) -> Cells<'dt> {
        Cells {
            chunks: self.data.chunks_exact(4),
        }
    }

    /// A property holding exactly one cell.
    pub fn as_u32(&self) -> Option<u32> {
        match self.data.len() {
            4 => self.cells().next(),
            _ => None,
        }
    }

    /// A one- or two-cell property, widened to 64 bits.
    pub fn as_u64(&self) -> Option<u64> {
        let mut cells = self.cells();
        match self.data.len() {
            4 => cells.read(1),
            8 => cells.read(2),
            _ => None,
        }
    }
}

fn classify(data: &[u8]) -> PropertyKind {
    if looks_like_strings(data) {
        PropertyKind::String
    } else if data.len() % 4 == 0 {
        PropertyKind::CellArray
    } else {
        PropertyKind::Opaque
    }
}

fn looks_like_strings(data: &[u8]) -> bool {
    let Some((&0, body)) = data.split_last() else {
        return false;
    };

    body.split(|b| *b == 0)
        .all(|s| !s.is_empty() && s.iter().all(|b| (0x20..0x7f).contains(b)))
}

/// Big-endian 32-bit cells of a property value.
#[derive(Clone)]
pub struct Cells<'dt> {
    chunks: ChunksExact<'dt, u8>,
}

impl Cells<'_> {
    /// Folds the next `count` cells into one number, most significant first.
    ///
    /// Returns `None` for more than two cells or when the value runs out.
    pub fn read(&mut self, count: u32) -> Option<u64> {
        if count > 2 {
            return None;
        }

        let mut value = 0u64;
        for _ in 0..count {
            value = (value << 32) | u64::from(self.next()?);
        }

        Some(value)
    }

    pub fn remaining(&self) -> usize {
        self.chunks.len()
    }
}

impl Iterator for Cells<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        self.chunks
            .next()
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}
