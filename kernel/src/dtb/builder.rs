// SPDX-License-Identifier: MIT
//! Assembles device tree blobs for tests.
//!
//! Layout: header, reservation map, structure block, strings block. Version 17, last
//! compatible 16. `finish` appends the `END` token itself.

use super::{FDT_MAGIC, HEADER_SIZE};

pub struct FdtBuilder {
    structure: Vec<u8>,
    strings: Vec<u8>,
    reservations: Vec<(u64, u64)>,
}

impl FdtBuilder {
    pub fn new() -> Self {
        Self {
            structure: Vec::new(),
            strings: Vec::new(),
            reservations: Vec::new(),
        }
    }

    pub fn begin_node(&mut self, name: &str) -> &mut Self {
        self.token(0x1);
        self.structure.extend_from_slice(name.as_bytes());
        self.structure.push(0);
        self.pad();
        self
    }

    pub fn end_node(&mut self) -> &mut Self {
        self.token(0x2)
    }

    pub fn nop(&mut self) -> &mut Self {
        self.token(0x4)
    }

    /// Emits any token word, valid or not.
    pub fn token(&mut self, token: u32) -> &mut Self {
        self.structure.extend_from_slice(&token.to_be_bytes());
        self
    }

    pub fn property(&mut self, name: &str, value: &[u8]) -> &mut Self {
        let name_offset = self.strings.len() as u32;
        self.strings.extend_from_slice(name.as_bytes());
        self.strings.push(0);
        self.raw_property(name_offset, value)
    }

    /// A property whose name offset is taken verbatim.
    pub fn raw_property(&mut self, name_offset: u32, value: &[u8]) -> &mut Self {
        self.token(0x3);
        self.structure
            .extend_from_slice(&(value.len() as u32).to_be_bytes());
        self.structure.extend_from_slice(&name_offset.to_be_bytes());
        self.structure.extend_from_slice(value);
        self.pad();
        self
    }

    pub fn prop_str(&mut self, name: &str, value: &str) -> &mut Self {
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        self.property(name, &bytes)
    }

    pub fn prop_u32(&mut self, name: &str, value: u32) -> &mut Self {
        self.prop_cells(name, &[value])
    }

    pub fn prop_cells(&mut self, name: &str, cells: &[u32]) -> &mut Self {
        let bytes: Vec<u8> = cells.iter().flat_map(|c| c.to_be_bytes()).collect();
        self.property(name, &bytes)
    }

    pub fn reserve(&mut self, base: u64, size: u64) -> &mut Self {
        self.reservations.push((base, size));
        self
    }

    pub fn finish(&self) -> Vec<u8> {
        let mut structure = self.structure.clone();
        structure.extend_from_slice(&0x9u32.to_be_bytes());

        let rsvmap_offset = HEADER_SIZE;
        let struct_offset = rsvmap_offset + (self.reservations.len() + 1) * 16;
        let strings_offset = struct_offset + structure.len();
        let total = strings_offset + self.strings.len();

        let header = [
            FDT_MAGIC,
            total as u32,
            struct_offset as u32,
            strings_offset as u32,
            rsvmap_offset as u32,
            17,
            16,
            0,
            self.strings.len() as u32,
            structure.len() as u32,
        ];

        let mut blob = Vec::with_capacity(total);
        for word in header {
            blob.extend_from_slice(&word.to_be_bytes());
        }
        for &(base, size) in self.reservations.iter().chain(&[(0, 0)]) {
            blob.extend_from_slice(&base.to_be_bytes());
            blob.extend_from_slice(&size.to_be_bytes());
        }
        blob.extend_from_slice(&structure);
        blob.extend_from_slice(&self.strings);

        blob
    }

    fn pad(&mut self) {
        while self.structure.len() % 4 != 0 {
            self.structure.push(0);
        }
    }
}
