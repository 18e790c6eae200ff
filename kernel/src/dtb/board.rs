// SPDX-License-Identifier: MIT
//! Board identity, address decoding and the memory layout described by the tree.

use alloc::vec::Vec;

use super::property::Cells;
use super::{DeviceTree, NodeRef, Property, Region};

const DEFAULT_ADDRESS_CELLS: u32 = 2;
const DEFAULT_SIZE_CELLS: u32 = 1;

/// `(address, size)` pairs of a `reg` property.
#[derive(Clone)]
pub struct RegIter<'dt> {
    cells: Cells<'dt>,
    address_cells: u32,
    size_cells: u32,
}

impl Iterator for RegIter<'_> {
    type Item = Region;

    fn next(&mut self) -> Option<Region> {
        let base = self.cells.read(self.address_cells)?;
        let size = self.cells.read(self.size_cells)?;
        Some(Region { base, size })
    }
}

impl<'a, 'dt> NodeRef<'a, 'dt> {
    /// Cells per address in this node's children's `reg`.
    pub fn address_cells(&self) -> u32 {
        self.property("#address-cells")
            .and_then(|p| p.as_u32())
            .unwrap_or(DEFAULT_ADDRESS_CELLS)
    }

    /// Cells per size in this node's children's `reg`.
    pub fn size_cells(&self) -> u32 {
        self.property("#size-cells")
            .and_then(|p| p.as_u32())
            .unwrap_or(DEFAULT_SIZE_CELLS)
    }

    /// Decodes `reg` with the parent's cell sizes.
    ///
    /// `None` if there is no `reg`, if its length is not a whole number of entries, or if an
    /// address or size would need more than 64 bits.
    pub fn reg(&self) -> Option<RegIter<'dt>> {
        let reg = self.property("reg")?;
        let (address_cells, size_cells) = match self.parent() {
            Some(parent) => (parent.address_cells(), parent.size_cells()),
            None => (DEFAULT_ADDRESS_CELLS, DEFAULT_SIZE_CELLS),
        };

        if address_cells > 2 || size_cells > 2 {
            return None;
        }
        let entry = (address_cells + size_cells) as usize * 4;
        if entry == 0 || reg.len() % entry != 0 {
            return None;
        }

        Some(RegIter {
            cells: reg.cells(),
            address_cells,
            size_cells,
        })
    }

    /// Whether this is a RAM node: `device_type = "memory"`, or named `memory` for trees that
    /// leave the type out.
    pub fn is_memory(&self) -> bool {
        match self.property("device_type") {
            Some(ty) => ty.as_str() == Some("memory"),
            None => self.base_name() == "memory",
        }
    }
}

impl<'dt> DeviceTree<'dt> {
    pub fn board_model(&self) -> Option<&'dt str> {
        self.find_property("/model")?.as_str()
    }

    pub fn board_revision(&self) -> Option<u32> {
        self.find_property("/system/linux,revision")?.as_u32()
    }

    pub fn board_serial(&self) -> Option<u64> {
        self.find_property("/system/linux,serial")?.as_u64()
    }

    /// CPU physical address of the device `alias` names in `/aliases`.
    ///
    /// Takes the first `reg` entry of the aliased node and maps it through every ancestor's
    /// `ranges`.
    pub fn device_mmio_address(&self, alias: &str) -> Option<usize> {
        let path = self.find_property_in("/aliases", alias)?.as_str()?;
        let node = self.find_node(path)?;
        let local = node.reg()?.next()?;
        let address = translate(node, local.base)?;

        usize::try_from(address).ok()
    }

    /// Top-level memory nodes.
    pub fn memory_nodes(&self) -> impl Iterator<Item = NodeRef<'_, 'dt>> {
        self.root().children().filter(|n| n.is_memory())
    }

    /// Every RAM range of every memory node, in blob order.
    ///
    /// `None` if a memory node has no usable `reg`.
    pub fn memory_regions(&self) -> Option<Vec<Region>> {
        let mut regions = Vec::new();
        for node in self.memory_nodes() {
            regions.extend(node.reg()?);
        }

        Some(regions)
    }

    /// Ranges software must leave alone: the reservation block plus the `reg` of every
    /// `/reserved-memory` child.
    pub fn reserved_regions(&self) -> Vec<Region> {
        let mut regions: Vec<Region> = self.mem_reservations().collect();
        if let Some(reserved) = self.find_node("/reserved-memory") {
            for child in reserved.children() {
                if let Some(reg) = child.reg() {
                    regions.extend(reg);
                }
            }
        }

        regions
    }

    fn find_property_in(&self, node: &str, name: &str) -> Option<Property<'dt>> {
        self.find_node(node)?.property(name)
    }
}

/// Walks from `node` up to the root, mapping `address` through each bus's `ranges`.
fn translate(node: NodeRef<'_, '_>, mut address: u64) -> Option<u64> {
    let mut bus = node.parent()?;

    while let Some(parent) = bus.parent() {
        if let Some(ranges) = bus.property("ranges") {
            if !ranges.is_empty() {
                address = map_range(
                    ranges.cells(),
                    address,
                    bus.address_cells(),
                    parent.address_cells(),
                    bus.size_cells(),
                )?;
            }
        }
        bus = parent;
    }

    Some(address)
}

/// Finds the `(child, parent, size)` entry covering `address`.
fn map_range(
    mut cells: Cells<'_>,
    address: u64,
    child_cells: u32,
    parent_cells: u32,
    size_cells: u32,
) -> Option<u64> {
    // Zero-width entries would never consume a cell.
    if child_cells == 0 && parent_cells == 0 && size_cells == 0 {
        return None;
    }

    while cells.remaining() > 0 {
        let child = cells.read(child_cells)?;
        let parent = cells.read(parent_cells)?;
        let size = cells.read(size_cells)?;

        if address >= child && address - child < size {
            return parent.checked_add(address - child);
        }
    }

    None
}
