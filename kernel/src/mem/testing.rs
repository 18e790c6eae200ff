// SPDX-License-Identifier: MIT
//! Host stand-ins for physical RAM and the board's device tree.

use std::alloc::{alloc_zeroed, Layout};

use crate::dtb::builder::FdtBuilder;
use crate::dtb::{DeviceTree, Region};
use crate::mem::{KernelLayout, MemoryManager, PAGE_SIZE};

/// Page-aligned host memory playing the part of RAM. Leaked, since the frame pool keeps a
/// `'static` bitmap inside it.
pub struct Ram {
    pub base: usize,
    pub pages: usize,
}

impl Ram {
    pub fn new(pages: usize) -> Self {
        let layout = Layout::from_size_align(pages * PAGE_SIZE, PAGE_SIZE).unwrap();
        let ptr = unsafe { alloc_zeroed(layout) };
        assert!(!ptr.is_null());

        Self {
            base: ptr as usize,
            pages,
        }
    }

    pub fn page(&self, index: usize) -> usize {
        self.base + index * PAGE_SIZE
    }

    pub fn region(&self, first: usize, count: usize) -> Region {
        Region {
            base: self.page(first) as u64,
            size: (count * PAGE_SIZE) as u64,
        }
    }

    /// Two pages of kernel image followed by a two page heap window; the pool starts at page 4.
    pub fn layout(&self) -> KernelLayout {
        KernelLayout::new(self.page(0), self.page(2), 2 * PAGE_SIZE)
    }
}

fn reg_cells(regions: &[Region]) -> Vec<u32> {
    regions
        .iter()
        .flat_map(|r| [(r.base >> 32) as u32, r.base as u32, (r.size >> 32) as u32, r.size as u32])
        .collect()
}

/// A tree with one memory node covering `ram`, plus optional reservations of both kinds.
pub fn memory_tree(ram: &[Region], reserved_nodes: &[Region], rsvmap: &[Region]) -> Vec<u8> {
    let mut fdt = FdtBuilder::new();
    for r in rsvmap {
        fdt.reserve(r.base, r.size);
    }

    fdt.begin_node("")
        .prop_u32("#address-cells", 2)
        .prop_u32("#size-cells", 2)
        .prop_str("model", "host test board");

    fdt.begin_node("reserved-memory")
        .prop_u32("#address-cells", 2)
        .prop_u32("#size-cells", 2);
    for (i, r) in reserved_nodes.iter().enumerate() {
        fdt.begin_node(&format!("area@{}", i))
            .prop_cells("reg", &reg_cells(&[*r]))
            .end_node();
    }
    fdt.end_node();

    fdt.begin_node("memory@0")
        .prop_str("device_type", "memory")
        .prop_cells("reg", &reg_cells(ram))
        .end_node()
        .end_node();

    fdt.finish()
}

/// A manager brought up over all of `ram` with [`Ram::layout`].
pub fn booted(ram: &Ram) -> MemoryManager {
    let blob = memory_tree(&[ram.region(0, ram.pages)], &[], &[]);
    let dt = DeviceTree::parse(&blob).unwrap();
    let manager = MemoryManager::new();

    unsafe {
        manager.init_heap(ram.layout()).unwrap();
        manager.init(&dt).unwrap();
    }

    manager
}
