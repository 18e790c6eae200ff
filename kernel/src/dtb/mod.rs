// SPDX-License-Identifier: MIT
//! Flattened device tree.
//!
//! The firmware leaves a blob in RAM describing the board. [`DeviceTree::parse`] validates it
//! once and indexes every node; afterwards the tree is immutable and can be queried from any
//! core without locking. Names and values borrow from the blob, so the blob must outlive the
//! tree.

use alloc::vec::Vec;
use core::fmt;

mod board;
#[cfg(test)]
pub(crate) mod builder;
mod header;
mod property;
mod structure;

pub use board::RegIter;
pub use header::{FdtHeader, Reservations, FDT_MAGIC, HEADER_SIZE};
pub use property::{Cells, Property, PropertyKind};

use structure::Node;

//--------------------------------------------------------------------------------------------------
// Public definitions
//--------------------------------------------------------------------------------------------------

/// Which block of the blob a layout error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    Structure,
    Strings,
    ReservationMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceTreeError {
    /// No blob at the given address.
    NullPointer,
    BadMagic(u32),
    UnsupportedVersion { version: u32, last_comp_version: u32 },
    /// The buffer ends before the data the header or a token promises.
    Truncated,
    BlockOutOfBounds(Block),
    MisalignedBlock(Block),
    UnknownToken { offset: usize, token: u32 },
    /// A node name or property name that is unterminated or not UTF-8.
    BadName(usize),
    UnbalancedNodes,
    MultipleRoots,
    PropertyOutsideNode,
    MissingEnd,
    EmptyTree,
}

impl fmt::Display for DeviceTreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NullPointer => write!(f, "no device tree blob"),
            Self::BadMagic(magic) => write!(f, "bad magic {:#010x}", magic),
            Self::UnsupportedVersion {
                version,
                last_comp_version,
            } => write!(
                f,
                "unsupported version {} (last compatible {})",
                version, last_comp_version
            ),
            Self::Truncated => write!(f, "blob is truncated"),
            Self::BlockOutOfBounds(block) => write!(f, "{:?} block lies outside the blob", block),
            Self::MisalignedBlock(block) => write!(f, "{:?} block is misaligned", block),
            Self::UnknownToken { offset, token } => {
                write!(f, "unknown token {:#x} at structure offset {:#x}", token, offset)
            }
            Self::BadName(offset) => write!(f, "malformed name at offset {:#x}", offset),
            Self::UnbalancedNodes => write!(f, "unbalanced begin/end node tokens"),
            Self::MultipleRoots => write!(f, "more than one root node"),
            Self::PropertyOutsideNode => write!(f, "property outside of any node"),
            Self::MissingEnd => write!(f, "structure block has no end token"),
            Self::EmptyTree => write!(f, "structure block has no nodes"),
        }
    }
}

/// A physical address range as found in `reg` or the reservation map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub base: u64,
    pub size: u64,
}

impl Region {
    pub fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }
}

/// Index of a node inside its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

pub struct DeviceTree<'dt> {
    blob: &'dt [u8],
    header: FdtHeader,
    nodes: Vec<Node<'dt>>,
}

/// A node together with the tree it belongs to.
#[derive(Clone, Copy)]
pub struct NodeRef<'a, 'dt> {
    tree: &'a DeviceTree<'dt>,
    id: NodeId,
}

//--------------------------------------------------------------------------------------------------
// Public code
//--------------------------------------------------------------------------------------------------

/// Views the blob the firmware left at `addr`, sized by its own header.
///
/// # Safety
///
/// `addr` must point to readable memory holding a device tree blob that stays valid and
/// unmodified for `'a`.
pub unsafe fn blob_from_raw<'a>(addr: *const u8) -> Result<&'a [u8], DeviceTreeError> {
    if addr.is_null() {
        return Err(DeviceTreeError::NullPointer);
    }

    let head = core::slice::from_raw_parts(addr, HEADER_SIZE);
    let magic = header::be32(head, 0).ok_or(DeviceTreeError::Truncated)?;
    if magic != FDT_MAGIC {
        return Err(DeviceTreeError::BadMagic(magic));
    }

    let total = header::be32(head, 4).ok_or(DeviceTreeError::Truncated)? as usize;
    if total < HEADER_SIZE {
        return Err(DeviceTreeError::Truncated);
    }

    Ok(core::slice::from_raw_parts(addr, total))
}

impl<'dt> DeviceTree<'dt> {
    /// Validates `blob` and indexes its nodes. Bytes past `totalsize` are ignored.
    pub fn parse(blob: &'dt [u8]) -> Result<Self, DeviceTreeError> {
        let header = FdtHeader::read(blob)?;
        let blob = &blob[..header.totalsize as usize];
        header::check_reservations(blob, &header)?;

        let nodes = structure::parse(
            &blob[header.structure_range()],
            &blob[header.strings_range()],
        )?;

        Ok(Self {
            blob,
            header,
            nodes,
        })
    }

    pub fn header(&self) -> &FdtHeader {
        &self.header
    }

    /// The whole blob, `totalsize` bytes long.
    pub fn blob(&self) -> &'dt [u8] {
        self.blob
    }

    /// Where the blob itself lives in memory.
    pub fn blob_region(&self) -> Region {
        Region {
            base: self.blob.as_ptr() as usize as u64,
            size: self.blob.len() as u64,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn root(&self) -> NodeRef<'_, 'dt> {
        self.node(NodeId(0))
    }

    pub fn node(&self, id: NodeId) -> NodeRef<'_, 'dt> {
        NodeRef { tree: self, id }
    }

    /// Resolves an absolute path such as `/soc/serial@7e201000`, one segment at a time.
    ///
    /// Segments must match node names exactly, unit address included. `"/"` is the root.
    pub fn find_node(&self, path: &str) -> Option<NodeRef<'_, 'dt>> {
        let rest = path.strip_prefix('/')?;
        let mut node = self.root();
        if rest.is_empty() {
            return Some(node);
        }

        for segment in rest.split('/') {
            if segment.is_empty() {
                return None;
            }
            node = node.child(segment)?;
        }

        Some(node)
    }

    /// Looks up `/path/to/node/property`; the last segment names the property.
    pub fn find_property(&self, path: &str) -> Option<Property<'dt>> {
        let (node_path, name) = path.rsplit_once('/')?;
        if name.is_empty() {
            return None;
        }

        let node = if node_path.is_empty() {
            self.root()
        } else {
            self.find_node(node_path)?
        };

        node.property(name)
    }

    /// Entries of the blob's memory reservation block.
    pub fn mem_reservations(&self) -> Reservations<'dt> {
        Reservations::new(self.blob, &self.header)
    }

    fn entry(&self, id: NodeId) -> &Node<'dt> {
        &self.nodes[id.0]
    }
}

impl<'a, 'dt> NodeRef<'a, 'dt> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Full name, unit address included; empty for the root.
    pub fn name(&self) -> &'dt str {
        self.tree.entry(self.id).name
    }

    /// The name without its `@unit-address` suffix.
    pub fn base_name(&self) -> &'dt str {
        let name = self.name();
        name.split_once('@').map_or(name, |(base, _)| base)
    }

    pub fn unit_address(&self) -> Option<&'dt str> {
        self.name().split_once('@').map(|(_, unit)| unit)
    }

    pub fn parent(&self) -> Option<NodeRef<'a, 'dt>> {
        self.tree
            .entry(self.id)
            .parent
            .map(|id| self.tree.node(id))
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a, 'dt>> + 'a {
        let tree = self.tree;
        tree.entry(self.id)
            .children
            .iter()
            .map(move |id| tree.node(*id))
    }

    pub fn child(&self, name: &str) -> Option<NodeRef<'a, 'dt>> {
        self.children().find(|c| c.name() == name)
    }

    pub fn properties(&self) -> impl Iterator<Item = Property<'dt>> + 'a {
        let tree = self.tree;
        tree.entry(self.id).properties.iter().copied()
    }

    pub fn property(&self, name: &str) -> Option<Property<'dt>> {
        self.properties().find(|p| p.name() == name)
    }
}

impl fmt::Debug for NodeRef<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::builder::FdtBuilder;
    use super::*;

    fn test_board() -> Vec<u8> {
        let mut fdt = FdtBuilder::new();
        fdt.begin_node("")
            .prop_str("model", "Raspberry Pi 4 Model B")
            .begin_node("chosen")
            .prop_str("model", "test-board")
            .end_node()
            .begin_node("soc")
            .begin_node("serial@7e201000")
            .prop_str("compatible", "arm,pl011")
            .end_node()
            .end_node()
            .end_node();
        fdt.finish()
    }

    #[test]
    fn chosen_model_is_found() {
        let blob = test_board();
        let dt = DeviceTree::parse(&blob).unwrap();

        let model = dt.find_property("/chosen/model").unwrap();
        assert_eq!(model.len(), 11);
        assert_eq!(model.data(), b"test-board\0");
        assert_eq!(model.kind(), PropertyKind::String);
        assert!(dt.find_property("/chosen/missing").is_none());
    }

    #[test]
    fn root_properties_resolve() {
        let blob = test_board();
        let dt = DeviceTree::parse(&blob).unwrap();

        assert_eq!(
            dt.find_property("/model").and_then(|p| p.as_str()),
            Some("Raspberry Pi 4 Model B")
        );
        assert_eq!(dt.find_node("/").map(|n| n.id()), Some(dt.root().id()));
    }

    #[test]
    fn paths_resolve_exactly() {
        let blob = test_board();
        let dt = DeviceTree::parse(&blob).unwrap();

        assert!(dt.find_node("/soc/serial@7e201000").is_some());
        assert!(dt.find_node("/soc/serial").is_none());
        assert!(dt.find_node("/soc//serial@7e201000").is_none());
        assert!(dt.find_node("/soc/").is_none());
        assert!(dt.find_node("soc").is_none());
        assert!(dt.find_property("model").is_none());
        assert!(dt.find_property("/chosen/").is_none());
        assert!(dt.find_property("/nowhere/model").is_none());
    }

    #[test]
    fn nodes_link_to_parents_and_children() {
        let blob = test_board();
        let dt = DeviceTree::parse(&blob).unwrap();

        let names: Vec<_> = dt.root().children().map(|c| c.name()).collect();
        assert_eq!(names, ["chosen", "soc"]);

        let serial = dt.find_node("/soc/serial@7e201000").unwrap();
        assert_eq!(serial.base_name(), "serial");
        assert_eq!(serial.unit_address(), Some("7e201000"));
        assert_eq!(serial.parent().map(|p| p.name()), Some("soc"));
        assert!(dt.root().parent().is_none());
        assert_eq!(dt.node_count(), 4);
    }

    #[test]
    fn nop_tokens_are_skipped() {
        let mut fdt = FdtBuilder::new();
        fdt.nop()
            .begin_node("")
            .nop()
            .prop_u32("#address-cells", 1)
            .nop()
            .end_node()
            .nop();
        let blob = fdt.finish();
        let dt = DeviceTree::parse(&blob).unwrap();

        assert_eq!(dt.find_property("/#address-cells").and_then(|p| p.as_u32()), Some(1));
    }

    #[test]
    fn reservation_block_is_listed() {
        let mut fdt = FdtBuilder::new();
        fdt.reserve(0x0, 0x1000)
            .reserve(0x3b40_0000, 0x4c0_0000)
            .begin_node("")
            .end_node();
        let blob = fdt.finish();
        let dt = DeviceTree::parse(&blob).unwrap();

        let entries: Vec<_> = dt.mem_reservations().collect();
        assert_eq!(
            entries,
            [
                Region { base: 0, size: 0x1000 },
                Region { base: 0x3b40_0000, size: 0x4c0_0000 },
            ]
        );
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut blob = test_board();
        blob[0] = 0;

        assert_eq!(
            DeviceTree::parse(&blob).err(),
            Some(DeviceTreeError::BadMagic(0x000d_feed))
        );
    }

    #[test]
    fn short_buffer_is_rejected() {
        let blob = test_board();

        assert_eq!(
            DeviceTree::parse(&blob[..blob.len() - 1]).err(),
            Some(DeviceTreeError::Truncated)
        );
        assert_eq!(
            DeviceTree::parse(&blob[..12]).err(),
            Some(DeviceTreeError::Truncated)
        );
    }

    #[test]
    fn old_versions_are_rejected() {
        let mut blob = test_board();
        blob[20..24].copy_from_slice(&16u32.to_be_bytes());

        assert_eq!(
            DeviceTree::parse(&blob).err(),
            Some(DeviceTreeError::UnsupportedVersion {
                version: 16,
                last_comp_version: 16
            })
        );
    }

    #[test]
    fn strings_block_must_fit() {
        let mut blob = test_board();
        let len = blob.len() as u32;
        blob[32..36].copy_from_slice(&len.to_be_bytes());

        assert_eq!(
            DeviceTree::parse(&blob).err(),
            Some(DeviceTreeError::BlockOutOfBounds(Block::Strings))
        );
    }

    #[test]
    fn unknown_tokens_are_rejected() {
        let mut fdt = FdtBuilder::new();
        fdt.begin_node("").token(0x7).end_node();
        let blob = fdt.finish();

        assert!(matches!(
            DeviceTree::parse(&blob),
            Err(DeviceTreeError::UnknownToken { token: 0x7, .. })
        ));
    }

    #[test]
    fn token_stream_must_be_balanced() {
        let mut open = FdtBuilder::new();
        open.begin_node("").begin_node("chosen").end_node();
        assert_eq!(
            DeviceTree::parse(&open.finish()).err(),
            Some(DeviceTreeError::UnbalancedNodes)
        );

        let mut closed = FdtBuilder::new();
        closed.begin_node("").end_node().end_node();
        assert_eq!(
            DeviceTree::parse(&closed.finish()).err(),
            Some(DeviceTreeError::UnbalancedNodes)
        );

        let mut twice = FdtBuilder::new();
        twice.begin_node("").end_node().begin_node("").end_node();
        assert_eq!(
            DeviceTree::parse(&twice.finish()).err(),
            Some(DeviceTreeError::MultipleRoots)
        );

        let mut stray = FdtBuilder::new();
        stray.prop_u32("orphan", 1).begin_node("").end_node();
        assert_eq!(
            DeviceTree::parse(&stray.finish()).err(),
            Some(DeviceTreeError::PropertyOutsideNode)
        );

        let empty = FdtBuilder::new();
        assert_eq!(
            DeviceTree::parse(&empty.finish()).err(),
            Some(DeviceTreeError::EmptyTree)
        );
    }

    #[test]
    fn property_names_must_lie_in_the_strings_block() {
        let mut fdt = FdtBuilder::new();
        fdt.begin_node("").raw_property(0x1000, &[0, 0, 0, 1]).end_node();

        assert_eq!(
            DeviceTree::parse(&fdt.finish()).err(),
            Some(DeviceTreeError::BadName(0x1000))
        );
    }

    #[test]
    fn raw_pointer_is_sized_by_header() {
        let mut blob = test_board();
        let len = blob.len();
        blob.extend_from_slice(&[0xff; 64]);

        let view = unsafe { blob_from_raw(blob.as_ptr()) }.unwrap();
        assert_eq!(view.len(), len);
        assert!(DeviceTree::parse(view).is_ok());

        assert_eq!(
            unsafe { blob_from_raw(core::ptr::null()) }.err(),
            Some(DeviceTreeError::NullPointer)
        );
    }

    #[test]
    fn blob_region_covers_the_blob() {
        let blob = test_board();
        let dt = DeviceTree::parse(&blob).unwrap();
        let region = dt.blob_region();

        assert_eq!(region.base, blob.as_ptr() as u64);
        assert_eq!(region.size, blob.len() as u64);
        assert_eq!(dt.header().totalsize as usize, blob.len());
    }

    #[test]
    fn errors_render_for_logs() {
        assert_eq!(
            DeviceTreeError::BadMagic(0x1234).to_string(),
            "bad magic 0x00001234"
        );
        assert_eq!(
            DeviceTreeError::BlockOutOfBounds(Block::Strings).to_string(),
            "Strings block lies outside the blob"
        );
    }
}
