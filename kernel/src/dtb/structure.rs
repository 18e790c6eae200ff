// SPDX-License-Identifier: MIT
//! Walks the structure block token by token and builds the node arena.

use alloc::vec::Vec;

use super::header::be32;
use super::property::Property;
use super::{DeviceTreeError, NodeId};

const FDT_BEGIN_NODE: u32 = 0x1;
const FDT_END_NODE: u32 = 0x2;
const FDT_PROP: u32 = 0x3;
const FDT_NOP: u32 = 0x4;
const FDT_END: u32 = 0x9;

pub(super) struct Node<'dt> {
    pub name: &'dt str,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub properties: Vec<Property<'dt>>,
}

impl<'dt> Node<'dt> {
    fn new(name: &'dt str, parent: Option<NodeId>) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            properties: Vec::new(),
        }
    }
}

/// Returns the nodes in blob order; index 0 is the root.
pub(super) fn parse<'dt>(
    structure: &'dt [u8],
    strings: &'dt [u8],
) -> Result<Vec<Node<'dt>>, DeviceTreeError> {
    let mut nodes: Vec<Node<'dt>> = Vec::new();
    let mut open: Vec<NodeId> = Vec::new();
    let mut offset = 0;

    loop {
        let token_offset = offset;
        let token = be32(structure, offset).ok_or(DeviceTreeError::MissingEnd)?;
        offset += 4;

        match token {
            FDT_BEGIN_NODE => {
                let name = c_str(structure, offset).ok_or(DeviceTreeError::BadName(offset))?;
                offset = align4(offset + name.len() + 1);

                let parent = open.last().copied();
                if parent.is_none() && !nodes.is_empty() {
                    return Err(DeviceTreeError::MultipleRoots);
                }

                let id = NodeId(nodes.len());
                nodes.push(Node::new(name, parent));
                if let Some(parent) = parent {
                    nodes[parent.0].children.push(id);
                }
                open.push(id);
            }
            FDT_END_NODE => {
                open.pop().ok_or(DeviceTreeError::UnbalancedNodes)?;
            }
            FDT_PROP => {
                let len = be32(structure, offset).ok_or(DeviceTreeError::Truncated)? as usize;
                let name_offset =
                    be32(structure, offset + 4).ok_or(DeviceTreeError::Truncated)? as usize;
                offset += 8;

                let value = offset
                    .checked_add(len)
                    .and_then(|end| structure.get(offset..end))
                    .ok_or(DeviceTreeError::Truncated)?;
                let name =
                    c_str(strings, name_offset).ok_or(DeviceTreeError::BadName(name_offset))?;
                let owner = open.last().ok_or(DeviceTreeError::PropertyOutsideNode)?;

                nodes[owner.0].properties.push(Property::new(name, value));
                offset = align4(offset + len);
            }
            FDT_NOP => {}
            FDT_END => {
                if !open.is_empty() {
                    return Err(DeviceTreeError::UnbalancedNodes);
                }
                if nodes.is_empty() {
                    return Err(DeviceTreeError::EmptyTree);
                }
                return Ok(nodes);
            }
            other => {
                return Err(DeviceTreeError::UnknownToken {
                    offset: token_offset,
                    token: other,
                })
            }
        }
    }
}

/// A NUL-terminated UTF-8 name starting at `offset`.
fn c_str(bytes: &[u8], offset: usize) -> Option<&str> {
    let tail = bytes.get(offset..)?;
    let len = tail.iter().position(|b| *b == 0)?;
    core::str::from_utf8(&tail[..len]).ok()
}

const fn align4(offset: usize) -> usize {
    (offset + 3) & !3
}
