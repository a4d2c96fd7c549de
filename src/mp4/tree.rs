//! ISO BMFF box traversal into an arena-backed tree.
//!
//! Boxes live in one contiguous node vector with index-based children;
//! [`BoxRef`] handles borrow the arena and the source slice. Container boxes
//! hold only parsed children, ordinary leaves expose their payload bytes, and
//! the bulk-data types (`mdat`, `free`, `skip`) record their size without
//! loading anything.

use crate::codec::ByteReader;
use crate::error::{Error, Result};
use crate::mp4::FourCC;

/// Largest leaf payload the tree will retain.
const MAX_RETAINED_PAYLOAD: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone)]
struct BoxNode {
    box_type: FourCC,
    offset: u64,
    size: u64,
    header_size: u8,
    /// Source range of the payload; `None` for containers and lazy boxes.
    payload: Option<(usize, usize)>,
    children: Vec<usize>,
}

/// Parsed box forest over a borrowed source buffer.
#[derive(Debug)]
pub struct BoxTree<'a> {
    source: &'a [u8],
    nodes: Vec<BoxNode>,
    roots: Vec<usize>,
}

/// Handle to one box in a [`BoxTree`].
#[derive(Clone, Copy)]
pub struct BoxRef<'t, 'a> {
    tree: &'t BoxTree<'a>,
    index: usize,
}

/// Parse all top-level boxes of `data`, recursing into containers.
pub fn read_boxes(data: &[u8]) -> Result<BoxTree<'_>> {
    if data.is_empty() {
        return Err(Error::invalid_mp4("empty input"));
    }
    let mut nodes = Vec::new();
    let roots = parse_scope(data, 0, data.len(), &mut nodes)?;
    #[cfg(feature = "tracing")]
    tracing::trace!(boxes = nodes.len(), roots = roots.len(), "parsed box tree");
    Ok(BoxTree {
        source: data,
        nodes,
        roots,
    })
}

/// Parse the boxes covering `[start, end)` of `data`.
///
/// Fewer than 8 leftover bytes at the end of the scope terminate the walk
/// without error; a committed header whose declared size overruns the scope
/// is reported.
fn parse_scope(
    data: &[u8],
    start: usize,
    end: usize,
    nodes: &mut Vec<BoxNode>,
) -> Result<Vec<usize>> {
    let mut indices = Vec::new();
    let mut pos = start;

    while pos + 8 <= end {
        let mut r = ByteReader::new(&data[pos..end]);
        let size32 = r.read_u32()?;
        let box_type = r.read_four_cc()?;

        let (size, header_size) = if size32 == 1 {
            if r.remaining() < 8 {
                return Err(Error::invalid_mp4("truncated header"));
            }
            (r.read_u64()?, 16u8)
        } else if size32 == 0 {
            // Box runs to the end of the enclosing scope.
            ((end - pos) as u64, 8u8)
        } else {
            (size32 as u64, 8u8)
        };

        if size < header_size as u64 {
            return Err(Error::invalid_mp4("truncated header"));
        }
        let box_end = pos as u64 + size;
        if box_end > end as u64 {
            return Err(Error::invalid_mp4("box size exceeds data"));
        }

        let index = nodes.len();
        nodes.push(BoxNode {
            box_type,
            offset: pos as u64,
            size,
            header_size,
            payload: None,
            children: Vec::new(),
        });

        let data_start = pos + header_size as usize;
        let data_end = box_end as usize;
        if box_type.is_container() {
            let children = parse_scope(data, data_start, data_end, nodes)?;
            nodes[index].children = children;
        } else if !box_type.is_lazy() {
            let payload_len = size - header_size as u64;
            if payload_len > MAX_RETAINED_PAYLOAD {
                return Err(Error::FileTooLarge(size));
            }
            nodes[index].payload = Some((data_start, data_end));
        }

        indices.push(index);
        pos = data_end;
    }

    Ok(indices)
}

impl<'a> BoxTree<'a> {
    /// Source buffer the tree was parsed from.
    pub fn source(&self) -> &'a [u8] {
        self.source
    }

    /// Total number of boxes in the tree.
    pub fn box_count(&self) -> usize {
        self.nodes.len()
    }

    /// Top-level boxes in file order.
    pub fn roots(&self) -> impl Iterator<Item = BoxRef<'_, 'a>> {
        self.roots.iter().map(move |&index| BoxRef { tree: self, index })
    }

    /// First top-level box of the given type.
    pub fn find_child(&self, box_type: FourCC) -> Option<BoxRef<'_, 'a>> {
        self.roots().find(|b| b.box_type() == box_type)
    }

    /// Resolve a slash-delimited path from the top level, e.g.
    /// `"moov/trak/mdia"`.
    pub fn find_by_path(&self, path: &str) -> Option<BoxRef<'_, 'a>> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let first = segments.next()?;
        let mut current = self.find_child(FourCC::new(first))?;
        for segment in segments {
            current = current.find_child(FourCC::new(segment))?;
        }
        Some(current)
    }

    /// All `trak` children of the `moov` box, in file order.
    pub fn tracks(&self) -> Vec<BoxRef<'_, 'a>> {
        match self.find_child(FourCC::MOOV) {
            Some(moov) => moov.find_children(FourCC::TRAK),
            None => Vec::new(),
        }
    }
}

impl<'t, 'a> BoxRef<'t, 'a> {
    fn node(&self) -> &'t BoxNode {
        &self.tree.nodes[self.index]
    }

    /// Four-character type of the box.
    pub fn box_type(&self) -> FourCC {
        self.node().box_type
    }

    /// Total size including the header.
    pub fn size(&self) -> u64 {
        self.node().size
    }

    /// Byte offset of the box within the source buffer.
    pub fn offset(&self) -> u64 {
        self.node().offset
    }

    /// Header size: 8, or 16 for extended-size boxes.
    pub fn header_size(&self) -> u8 {
        self.node().header_size
    }

    /// Offset of the first payload byte.
    pub fn data_offset(&self) -> u64 {
        self.node().offset + self.node().header_size as u64
    }

    /// Payload length.
    pub fn data_size(&self) -> u64 {
        self.node().size - self.node().header_size as u64
    }

    /// Payload bytes, when retained. Containers and the lazy set return
    /// `None`.
    pub fn payload(&self) -> Option<&'a [u8]> {
        self.node()
            .payload
            .map(|(start, end)| &self.tree.source[start..end])
    }

    /// Child boxes in file order.
    pub fn children(self) -> impl Iterator<Item = BoxRef<'t, 'a>> {
        let tree = self.tree;
        self.tree.nodes[self.index]
            .children
            .iter()
            .map(move |&index| BoxRef { tree, index })
    }

    /// First child of the given type.
    pub fn find_child(self, box_type: FourCC) -> Option<BoxRef<'t, 'a>> {
        self.children().find(|b| b.box_type() == box_type)
    }

    /// All children of the given type, in file order.
    pub fn find_children(self, box_type: FourCC) -> Vec<BoxRef<'t, 'a>> {
        self.children()
            .filter(|b| b.box_type() == box_type)
            .collect()
    }

    /// Resolve a slash-delimited path of child types below this box.
    pub fn find_by_path(self, path: &str) -> Option<BoxRef<'t, 'a>> {
        let mut current = self;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current.find_child(FourCC::new(segment))?;
        }
        Some(current)
    }
}

impl std::fmt::Debug for BoxRef<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxRef")
            .field("type", &self.box_type())
            .field("offset", &self.offset())
            .field("size", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{boxed, container, full_boxed};

    #[test]
    fn test_top_level_walk() {
        let mut data = Vec::new();
        data.extend_from_slice(&boxed(FourCC::FTYP, b"isom\x00\x00\x00\x00isomiso2"));
        data.extend_from_slice(&container(
            FourCC::MOOV,
            &[&full_boxed(FourCC::MVHD, 0, 0, &[0u8; 96])],
        ));
        data.extend_from_slice(&boxed(FourCC::MDAT, &[0xFF; 16]));

        let tree = read_boxes(&data).unwrap();
        let types: Vec<FourCC> = tree.roots().map(|b| b.box_type()).collect();
        assert_eq!(types, vec![FourCC::FTYP, FourCC::MOOV, FourCC::MDAT]);

        // mdat is lazy: size recorded, payload absent.
        let mdat = tree.find_child(FourCC::MDAT).unwrap();
        assert_eq!(mdat.size(), 24);
        assert!(mdat.payload().is_none());
        assert_eq!(mdat.data_size(), 16);

        // moov is a container: children parsed, payload absent.
        let moov = tree.find_child(FourCC::MOOV).unwrap();
        assert!(moov.payload().is_none());
        assert_eq!(moov.children().count(), 1);
    }

    #[test]
    fn test_extended_size_box() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(b"blob");
        data.extend_from_slice(&20u64.to_be_bytes());
        data.extend_from_slice(&[0xAB; 4]);

        let tree = read_boxes(&data).unwrap();
        let b = tree.roots().next().unwrap();
        assert_eq!(b.header_size(), 16);
        assert_eq!(b.size(), 20);
        assert_eq!(b.payload().unwrap().len(), 4);
    }

    #[test]
    fn test_zero_size_runs_to_scope_end() {
        let mut data = Vec::new();
        data.extend_from_slice(&boxed(FourCC::FTYP, b"isom\x00\x00\x00\x00"));
        data.extend_from_slice(&0u32.to_be_bytes());
        data.extend_from_slice(b"blob");
        data.extend_from_slice(&[0xCD; 10]);

        let tree = read_boxes(&data).unwrap();
        let b = tree.roots().nth(1).unwrap();
        assert_eq!(b.size(), 18);
        assert_eq!(b.payload().unwrap(), &[0xCD; 10]);
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(matches!(read_boxes(&[]), Err(Error::InvalidMp4(_))));
    }

    #[test]
    fn test_declared_size_overrun_rejected() {
        let mut data = Vec::new();
        data.extend_from_slice(&100u32.to_be_bytes());
        data.extend_from_slice(b"blob");
        data.extend_from_slice(&[0u8; 4]);
        match read_boxes(&data) {
            Err(Error::InvalidMp4(reason)) => assert_eq!(reason, "box size exceeds data"),
            other => panic!("expected InvalidMp4, got {other:?}"),
        }
    }

    #[test]
    fn test_size_smaller_than_header_rejected() {
        let mut data = Vec::new();
        data.extend_from_slice(&4u32.to_be_bytes());
        data.extend_from_slice(b"blob");
        data.extend_from_slice(&[0u8; 8]);
        match read_boxes(&data) {
            Err(Error::InvalidMp4(reason)) => assert_eq!(reason, "truncated header"),
            other => panic!("expected InvalidMp4, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_largesize_rejected() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(b"blob");
        data.extend_from_slice(&[0u8; 4]); // only half of the largesize field
        assert!(matches!(read_boxes(&data), Err(Error::InvalidMp4(_))));
    }

    #[test]
    fn test_trailing_short_bytes_tolerated() {
        let mut data = boxed(FourCC::FTYP, b"isom\x00\x00\x00\x00");
        data.extend_from_slice(&[0u8; 5]);
        let tree = read_boxes(&data).unwrap();
        assert_eq!(tree.roots().count(), 1);
    }

    #[test]
    fn test_find_by_path_composes_find_child() {
        let stbl = container(FourCC::STBL, &[&full_boxed(FourCC::STTS, 0, 0, &[0u8; 4])]);
        let minf = container(FourCC::MINF, &[&stbl]);
        let mdia = container(FourCC::MDIA, &[&minf]);
        let trak = container(FourCC::TRAK, &[&mdia]);
        let moov = container(FourCC::MOOV, &[&trak]);

        let tree = read_boxes(&moov).unwrap();
        let by_path = tree.find_by_path("moov/trak/mdia/minf/stbl/stts").unwrap();
        let by_steps = tree
            .find_child(FourCC::MOOV)
            .and_then(|b| b.find_child(FourCC::TRAK))
            .and_then(|b| b.find_child(FourCC::MDIA))
            .and_then(|b| b.find_child(FourCC::MINF))
            .and_then(|b| b.find_child(FourCC::STBL))
            .and_then(|b| b.find_child(FourCC::STTS))
            .unwrap();
        assert_eq!(by_path.offset(), by_steps.offset());
        assert_eq!(by_path.box_type(), FourCC::STTS);
    }

    #[test]
    fn test_tracks_helper() {
        let trak1 = container(FourCC::TRAK, &[]);
        let trak2 = container(FourCC::TRAK, &[]);
        let mvhd = full_boxed(FourCC::MVHD, 0, 0, &[0u8; 96]);
        let moov = container(FourCC::MOOV, &[&mvhd, &trak1, &trak2]);

        let tree = read_boxes(&moov).unwrap();
        assert_eq!(tree.tracks().len(), 2);
    }

    #[test]
    fn test_data_offset_and_size() {
        let data = boxed(FourCC::new("blob"), &[1, 2, 3, 4]);
        let tree = read_boxes(&data).unwrap();
        let b = tree.roots().next().unwrap();
        assert_eq!(b.offset(), 0);
        assert_eq!(b.data_offset(), 8);
        assert_eq!(b.data_size(), 4);
        assert_eq!(b.payload().unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_nested_zero_size_ends_at_parent() {
        // A udta container whose single child declares size 0: the child
        // must end at the container's payload end, not the buffer end.
        let mut child = Vec::new();
        child.extend_from_slice(&0u32.to_be_bytes());
        child.extend_from_slice(b"blob");
        child.extend_from_slice(&[0xEE; 6]);
        let udta = container(FourCC::UDTA, &[&child]);
        let mut data = udta;
        data.extend_from_slice(&boxed(FourCC::FREE, &[0u8; 8]));

        let tree = read_boxes(&data).unwrap();
        let udta = tree.find_child(FourCC::UDTA).unwrap();
        let blob = udta.children().next().unwrap();
        assert_eq!(blob.size(), 14);
        assert_eq!(blob.payload().unwrap(), &[0xEE; 6]);
        assert!(tree.find_child(FourCC::FREE).is_some());
    }
}
