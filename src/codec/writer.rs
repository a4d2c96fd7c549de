//! Appending big-endian writer used to serialize ISO BMFF boxes.
//!
//! Wraps [`bytes::BytesMut`]. Box sizes that are unknown until the payload is
//! written (`moof`, `traf`) use open/close marks that backpatch the size
//! field; `trun` data offsets are patched the same way once the enclosing
//! `moof` size is known.

use bytes::{BufMut, BytesMut};

use crate::mp4::FourCC;

/// Growing big-endian byte writer with in-place patching.
#[derive(Debug, Default)]
pub struct BoxWriter {
    buf: BytesMut,
}

/// Marks an open box whose size is patched on close.
#[derive(Debug, Clone, Copy)]
#[must_use = "an open box must be closed to patch its size"]
pub struct BoxMark {
    start: usize,
}

impl BoxWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    /// Create a writer with a pre-sized buffer.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    pub fn count(&self) -> usize {
        self.buf.len()
    }

    /// The bytes written so far.
    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer, returning the assembled bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.buf.to_vec()
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.put_u16(v);
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.put_u32(v);
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.put_u64(v);
    }

    pub fn put_i32(&mut self, v: i32) {
        self.buf.put_i32(v);
    }

    pub fn put_i64(&mut self, v: i64) {
        self.buf.put_i64(v);
    }

    /// Write a four-character code.
    pub fn put_four_cc(&mut self, cc: FourCC) {
        self.buf.put_slice(cc.as_bytes());
    }

    /// Write a 16.16 fixed-point value.
    pub fn put_fixed_16_16(&mut self, v: f64) {
        self.buf.put_u32((v * 65536.0).round() as u32);
    }

    /// Write an 8.8 fixed-point value.
    pub fn put_fixed_8_8(&mut self, v: f64) {
        self.buf.put_u16((v * 256.0).round() as u16);
    }

    /// Write raw bytes.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Write `n` zero bytes.
    pub fn put_zeros(&mut self, n: usize) {
        self.buf.put_bytes(0, n);
    }

    /// Write a full-box version/flags word (flags are 24-bit).
    pub fn put_version_flags(&mut self, version: u8, flags: u32) {
        self.buf
            .put_u32(((version as u32) << 24) | (flags & 0x00FF_FFFF));
    }

    /// Begin a box: placeholder size + type. Close with [`Self::close_box`].
    pub fn open_box(&mut self, box_type: FourCC) -> BoxMark {
        let start = self.buf.len();
        self.buf.put_u32(0);
        self.buf.put_slice(box_type.as_bytes());
        BoxMark { start }
    }

    /// Begin a full box: placeholder size + type + version/flags.
    pub fn open_full_box(&mut self, box_type: FourCC, version: u8, flags: u32) -> BoxMark {
        let mark = self.open_box(box_type);
        self.put_version_flags(version, flags);
        mark
    }

    /// Close an open box, patching its size field to cover everything
    /// written since [`Self::open_box`].
    pub fn close_box(&mut self, mark: BoxMark) {
        let size = (self.buf.len() - mark.start) as u32;
        self.patch_u32(mark.start, size);
    }

    /// Write a complete box: size + type + payload.
    pub fn put_box(&mut self, box_type: FourCC, payload: &[u8]) {
        self.buf.put_u32((8 + payload.len()) as u32);
        self.buf.put_slice(box_type.as_bytes());
        self.buf.put_slice(payload);
    }

    /// Write a complete full box: size + type + version/flags + payload.
    pub fn put_full_box(&mut self, box_type: FourCC, version: u8, flags: u32, payload: &[u8]) {
        self.buf.put_u32((12 + payload.len()) as u32);
        self.buf.put_slice(box_type.as_bytes());
        self.put_version_flags(version, flags);
        self.buf.put_slice(payload);
    }

    /// Write a container box: size + type + concatenated children.
    pub fn put_container(&mut self, box_type: FourCC, children: &[&[u8]]) {
        let children_len: usize = children.iter().map(|c| c.len()).sum();
        self.buf.put_u32((8 + children_len) as u32);
        self.buf.put_slice(box_type.as_bytes());
        for child in children {
            self.buf.put_slice(child);
        }
    }

    /// Overwrite 4 bytes at `at` with the big-endian encoding of `v`.
    pub fn patch_u32(&mut self, at: usize, v: u32) {
        self.buf[at..at + 4].copy_from_slice(&v.to_be_bytes());
    }

    /// Overwrite 4 bytes at `at` with the big-endian encoding of `v`.
    pub fn patch_i32(&mut self, at: usize, v: i32) {
        self.buf[at..at + 4].copy_from_slice(&v.to_be_bytes());
    }
}

/// Assemble a complete box as owned bytes.
pub fn boxed(box_type: FourCC, payload: &[u8]) -> Vec<u8> {
    let mut w = BoxWriter::with_capacity(8 + payload.len());
    w.put_box(box_type, payload);
    w.into_vec()
}

/// Assemble a complete full box as owned bytes.
pub fn full_boxed(box_type: FourCC, version: u8, flags: u32, payload: &[u8]) -> Vec<u8> {
    let mut w = BoxWriter::with_capacity(12 + payload.len());
    w.put_full_box(box_type, version, flags, payload);
    w.into_vec()
}

/// Assemble a container box around child byte spans.
pub fn container(box_type: FourCC, children: &[&[u8]]) -> Vec<u8> {
    let mut w = BoxWriter::new();
    w.put_container(box_type, children);
    w.into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ByteReader;

    #[test]
    fn test_typed_round_trip() {
        let mut w = BoxWriter::new();
        w.put_u8(0xAB);
        w.put_u16(0x1234);
        w.put_u32(0xDEADBEEF);
        w.put_u64(0x0102030405060708);
        w.put_i32(-7);
        w.put_i64(-9_000_000_000);

        let mut r = ByteReader::new(w.data());
        assert_eq!(r.read_u8().unwrap(), 0xAB);
        assert_eq!(r.read_u16().unwrap(), 0x1234);
        assert_eq!(r.read_u32().unwrap(), 0xDEADBEEF);
        assert_eq!(r.read_u64().unwrap(), 0x0102030405060708);
        assert_eq!(r.read_i32().unwrap(), -7);
        assert_eq!(r.read_i64().unwrap(), -9_000_000_000);
        assert!(!r.has_remaining());
    }

    #[test]
    fn test_fixed_point_round_trip() {
        let mut w = BoxWriter::new();
        w.put_fixed_16_16(1920.0);
        w.put_fixed_16_16(1.5);
        w.put_fixed_8_8(1.25);

        let mut r = ByteReader::new(w.data());
        assert!((r.read_fixed_16_16().unwrap() - 1920.0).abs() < 1.0 / 65536.0);
        assert!((r.read_fixed_16_16().unwrap() - 1.5).abs() < 1.0 / 65536.0);
        assert!((r.read_fixed_8_8().unwrap() - 1.25).abs() < 1.0 / 256.0);
    }

    #[test]
    fn test_boxed_layout() {
        let b = boxed(FourCC::new("test"), &[1, 2, 3]);
        assert_eq!(b.len(), 11);
        assert_eq!(&b[0..4], &11u32.to_be_bytes());
        assert_eq!(&b[4..8], b"test");
        assert_eq!(&b[8..], &[1, 2, 3]);
    }

    #[test]
    fn test_full_boxed_layout() {
        let b = full_boxed(FourCC::MFHD, 0, 0x000007, &[0xAA]);
        assert_eq!(b.len(), 13);
        assert_eq!(&b[0..4], &13u32.to_be_bytes());
        assert_eq!(&b[4..8], b"mfhd");
        assert_eq!(&b[8..12], &0x00000007u32.to_be_bytes());
        assert_eq!(b[12], 0xAA);
    }

    #[test]
    fn test_container_layout() {
        let child1 = boxed(FourCC::new("ch_1"), &[0xAA]);
        let child2 = boxed(FourCC::new("ch_2"), &[0xBB, 0xCC]);
        let c = container(FourCC::new("cont"), &[&child1, &child2]);
        assert_eq!(c.len(), 27);
        assert_eq!(&c[0..4], &27u32.to_be_bytes());
        assert_eq!(&c[4..8], b"cont");
    }

    #[test]
    fn test_open_close_box_patches_size() {
        let mut w = BoxWriter::new();
        let mark = w.open_box(FourCC::MOOF);
        w.put_u32(0x11223344);
        w.put_zeros(4);
        w.close_box(mark);

        assert_eq!(&w.data()[0..4], &16u32.to_be_bytes());
        assert_eq!(&w.data()[4..8], b"moof");
    }

    #[test]
    fn test_patch_changes_only_four_bytes() {
        let mut w = BoxWriter::new();
        w.put_bytes(&[0x11; 16]);
        let before = w.data().to_vec();
        w.patch_i32(4, -2);

        assert_eq!(&w.data()[4..8], &(-2i32).to_be_bytes());
        assert_eq!(&w.data()[..4], &before[..4]);
        assert_eq!(&w.data()[8..], &before[8..]);
    }

    #[test]
    fn test_four_cc_padding_via_new() {
        let mut w = BoxWriter::new();
        w.put_four_cc(FourCC::new("url"));
        assert_eq!(w.data(), b"url ");
    }
}
