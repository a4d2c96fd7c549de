//! Big-endian byte codec shared by the box reader and the fMP4 writer.

mod reader;
mod writer;

pub use reader::ByteReader;
pub use writer::{boxed, container, full_boxed, BoxMark, BoxWriter};
