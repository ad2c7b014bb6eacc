//! Zip/Zip64 archives and the deflate codec backing them (spec §4.4).
//!
//! Grounded on the teacher's `compression` crate (`zip`, `deflate`,
//! `huffman`, `bits` modules) and `crypto::checksum::crc`; reworked
//! against stable Rust (the teacher's originals lean on nightly
//! box-pattern matching and a build-time binary-format parser) and
//! against an explicit `ArchiveSource`/`Writeable` seam so the engine
//! never needs to know whether its bytes come from a real file or an
//! in-memory test fixture.

pub mod bits;
pub mod crc;
pub mod deflate;
pub mod huffman;
pub mod zip;

pub use crc::{crc32, Crc32};
pub use deflate::InflateSink;
pub use zip::{ArchiveReader, ArchiveSource, ArchiveWriter, CompressionMethod, ZipEntry};
