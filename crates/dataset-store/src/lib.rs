//! Touchset Dataset Store
//!
//! Append-only binary store with two parallel channels, `images` and
//! `attributes`, written in chunks so a multi-minute export never holds
//! more than one chunk in memory.
//!
//! # File Layout
//!
//! ```text
//! "TSDS" u16 version
//! 'S' u32 len  <schema json>          written once, with the first record
//! 'C' u32 n    n x image  (f32 LE)    images channel
//!              n x [label, x, y]      attributes channel
//! 'C' ...
//! 'E' u64 total                       written by finalize
//! ```
//!
//! Both channels of a record live in the same chunk, so their record
//! counts can never diverge. Records in a partially written trailing chunk
//! (crash before finalize) are not considered durable.

pub mod format;
pub mod reader;
pub mod record;
pub mod writer;

pub use format::DatasetSchema;
pub use reader::DatasetReader;
pub use record::{MatchedPoint, RecordAttributes};
pub use writer::DatasetWriter;
