//! Touchset Export Engine
//!
//! Drives one export job: every frame in the requested range is decoded,
//! normalized, matched against the pointer log, labelled from the state
//! log snapshot and appended to the dataset store.
//!
//! # Pipeline Architecture
//!
//! ```text
//! video ──── Read ── Normalize ──┐
//!                                ├── Append ──> dataset.tsds
//! pointer.jsonl ── Match ────────┤
//!                                │
//! labels snapshot ── Label ──────┘
//!                                      │
//!                                      ▼
//!                          progress / terminal outcome
//! ```

pub mod handle;
pub mod labels;
pub mod pipeline;
pub mod progress;
pub mod sink;

pub use handle::{spawn_export, ExportHandle};
pub use labels::derive_labels;
pub use pipeline::{ExportPipeline, ExportRequest, ExportSettings};
pub use progress::{ExportEvent, ExportOutcome, ExportProgress, ExportState};
pub use sink::{create_dataset_writer, RecordSink, SinkFactory};
