//! Record sinks: where an export's records end up.
//!
//! The pipeline opens one sink per run through a [`SinkFactory`]. The
//! default factory creates a [`DatasetWriter`] at the request's output path.

use std::path::Path;

use touchset_common::error::TouchsetResult;
use touchset_dataset_store::{DatasetWriter, RecordAttributes};
use touchset_processing_core::FrameTensor;

use crate::pipeline::ExportSettings;

/// Append-only destination for `(image, attributes)` records.
pub trait RecordSink: Send {
    /// Append one record. The first call fixes the image shape.
    fn write_record(
        &mut self,
        image: &FrameTensor,
        attributes: RecordAttributes,
    ) -> TouchsetResult<()>;

    /// Flush and close. Called exactly once per run, on every exit path.
    fn finalize(&mut self) -> TouchsetResult<()>;

    /// Records that will survive a crash right now.
    fn records_durable(&self) -> u64;
}

impl RecordSink for DatasetWriter {
    fn write_record(
        &mut self,
        image: &FrameTensor,
        attributes: RecordAttributes,
    ) -> TouchsetResult<()> {
        DatasetWriter::write_record(self, image, attributes)
    }

    fn finalize(&mut self) -> TouchsetResult<()> {
        DatasetWriter::finalize(self)
    }

    fn records_durable(&self) -> u64 {
        DatasetWriter::records_durable(self)
    }
}

/// Opens the sink for one run.
pub type SinkFactory =
    Box<dyn FnMut(&Path, &ExportSettings) -> TouchsetResult<Box<dyn RecordSink>> + Send>;

/// Default factory: a chunked dataset file at `path`.
pub fn create_dataset_writer(
    path: &Path,
    settings: &ExportSettings,
) -> TouchsetResult<Box<dyn RecordSink>> {
    let writer = DatasetWriter::create(path)?.with_chunk_records(settings.chunk_records);
    Ok(Box::new(writer))
}
