//! Append-only chunked dataset writer.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use touchset_common::error::{TouchsetError, TouchsetResult};
use touchset_processing_core::FrameTensor;

use crate::format::{
    encode_attributes, extend_f32_le, DatasetSchema, ATTRIBUTE_LEN, FORMAT_VERSION, MAGIC,
    TAG_CHUNK, TAG_END, TAG_SCHEMA,
};
use crate::record::RecordAttributes;

pub const DEFAULT_CHUNK_RECORDS: usize = 64;

/// Writes `(image, attributes)` records to a dataset file.
///
/// One writer owns one file for one export; nothing is shared between
/// writers. Records are buffered into a chunk of at most `chunk_records`
/// and written as a unit.
pub struct DatasetWriter {
    writer: Option<BufWriter<File>>,
    path: PathBuf,
    schema: Option<DatasetSchema>,
    chunk_records: usize,
    pending_images: Vec<f32>,
    pending_attributes: Vec<f32>,
    pending_records: usize,
    records_written: u64,
    records_durable: u64,
    chunks_written: u64,
}

impl DatasetWriter {
    /// Create (or truncate) the dataset file at `path`.
    pub fn create(path: impl AsRef<Path>) -> TouchsetResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                TouchsetError::dataset(format!("Cannot create {}: {e}", parent.display()))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| TouchsetError::dataset(format!("Cannot create {}: {e}", path.display())))?;

        let mut writer = BufWriter::new(file);
        writer
            .write_all(MAGIC)
            .and_then(|_| writer.write_all(&FORMAT_VERSION.to_le_bytes()))
            .map_err(|e| TouchsetError::dataset(format!("Failed to write header: {e}")))?;

        Ok(Self {
            writer: Some(writer),
            path,
            schema: None,
            chunk_records: DEFAULT_CHUNK_RECORDS,
            pending_images: Vec::new(),
            pending_attributes: Vec::new(),
            pending_records: 0,
            records_written: 0,
            records_durable: 0,
            chunks_written: 0,
        })
    }

    /// Records per chunk (minimum 1).
    pub fn with_chunk_records(mut self, chunk_records: usize) -> Self {
        self.chunk_records = chunk_records.max(1);
        self
    }

    /// Fix the schema from the first record and append it.
    ///
    /// The tensor shape is permanent for the life of the store.
    pub fn initialize_schema(
        &mut self,
        first_image: &FrameTensor,
        first_attributes: RecordAttributes,
    ) -> TouchsetResult<()> {
        if self.schema.is_some() {
            return Err(TouchsetError::dataset("Schema already initialized"));
        }
        let schema = DatasetSchema::for_side(first_image.side());
        let json = serde_json::to_vec(&schema)?;

        let writer = self.open_writer()?;
        let mut block = Vec::with_capacity(json.len() + 5);
        block.push(TAG_SCHEMA);
        block.extend_from_slice(&(json.len() as u32).to_le_bytes());
        block.extend_from_slice(&json);
        writer
            .write_all(&block)
            .and_then(|_| writer.flush())
            .map_err(|e| TouchsetError::dataset(format!("Failed to write schema: {e}")))?;

        tracing::debug!(
            path = %self.path.display(),
            image_len = schema.image_len(),
            "Dataset schema initialized"
        );

        self.pending_images.reserve(schema.image_len() * self.chunk_records);
        self.pending_attributes.reserve(ATTRIBUTE_LEN * self.chunk_records);
        self.schema = Some(schema);
        self.push_record(first_image, first_attributes)
    }

    /// Append one record. Fails if the image shape differs from the schema.
    pub fn append(
        &mut self,
        image: &FrameTensor,
        attributes: RecordAttributes,
    ) -> TouchsetResult<()> {
        let schema = self
            .schema
            .as_ref()
            .ok_or_else(|| TouchsetError::dataset("append before initialize_schema"))?;
        if image.len() != schema.image_len() {
            return Err(TouchsetError::SchemaMismatch {
                expected: schema.image_len(),
                actual: image.len(),
            });
        }
        self.push_record(image, attributes)
    }

    /// Initialize the schema on the first call, append afterwards.
    pub fn write_record(
        &mut self,
        image: &FrameTensor,
        attributes: RecordAttributes,
    ) -> TouchsetResult<()> {
        if self.schema.is_none() {
            self.initialize_schema(image, attributes)
        } else {
            self.append(image, attributes)
        }
    }

    fn push_record(
        &mut self,
        image: &FrameTensor,
        attributes: RecordAttributes,
    ) -> TouchsetResult<()> {
        self.open_writer()?;
        self.pending_images.extend_from_slice(image.as_slice());
        self.pending_attributes.extend_from_slice(&encode_attributes(&attributes));
        self.pending_records += 1;
        self.records_written += 1;

        if self.pending_records >= self.chunk_records {
            self.flush_chunk()?;
        }
        Ok(())
    }

    /// Write the pending chunk, if any, and flush it to the OS.
    pub fn flush_chunk(&mut self) -> TouchsetResult<()> {
        if self.pending_records == 0 {
            return Ok(());
        }

        let mut block = Vec::with_capacity(
            5 + (self.pending_images.len() + self.pending_attributes.len()) * 4,
        );
        block.push(TAG_CHUNK);
        block.extend_from_slice(&(self.pending_records as u32).to_le_bytes());
        extend_f32_le(&mut block, &self.pending_images);
        extend_f32_le(&mut block, &self.pending_attributes);

        let records = self.pending_records;
        self.pending_images.clear();
        self.pending_attributes.clear();
        self.pending_records = 0;

        let writer = self.open_writer()?;
        writer
            .write_all(&block)
            .and_then(|_| writer.flush())
            .map_err(|e| TouchsetError::dataset(format!("Failed to write chunk: {e}")))?;

        self.records_durable += records as u64;
        self.chunks_written += 1;
        Ok(())
    }

    /// Flush, write the trailer and close. Safe to call more than once.
    pub fn finalize(&mut self) -> TouchsetResult<()> {
        if self.writer.is_none() {
            return Ok(());
        }

        let flushed = self.flush_chunk();
        // Closed from here on, whatever happens below.
        let Some(mut writer) = self.writer.take() else {
            return flushed;
        };
        flushed?;

        let mut trailer = Vec::with_capacity(9);
        trailer.push(TAG_END);
        trailer.extend_from_slice(&self.records_durable.to_le_bytes());
        writer
            .write_all(&trailer)
            .and_then(|_| writer.flush())
            .and_then(|_| writer.get_ref().sync_all())
            .map_err(|e| TouchsetError::dataset(format!("Failed to finalize dataset: {e}")))?;

        tracing::info!(
            path = %self.path.display(),
            records = self.records_durable,
            chunks = self.chunks_written,
            "Dataset finalized"
        );
        Ok(())
    }

    fn open_writer(&mut self) -> TouchsetResult<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| TouchsetError::dataset("Dataset already finalized"))
    }

    pub fn is_finalized(&self) -> bool {
        self.writer.is_none()
    }

    pub fn schema(&self) -> Option<&DatasetSchema> {
        self.schema.as_ref()
    }

    /// Records accepted so far, including the pending chunk.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Records in chunks already handed to the OS.
    pub fn records_durable(&self) -> u64 {
        self.records_durable
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DatasetWriter {
    fn drop(&mut self) {
        if !self.is_finalized() {
            if let Err(e) = self.finalize() {
                tracing::warn!(
                    error = %e,
                    path = %self.path.display(),
                    "Failed to finalize dataset on drop"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MatchedPoint;

    fn tensor(side: u32, fill: f32) -> FrameTensor {
        FrameTensor::from_vec(side, vec![fill; (side * side * 3) as usize]).unwrap()
    }

    fn temp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        dir.join("dataset.tsds")
    }

    #[test]
    fn test_append_before_schema_fails() {
        let path = temp_path("touchset_test_writer_no_schema");
        let mut writer = DatasetWriter::create(&path).unwrap();
        let err = writer
            .append(&tensor(2, 0.0), RecordAttributes::default())
            .unwrap_err();
        assert!(matches!(err, TouchsetError::Dataset { .. }));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_schema_mismatch_is_fatal_and_not_counted() {
        let path = temp_path("touchset_test_writer_mismatch");
        let mut writer = DatasetWriter::create(&path).unwrap();
        writer
            .initialize_schema(&tensor(2, 0.5), RecordAttributes::default())
            .unwrap();
        let err = writer
            .append(&tensor(3, 0.5), RecordAttributes::default())
            .unwrap_err();
        assert!(matches!(
            err,
            TouchsetError::SchemaMismatch {
                expected: 12,
                actual: 27
            }
        ));
        assert_eq!(writer.records_written(), 1);
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_double_initialize_rejected() {
        let path = temp_path("touchset_test_writer_double_init");
        let mut writer = DatasetWriter::create(&path).unwrap();
        writer
            .initialize_schema(&tensor(1, 0.0), RecordAttributes::default())
            .unwrap();
        assert!(writer
            .initialize_schema(&tensor(1, 0.0), RecordAttributes::default())
            .is_err());
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_chunks_flush_at_capacity() {
        let path = temp_path("touchset_test_writer_chunks");
        let mut writer = DatasetWriter::create(&path).unwrap().with_chunk_records(4);
        let attrs = RecordAttributes::new(true, MatchedPoint::Matched { x: 1.0, y: 2.0 });
        writer.write_record(&tensor(2, 0.1), attrs).unwrap();
        for _ in 0..5 {
            writer.write_record(&tensor(2, 0.1), attrs).unwrap();
        }
        assert_eq!(writer.records_written(), 6);
        assert_eq!(writer.records_durable(), 4);

        writer.finalize().unwrap();
        assert_eq!(writer.records_durable(), 6);
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let path = temp_path("touchset_test_writer_idempotent");
        let mut writer = DatasetWriter::create(&path).unwrap();
        writer
            .initialize_schema(&tensor(1, 1.0), RecordAttributes::default())
            .unwrap();
        writer.finalize().unwrap();
        let len_after_first = std::fs::metadata(&path).unwrap().len();
        writer.finalize().unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), len_after_first);
        assert!(writer
            .append(&tensor(1, 1.0), RecordAttributes::default())
            .is_err());
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_create_in_unwritable_location_fails() {
        let blocker = std::env::temp_dir().join("touchset_test_writer_blocker");
        let _ = std::fs::remove_dir_all(&blocker);
        std::fs::write(&blocker, b"file, not a directory").unwrap();
        let err = DatasetWriter::create(blocker.join("out.tsds")).err().unwrap();
        assert!(matches!(err, TouchsetError::Dataset { .. }));
        std::fs::remove_file(&blocker).ok();
    }
}
