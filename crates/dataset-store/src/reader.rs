//! Random-access reader for finalized (or crash-truncated) datasets.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use touchset_common::error::{TouchsetError, TouchsetResult};

use crate::format::{
    decode_attributes, f32s_from_le, DatasetSchema, ATTRIBUTE_LEN, FORMAT_VERSION, MAGIC,
    TAG_CHUNK, TAG_END, TAG_SCHEMA,
};
use crate::record::RecordAttributes;

#[derive(Debug, Clone, Copy)]
struct ChunkEntry {
    /// Byte offset of the first image in the chunk.
    offset: u64,
    first_record: u64,
    records: u64,
}

/// Opens a dataset file and reads records by index.
///
/// Only complete chunks are indexed; a torn trailing chunk is ignored and
/// the file is reported as not finalized.
pub struct DatasetReader {
    path: PathBuf,
    reader: BufReader<File>,
    schema: Option<DatasetSchema>,
    chunks: Vec<ChunkEntry>,
    len: u64,
    finalized: bool,
}

impl DatasetReader {
    pub fn open(path: impl AsRef<Path>) -> TouchsetResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(TouchsetError::FileNotFound { path });
        }
        let file_len = std::fs::metadata(&path)?.len();
        let mut reader = BufReader::new(File::open(&path)?);

        let mut magic = [0u8; 4];
        let mut version = [0u8; 2];
        reader
            .read_exact(&mut magic)
            .and_then(|_| reader.read_exact(&mut version))
            .map_err(|_| TouchsetError::dataset(format!("{} is not a dataset", path.display())))?;
        if &magic != MAGIC {
            return Err(TouchsetError::dataset(format!(
                "{} is not a dataset",
                path.display()
            )));
        }
        let version = u16::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(TouchsetError::dataset(format!(
                "Unsupported dataset version {version}"
            )));
        }

        let mut this = Self {
            path,
            reader,
            schema: None,
            chunks: Vec::new(),
            len: 0,
            finalized: false,
        };
        this.index(file_len)?;
        Ok(this)
    }

    fn index(&mut self, file_len: u64) -> TouchsetResult<()> {
        loop {
            let mut tag = [0u8; 1];
            match self.reader.read_exact(&mut tag) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            match tag[0] {
                TAG_SCHEMA => {
                    let Some(len) = self.read_u32()? else { break };
                    let mut json = vec![0u8; len as usize];
                    if !self.read_fully(&mut json)? {
                        break;
                    }
                    let schema: DatasetSchema = serde_json::from_slice(&json)?;
                    self.schema = Some(schema);
                }
                TAG_CHUNK => {
                    let schema = self.schema.as_ref().ok_or_else(|| {
                        TouchsetError::dataset("Chunk before schema block")
                    })?;
                    let record_bytes = schema.record_bytes() as u64;
                    let Some(records) = self.read_u32()? else { break };
                    let records = records as u64;
                    let offset = self.reader.stream_position()?;
                    let end = offset + records * record_bytes;
                    if end > file_len {
                        tracing::warn!(
                            path = %self.path.display(),
                            durable = self.len,
                            "Ignoring truncated trailing chunk"
                        );
                        break;
                    }
                    self.chunks.push(ChunkEntry {
                        offset,
                        first_record: self.len,
                        records,
                    });
                    self.len += records;
                    self.reader.seek(SeekFrom::Start(end))?;
                }
                TAG_END => {
                    let mut total = [0u8; 8];
                    if !self.read_fully(&mut total)? {
                        break;
                    }
                    let total = u64::from_le_bytes(total);
                    if total != self.len {
                        return Err(TouchsetError::dataset(format!(
                            "Trailer records {total} records but chunks hold {}",
                            self.len
                        )));
                    }
                    self.finalized = true;
                    break;
                }
                other => {
                    return Err(TouchsetError::dataset(format!(
                        "Unknown block tag 0x{other:02x}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn read_u32(&mut self) -> TouchsetResult<Option<u32>> {
        let mut buf = [0u8; 4];
        Ok(self
            .read_fully(&mut buf)?
            .then(|| u32::from_le_bytes(buf)))
    }

    /// `Ok(false)` on a clean EOF mid-block.
    fn read_fully(&mut self, buf: &mut [u8]) -> TouchsetResult<bool> {
        match self.reader.read_exact(buf) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn locate(&self, index: u64) -> TouchsetResult<(&ChunkEntry, u64)> {
        if index >= self.len {
            return Err(TouchsetError::dataset(format!(
                "Record {index} out of range (dataset holds {})",
                self.len
            )));
        }
        let pos = self
            .chunks
            .partition_point(|c| c.first_record + c.records <= index);
        let chunk = &self.chunks[pos];
        Ok((chunk, index - chunk.first_record))
    }

    fn schema_or_err(&self) -> TouchsetResult<&DatasetSchema> {
        self.schema
            .as_ref()
            .ok_or_else(|| TouchsetError::dataset("Dataset has no schema"))
    }

    /// Flat `W * H * 3` image values of record `index`.
    pub fn image(&mut self, index: u64) -> TouchsetResult<Vec<f32>> {
        let image_len = self.schema_or_err()?.image_len();
        let (chunk, within) = self.locate(index)?;
        let offset = chunk.offset + within * (image_len as u64 * 4);

        let mut bytes = vec![0u8; image_len * 4];
        self.reader.seek(SeekFrom::Start(offset))?;
        self.reader.read_exact(&mut bytes)?;
        Ok(f32s_from_le(&bytes))
    }

    pub fn attributes(&mut self, index: u64) -> TouchsetResult<RecordAttributes> {
        let image_len = self.schema_or_err()?.image_len();
        let (chunk, within) = self.locate(index)?;
        let offset = chunk.offset
            + chunk.records * (image_len as u64 * 4)
            + within * (ATTRIBUTE_LEN as u64 * 4);

        let mut bytes = [0u8; ATTRIBUTE_LEN * 4];
        self.reader.seek(SeekFrom::Start(offset))?;
        self.reader.read_exact(&mut bytes)?;
        let values = f32s_from_le(&bytes);
        Ok(decode_attributes([values[0], values[1], values[2]]))
    }

    /// All attribute records in order.
    pub fn all_attributes(&mut self) -> TouchsetResult<Vec<RecordAttributes>> {
        (0..self.len).map(|i| self.attributes(i)).collect()
    }

    pub fn labels(&mut self) -> TouchsetResult<Vec<bool>> {
        Ok(self.all_attributes()?.into_iter().map(|a| a.label).collect())
    }

    pub fn positive_count(&mut self) -> TouchsetResult<u64> {
        Ok(self.labels()?.into_iter().filter(|l| *l).count() as u64)
    }

    pub fn schema(&self) -> Option<&DatasetSchema> {
        self.schema.as_ref()
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the trailer was written.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
