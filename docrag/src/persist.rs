//! Binary persistence for [`VectorIndex`].
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! header:  magic "DRAGIDX\0" | version u32 | dimensions u32 | entries u64 | metric u8
//! entry:   vector f32 × dimensions
//!          chunk id | document id | text            (u32 length + UTF-8 bytes each)
//!          chunk index u32 | start u64 | end u64
//!          metadata count u32, then key/value strings
//! ```
//!
//! Loading goes through [`VectorIndex::build_with_metric`], so a persisted
//! index is held to the same invariants as a freshly built one.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::document::{Chunk, IndexEntry};
use crate::error::{RagError, Result};
use crate::index::{SimilarityMetric, VectorIndex};

const MAGIC: &[u8; 8] = b"DRAGIDX\0";
const FORMAT_VERSION: u32 = 1;
/// Upper bound on a single persisted string, to fail fast on corrupt input.
const MAX_STRING_LEN: usize = 64 * 1024 * 1024;
/// Upper bound on the header's dimensionality, checked before any vector is allocated.
const MAX_DIMENSIONS: usize = 65_536;

impl VectorIndex {
    /// Serialize the index into `writer`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`] if writing fails, or
    /// [`RagError::PersistenceError`] if a field does not fit the format.
    pub fn write_to(&self, mut writer: impl Write) -> Result<()> {
        writer.write_all(MAGIC)?;
        write_u32(&mut writer, FORMAT_VERSION)?;
        write_u32(&mut writer, to_u32(self.dimensions(), "dimensions")?)?;
        writer.write_all(&(self.len() as u64).to_le_bytes())?;
        writer.write_all(&[self.metric().id()])?;

        for entry in self.entries() {
            for value in &entry.vector {
                writer.write_all(&value.to_le_bytes())?;
            }
            let chunk = &entry.chunk;
            write_str(&mut writer, &chunk.id)?;
            write_str(&mut writer, &chunk.document_id)?;
            write_str(&mut writer, &chunk.text)?;
            write_u32(&mut writer, to_u32(chunk.index, "chunk index")?)?;
            writer.write_all(&(chunk.start as u64).to_le_bytes())?;
            writer.write_all(&(chunk.end as u64).to_le_bytes())?;

            let mut metadata: Vec<_> = chunk.metadata.iter().collect();
            metadata.sort();
            write_u32(&mut writer, to_u32(metadata.len(), "metadata count")?)?;
            for (key, value) in metadata {
                write_str(&mut writer, key)?;
                write_str(&mut writer, value)?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Deserialize an index previously written with [`VectorIndex::write_to`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PersistenceError`] for a bad header or truncated
    /// or malformed records, and the usual build errors if the decoded
    /// entries violate index invariants.
    pub fn read_from(mut reader: impl Read) -> Result<Self> {
        let mut magic = [0u8; 8];
        read_exact(&mut reader, &mut magic)?;
        if &magic != MAGIC {
            return Err(RagError::PersistenceError("not a docrag index file".to_string()));
        }
        let version = read_u32(&mut reader)?;
        if version != FORMAT_VERSION {
            return Err(RagError::PersistenceError(format!(
                "unsupported index format version {version}"
            )));
        }
        let dimensions = read_u32(&mut reader)? as usize;
        if dimensions > MAX_DIMENSIONS {
            return Err(RagError::PersistenceError(format!(
                "dimensionality {dimensions} exceeds the supported maximum of {MAX_DIMENSIONS}"
            )));
        }
        let count = read_u64(&mut reader)?;
        let mut metric_id = [0u8; 1];
        read_exact(&mut reader, &mut metric_id)?;
        let metric = SimilarityMetric::from_id(metric_id[0]).ok_or_else(|| {
            RagError::PersistenceError(format!("unknown similarity metric id {}", metric_id[0]))
        })?;

        let mut entries = Vec::new();
        for _ in 0..count {
            let mut vector = Vec::with_capacity(dimensions);
            for _ in 0..dimensions {
                let mut buf = [0u8; 4];
                read_exact(&mut reader, &mut buf)?;
                vector.push(f32::from_le_bytes(buf));
            }
            let id = read_string(&mut reader)?;
            let document_id = read_string(&mut reader)?;
            let text = read_string(&mut reader)?;
            let index = read_u32(&mut reader)? as usize;
            let start = read_u64(&mut reader)? as usize;
            let end = read_u64(&mut reader)? as usize;
            if start > end {
                return Err(RagError::PersistenceError(format!(
                    "chunk '{id}' has an inverted range {start}..{end}"
                )));
            }

            let pairs = read_u32(&mut reader)?;
            let mut metadata = HashMap::new();
            for _ in 0..pairs {
                let key = read_string(&mut reader)?;
                let value = read_string(&mut reader)?;
                metadata.insert(key, value);
            }

            let chunk = Chunk { id, document_id, index, start, end, text, metadata };
            entries.push(IndexEntry::new(chunk, vector));
        }

        let index = VectorIndex::build_with_metric(entries, metric)?;
        debug!(entries = index.len(), dimensions = index.dimensions(), "decoded vector index");
        Ok(index)
    }

    /// Write the index to a file, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        self.write_to(BufWriter::new(file))?;
        info!(path = %path.display(), entries = self.len(), "saved vector index");
        Ok(())
    }

    /// Load an index from a file written by [`VectorIndex::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let index = Self::read_from(BufReader::new(file))?;
        info!(path = %path.display(), entries = index.len(), "loaded vector index");
        Ok(index)
    }
}

fn to_u32(value: usize, field: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| RagError::PersistenceError(format!("{field} {value} exceeds u32 range")))
}

fn write_u32(writer: &mut impl Write, value: u32) -> Result<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_str(writer: &mut impl Write, value: &str) -> Result<()> {
    write_u32(writer, to_u32(value.len(), "string length")?)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

/// `read_exact` that reports truncation as a format error instead of raw I/O.
fn read_exact(reader: &mut impl Read, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => {
            RagError::PersistenceError("unexpected end of index data".to_string())
        }
        _ => RagError::Io(e),
    })
}

fn read_u32(reader: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(reader: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    read_exact(reader, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_string(reader: &mut impl Read) -> Result<String> {
    let len = read_u32(reader)? as usize;
    if len > MAX_STRING_LEN {
        return Err(RagError::PersistenceError(format!("string length {len} is implausible")));
    }
    let mut buf = vec![0u8; len];
    read_exact(reader, &mut buf)?;
    String::from_utf8(buf)
        .map_err(|e| RagError::PersistenceError(format!("invalid UTF-8 in index data: {e}")))
}
