//! Binary persistence for similarity indexes and matrices.
//!
//! File layout: an 8-byte magic tag followed by a bincode record holding a
//! format version, the shape, and the flat `f32` payload. Values are written
//! bit-for-bit, so a loaded index or matrix returns exactly the results of
//! the one that was saved.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use rxnsim_core::error::{Result, SimError};

use crate::index::SimilarityIndex;
use crate::pairwise::SimilarityMatrix;
use crate::store::{l2_norm, VectorStore};

const INDEX_MAGIC: &[u8; 8] = b"RXNSIDX1";
const MATRIX_MAGIC: &[u8; 8] = b"RXNSMAT1";
const FORMAT_VERSION: u32 = 1;

/// Stored vectors must be unit length within this tolerance.
const UNIT_NORM_TOLERANCE: f64 = 1e-3;

#[derive(Serialize)]
struct IndexRecordRef<'a> {
    version: u32,
    dimension: u64,
    count: u64,
    data: &'a [f32],
}

#[derive(Deserialize)]
struct IndexRecord {
    version: u32,
    dimension: u64,
    count: u64,
    data: Vec<f32>,
}

#[derive(Serialize)]
struct MatrixRecordRef<'a> {
    version: u32,
    size: u64,
    values: &'a [f32],
}

#[derive(Deserialize)]
struct MatrixRecord {
    version: u32,
    size: u64,
    values: Vec<f32>,
}

impl SimilarityIndex {
    /// Write the index to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = create_file(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        info!(
            vectors = self.size(),
            dimension = self.dimension(),
            path = %path.display(),
            "Similarity index saved"
        );
        Ok(())
    }

    /// Read an index previously written by [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let index = Self::read_from(BufReader::new(file))?;
        info!(
            vectors = index.size(),
            dimension = index.dimension(),
            path = %path.display(),
            "Similarity index loaded"
        );
        Ok(index)
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(INDEX_MAGIC)?;
        let record = IndexRecordRef {
            version: FORMAT_VERSION,
            dimension: self.dimension() as u64,
            count: self.size() as u64,
            data: self.store().as_flat(),
        };
        bincode::serialize_into(&mut writer, &record)?;
        Ok(())
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        read_magic(&mut reader, INDEX_MAGIC, "similarity index")?;
        let record: IndexRecord = bincode::deserialize_from(&mut reader)?;
        check_version(record.version)?;

        let dimension = to_usize(record.dimension)?;
        let count = to_usize(record.count)?;
        if dimension.checked_mul(count) != Some(record.data.len()) {
            return Err(SimError::Serialization(format!(
                "index payload holds {} values, expected {} x {}",
                record.data.len(),
                count,
                dimension
            )));
        }

        let store = VectorStore::from_flat(dimension, record.data)?;
        for (id, row) in store.iter() {
            let norm = l2_norm(row);
            if (norm - 1.0).abs() > UNIT_NORM_TOLERANCE {
                return Err(SimError::Serialization(format!(
                    "stored vector {} has norm {:.6}, expected unit length",
                    id, norm
                )));
            }
        }
        debug!(vectors = count, dimension, "Index payload validated");

        Ok(SimilarityIndex::from_normalized(store.assume_normalized()))
    }
}

impl SimilarityMatrix {
    /// Write the matrix to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = create_file(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        info!(
            size = self.size(),
            path = %path.display(),
            "Similarity matrix saved"
        );
        Ok(())
    }

    /// Read a matrix previously written by [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let matrix = Self::read_from(BufReader::new(file))?;
        info!(
            size = matrix.size(),
            path = %path.display(),
            "Similarity matrix loaded"
        );
        Ok(matrix)
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(MATRIX_MAGIC)?;
        let record = MatrixRecordRef {
            version: FORMAT_VERSION,
            size: self.size() as u64,
            values: self.as_flat(),
        };
        bincode::serialize_into(&mut writer, &record)?;
        Ok(())
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        read_magic(&mut reader, MATRIX_MAGIC, "similarity matrix")?;
        let record: MatrixRecord = bincode::deserialize_from(&mut reader)?;
        check_version(record.version)?;

        let size = to_usize(record.size)?;
        if size == 0 {
            return Err(SimError::Serialization("matrix has zero rows".to_string()));
        }
        if size.checked_mul(size) != Some(record.values.len()) {
            return Err(SimError::Serialization(format!(
                "matrix payload holds {} values, expected {} x {}",
                record.values.len(),
                size,
                size
            )));
        }
        if let Some(pos) = record.values.iter().position(|v| !v.is_finite()) {
            return Err(SimError::Serialization(format!(
                "matrix entry ({}, {}) is not finite",
                pos / size,
                pos % size
            )));
        }

        Ok(SimilarityMatrix::from_parts(size, record.values))
    }
}

/// Create `path`, including missing parent directories.
fn create_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(File::create(path)?)
}

fn read_magic<R: Read>(reader: &mut R, expected: &[u8; 8], what: &str) -> Result<()> {
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if &magic != expected {
        return Err(SimError::Serialization(format!(
            "not a {} file (bad magic {:?})",
            what,
            String::from_utf8_lossy(&magic)
        )));
    }
    Ok(())
}

fn check_version(version: u32) -> Result<()> {
    if version != FORMAT_VERSION {
        return Err(SimError::Serialization(format!(
            "unsupported format version {} (expected {})",
            version, FORMAT_VERSION
        )));
    }
    Ok(())
}

fn to_usize(value: u64) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| SimError::Serialization(format!("length {} does not fit in memory", value)))
}
