//! Exact (flat) nearest-neighbor index over dense vectors with a side-table
//! of chunk texts and metadata.


pub mod consistency;
pub mod sidecar;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::chunking::Metadata;
use crate::{RagError, Result};

pub use consistency::{ConsistencyReport, check_consistency};
pub use sidecar::{read_chunk_lines, sidecar_path};
use sidecar::stage_sidecar;

const INDEX_FORMAT_VERSION: u32 = 1;

/// How vectors are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Squared euclidean distance, lower is better
    L2,
    /// Dot product, higher is better. Cosine similarity on unit vectors.
    #[default]
    InnerProduct,
}

impl Metric {
    /// Raw score between two vectors of equal length
    #[inline]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
            Self::InnerProduct => a.iter().zip(b).map(|(x, y)| x * y).sum(),
        }
    }

    /// Cosine-style similarity for a distance produced by this metric.
    ///
    /// For unit vectors `|a - b|^2 = 2 - 2 cos`, so both metrics land on the same scale.
    #[inline]
    pub fn similarity(self, distance: f32) -> f32 {
        match self {
            Self::L2 => 1.0 - distance / 2.0,
            Self::InnerProduct => distance,
        }
    }

    fn best_first(self, a: f32, b: f32) -> std::cmp::Ordering {
        match self {
            Self::L2 => a.total_cmp(&b),
            Self::InnerProduct => b.total_cmp(&a),
        }
    }
}

impl fmt::Display for Metric {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::L2 => write!(f, "l2"),
            Self::InnerProduct => write!(f, "inner_product"),
        }
    }
}

/// One search hit
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub id: usize,
    pub distance: f32,
    pub text: Option<String>,
    pub metadata: Metadata,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    dimension: usize,
    metric: Metric,
    count: usize,
    vectors: Vec<f32>,
}

impl IndexFile {
    /// Whether the flat buffer holds exactly `count` vectors of `dimension` floats
    fn stores_declared_vectors(&self) -> bool {
        self.count.checked_mul(self.dimension) == Some(self.vectors.len())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SideTable {
    dimension: usize,
    metric: Metric,
    documents: Vec<Option<String>>,
    metadata: BTreeMap<usize, Metadata>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    metric: Metric,
    /// Row-major, `dimension` floats per vector
    vectors: Vec<f32>,
    documents: Vec<Option<String>>,
    metadata: BTreeMap<usize, Metadata>,
}

impl VectorIndex {
    #[inline]
    pub fn new(dimension: usize, metric: Metric) -> Self {
        Self {
            dimension,
            metric,
            vectors: Vec::new(),
            documents: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    #[inline]
    pub fn text(&self, id: usize) -> Option<&str> {
        self.documents.get(id).and_then(Option::as_deref)
    }

    #[inline]
    pub fn metadata(&self, id: usize) -> Option<&Metadata> {
        self.metadata.get(&id)
    }

    #[inline]
    pub fn vector(&self, id: usize) -> Option<&[f32]> {
        let start = id.checked_mul(self.dimension)?;
        self.vectors.get(start..start.checked_add(self.dimension)?)
    }

    /// Append vectors with optional parallel texts and metadata. Ids continue
    /// from the current length. Nothing is added when any check fails.
    #[inline]
    pub fn add(
        &mut self,
        vectors: &[Vec<f32>],
        texts: Option<&[String]>,
        metadata: Option<&[Metadata]>,
    ) -> Result<()> {
        if let Some(len) = texts.map(<[String]>::len).filter(|&n| n != vectors.len()) {
            return Err(RagError::InvariantViolation(format!(
                "{len} texts for {} vectors",
                vectors.len()
            )));
        }
        if let Some(len) = metadata
            .map(<[Metadata]>::len)
            .filter(|&n| n != vectors.len())
        {
            return Err(RagError::InvariantViolation(format!(
                "{len} metadata entries for {} vectors",
                vectors.len()
            )));
        }
        if let Some((position, vector)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != self.dimension)
        {
            return Err(RagError::InvariantViolation(format!(
                "vector {position} has dimension {}, index expects {}",
                vector.len(),
                self.dimension
            )));
        }

        let start_id = self.len();
        self.vectors.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.vectors.extend_from_slice(vector);
        }

        match texts {
            Some(texts) => self.documents.extend(texts.iter().cloned().map(Some)),
            None => self
                .documents
                .extend(std::iter::repeat_n(None, vectors.len())),
        }

        if let Some(metadata) = metadata {
            for (offset, meta) in metadata.iter().enumerate() {
                self.metadata.insert(start_id + offset, meta.clone());
            }
        }

        debug!("Added {} vectors, index now holds {}", vectors.len(), self.len());
        Ok(())
    }

    /// Up to `k` nearest neighbors, best first. Ties keep insertion order.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(RagError::InvariantViolation(format!(
                "query has dimension {}, index expects {}",
                query.len(),
                self.dimension
            )));
        }
        if k == 0 || self.is_empty() || self.dimension == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(id, vector)| (id, self.metric.distance(query, vector)))
            .filter(|(_, distance)| distance.is_finite())
            .collect();

        scored.sort_by(|a, b| self.metric.best_first(a.1, b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(id, distance)| Neighbor {
                id,
                distance,
                text: self.text(id).map(str::to_string),
                metadata: self.metadata.get(&id).cloned().unwrap_or_default(),
            })
            .collect())
    }

    /// Persist the index file, the side-table and the chunk sidecar under `directory`
    #[inline]
    pub fn save(&self, directory: &Path, prefix: &str) -> Result<()> {
        fs::create_dir_all(directory)?;

        let index_file = IndexFile {
            version: INDEX_FORMAT_VERSION,
            dimension: self.dimension,
            metric: self.metric,
            count: self.len(),
            vectors: self.vectors.clone(),
        };
        let side_table = SideTable {
            dimension: self.dimension,
            metric: self.metric,
            documents: self.documents.clone(),
            metadata: self.metadata.clone(),
        };

        let index_path = index_path(directory, prefix);
        let data_path = data_path(directory, prefix);

        // Rename only once every artifact is staged, index file last
        let staged_index = StagedFile::write(&index_path, |writer| {
            bincode::serialize_into(writer, &index_file)
                .map_err(|e| RagError::Other(anyhow::anyhow!("Failed to encode index: {e}")))
        })?;
        let staged_side_table = StagedFile::write(&data_path, |writer| {
            serde_json::to_writer(writer, &side_table)
                .map_err(|e| RagError::Other(anyhow::anyhow!("Failed to encode side-table: {e}")))
        })?;
        let sidecar = stage_sidecar(directory, prefix, &self.documents)?;

        staged_side_table.commit()?;
        sidecar.commit()?;
        staged_index.commit()?;

        info!(
            "Saved index with {} vectors to {}",
            self.len(),
            index_path.display()
        );
        Ok(())
    }

    /// Restore an index written by [`VectorIndex::save`]
    #[inline]
    pub fn load(directory: &Path, prefix: &str) -> Result<Self> {
        let index_path = index_path(directory, prefix);
        let data_path = data_path(directory, prefix);

        let index_file: IndexFile = {
            let reader = open_artifact(&index_path)?;
            bincode::deserialize_from(reader).map_err(|e| {
                RagError::Corruption(format!("{}: {e}", index_path.display()))
            })?
        };
        let side_table: SideTable = {
            let reader = open_artifact(&data_path)?;
            serde_json::from_reader(reader).map_err(|e| {
                RagError::Corruption(format!("{}: {e}", data_path.display()))
            })?
        };

        if index_file.version != INDEX_FORMAT_VERSION {
            return Err(RagError::Corruption(format!(
                "unsupported index format version {}",
                index_file.version
            )));
        }
        if !index_file.stores_declared_vectors() {
            return Err(RagError::Corruption(format!(
                "index declares {} vectors of dimension {} but stores {} floats",
                index_file.count,
                index_file.dimension,
                index_file.vectors.len()
            )));
        }
        if side_table.documents.len() != index_file.count {
            return Err(RagError::Corruption(format!(
                "side-table holds {} documents but the index holds {} vectors",
                side_table.documents.len(),
                index_file.count
            )));
        }
        if side_table.dimension != index_file.dimension || side_table.metric != index_file.metric
        {
            return Err(RagError::Corruption(format!(
                "side-table describes {} ({}) but the index is {} ({})",
                side_table.dimension, side_table.metric, index_file.dimension, index_file.metric
            )));
        }
        if let Some(id) = side_table
            .metadata
            .keys()
            .find(|&&id| id >= index_file.count)
        {
            return Err(RagError::Corruption(format!(
                "metadata refers to missing vector {id}"
            )));
        }

        info!(
            "Loaded index with {} vectors from {}",
            index_file.count,
            index_path.display()
        );

        Ok(Self {
            dimension: index_file.dimension,
            metric: index_file.metric,
            vectors: index_file.vectors,
            documents: side_table.documents,
            metadata: side_table.metadata,
        })
    }

    /// Whether both persisted artifacts exist for `prefix`
    #[inline]
    pub fn exists(directory: &Path, prefix: &str) -> bool {
        index_path(directory, prefix).is_file() && data_path(directory, prefix).is_file()
    }
}

#[inline]
pub fn index_path(directory: &Path, prefix: &str) -> PathBuf {
    directory.join(format!("{prefix}_index.bin"))
}

#[inline]
pub fn data_path(directory: &Path, prefix: &str) -> PathBuf {
    directory.join(format!("{prefix}_data.json"))
}

fn open_artifact(path: &Path) -> Result<BufReader<File>> {
    match File::open(path) {
        Ok(file) => Ok(BufReader::new(file)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RagError::NotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// A fully written temporary sibling of `path`, renamed over it by
/// [`StagedFile::commit`] and removed if dropped uncommitted
#[derive(Debug)]
pub(crate) struct StagedFile {
    tmp_path: PathBuf,
    path: PathBuf,
    committed: bool,
}

impl StagedFile {
    pub(crate) fn write<F>(path: &Path, write: F) -> Result<Self>
    where
        F: FnOnce(&mut BufWriter<File>) -> Result<()>,
    {
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let staged = Self {
            tmp_path: PathBuf::from(tmp_name),
            path: path.to_path_buf(),
            committed: false,
        };

        write_file(&staged.tmp_path, write)?;
        Ok(staged)
    }

    pub(crate) fn commit(mut self) -> Result<()> {
        fs::rename(&self.tmp_path, &self.path)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}

fn write_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    write(&mut writer)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}
