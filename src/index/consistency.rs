//! Checks that the persisted index, side-table and chunk sidecar agree

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

use super::sidecar::count_lines;
use super::{IndexFile, Metric, SideTable, data_path, index_path, sidecar_path};
use crate::Result;

/// Consistency check results for one persisted location
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConsistencyReport {
    /// Vectors stored in the index file
    pub index_vectors: Option<usize>,
    /// Documents listed in the side-table
    pub side_table_documents: Option<usize>,
    /// Lines in the chunk sidecar
    pub sidecar_lines: Option<usize>,
    pub dimension: Option<usize>,
    pub metric: Option<Metric>,
    pub issues: Vec<String>,
    /// Overall consistency status
    pub is_consistent: bool,
}

/// Inspect the artifacts for `prefix` under `directory` without loading them into an index
#[inline]
pub fn check_consistency(directory: &Path, prefix: &str) -> Result<ConsistencyReport> {
    let mut report = ConsistencyReport::default();

    let index_path = index_path(directory, prefix);
    match File::open(&index_path) {
        Ok(file) => match bincode::deserialize_from::<_, IndexFile>(BufReader::new(file)) {
            Ok(index_file) => {
                if !index_file.stores_declared_vectors() {
                    report.issues.push(format!(
                        "index declares {} vectors but stores {} floats",
                        index_file.count,
                        index_file.vectors.len()
                    ));
                }
                report.index_vectors = Some(index_file.count);
                report.dimension = Some(index_file.dimension);
                report.metric = Some(index_file.metric);
            }
            Err(e) => report.issues.push(format!("index file is unreadable: {e}")),
        },
        Err(_) => report
            .issues
            .push(format!("missing index file {}", index_path.display())),
    }

    let data_path = data_path(directory, prefix);
    match File::open(&data_path) {
        Ok(file) => match serde_json::from_reader::<_, SideTable>(BufReader::new(file)) {
            Ok(side_table) => {
                if report
                    .dimension
                    .is_some_and(|dimension| dimension != side_table.dimension)
                {
                    report.issues.push(format!(
                        "side-table dimension {} differs from the index",
                        side_table.dimension
                    ));
                }
                report.side_table_documents = Some(side_table.documents.len());
            }
            Err(e) => report.issues.push(format!("side-table is unreadable: {e}")),
        },
        Err(_) => report
            .issues
            .push(format!("missing side-table {}", data_path.display())),
    }

    let sidecar = sidecar_path(directory, prefix);
    if sidecar.is_file() {
        report.sidecar_lines = Some(count_lines(&sidecar)?);
    } else {
        report
            .issues
            .push(format!("missing chunk sidecar {}", sidecar.display()));
    }

    if let (Some(vectors), Some(documents)) = (report.index_vectors, report.side_table_documents)
    {
        if vectors != documents {
            report.issues.push(format!(
                "index holds {vectors} vectors but the side-table holds {documents} documents"
            ));
        }
    }
    if let (Some(vectors), Some(lines)) = (report.index_vectors, report.sidecar_lines) {
        if vectors != lines {
            report.issues.push(format!(
                "index holds {vectors} vectors but the sidecar has {lines} lines"
            ));
        }
    }

    report.is_consistent = report.issues.is_empty();

    if report.is_consistent {
        info!("Index consistency validation passed");
    } else {
        warn!("Index consistency validation found issues");
        for issue in &report.issues {
            warn!("  {}", issue);
        }
    }

    Ok(report)
}
