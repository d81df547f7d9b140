//! Line-oriented view of the corpus, one chunk per line, line i is chunk i

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::StagedFile;
use crate::{RagError, Result};

#[inline]
pub fn sidecar_path(directory: &Path, prefix: &str) -> PathBuf {
    directory.join(format!("{prefix}_chunks.txt"))
}

/// Stage one line per document. Embedded line breaks are flattened to spaces
/// so line numbers stay aligned with chunk ids; missing texts become empty lines.
pub(crate) fn stage_sidecar(
    directory: &Path,
    prefix: &str,
    documents: &[Option<String>],
) -> Result<StagedFile> {
    let path = sidecar_path(directory, prefix);
    let staged = StagedFile::write(&path, |writer| {
        for document in documents {
            let line = document.as_deref().map(flatten_line).unwrap_or_default();
            writeln!(writer, "{line}")?;
        }
        Ok(())
    })?;
    debug!("Staged {} lines for {}", documents.len(), path.display());
    Ok(staged)
}

/// Trimmed lines at `indices`, in the order requested. Out-of-range indices are skipped.
#[inline]
pub fn read_chunk_lines(path: &Path, indices: &[usize]) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => RagError::NotFound {
            path: path.to_path_buf(),
        },
        _ => RagError::Io(e),
    })?;

    let lines: Vec<&str> = content.lines().collect();
    Ok(indices
        .iter()
        .filter_map(|&idx| lines.get(idx))
        .map(|line| line.trim().to_string())
        .collect())
}

/// Number of lines in a sidecar file
#[inline]
pub fn count_lines(path: &Path) -> Result<usize> {
    Ok(fs::read_to_string(path)?.lines().count())
}

fn flatten_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
