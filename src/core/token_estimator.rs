use crate::domain::models::{FileId, FileKind};
use crate::infra::file_system::{ALL_FILES_GLOB, FileAccess};
use log::{debug, warn};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Quarter-length token proxy shared by the live estimate and the final
/// prompt size.
pub fn estimate_for_len(len: usize) -> usize {
    len.div_ceil(4)
}

pub struct TokenEstimator {
    files: Arc<dyn FileAccess>,
}

impl TokenEstimator {
    pub fn new(files: Arc<dyn FileAccess>) -> Self {
        Self { files }
    }

    /// Expands directories to their files, counts each file once and sums the
    /// per-file estimates. Unreadable entries contribute nothing.
    pub fn estimate(&self, ids: &[FileId]) -> usize {
        let expanded = self.expand(ids);
        debug!("Estimating tokens for {} files", expanded.len());

        expanded
            .iter()
            .map(|id| match self.files.read_file(id) {
                Ok(bytes) => estimate_for_len(bytes.len()),
                Err(e) => {
                    warn!("Error reading file {}: {}", id, e);
                    0
                }
            })
            .sum()
    }

    pub fn expand(&self, ids: &[FileId]) -> BTreeSet<FileId> {
        let mut expanded = BTreeSet::new();

        for id in ids {
            match self.files.stat(id) {
                Ok(stat) if stat.kind == FileKind::Directory => {
                    match self.files.find_files(id, ALL_FILES_GLOB) {
                        Ok(found) => expanded.extend(found),
                        Err(e) => warn!("Error expanding {}: {}", id, e),
                    }
                }
                Ok(stat) => {
                    debug!("Expanding file {} ({} bytes on disk)", id, stat.size);
                    expanded.insert(id.clone());
                }
                Err(e) => warn!("Error expanding {}: {}", id, e),
            }
        }

        expanded
    }
}
