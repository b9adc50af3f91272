use crate::core::selection_store::{SelectionStore, aggregate_state};
use crate::core::token_estimator::TokenEstimator;
use crate::domain::models::{DirectoryAggregateState, FileId, FileKind};
use crate::infra::file_system::FileAccess;
use log::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: String,
    pub id: FileId,
    pub kind: FileKind,
    pub state: DirectoryAggregateState,
    pub description: String,
}

/// Children of `dir`, directories first and then by name, each with its
/// checkbox state and a short description.
pub fn list_children(
    dir: &FileId,
    files: &dyn FileAccess,
    selection: &SelectionStore,
    estimator: &TokenEstimator,
) -> Vec<TreeEntry> {
    let mut entries = match files.read_directory(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Error reading directory {}: {}", dir, e);
            return Vec::new();
        }
    };

    entries.sort_by(|(name_a, kind_a), (name_b, kind_b)| {
        let dir_a = *kind_a == FileKind::Directory;
        let dir_b = *kind_b == FileKind::Directory;
        dir_b.cmp(&dir_a).then_with(|| name_a.cmp(name_b))
    });

    entries
        .into_iter()
        .map(|(name, kind)| {
            let id = dir.join(&name);
            let (state, description) = match kind {
                FileKind::Directory => {
                    let (selected, total) = selection.directory_counts(&id).unwrap_or((0, 0));
                    (
                        aggregate_state(selected, total),
                        format!("{}/{}", selected, total),
                    )
                }
                FileKind::File => {
                    let state = if selection.is_selected(&id) {
                        DirectoryAggregateState::FullySelected
                    } else {
                        DirectoryAggregateState::Unselected
                    };
                    let tokens = estimator.estimate(std::slice::from_ref(&id));
                    (state, format!("~{}", tokens))
                }
            };
            TreeEntry {
                name,
                id,
                kind,
                state,
                description,
            }
        })
        .collect()
}
