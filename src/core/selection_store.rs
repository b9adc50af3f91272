use crate::domain::models::{CheckboxState, DirectoryAggregateState, FileId, FileKind};
use crate::infra::file_system::{ALL_FILES_GLOB, FileAccess};
use crate::infra::key_value_store::{KeyValueStore, SELECTED_FILES_KEY, get_or, set_typed};
use log::{debug, info, warn};
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// File-granularity selection set, persisted under `selectedFiles`.
///
/// Directories are never stored; their state is derived on demand from the
/// files beneath them. Every mutation holds `write_guard` through its persist
/// call, so the stored list is written in mutation order.
pub struct SelectionStore {
    selected: Mutex<BTreeSet<FileId>>,
    write_guard: Mutex<()>,
    storage: Arc<dyn KeyValueStore>,
    files: Arc<dyn FileAccess>,
}

impl SelectionStore {
    pub fn load(storage: Arc<dyn KeyValueStore>, files: Arc<dyn FileAccess>) -> Self {
        let stored: Vec<String> = get_or(storage.as_ref(), SELECTED_FILES_KEY, Vec::new());
        let selected: BTreeSet<FileId> = stored.into_iter().map(FileId::from_canonical).collect();
        debug!("Loaded {} selected files", selected.len());

        Self {
            selected: Mutex::new(selected),
            write_guard: Mutex::new(()),
            storage,
            files,
        }
    }

    pub fn is_selected(&self, id: &FileId) -> bool {
        lock(&self.selected).contains(id)
    }

    pub fn list_selected(&self) -> Vec<FileId> {
        lock(&self.selected).iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.selected).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn select(&self, id: &FileId) -> anyhow::Result<()> {
        let _guard = lock(&self.write_guard);
        let snapshot = {
            let mut selected = lock(&self.selected);
            selected.insert(id.clone());
            snapshot_of(&selected)
        };
        self.persist(&snapshot)
    }

    pub fn deselect(&self, id: &FileId) -> anyhow::Result<()> {
        let _guard = lock(&self.write_guard);
        let snapshot = {
            let mut selected = lock(&self.selected);
            selected.remove(id);
            snapshot_of(&selected)
        };
        self.persist(&snapshot)
    }

    /// Applies one batch of checkbox changes. At most one batch runs at a time;
    /// the selection is persisted once at the end.
    pub fn apply_bulk_changes(&self, changes: &[(FileId, CheckboxState)]) -> anyhow::Result<()> {
        let _guard = lock(&self.write_guard);

        let (file_changes, dir_changes) = self.categorize_changes(changes);
        debug!(
            "Bulk change: {} file changes, {} directory changes",
            file_changes.len(),
            dir_changes.len()
        );

        {
            let mut selected = lock(&self.selected);
            for (id, checked) in &file_changes {
                if *checked {
                    selected.insert(id.clone());
                } else {
                    selected.remove(id);
                }
            }
        }

        for (dir, checked) in &dir_changes {
            let prefix = dir.dir_prefix();
            let pinned: HashSet<&FileId> = file_changes
                .iter()
                .map(|(id, _)| id)
                .filter(|id| id.is_under(&prefix))
                .collect();
            if !pinned.is_empty() {
                debug!(
                    "{} descendants of {} were toggled in the same batch and keep their own state",
                    pinned.len(),
                    dir
                );
            }
            self.update_directory_selection(dir, &prefix, *checked, &pinned);
        }

        let snapshot = snapshot_of(&lock(&self.selected));
        self.persist(&snapshot)?;
        info!("Selection now holds {} files", snapshot.len());
        Ok(())
    }

    /// Flips a single resource. A fully selected directory is unchecked, any
    /// other directory is checked.
    pub fn toggle_selection(&self, id: &FileId) -> anyhow::Result<CheckboxState> {
        let target = match self.files.stat(id) {
            Ok(stat) if stat.kind == FileKind::Directory => {
                match self.directory_aggregate_state(id) {
                    DirectoryAggregateState::FullySelected => CheckboxState::Unchecked,
                    _ => CheckboxState::Checked,
                }
            }
            _ if self.is_selected(id) => CheckboxState::Unchecked,
            _ => CheckboxState::Checked,
        };
        self.apply_bulk_changes(&[(id.clone(), target)])?;
        Ok(target)
    }

    pub fn directory_aggregate_state(&self, dir: &FileId) -> DirectoryAggregateState {
        match self.directory_counts(dir) {
            Some((selected, total)) => aggregate_state(selected, total),
            None => DirectoryAggregateState::Unselected,
        }
    }

    /// `(selected, total)` descendant file counts, or `None` when the
    /// directory cannot be enumerated.
    pub fn directory_counts(&self, dir: &FileId) -> Option<(usize, usize)> {
        match self.files.find_files(dir, ALL_FILES_GLOB) {
            Ok(descendants) => {
                let selected = lock(&self.selected);
                let count = descendants.iter().filter(|id| selected.contains(id)).count();
                Some((count, descendants.len()))
            }
            Err(e) => {
                warn!("Error reading directory {}: {}", dir, e);
                None
            }
        }
    }

    fn categorize_changes(
        &self,
        changes: &[(FileId, CheckboxState)],
    ) -> (Vec<(FileId, bool)>, Vec<(FileId, bool)>) {
        let mut file_changes = Vec::new();
        let mut dir_changes = Vec::new();

        for (id, state) in changes {
            let checked = match state {
                CheckboxState::Checked => true,
                CheckboxState::Unchecked => false,
                CheckboxState::Mixed => {
                    warn!("Ignoring unsupported checkbox state {:?} for {}", state, id);
                    continue;
                }
            };

            match self.files.stat(id) {
                Ok(stat) if stat.kind == FileKind::Directory => dir_changes.push((id.clone(), checked)),
                Ok(_) => file_changes.push((id.clone(), checked)),
                Err(e) => {
                    debug!("Stat failed for {}, treating as file: {}", id, e);
                    file_changes.push((id.clone(), checked));
                }
            }
        }

        (file_changes, dir_changes)
    }

    /// Propagates a directory toggle to its descendants. Files in `pinned`
    /// were changed individually in the same batch and are left alone.
    fn update_directory_selection(
        &self,
        dir: &FileId,
        prefix: &str,
        checked: bool,
        pinned: &HashSet<&FileId>,
    ) {
        if checked {
            match self.files.find_files(dir, ALL_FILES_GLOB) {
                Ok(descendants) => {
                    debug!("Selecting {} files under {}", descendants.len(), dir);
                    lock(&self.selected)
                        .extend(descendants.into_iter().filter(|id| !pinned.contains(id)));
                }
                Err(e) => warn!("Error reading directory {}: {}", dir, e),
            }
        } else {
            let mut selected = lock(&self.selected);
            let before = selected.len();
            selected.retain(|id| !id.is_under(prefix) || pinned.contains(id));
            debug!("Deselected {} files under {}", before - selected.len(), dir);
        }
    }

    fn persist(&self, snapshot: &[String]) -> anyhow::Result<()> {
        set_typed(self.storage.as_ref(), SELECTED_FILES_KEY, snapshot)
    }
}

fn snapshot_of(selected: &BTreeSet<FileId>) -> Vec<String> {
    selected.iter().map(|id| id.as_str().to_string()).collect()
}

pub fn aggregate_state(selected: usize, total: usize) -> DirectoryAggregateState {
    if total == 0 || selected == 0 {
        DirectoryAggregateState::Unselected
    } else if selected == total {
        DirectoryAggregateState::FullySelected
    } else {
        DirectoryAggregateState::PartiallySelected
    }
}
