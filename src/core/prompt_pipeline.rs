use crate::core::prompt_assembler::{PromptFile, assemble_prompt};
use crate::core::selection_store::SelectionStore;
use crate::core::token_estimator::estimate_for_len;
use crate::domain::errors::PromptError;
use crate::domain::models::{FileId, GeneratedPrompt, ProcessedFile, PromptOptions};
use crate::infra::file_system::FileAccess;
use log::{debug, info, warn};

/// Reads every id in order. A failed read is recorded as a warning and the
/// file is left out; the rest still go through.
pub fn process_files(
    ids: &[FileId],
    files: &dyn FileAccess,
    workspace_root: &FileId,
) -> (Vec<ProcessedFile>, Vec<String>) {
    let mut processed = Vec::new();
    let mut warnings = Vec::new();

    for id in ids {
        match files.read_file(id) {
            Ok(bytes) => {
                let content = String::from_utf8_lossy(&bytes).into_owned();
                let token_count = estimate_for_len(bytes.len());
                debug!("Adding file {} with ~{} tokens", id, token_count);
                processed.push(ProcessedFile {
                    path: id.display_path(workspace_root),
                    content,
                    token_count,
                });
            }
            Err(e) => {
                let message = format!("Error reading {}: {}", id.to_path().display(), e);
                warn!("{}", message);
                warnings.push(message);
            }
        }
    }

    (processed, warnings)
}

/// End-to-end prompt for the current selection. Used both for explicit
/// generation and for the live size estimate.
pub fn generate(
    selection: &SelectionStore,
    options: &PromptOptions,
    files: &dyn FileAccess,
    workspace_root: &FileId,
) -> Result<GeneratedPrompt, PromptError> {
    let ids = selection.list_selected();
    if ids.is_empty() {
        return Err(PromptError::NoSelection);
    }

    let (processed, warnings) = process_files(&ids, files, workspace_root);

    let prompt_files: Vec<PromptFile<'_>> = processed
        .iter()
        .map(|f| PromptFile {
            path: &f.path,
            content: &f.content,
        })
        .collect();
    let text = assemble_prompt(&prompt_files, options);
    let token_count = estimate_for_len(text.len());

    info!(
        "Generated prompt from {} of {} files (~{} tokens)",
        processed.len(),
        ids.len(),
        token_count
    );

    Ok(GeneratedPrompt {
        text,
        files: processed,
        warnings,
        token_count,
    })
}
