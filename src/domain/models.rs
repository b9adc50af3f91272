use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

const FILE_SCHEME: &str = "file://";

/// Canonical identifier of a file-system resource: `file://` followed by the
/// absolute, `/`-separated path. Equality is plain string equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// Builds an id from a path without touching the disk. Relative paths are
    /// joined onto the current directory and `.`/`..` are folded lexically.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        let mut normalized = PathBuf::new();
        for component in absolute.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    normalized.pop();
                }
                other => normalized.push(other.as_os_str()),
            }
        }

        let mut text = normalized.to_string_lossy().replace('\\', "/");
        if !text.starts_with('/') {
            text.insert(0, '/');
        }
        while text.len() > 1 && text.ends_with('/') {
            text.pop();
        }

        Ok(FileId(format!("{}{}", FILE_SCHEME, text)))
    }

    /// Wraps an already-canonical id, e.g. one loaded from the store.
    pub fn from_canonical(id: impl Into<String>) -> Self {
        FileId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_path(&self) -> PathBuf {
        PathBuf::from(self.0.strip_prefix(FILE_SCHEME).unwrap_or(&self.0))
    }

    /// Separator-terminated form used for "is under this directory" checks.
    /// `file:///a/foo/` is not a prefix of `file:///a/foobar/x`.
    pub fn dir_prefix(&self) -> String {
        if self.0.ends_with('/') {
            self.0.clone()
        } else {
            format!("{}/", self.0)
        }
    }

    pub fn is_under(&self, dir_prefix: &str) -> bool {
        self.0.starts_with(dir_prefix)
    }

    pub fn join(&self, name: &str) -> FileId {
        FileId(format!("{}{}", self.dir_prefix(), name))
    }

    /// Path relative to `root` when the id lies beneath it, otherwise the
    /// absolute path.
    pub fn display_path(&self, root: &FileId) -> String {
        match self.0.strip_prefix(&root.dir_prefix()) {
            Some(relative) if !relative.is_empty() => relative.to_string(),
            _ => self.to_path().to_string_lossy().to_string(),
        }
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub kind: FileKind,
    pub size: u64,
}

/// Checkbox value reported by the presentation layer for a bulk change.
/// Only `Checked` and `Unchecked` are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckboxState {
    Checked,
    Unchecked,
    Mixed,
}

impl FromStr for CheckboxState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "checked" | "on" | "true" => Ok(CheckboxState::Checked),
            "unchecked" | "off" | "false" => Ok(CheckboxState::Unchecked),
            "mixed" | "partial" => Ok(CheckboxState::Mixed),
            other => Err(anyhow::anyhow!("Unknown checkbox state: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryAggregateState {
    FullySelected,
    PartiallySelected,
    Unselected,
}

impl fmt::Display for DirectoryAggregateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DirectoryAggregateState::FullySelected => "fully-selected",
            DirectoryAggregateState::PartiallySelected => "partially-selected",
            DirectoryAggregateState::Unselected => "unselected",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFile {
    pub path: String,
    pub content: String,
    pub token_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptFormat {
    #[default]
    Markdown,
    Xml,
}

impl FromStr for PromptFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(PromptFormat::Markdown),
            "xml" => Ok(PromptFormat::Xml),
            other => Err(anyhow::anyhow!("Unknown prompt format: {}", other)),
        }
    }
}

impl fmt::Display for PromptFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptFormat::Markdown => f.write_str("markdown"),
            PromptFormat::Xml => f.write_str("xml"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptOptions {
    pub format: PromptFormat,
    pub header: String,
    pub append_reasoning_instruction: bool,
}

#[derive(Debug, Clone)]
pub struct GeneratedPrompt {
    pub text: String,
    pub files: Vec<ProcessedFile>,
    pub warnings: Vec<String>,
    pub token_count: usize,
}
