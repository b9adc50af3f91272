use crate::domain::models::{FileId, FileKind, FileStat};
use anyhow::Context;
use globset::{GlobBuilder, GlobMatcher};
use log::{debug, info, warn};
use std::fs;
use std::path::Path;

/// Glob used when a whole directory is expanded to its files.
pub const ALL_FILES_GLOB: &str = "**/*";

/// Host file-system collaborator consumed by the core.
pub trait FileAccess: Send + Sync {
    fn stat(&self, id: &FileId) -> anyhow::Result<FileStat>;

    fn read_directory(&self, id: &FileId) -> anyhow::Result<Vec<(String, FileKind)>>;

    fn read_file(&self, id: &FileId) -> anyhow::Result<Vec<u8>>;

    /// Every file below `root` whose root-relative path matches `pattern`.
    fn find_files(&self, root: &FileId, pattern: &str) -> anyhow::Result<Vec<FileId>>;
}

pub(crate) fn compile_glob(pattern: &str) -> anyhow::Result<GlobMatcher> {
    Ok(GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .with_context(|| format!("Invalid glob pattern: {}", pattern))?
        .compile_matcher())
}

fn is_excluded(relative: &str, exclude_patterns: &[String]) -> bool {
    !relative.is_empty()
        && exclude_patterns
            .iter()
            .any(|pat| !pat.is_empty() && relative.contains(pat.as_str()))
}

pub struct LocalFileSystem {
    exclude_patterns: Vec<String>,
}

impl LocalFileSystem {
    pub fn new(exclude_patterns: Vec<String>) -> Self {
        Self { exclude_patterns }
    }
}

impl FileAccess for LocalFileSystem {
    fn stat(&self, id: &FileId) -> anyhow::Result<FileStat> {
        let metadata = fs::metadata(id.to_path())
            .with_context(|| format!("Failed to stat {}", id))?;
        let kind = if metadata.is_dir() {
            FileKind::Directory
        } else {
            FileKind::File
        };
        Ok(FileStat {
            kind,
            size: metadata.len(),
        })
    }

    fn read_directory(&self, id: &FileId) -> anyhow::Result<Vec<(String, FileKind)>> {
        let path = id.to_path();
        debug!("Reading directory: {}", path.display());

        let mut entries = Vec::new();
        for entry in fs::read_dir(&path)
            .with_context(|| format!("Error reading directory {}", path.display()))?
        {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if is_excluded(&name, &self.exclude_patterns) {
                continue;
            }
            let kind = if entry.file_type()?.is_dir() {
                FileKind::Directory
            } else {
                FileKind::File
            };
            entries.push((name, kind));
        }
        Ok(entries)
    }

    fn read_file(&self, id: &FileId) -> anyhow::Result<Vec<u8>> {
        let path = id.to_path();
        debug!("Reading file contents: {}", path.display());
        let bytes = fs::read(&path).with_context(|| format!("Error reading {}", path.display()))?;
        debug!("Read {} bytes from file", bytes.len());
        Ok(bytes)
    }

    fn find_files(&self, root: &FileId, pattern: &str) -> anyhow::Result<Vec<FileId>> {
        let root_path = root.to_path();
        let metadata = fs::metadata(&root_path)
            .with_context(|| format!("Error reading directory {}", root_path.display()))?;
        if !metadata.is_dir() {
            anyhow::bail!("Not a directory: {}", root_path.display());
        }

        let matcher = compile_glob(pattern)?;
        let mut result = Vec::new();

        for entry in walkdir::WalkDir::new(&root_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                let relative = relative_to(e.path(), &root_path);
                !is_excluded(&relative, &self.exclude_patterns)
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", root_path.display(), e);
                    None
                }
            })
        {
            if entry.file_type().is_dir() || entry.file_type().is_symlink() {
                continue;
            }

            let relative = relative_to(entry.path(), &root_path);
            if matcher.is_match(&relative) {
                result.push(FileId::from_path(entry.path())?);
            }
        }

        info!("Found {} files under {}", result.len(), root_path.display());
        Ok(result)
    }
}

fn relative_to(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut file = File::create(path).unwrap();
        write!(file, "{}", content).unwrap();
    }

    #[test]
    fn test_read_file() {
        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "test.txt", "Test content\n");

        let fs_access = LocalFileSystem::new(Vec::new());
        let id = FileId::from_path(&temp_dir.path().join("test.txt")).unwrap();

        assert_eq!(fs_access.read_file(&id).unwrap(), b"Test content\n");
        assert_eq!(fs_access.stat(&id).unwrap().size, 13);
        assert_eq!(fs_access.stat(&id).unwrap().kind, FileKind::File);
    }

    #[test]
    fn test_read_nonexistent_file_errors() {
        let temp_dir = TempDir::new().unwrap();
        let fs_access = LocalFileSystem::new(Vec::new());
        let id = FileId::from_path(&temp_dir.path().join("nonexistent.txt")).unwrap();

        assert!(fs_access.read_file(&id).is_err());
        assert!(fs_access.stat(&id).is_err());
    }

    #[test]
    fn test_find_files_recurses_and_excludes() {
        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "a.rs", "a");
        write_file(temp_dir.path(), "src/b.rs", "b");
        write_file(temp_dir.path(), "src/deep/c.rs", "c");
        write_file(temp_dir.path(), "target/debug/out.bin", "x");

        let fs_access = LocalFileSystem::new(vec!["target".to_string()]);
        let root = FileId::from_path(temp_dir.path()).unwrap();
        let found = fs_access.find_files(&root, ALL_FILES_GLOB).unwrap();

        let relative: Vec<String> = found.iter().map(|id| id.display_path(&root)).collect();
        assert_eq!(relative, vec!["a.rs", "src/b.rs", "src/deep/c.rs"]);
    }

    #[test]
    fn test_find_files_respects_pattern() {
        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "a.rs", "a");
        write_file(temp_dir.path(), "notes.md", "n");

        let fs_access = LocalFileSystem::new(Vec::new());
        let root = FileId::from_path(temp_dir.path()).unwrap();
        let found = fs_access.find_files(&root, "**/*.rs").unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].display_path(&root), "a.rs");
    }

    #[test]
    fn test_find_files_on_missing_directory_errors() {
        let temp_dir = TempDir::new().unwrap();
        let fs_access = LocalFileSystem::new(Vec::new());
        let gone = FileId::from_path(&temp_dir.path().join("gone")).unwrap();

        assert!(fs_access.find_files(&gone, ALL_FILES_GLOB).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_find_files_continues_past_unreadable_subdirectory() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "a.rs", "a");
        write_file(temp_dir.path(), "locked/secret.rs", "s");
        write_file(temp_dir.path(), "src/b.rs", "b");
        let locked = temp_dir.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let fs_access = LocalFileSystem::new(Vec::new());
        let root = FileId::from_path(temp_dir.path()).unwrap();
        let found = fs_access.find_files(&root, ALL_FILES_GLOB);

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        // Root ignores the mode bits, so the locked file may or may not show up.
        let relative: Vec<String> = found
            .unwrap()
            .iter()
            .map(|id| id.display_path(&root))
            .filter(|p| !p.starts_with("locked/"))
            .collect();
        assert_eq!(relative, vec!["a.rs", "src/b.rs"]);
    }

    #[test]
    fn test_read_directory_lists_kinds() {
        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "a.rs", "a");
        write_file(temp_dir.path(), "src/b.rs", "b");
        write_file(temp_dir.path(), ".git/HEAD", "ref");

        let fs_access = LocalFileSystem::new(vec![".git".to_string()]);
        let root = FileId::from_path(temp_dir.path()).unwrap();
        let mut entries = fs_access.read_directory(&root).unwrap();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(
            entries,
            vec![
                ("a.rs".to_string(), FileKind::File),
                ("src".to_string(), FileKind::Directory),
            ]
        );
        assert_eq!(fs_access.stat(&root).unwrap().kind, FileKind::Directory);
    }

    #[test]
    fn test_memory_file_system_listing() {
        let mem = memory::MemoryFileSystem::new();
        mem.add_file("file:///w/a.rs", "a");
        mem.add_file("file:///w/src/b.rs", "b");
        mem.add_dir("file:///w/empty");

        let root = FileId::from_canonical("file:///w");
        let entries = mem.read_directory(&root).unwrap();

        assert_eq!(
            entries,
            vec![
                ("a.rs".to_string(), FileKind::File),
                ("empty".to_string(), FileKind::Directory),
                ("src".to_string(), FileKind::Directory),
            ]
        );
        assert_eq!(mem.find_files(&root, ALL_FILES_GLOB).unwrap().len(), 2);
        assert_eq!(
            mem.stat(&FileId::from_canonical("file:///w/empty")).unwrap().kind,
            FileKind::Directory
        );
    }
}
