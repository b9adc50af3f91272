use crate::core::directory_view::list_children;
use crate::core::prompt_pipeline::generate;
use crate::core::selection_store::SelectionStore;
use crate::core::token_estimator::TokenEstimator;
use crate::domain::errors::PromptError;
use crate::domain::models::{
    CheckboxState, DirectoryAggregateState, FileId, FileKind, PromptFormat, PromptOptions,
};
use crate::infra::file_system::{FileAccess, LocalFileSystem};
use crate::infra::key_value_store::{JsonFileStore, KeyValueStore};
use crate::infra::logger::setup_logger;
use crate::infra::output::write_output;
use clap::{Parser, Subcommand};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const STATE_DIR: &str = ".prompt-weaver";

#[derive(Parser)]
#[command(name = "prompt-weaver")]
#[command(about = "Select workspace files and weave them into one LLM prompt", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Workspace root; relative paths are resolved against it.
    #[arg(long, global = true, default_value = ".")]
    pub workspace: String,

    /// State file, defaults to <workspace>/.prompt-weaver/state.json
    #[arg(long, global = true)]
    pub state: Option<String>,

    #[arg(long, global = true, default_value = ".git,target,node_modules,.prompt-weaver")]
    pub exclude: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check files or directories
    Select { paths: Vec<String> },

    /// Uncheck files or directories
    Deselect { paths: Vec<String> },

    /// Flip one file or directory
    Toggle { path: String },

    /// Apply a batch of PATH=STATE changes (checked, unchecked, mixed)
    Apply { changes: Vec<String> },

    /// Print the selected files
    List,

    /// Show a directory's children with their selection state
    Tree { dir: Option<String> },

    /// Print the aggregate state of a directory
    State { dir: String },

    /// Estimate tokens for paths, or for the selection when none are given
    Estimate { paths: Vec<String> },

    /// Selected file count and prompt size
    Status,

    /// Build the prompt from the current selection
    Generate {
        #[arg(long)]
        format: Option<String>,

        #[arg(long)]
        header: Option<String>,

        #[arg(long)]
        thinking: bool,

        #[arg(long)]
        output: Option<String>,

        #[arg(long)]
        clipboard: bool,
    },

    /// Persist prompt options
    Settings {
        #[arg(long)]
        format: Option<String>,

        #[arg(long)]
        header: Option<String>,

        #[arg(long)]
        thinking: Option<bool>,
    },
}

struct Workspace {
    root: FileId,
    files: Arc<dyn FileAccess>,
    storage: Arc<dyn KeyValueStore>,
    selection: SelectionStore,
    estimator: TokenEstimator,
}

impl Workspace {
    fn open(cli: &Cli) -> anyhow::Result<Self> {
        let root_path = PathBuf::from(&cli.workspace);
        let root = FileId::from_path(&root_path)?;
        let state_path = match &cli.state {
            Some(path) => PathBuf::from(path),
            None => root.to_path().join(STATE_DIR).join("state.json"),
        };
        debug!("Workspace {} with state at {}", root, state_path.display());

        let excludes: Vec<String> = cli
            .exclude
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let files: Arc<dyn FileAccess> = Arc::new(LocalFileSystem::new(excludes));
        let storage: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(&state_path)?);
        let selection = SelectionStore::load(Arc::clone(&storage), Arc::clone(&files));
        let estimator = TokenEstimator::new(Arc::clone(&files));

        Ok(Self {
            root,
            files,
            storage,
            selection,
            estimator,
        })
    }

    /// Relative paths are taken from the workspace root, matching what
    /// `list` and `tree` print.
    fn resolve(&self, path: &str) -> anyhow::Result<FileId> {
        let path = Path::new(path);
        if path.is_absolute() {
            FileId::from_path(path)
        } else {
            FileId::from_path(&self.root.to_path().join(path))
        }
    }

    fn display(&self, id: &FileId) -> String {
        id.display_path(&self.root)
    }

    /// Live size readout after a selection change, computed by the same
    /// pipeline that `generate` uses.
    fn report_status(&self) -> anyhow::Result<()> {
        let options = PromptOptions::load(self.storage.as_ref());
        match generate(&self.selection, &options, self.files.as_ref(), &self.root) {
            Ok(prompt) => println!(
                "{} files selected, Tokens: ~{}",
                self.selection.len(),
                prompt.token_count
            ),
            Err(PromptError::NoSelection) => println!("0 files selected, Tokens: 0"),
        }
        Ok(())
    }
}

fn parse_change(raw: &str) -> anyhow::Result<(String, CheckboxState)> {
    let (path, state) = raw
        .rsplit_once('=')
        .ok_or_else(|| anyhow::anyhow!("Expected PATH=STATE, got {}", raw))?;
    Ok((path.to_string(), state.parse()?))
}

fn checkbox_glyph(state: DirectoryAggregateState) -> &'static str {
    match state {
        DirectoryAggregateState::FullySelected => "[x]",
        DirectoryAggregateState::PartiallySelected => "[-]",
        DirectoryAggregateState::Unselected => "[ ]",
    }
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logger(cli.verbose)?;

    info!("Opening workspace {}", cli.workspace);
    let workspace = Workspace::open(&cli)?;
    execute(&workspace, cli.command)
}

fn execute(ws: &Workspace, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Select { paths } => {
            apply_uniform(ws, &paths, CheckboxState::Checked)?;
            ws.report_status()
        }
        Commands::Deselect { paths } => {
            apply_uniform(ws, &paths, CheckboxState::Unchecked)?;
            ws.report_status()
        }
        Commands::Toggle { path } => {
            let id = ws.resolve(&path)?;
            let state = ws.selection.toggle_selection(&id)?;
            let label = match state {
                CheckboxState::Checked => "checked",
                _ => "unchecked",
            };
            println!("{} {}", ws.display(&id), label);
            ws.report_status()
        }
        Commands::Apply { changes } => {
            let mut batch = Vec::with_capacity(changes.len());
            for raw in &changes {
                let (path, state) = parse_change(raw)?;
                batch.push((ws.resolve(&path)?, state));
            }
            ws.selection.apply_bulk_changes(&batch)?;
            ws.report_status()
        }
        Commands::List => {
            for id in ws.selection.list_selected() {
                println!("{}", ws.display(&id));
            }
            Ok(())
        }
        Commands::Tree { dir } => {
            let dir = match dir {
                Some(path) => ws.resolve(&path)?,
                None => ws.root.clone(),
            };
            for entry in list_children(&dir, ws.files.as_ref(), &ws.selection, &ws.estimator) {
                let suffix = if entry.kind == FileKind::Directory { "/" } else { "" };
                println!(
                    "{} {}{}  {}",
                    checkbox_glyph(entry.state),
                    entry.name,
                    suffix,
                    entry.description
                );
            }
            Ok(())
        }
        Commands::State { dir } => {
            let id = ws.resolve(&dir)?;
            println!("{}", ws.selection.directory_aggregate_state(&id));
            Ok(())
        }
        Commands::Estimate { paths } => {
            let ids = if paths.is_empty() {
                ws.selection.list_selected()
            } else {
                paths
                    .iter()
                    .map(|p| ws.resolve(p))
                    .collect::<anyhow::Result<Vec<_>>>()?
            };
            println!("~{} tokens", ws.estimator.estimate(&ids));
            Ok(())
        }
        Commands::Status => ws.report_status(),
        Commands::Generate {
            format,
            header,
            thinking,
            output,
            clipboard,
        } => {
            let mut options = PromptOptions::load(ws.storage.as_ref());
            if let Some(format) = format {
                options.format = format.parse::<PromptFormat>()?;
            }
            if let Some(header) = header {
                options.header = header;
            }
            if thinking {
                options.append_reasoning_instruction = true;
            }
            debug!("Prompt options: {:?}", options);

            let prompt = generate(&ws.selection, &options, ws.files.as_ref(), &ws.root)?;
            for file in &prompt.files {
                debug!("Included {} (~{} tokens)", file.path, file.token_count);
            }
            for warning in &prompt.warnings {
                eprintln!("⚠ {}", warning);
            }
            write_output(&prompt, output, clipboard)
        }
        Commands::Settings {
            format,
            header,
            thinking,
        } => {
            let mut options = PromptOptions::load(ws.storage.as_ref());
            let changed = format.is_some() || header.is_some() || thinking.is_some();
            if let Some(format) = format {
                options.format = format.parse::<PromptFormat>()?;
            }
            if let Some(header) = header {
                options.header = header;
            }
            if let Some(thinking) = thinking {
                options.append_reasoning_instruction = thinking;
            }
            if changed {
                options.save(ws.storage.as_ref())?;
            }

            println!("format: {}", options.format);
            println!("thinking tags: {}", options.append_reasoning_instruction);
            println!("header:\n{}", options.header);
            Ok(())
        }
    }
}

fn apply_uniform(ws: &Workspace, paths: &[String], state: CheckboxState) -> anyhow::Result<()> {
    if paths.is_empty() {
        anyhow::bail!("No paths given");
    }
    let batch = paths
        .iter()
        .map(|p| ws.resolve(p).map(|id| (id, state)))
        .collect::<anyhow::Result<Vec<_>>>()?;
    ws.selection.apply_bulk_changes(&batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "prompt-weaver",
            "generate",
            "--workspace",
            "./project",
            "--format",
            "xml",
            "--thinking",
            "--output",
            "prompt.md",
        ])
        .unwrap();

        assert_eq!(cli.workspace, "./project");
        match cli.command {
            Commands::Generate {
                format,
                thinking,
                output,
                clipboard,
                ..
            } => {
                assert_eq!(format, Some("xml".to_string()));
                assert!(thinking);
                assert_eq!(output, Some("prompt.md".to_string()));
                assert!(!clipboard);
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn test_cli_parsing_apply_and_defaults() {
        let cli =
            Cli::try_parse_from(["prompt-weaver", "apply", "src=checked", "src/a.rs=off"]).unwrap();

        assert_eq!(cli.workspace, ".");
        assert_eq!(cli.exclude, ".git,target,node_modules,.prompt-weaver");
        match cli.command {
            Commands::Apply { changes } => assert_eq!(changes.len(), 2),
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_parse_change() {
        let (path, state) = parse_change("dir/a=b.rs=unchecked").unwrap();
        assert_eq!(path, "dir/a=b.rs");
        assert_eq!(state, CheckboxState::Unchecked);

        assert!(parse_change("no-state").is_err());
        assert!(parse_change("a.rs=sometimes").is_err());
    }

    fn cli_for(root: &Path, args: &[&str]) -> Cli {
        let mut argv = vec!["prompt-weaver", "--workspace"];
        let root = root.to_str().unwrap();
        argv.push(root);
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_select_directory_then_generate_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/a.rs"), "fn a() {}").unwrap();
        fs::write(root.join("src/b.rs"), "fn b() {}").unwrap();

        let src = root.join("src").to_string_lossy().to_string();
        let cli = cli_for(root, &["select", &src]);
        let ws = Workspace::open(&cli).unwrap();
        execute(&ws, cli.command).unwrap();
        assert_eq!(ws.selection.len(), 2);
        assert!(root.join(STATE_DIR).join("state.json").exists());

        let out = root.join("prompt.md").to_string_lossy().to_string();
        let cli = cli_for(root, &["generate", "--header", "H", "--output", &out]);
        let ws = Workspace::open(&cli).unwrap();
        execute(&ws, cli.command).unwrap();

        let written = fs::read_to_string(root.join("prompt.md")).unwrap();
        assert_eq!(
            written,
            "H\n\n## src/a.rs\n```\nfn a() {}\n```\n\n## src/b.rs\n```\nfn b() {}\n```"
        );
    }

    #[test]
    fn test_listed_paths_resolve_against_workspace() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/a.rs"), "fn a() {}").unwrap();
        fs::write(root.join("src/b.rs"), "fn b() {}").unwrap();

        let cli = cli_for(root, &["select", "src"]);
        let ws = Workspace::open(&cli).unwrap();
        execute(&ws, cli.command).unwrap();
        let listed: Vec<String> = ws
            .selection
            .list_selected()
            .iter()
            .map(|id| ws.display(id))
            .collect();
        assert_eq!(listed, vec!["src/a.rs", "src/b.rs"]);

        let cli = cli_for(root, &["deselect", "src/a.rs"]);
        let ws = Workspace::open(&cli).unwrap();
        execute(&ws, cli.command).unwrap();
        assert_eq!(ws.selection.len(), 1);
        assert!(!ws.selection.is_selected(&ws.resolve("src/a.rs").unwrap()));
        assert_eq!(
            ws.resolve("src/b.rs").unwrap(),
            FileId::from_path(&root.join("src").join("b.rs")).unwrap()
        );
    }

    #[test]
    fn test_generate_without_selection_fails() {
        let temp_dir = TempDir::new().unwrap();
        let cli = cli_for(temp_dir.path(), &["generate"]);
        let ws = Workspace::open(&cli).unwrap();

        let err = execute(&ws, cli.command).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PromptError>(),
            Some(PromptError::NoSelection)
        ));
    }

    #[test]
    fn test_settings_persist() {
        let temp_dir = TempDir::new().unwrap();
        let cli = cli_for(
            temp_dir.path(),
            &["settings", "--format", "xml", "--thinking", "true"],
        );
        let ws = Workspace::open(&cli).unwrap();
        execute(&ws, cli.command).unwrap();

        let cli = cli_for(temp_dir.path(), &["status"]);
        let ws = Workspace::open(&cli).unwrap();
        let options = PromptOptions::load(ws.storage.as_ref());
        assert_eq!(options.format, PromptFormat::Xml);
        assert!(options.append_reasoning_instruction);
    }
}
