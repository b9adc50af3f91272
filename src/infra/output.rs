#[cfg(feature = "clipboard-support")]
use clipboard::{ClipboardContext, ClipboardProvider};
use crate::domain::models::GeneratedPrompt;
use anyhow::Context;
use crossterm::{
    ExecutableCommand,
    style::{Color, ResetColor, SetForegroundColor},
};
use log::{debug, info};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

const PREVIEW_CHARS: usize = 200;

/// Where a generated prompt ends up. Each destination returns the status
/// line that describes the delivery.
pub trait PromptSink {
    fn deliver(&self, prompt: &GeneratedPrompt) -> anyhow::Result<String>;
}

pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PromptSink for FileSink {
    fn deliver(&self, prompt: &GeneratedPrompt) -> anyhow::Result<String> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&self.path, &prompt.text)
            .with_context(|| format!("Failed to write prompt to {}", self.path.display()))?;
        info!("Prompt written to {}", self.path.display());

        Ok(format!(
            "📝 {} written to {}",
            summary(prompt),
            self.path.display()
        ))
    }
}

/// Prompt on stdout so it can be piped; the status line stays on stderr.
pub struct ConsoleSink;

impl PromptSink for ConsoleSink {
    fn deliver(&self, prompt: &GeneratedPrompt) -> anyhow::Result<String> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(prompt.text.as_bytes())?;
        if !prompt.text.ends_with('\n') {
            stdout.write_all(b"\n")?;
        }
        stdout.flush()?;
        Ok(summary(prompt))
    }
}

#[cfg(feature = "clipboard-support")]
pub struct ClipboardSink;

#[cfg(feature = "clipboard-support")]
impl PromptSink for ClipboardSink {
    fn deliver(&self, prompt: &GeneratedPrompt) -> anyhow::Result<String> {
        let mut ctx: ClipboardContext = ClipboardProvider::new()
            .map_err(|e| anyhow::anyhow!("Failed to access clipboard: {}", e))?;
        ctx.set_contents(prompt.text.clone())
            .map_err(|e| anyhow::anyhow!("Failed to copy to clipboard: {}", e))?;
        info!("Prompt copied to clipboard ({} bytes)", prompt.text.len());

        Ok(format!(
            "📋 {} copied to clipboard\n\n{}",
            summary(prompt),
            preview(&prompt.text, PREVIEW_CHARS)
        ))
    }
}

pub fn sink_for(
    output_path: Option<String>,
    clipboard_output: bool,
) -> anyhow::Result<Box<dyn PromptSink>> {
    if clipboard_output {
        #[cfg(feature = "clipboard-support")]
        return Ok(Box::new(ClipboardSink) as Box<dyn PromptSink>);

        #[cfg(not(feature = "clipboard-support"))]
        anyhow::bail!("Clipboard support is not enabled in this build");
    }

    Ok(match output_path {
        Some(path) => Box::new(FileSink::new(path)) as Box<dyn PromptSink>,
        None => Box::new(ConsoleSink) as Box<dyn PromptSink>,
    })
}

/// "Prompt with 3 files (~120 tokens)", plus the skipped count when any file
/// was left out.
fn summary(prompt: &GeneratedPrompt) -> String {
    let noun = if prompt.files.len() == 1 { "file" } else { "files" };
    let mut line = format!(
        "Prompt with {} {} (~{} tokens)",
        prompt.files.len(),
        noun,
        prompt.token_count
    );
    if !prompt.warnings.is_empty() {
        line.push_str(&format!(", {} skipped", prompt.warnings.len()));
    }
    line
}

fn preview(content: &str, limit: usize) -> String {
    match content.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

/// Delivers the prompt and prints its status line to stderr: green when every
/// selected file made it in, yellow when some were skipped.
pub fn write_output(
    prompt: &GeneratedPrompt,
    output_path: Option<String>,
    clipboard_output: bool,
) -> anyhow::Result<()> {
    let sink = sink_for(output_path, clipboard_output)?;
    let status = sink.deliver(prompt)?;
    debug!("Delivered prompt: {}", status);

    let color = if prompt.warnings.is_empty() {
        Color::Green
    } else {
        Color::Yellow
    };
    let mut stderr = io::stderr();
    stderr.execute(SetForegroundColor(color))?;
    writeln!(stderr, "{}", status)?;
    stderr.execute(ResetColor)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ProcessedFile;
    use tempfile::TempDir;

    fn prompt(files: usize, warnings: usize) -> GeneratedPrompt {
        GeneratedPrompt {
            text: "## a.rs\n```\nfn main() {}\n```".to_string(),
            files: (0..files)
                .map(|i| ProcessedFile {
                    path: format!("f{}.rs", i),
                    content: String::new(),
                    token_count: 1,
                })
                .collect(),
            warnings: (0..warnings).map(|i| format!("skipped {}", i)).collect(),
            token_count: 8,
        }
    }

    #[test]
    fn test_file_sink_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out/nested/prompt.md");
        let generated = prompt(1, 0);

        let status = FileSink::new(&path).deliver(&generated).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), generated.text);
        assert!(status.contains("Prompt with 1 file (~8 tokens)"));
        assert!(status.ends_with(&path.display().to_string()));
    }

    #[test]
    fn test_write_output_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prompt.xml");
        let generated = prompt(2, 1);

        write_output(&generated, Some(path.to_string_lossy().to_string()), false).unwrap();

        assert_eq!(fs::read_to_string(path).unwrap(), generated.text);
    }

    #[test]
    fn test_summary_reports_skipped_files() {
        assert_eq!(summary(&prompt(3, 0)), "Prompt with 3 files (~8 tokens)");
        assert_eq!(
            summary(&prompt(1, 2)),
            "Prompt with 1 file (~8 tokens), 2 skipped"
        );
    }

    #[test]
    fn test_utf8_safe_preview() {
        let content =
            "اهلا مرحب عبدالله 🚀 This string has UTF-8 characters like: ├── ./src/file.rs";

        let shortened = preview(content, 20);
        assert_eq!(shortened.chars().count(), 23);
        assert!(shortened.ends_with("..."));
        assert_eq!(preview("short", 20), "short");
    }
}
