use crate::domain::models::{PromptFormat, PromptOptions};
use log::debug;

pub const REASONING_INSTRUCTION: &str = "Please think through your response step by step before answering. \
Wrap that reasoning in <thinking>...</thinking> XML tags.";

/// One file as it enters the prompt.
#[derive(Debug, Clone, Copy)]
pub struct PromptFile<'a> {
    pub path: &'a str,
    pub content: &'a str,
}

/// Serializes files in the given order; no sorting or deduplication happens
/// here.
pub fn assemble_prompt(files: &[PromptFile<'_>], options: &PromptOptions) -> String {
    debug!(
        "Assembling {} prompt from {} files",
        options.format,
        files.len()
    );

    let base = match options.format {
        PromptFormat::Markdown => build_markdown(files, &options.header),
        PromptFormat::Xml => build_xml(files, &options.header),
    };

    if options.append_reasoning_instruction {
        format!("{}\n\n{}", base, REASONING_INSTRUCTION)
    } else {
        base
    }
}

fn build_markdown(files: &[PromptFile<'_>], header: &str) -> String {
    let body = files
        .iter()
        .map(|f| format!("## {}\n```\n{}\n```", f.path, f.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{}\n\n{}", header, body).trim().to_string()
}

fn build_xml(files: &[PromptFile<'_>], header: &str) -> String {
    let mut result = String::new();

    result.push_str("<prompt>\n");
    result.push_str(&format!(
        "  <instructions>{}</instructions>\n",
        escape_xml(header)
    ));

    if files.is_empty() {
        result.push_str("  <context></context>\n");
    } else {
        result.push_str("  <context>\n");
        for file in files {
            result.push_str(&format!(
                "    <file path=\"{}\">\n{}\n</file>\n",
                escape_xml(file.path),
                escape_xml(file.content)
            ));
        }
        result.push_str("  </context>\n");
    }

    result.push_str("</prompt>");
    result.trim().to_string()
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
