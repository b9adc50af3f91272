use crate::domain::models::{PromptFormat, PromptOptions};
use crate::infra::key_value_store::{
    KeyValueStore, PROMPT_FORMAT_KEY, PROMPT_HEADER_KEY, THINKING_TAGS_KEY, get_or, set_typed,
};
use log::{info, warn};

pub const DEFAULT_PROMPT_HEADER: &str =
    "Analyze the following codebase structure and contents:\n\n[PROJECT OVERVIEW]\n";

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            format: PromptFormat::Markdown,
            header: DEFAULT_PROMPT_HEADER.to_string(),
            append_reasoning_instruction: false,
        }
    }
}

impl PromptOptions {
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let raw_format: String = get_or(store, PROMPT_FORMAT_KEY, PromptFormat::default().to_string());
        let format = raw_format.parse().unwrap_or_else(|e| {
            warn!("{}, falling back to markdown", e);
            PromptFormat::Markdown
        });

        Self {
            format,
            header: get_or(store, PROMPT_HEADER_KEY, DEFAULT_PROMPT_HEADER.to_string()),
            append_reasoning_instruction: get_or(store, THINKING_TAGS_KEY, false),
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> anyhow::Result<()> {
        set_typed(store, PROMPT_FORMAT_KEY, &self.format)?;
        set_typed(store, PROMPT_HEADER_KEY, &self.header)?;
        set_typed(store, THINKING_TAGS_KEY, &self.append_reasoning_instruction)?;
        info!(
            "Prompt settings saved: format={}, thinking tags={}",
            self.format, self.append_reasoning_instruction
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::key_value_store::MemoryStore;
    use serde_json::json;

    #[test]
    fn test_defaults_when_store_is_empty() {
        let store = MemoryStore::new();
        assert_eq!(PromptOptions::load(&store), PromptOptions::default());
    }

    #[test]
    fn test_save_then_load() {
        let store = MemoryStore::new();
        let options = PromptOptions {
            format: PromptFormat::Xml,
            header: "Review".to_string(),
            append_reasoning_instruction: true,
        };
        options.save(&store).unwrap();

        assert_eq!(store.get(PROMPT_FORMAT_KEY), Some(json!("xml")));
        assert_eq!(PromptOptions::load(&store), options);
    }

    #[test]
    fn test_unknown_format_falls_back_to_markdown() {
        let store = MemoryStore::new();
        store.set(PROMPT_FORMAT_KEY, json!("yaml")).unwrap();
        assert_eq!(PromptOptions::load(&store).format, PromptFormat::Markdown);
    }
}
