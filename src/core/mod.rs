pub mod directory_view;
pub mod prompt_assembler;
pub mod prompt_pipeline;
pub mod selection_store;
pub mod settings;
pub mod token_estimator;
