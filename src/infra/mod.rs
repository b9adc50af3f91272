pub mod file_system;
pub mod key_value_store;
pub mod logger;
pub mod output;
