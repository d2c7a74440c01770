//! Configuration loading for mnemo: `mnemo.toml` plus environment overrides.

pub mod loader;
pub mod paths;
pub mod schema;

pub use {
    loader::{ConfigError, apply_env_overrides, load, load_from, load_with},
    paths::{config_dir, data_dir},
    schema::{EmbeddingsSection, MemorySection, MnemoConfig},
};
