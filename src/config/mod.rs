// src/config/mod.rs

//! Configuration loading and validation for assetdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate names, references and acyclicity (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{
    AddOptions, BindingConfig, CleanConfig, CommandOptions, ConcatOptions, ConfigFile,
    ConfigSection, FanoutOptions, FilterOptions, NewerOptions, PipelineConfig, RawConfigFile, RenameOptions,
    StageConfig, TaskConfig, WatchConfig,
};
