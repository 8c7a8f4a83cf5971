// src/config/mod.rs

//! Stack manifest loading and validation.
//!
//! - `model.rs`: TOML-backed raw model and the validated `ConfigFile`.
//! - `loader.rs`: read a manifest from disk.
//! - `validate.rs`: `TryFrom<RawConfigFile> for ConfigFile`.

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_root_dir, default_config_path, load_and_validate, load_from_path};
pub use model::{
    CloudSettings, ConfigFile, RawCloudSection, RawConfigFile, RawRunSection, RunSettings,
    StackConfig,
};
