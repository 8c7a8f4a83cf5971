use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use stackrun::config::{
    ConfigFile, RawCloudSection, RawConfigFile, RawRunSection, StackConfig,
};
use stackrun::stack::{select_stacks, Stack};
use tempfile::TempDir;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                run: RawRunSection::default(),
                cloud: None,
                stack: BTreeMap::new(),
            },
        }
    }

    pub fn with_stack(mut self, name: &str, path: &str, id: Option<&str>) -> Self {
        self.config.stack.insert(
            name.to_string(),
            StackConfig {
                path: path.to_string(),
                id: id.map(str::to_string),
            },
        );
        self
    }

    pub fn with_interrupt_limit(mut self, limit: u32) -> Self {
        self.config.run.interrupt_limit = limit;
        self
    }

    pub fn with_kill_after(mut self, kill_after: &str) -> Self {
        self.config.run.kill_after = Some(kill_after.to_string());
        self
    }

    pub fn with_cloud(mut self, base_url: &str, org_id: &str) -> Self {
        self.config.cloud = Some(RawCloudSection {
            base_url: base_url.to_string(),
            org_id: org_id.to_string(),
            max_attempts: 3,
            retry_delay: "10ms".to_string(),
            on_report_failure: Default::default(),
            token_env: "STACKRUN_CLOUD_TOKEN".to_string(),
        });
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A temporary directory holding a manifest and one directory per stack.
pub struct StackWorkspace {
    dir: TempDir,
    manifest: String,
}

impl StackWorkspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
            manifest: String::new(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.path().join("Stackrun.toml")
    }

    /// Add raw TOML (e.g. a `[run]` or `[cloud]` section) to the manifest.
    pub fn with_section(mut self, toml: &str) -> Self {
        self.manifest.push_str(toml);
        self.manifest.push('\n');
        self
    }

    /// Create `path` on disk and declare it as stack `name`.
    pub fn with_stack(mut self, name: &str, path: &str, id: Option<&str>) -> Self {
        fs::create_dir_all(self.dir.path().join(path)).expect("create stack dir");
        self.manifest
            .push_str(&format!("[stack.{name}]\npath = \"{path}\"\n"));
        if let Some(id) = id {
            self.manifest.push_str(&format!("id = \"{id}\"\n"));
        }
        self.manifest.push('\n');
        self
    }

    /// Declare a stack without creating its directory.
    pub fn with_missing_stack(mut self, name: &str, path: &str) -> Self {
        self.manifest
            .push_str(&format!("[stack.{name}]\npath = \"{path}\"\n\n"));
        self
    }

    /// Write the manifest and load it back.
    pub fn load(&self) -> ConfigFile {
        fs::write(self.manifest_path(), &self.manifest).expect("write manifest");
        stackrun::config::load_and_validate(self.manifest_path()).expect("valid manifest")
    }

    /// Stacks in processing order, paths resolved against the workspace.
    pub fn stacks(&self) -> Vec<Stack> {
        select_stacks(&self.load(), self.root())
    }
}

impl Default for StackWorkspace {
    fn default() -> Self {
        Self::new()
    }
}
