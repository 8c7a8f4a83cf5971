// src/stack/mod.rs

//! Stacks and the (minimal) selection of stacks for a run.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::ConfigFile;

/// Independently addressable unit a command is run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stack {
    pub name: String,
    /// Directory the command runs in.
    pub path: PathBuf,
    /// Identifier known to the deployment-tracking service.
    pub id: Option<String>,
}

impl Stack {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The identifier, if present and not blank.
    pub fn remote_id(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }
}

impl fmt::Display for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.path.display())
    }
}

/// Every stack of the manifest, paths resolved against `root` and sorted by
/// path so the processing order never depends on map iteration.
pub fn select_stacks(cfg: &ConfigFile, root: &Path) -> Vec<Stack> {
    let mut stacks: Vec<Stack> = cfg
        .stack
        .iter()
        .map(|(name, stack)| Stack {
            name: name.clone(),
            path: root.join(stack.path.trim().trim_start_matches("./")),
            id: stack.id.clone(),
        })
        .collect();

    stacks.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.name.cmp(&b.name)));
    stacks
}
