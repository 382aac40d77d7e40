//! Filesystem infrastructure: implements `ConfigFiles`.

use std::path::Path;

use anyhow::{Context, Result};

use crate::application::ports::ConfigFiles;

/// Production filesystem implementation of `ConfigFiles`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl ConfigFiles for LocalFs {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).with_context(|| format!("reading file {}", path.display()))
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        std::fs::write(path, content).with_context(|| format!("writing file {}", path.display()))
    }
}
