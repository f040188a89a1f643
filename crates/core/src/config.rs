use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use gbdec_rom::Address;
use serde::Deserialize;

/// Per-ROM analysis settings, usually kept next to the image as
/// `game.gbdec.ron`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Manual caps on the number of entries of a jump table, keyed by the
    /// address of its first slot.
    #[serde(default)]
    pub jumptables: BTreeMap<Address, usize>,
    /// Call targets that dispatch through the table following the call.
    #[serde(default = "default_switch_dispatchers")]
    pub switch_dispatchers: Vec<Address>,
    /// Known procedure entry points.
    #[serde(default)]
    pub procedures: Vec<Address>,
}

fn default_switch_dispatchers() -> Vec<Address> {
    vec![Address::from_virtual(0x0000)]
}

impl Default for ProjectConfig {
    fn default() -> Self {
        default_config()
    }
}

pub fn load_config(path: &Path) -> Result<ProjectConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read project config '{}'", path.display()))?;
    ron::from_str(&text)
        .with_context(|| format!("failed to parse project config '{}'", path.display()))
}

pub fn default_config() -> ProjectConfig {
    ProjectConfig {
        jumptables: BTreeMap::new(),
        switch_dispatchers: default_switch_dispatchers(),
        procedures: Vec::new(),
    }
}
