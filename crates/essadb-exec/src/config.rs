//! `EngineConfig`: the handful of knobs spec.md leaves unspecified (where
//! EDB files live, how big their blocks are). No external config-file
//! format is named by the spec, so this stays a plain struct with
//! `Default` rather than a parsed file, threaded explicitly through
//! `Engine::new` the way `essadb_helpers::Config` is meant to be used.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory EDB files are created/opened relative to.
    pub data_dir: PathBuf,
    /// Bytes per EDB block for newly created file-backed tables.
    pub edb_block_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            edb_block_size: 4096,
        }
    }
}

impl EngineConfig {
    pub fn edb_path(&self, table_name: &str) -> PathBuf {
        self.data_dir.join(format!("{table_name}.edb"))
    }
}
