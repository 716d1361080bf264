//! Bundled default scripts.

use std::io;
use std::path::Path;

use tracing::info;

/// Source of default scripts that can be copied into the script directory.
pub trait AssetSource: Send + Sync {
    /// Copy `file_name` into `dir`. Returns false if no such asset exists.
    fn materialize(&self, file_name: &str, dir: &Path) -> io::Result<bool>;
}

/// Scripts compiled into the binary.
pub struct EmbeddedAssets {
    entries: Vec<(String, String)>,
}

const BUNDLED: &[(&str, &str)] = &[
    ("welcome.lua", include_str!("../../assets/scripts/welcome.lua")),
    ("countdown.lua", include_str!("../../assets/scripts/countdown.lua")),
];

impl EmbeddedAssets {
    pub fn new<N, S>(entries: impl IntoIterator<Item = (N, S)>) -> Self
    where
        N: Into<String>,
        S: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(name, source)| (name.into(), source.into()))
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The scripts shipped under `assets/scripts/`.
    pub fn bundled() -> Self {
        Self::new(BUNDLED.iter().copied())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

impl AssetSource for EmbeddedAssets {
    fn materialize(&self, file_name: &str, dir: &Path) -> io::Result<bool> {
        let Some((_, source)) = self.entries.iter().find(|(name, _)| name == file_name) else {
            return Ok(false);
        };

        std::fs::create_dir_all(dir)?;
        let target = dir.join(file_name);
        std::fs::write(&target, source)?;
        info!(target: "host", "Copied bundled script to {}", target.display());
        Ok(true)
    }
}
