//! Script files on disk.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{BridgeError, Result};

/// Text of one script file, read once.
#[derive(Debug, Clone)]
pub struct ScriptSource {
    path: PathBuf,
    file_name: String,
    text: String,
}

impl ScriptSource {
    /// Read a script from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file_name = file_name_of(path)?;
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BridgeError::ScriptNotFound(file_name.clone()),
            _ => BridgeError::Io(e),
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            text,
        })
    }

    /// A script that does not live on disk.
    pub fn from_text(file_name: impl Into<String>, text: impl Into<String>) -> Self {
        let file_name = file_name.into();
        Self {
            path: PathBuf::from(&file_name),
            file_name,
            text: text.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Hex SHA-256 of the source text.
    pub fn digest(&self) -> String {
        let hash = Sha256::digest(self.text.as_bytes());
        hash.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Append `extension` to names that do not already carry one.
pub fn with_default_extension(name: &str, extension: &str) -> String {
    if name.contains('.') {
        name.to_string()
    } else {
        format!("{}.{}", name, extension.trim_start_matches('.'))
    }
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| BridgeError::ScriptNotFound(path.display().to_string()))
}
