//! Resolution of `config.json` to a writable target workbook.

use crate::LeadError;
use serde_json::Value;
use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};
use tracing::debug;

/// Looked up in the current working directory unless a path is given.
pub const CONFIG_FILENAME: &str = "config.json";
pub const TARGET_KEY: &str = "target_excel_file";

/// A validated configuration: the target exists and is writable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    source: PathBuf,
    target_excel_file: PathBuf,
}

impl Config {
    /// Reads and validates the configuration file at `path`.
    ///
    /// A relative `target_excel_file` is taken relative to the directory
    /// holding the configuration file. The target is never created here.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LeadError> {
        let source = path.as_ref().to_path_buf();
        if !source.exists() {
            return Err(LeadError::ConfigNotFound { path: source });
        }

        let malformed = |detail: String| LeadError::ConfigMalformed {
            path: source.clone(),
            detail,
        };
        let text = fs::read_to_string(&source)
            .map_err(|e| malformed(format!("cannot read configuration file: {e}")))?;
        let value: Value =
            serde_json::from_str(&text).map_err(|e| malformed(format!("invalid JSON: {e}")))?;
        if !value.is_object() {
            return Err(malformed("expected a JSON object".into()));
        }

        let target = match value.get(TARGET_KEY) {
            Some(Value::String(s)) if !s.is_empty() => PathBuf::from(s),
            None | Some(Value::Null) | Some(Value::String(_)) => {
                return Err(LeadError::ConfigKeyMissing {
                    path: source.clone(),
                    key: TARGET_KEY,
                });
            }
            Some(other) => {
                return Err(malformed(format!("'{TARGET_KEY}' must be a path string, got {other}")));
            }
        };

        let target = match source.parent() {
            Some(dir) if target.is_relative() && !dir.as_os_str().is_empty() => dir.join(target),
            _ => target,
        };
        check_target(&target)?;
        debug!(config = %source.display(), target = %target.display(), "configuration resolved");

        Ok(Self {
            source,
            target_excel_file: target,
        })
    }

    /// Loads `config.json` from the current working directory.
    pub fn load_default() -> Result<Self, LeadError> {
        Self::load(CONFIG_FILENAME)
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn target_excel_file(&self) -> &Path {
        &self.target_excel_file
    }
}

/// Path of the target workbook named by `config.json` in the working directory.
pub fn resolve_target_path() -> Result<PathBuf, LeadError> {
    Ok(Config::load_default()?.target_excel_file)
}

fn check_target(target: &Path) -> Result<(), LeadError> {
    if !target.is_file() {
        return Err(LeadError::TargetFileMissing {
            path: target.to_path_buf(),
        });
    }
    let not_writable = || LeadError::TargetFileNotWritable {
        path: target.to_path_buf(),
    };
    let meta = fs::metadata(target).map_err(|_| not_writable())?;
    if meta.permissions().readonly() {
        return Err(not_writable());
    }
    // открытие на запись без truncate файл не меняет
    OpenOptions::new()
        .write(true)
        .open(target)
        .map_err(|_| not_writable())?;
    Ok(())
}
