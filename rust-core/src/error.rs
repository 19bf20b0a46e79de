//! Error taxonomy for saving leads.

use std::path::PathBuf;

/// Everything that can stop a lead from reaching the spreadsheet.
///
/// Nothing is retried: each variant is raised where it is detected and
/// handed to the caller unchanged.
#[derive(Debug, thiserror::Error)]
pub enum LeadError {
    #[error("configuration file '{}' not found", path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("unusable configuration file '{}': {detail}", path.display())]
    ConfigMalformed { path: PathBuf, detail: String },

    #[error("missing '{key}' key in configuration file '{}'", path.display())]
    ConfigKeyMissing { path: PathBuf, key: &'static str },

    #[error(
        "configured Excel file does not exist: '{}'; create the file before saving leads",
        path.display()
    )]
    TargetFileMissing { path: PathBuf },

    #[error("no write access to configured Excel file: '{}'", path.display())]
    TargetFileNotWritable { path: PathBuf },

    #[error("workbook I/O failure on '{}': {cause:#}", path.display())]
    WorkbookIo { path: PathBuf, cause: anyhow::Error },
}

impl LeadError {
    /// Stable name of the failure condition, for machine-readable output.
    pub fn kind(&self) -> &'static str {
        match self {
            LeadError::ConfigNotFound { .. } => "ConfigNotFound",
            LeadError::ConfigMalformed { .. } => "ConfigMalformed",
            LeadError::ConfigKeyMissing { .. } => "ConfigKeyMissing",
            LeadError::TargetFileMissing { .. } => "TargetFileMissing",
            LeadError::TargetFileNotWritable { .. } => "TargetFileNotWritable",
            LeadError::WorkbookIo { .. } => "WorkbookIOFailure",
        }
    }

    /// The file the failure is about.
    pub fn path(&self) -> &std::path::Path {
        match self {
            LeadError::ConfigNotFound { path }
            | LeadError::ConfigMalformed { path, .. }
            | LeadError::ConfigKeyMissing { path, .. }
            | LeadError::TargetFileMissing { path }
            | LeadError::TargetFileNotWritable { path }
            | LeadError::WorkbookIo { path, .. } => path,
        }
    }
}
