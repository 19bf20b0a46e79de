//! Sales leads as rows of the `sales_leads` sheet.

use crate::{Config, LeadError, XlsxEditor};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const SHEET_NAME: &str = "sales_leads";

/// Header row, also the column order of every lead row.
pub const FIELDNAMES: [&str; 8] = [
    "visitor_name",
    "title",
    "company",
    "interests_of_solutions",
    "interested_in_pilot",
    "email",
    "phone_number",
    "next_steps",
];

/// One prospective customer. Fields left out default to "".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadRecord {
    pub visitor_name: String,
    pub title: String,
    pub company: String,
    pub interests_of_solutions: String,
    pub interested_in_pilot: String,
    pub email: String,
    pub phone_number: String,
    pub next_steps: String,
}

impl LeadRecord {
    /// Field values in [`FIELDNAMES`] order.
    pub fn values(&self) -> [&str; 8] {
        [
            self.visitor_name.as_str(),
            self.title.as_str(),
            self.company.as_str(),
            self.interests_of_solutions.as_str(),
            self.interested_in_pilot.as_str(),
            self.email.as_str(),
            self.phone_number.as_str(),
            self.next_steps.as_str(),
        ]
    }
}

/// What a successful append did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppendOutcome {
    /// Row the lead was written to.
    pub row: u32,
    /// Whether row 1 was empty and received the header.
    pub header_written: bool,
}

/// Appends leads to the workbook named by a resolved [`Config`].
#[derive(Debug, Clone)]
pub struct LeadAppender {
    target: PathBuf,
}

impl LeadAppender {
    pub fn new(config: &Config) -> Self {
        Self {
            target: config.target_excel_file().to_path_buf(),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn append(&self, record: &LeadRecord) -> Result<AppendOutcome, LeadError> {
        append_lead(&self.target, record)
    }
}

/// Appends `record` as one row of the `sales_leads` sheet of the workbook at `path`.
///
/// The sheet is added when missing and the header goes into row 1 while that
/// row is empty. The file is rewritten in place; concurrent writers are not
/// coordinated and the last save wins.
pub fn append_lead<P: AsRef<Path>>(path: P, record: &LeadRecord) -> Result<AppendOutcome, LeadError> {
    let path = path.as_ref();
    write_lead(path, record).map_err(|cause| LeadError::WorkbookIo {
        path: path.to_path_buf(),
        cause,
    })
}

fn write_lead(path: &Path, record: &LeadRecord) -> anyhow::Result<AppendOutcome> {
    let mut editor = XlsxEditor::open_or_create(path, SHEET_NAME)?;

    let header_written = editor.row_is_empty(1)?;
    if header_written {
        editor.put_row(1, FIELDNAMES)?;
    }
    let row = editor.append_row(record.values())?;
    editor.save(path)?;

    info!(path = %path.display(), row, header_written, "lead saved");
    Ok(AppendOutcome { row, header_written })
}
