use pyo3::exceptions::{
    PyFileNotFoundError, PyIOError, PyKeyError, PyPermissionError, PyRuntimeError, PyValueError,
};
use pyo3::prelude::*;

use lead_core::{CONFIG_FILENAME, Config, LeadAppender, LeadError, LeadRecord, SHEET_NAME};
use std::path::PathBuf;

/// Config problems surface as the exception a Python caller would expect.
fn to_py_err(err: LeadError) -> PyErr {
    let msg = err.to_string();
    match err {
        LeadError::ConfigNotFound { .. } | LeadError::TargetFileMissing { .. } => {
            PyFileNotFoundError::new_err(msg)
        }
        LeadError::ConfigMalformed { .. } => PyValueError::new_err(msg),
        LeadError::ConfigKeyMissing { .. } => PyKeyError::new_err(msg),
        LeadError::TargetFileNotWritable { .. } => PyPermissionError::new_err(msg),
        LeadError::WorkbookIo { .. } => PyIOError::new_err(msg),
    }
}

/// Append one sales lead to the `sales_leads` sheet of the configured workbook.
///
/// Every field is optional and defaults to an empty string.
#[pyfunction]
#[pyo3(signature = (
    visitor_name = None,
    title = None,
    company = None,
    interests_of_solutions = None,
    interested_in_pilot = None,
    email = None,
    phone_number = None,
    next_steps = None,
    config = None,
))]
#[allow(clippy::too_many_arguments)]
fn save_sales_lead(
    py: Python<'_>,
    visitor_name: Option<String>,
    title: Option<String>,
    company: Option<String>,
    interests_of_solutions: Option<String>,
    interested_in_pilot: Option<String>,
    email: Option<String>,
    phone_number: Option<String>,
    next_steps: Option<String>,
    config: Option<PathBuf>,
) -> PyResult<String> {
    let record = LeadRecord {
        visitor_name: visitor_name.unwrap_or_default(),
        title: title.unwrap_or_default(),
        company: company.unwrap_or_default(),
        interests_of_solutions: interests_of_solutions.unwrap_or_default(),
        interested_in_pilot: interested_in_pilot.unwrap_or_default(),
        email: email.unwrap_or_default(),
        phone_number: phone_number.unwrap_or_default(),
        next_steps: next_steps.unwrap_or_default(),
    };
    let config_path = config.unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME));

    // файл переписывается целиком, GIL на это время не нужен
    py.allow_threads(|| {
        let config = Config::load(&config_path)?;
        let appender = LeadAppender::new(&config);
        let outcome = appender.append(&record)?;
        Ok(format!(
            "Lead saved to '{}' in sheet '{}' (row {}).",
            appender.target().display(),
            SHEET_NAME,
            outcome.row
        ))
    })
    .map_err(to_py_err)
}

/// Write an empty workbook at `path` so it can be used as a lead target.
#[pyfunction]
fn create_workbook(path: PathBuf) -> PyResult<()> {
    lead_core::create_workbook(&path).map_err(|e| PyRuntimeError::new_err(format!("{e:#}")))
}

/// Sheet names of the workbook at `path`.
#[pyfunction]
fn scan_excel(path: PathBuf) -> PyResult<Vec<String>> {
    lead_core::scan(&path).map_err(|e| PyRuntimeError::new_err(format!("{e:#}")))
}

#[pyfunction]
fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[pymodule]
fn lead_sheet_py(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(save_sales_lead, m)?)?;
    m.add_function(wrap_pyfunction!(create_workbook, m)?)?;
    m.add_function(wrap_pyfunction!(scan_excel, m)?)?;
    m.add_function(wrap_pyfunction!(version, m)?)?;
    m.add("SHEET_NAME", SHEET_NAME)?;
    m.add("FIELDNAMES", lead_core::FIELDNAMES.to_vec())?;
    Ok(())
}
